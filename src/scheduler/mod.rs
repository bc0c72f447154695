pub mod dispatcher;
pub mod queue;

pub use dispatcher::{Assignment, Dispatcher};
pub use queue::PendingQueue;
