pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod shutdown;
pub mod stats;
pub mod wire;
pub mod worker;

pub use config::ServerConfig;
pub use error::{DispatchError, Result};
pub use scheduler::Dispatcher;
pub use server::Server;
