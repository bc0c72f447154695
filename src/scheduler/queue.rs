use std::collections::VecDeque;

/// FIFO queue of job ids awaiting assignment.
///
/// A job id appears at most once, and only while its job is queued.
#[derive(Debug, Default)]
pub struct PendingQueue {
    ids: VecDeque<u16>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job id at the tail. Returns false if the id is already
    /// queued.
    pub fn push(&mut self, job_id: u16) -> bool {
        if self.ids.contains(&job_id) {
            return false;
        }
        self.ids.push_back(job_id);
        true
    }

    /// Pop the job id at the head.
    pub fn pop(&mut self) -> Option<u16> {
        self.ids.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_fifo_order() {
        let mut queue = PendingQueue::new();
        assert!(queue.push(1));
        assert!(queue.push(2));
        assert!(queue.push(3));
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut queue = PendingQueue::new();
        assert!(queue.push(5));
        assert!(!queue.push(5));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn empty_queue_pops_none() {
        let mut queue = PendingQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }
}
