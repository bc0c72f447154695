use std::collections::HashMap;

use crate::wire::{ErrorCode, WIRE_STATUS_FAILURE, WIRE_STATUS_SUCCESS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Ready,
    Busy,
    /// Reported success, completion logic not yet applied by the sweep.
    Success,
    /// Reported failure, retry logic not yet applied by the sweep.
    Failure,
}

impl WorkerStatus {
    pub fn from_wire(v: i16) -> Option<Self> {
        match v {
            0 => Some(WorkerStatus::Ready),
            2 => Some(WorkerStatus::Busy),
            WIRE_STATUS_SUCCESS => Some(WorkerStatus::Success),
            WIRE_STATUS_FAILURE => Some(WorkerStatus::Failure),
            _ => None,
        }
    }
}

/// Server-side record of one connected worker. The id doubles as the
/// connection identity.
#[derive(Debug, Clone)]
pub struct Worker {
    pub worker_id: u16,
    pub status: WorkerStatus,
    /// Valid only while the worker is busy.
    pub cur_job_id: Option<u16>,
    pub error_code: ErrorCode,
    pub jobs_completed: u64,
    /// Result text reported but not yet applied by the sweep.
    pub pending_result: Option<String>,
}

impl Worker {
    fn new(worker_id: u16) -> Self {
        Self {
            worker_id,
            status: WorkerStatus::Ready,
            cur_job_id: None,
            error_code: ErrorCode::Ok,
            jobs_completed: 0,
            pending_result: None,
        }
    }
}

/// Owns worker records, keyed by connection id, preserving registration
/// order for the FCFS pick and the full-worker sweep.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: HashMap<u16, Worker>,
    order: Vec<u16>,
    next_id: u16,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new worker in the Ready state and return its id.
    ///
    /// Ids count upward and wrap; a wrapped id that still names a live
    /// worker is skipped rather than clobbered.
    pub fn insert(&mut self) -> u16 {
        loop {
            self.next_id = self.next_id.wrapping_add(1);
            let worker_id = self.next_id;
            if self.workers.contains_key(&worker_id) {
                continue;
            }
            self.workers.insert(worker_id, Worker::new(worker_id));
            self.order.push(worker_id);
            return worker_id;
        }
    }

    pub fn get(&self, worker_id: u16) -> Option<&Worker> {
        self.workers.get(&worker_id)
    }

    pub fn get_mut(&mut self, worker_id: u16) -> Option<&mut Worker> {
        self.workers.get_mut(&worker_id)
    }

    /// Remove a worker record. Outstanding lookups for the id report
    /// not-found from here on.
    pub fn remove(&mut self, worker_id: u16) -> Option<Worker> {
        self.order.retain(|&id| id != worker_id);
        self.workers.remove(&worker_id)
    }

    /// First Ready worker in registration order.
    pub fn first_ready(&self) -> Option<u16> {
        self.order
            .iter()
            .copied()
            .find(|id| matches!(self.workers.get(id), Some(w) if w.status == WorkerStatus::Ready))
    }

    /// Ids of workers that reported a result or failure and are waiting for
    /// the sweep, in registration order.
    pub fn reported(&self) -> Vec<u16> {
        self.order
            .iter()
            .copied()
            .filter(|id| {
                matches!(
                    self.workers.get(id),
                    Some(w) if matches!(w.status, WorkerStatus::Success | WorkerStatus::Failure)
                )
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Worker> {
        self.order.iter().filter_map(|id| self.workers.get(id))
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_starts_ready() {
        let mut registry = WorkerRegistry::new();
        let id = registry.insert();
        let worker = registry.get(id).unwrap();
        assert_eq!(worker.status, WorkerStatus::Ready);
        assert!(worker.cur_job_id.is_none());
        assert_eq!(worker.jobs_completed, 0);
    }

    #[test]
    fn remove_invalidates_lookup() {
        let mut registry = WorkerRegistry::new();
        let id = registry.insert();
        assert!(registry.remove(id).is_some());
        assert!(registry.get(id).is_none());
        assert!(registry.remove(id).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn first_ready_follows_registration_order() {
        let mut registry = WorkerRegistry::new();
        let a = registry.insert();
        let b = registry.insert();
        assert_eq!(registry.first_ready(), Some(a));

        registry.get_mut(a).unwrap().status = WorkerStatus::Busy;
        assert_eq!(registry.first_ready(), Some(b));

        registry.get_mut(b).unwrap().status = WorkerStatus::Busy;
        assert_eq!(registry.first_ready(), None);
    }

    #[test]
    fn reported_only_returns_swept_states() {
        let mut registry = WorkerRegistry::new();
        let a = registry.insert();
        let b = registry.insert();
        let c = registry.insert();
        registry.get_mut(a).unwrap().status = WorkerStatus::Success;
        registry.get_mut(b).unwrap().status = WorkerStatus::Busy;
        registry.get_mut(c).unwrap().status = WorkerStatus::Failure;
        assert_eq!(registry.reported(), vec![a, c]);
    }

    #[test]
    fn id_wrap_skips_live_workers() {
        let mut registry = WorkerRegistry::new();
        let first = registry.insert();

        // Burn through the id space with short-lived workers, wrapping
        // next_id past zero.
        for _ in 0..u16::MAX {
            let id = registry.insert();
            registry.remove(id);
        }

        let second = registry.insert();
        assert_ne!(second, first);
        assert!(registry.get(first).is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn status_from_wire() {
        assert_eq!(WorkerStatus::from_wire(0), Some(WorkerStatus::Ready));
        assert_eq!(WorkerStatus::from_wire(1), Some(WorkerStatus::Success));
        assert_eq!(WorkerStatus::from_wire(-1), Some(WorkerStatus::Failure));
        assert_eq!(WorkerStatus::from_wire(2), Some(WorkerStatus::Busy));
        assert_eq!(WorkerStatus::from_wire(7), None);
    }
}
