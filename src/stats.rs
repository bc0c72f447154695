/// Operator-visible snapshot derived from the registries. Never
/// authoritative; always recomputable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Jobs that reached a terminal state.
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub in_queue: usize,
    pub in_progress: usize,
    pub workers: usize,
}

impl std::fmt::Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "jobs processed: {}", self.processed)?;
        writeln!(f, "  succeeded:    {}", self.succeeded)?;
        writeln!(f, "  failed:       {}", self.failed)?;
        writeln!(f, "in queue:       {}", self.in_queue)?;
        writeln!(f, "in progress:    {}", self.in_progress)?;
        write!(f, "workers:        {}", self.workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_every_counter() {
        let stats = Stats {
            processed: 3,
            succeeded: 2,
            failed: 1,
            in_queue: 4,
            in_progress: 1,
            workers: 2,
        };
        let text = stats.to_string();
        assert!(text.contains("jobs processed: 3"));
        assert!(text.contains("succeeded:    2"));
        assert!(text.contains("failed:       1"));
        assert!(text.contains("in queue:       4"));
        assert!(text.contains("workers:        2"));
    }
}
