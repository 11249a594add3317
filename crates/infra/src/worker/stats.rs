use serde::Serialize;

/// Worker runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub received: u64,
    pub succeeded: u64,
    pub computation_errors: u64,
    pub poison_messages: u64,
    pub publish_failures: u64,
    pub redeliveries: u64,
    pub receive_errors: u64,
}

impl WorkerStats {
    /// Outcomes successfully stored (values and computation errors alike).
    pub fn published(&self) -> u64 {
        self.succeeded + self.computation_errors
    }

    pub(crate) fn merge(&mut self, other: &WorkerStats) {
        self.received += other.received;
        self.succeeded += other.succeeded;
        self.computation_errors += other.computation_errors;
        self.poison_messages += other.poison_messages;
        self.publish_failures += other.publish_failures;
        self.redeliveries += other.redeliveries;
        self.receive_errors += other.receive_errors;
    }
}
