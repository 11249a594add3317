use std::collections::HashMap;
use std::sync::RwLock;

use asyncalc_core::{JobId, LookupResult, Outcome};

use super::r#trait::{ResultStore, StoreError};

/// In-memory result store.
///
/// Intended for tests/dev and the API's embedded mode.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    outcomes: RwLock<HashMap<JobId, Outcome>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.outcomes.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultStore for InMemoryResultStore {
    fn put(&self, outcome: &Outcome) -> Result<(), StoreError> {
        let mut outcomes = self
            .outcomes
            .write()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))?;
        outcomes.insert(outcome.job_id, outcome.clone());
        Ok(())
    }

    fn get(&self, job_id: JobId) -> Result<LookupResult, StoreError> {
        let outcomes = self
            .outcomes
            .read()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))?;
        Ok(outcomes
            .get(&job_id)
            .cloned()
            .map_or(LookupResult::Pending, LookupResult::Completed))
    }
}

#[cfg(test)]
mod tests {
    use asyncalc_core::ComputationError;

    use super::*;

    #[test]
    fn unknown_id_is_pending() {
        let store = InMemoryResultStore::new();
        assert_eq!(store.get(JobId::new()).unwrap(), LookupResult::Pending);
    }

    #[test]
    fn put_then_get_is_completed() {
        let store = InMemoryResultStore::new();
        let id = JobId::new();
        let outcome = Outcome::success(id, 9.0);

        store.put(&outcome).unwrap();
        assert_eq!(store.get(id).unwrap(), LookupResult::Completed(outcome));
    }

    #[test]
    fn republishing_the_same_outcome_is_idempotent() {
        let store = InMemoryResultStore::new();
        let id = JobId::new();
        let outcome = Outcome::computation_error(id, &ComputationError::DivisionByZero);

        store.put(&outcome).unwrap();
        let first = store.get(id).unwrap();
        store.put(&outcome).unwrap();

        assert_eq!(store.get(id).unwrap(), first);
        assert_eq!(store.len(), 1);
    }
}
