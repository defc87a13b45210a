use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use parimate_types::{OwnerId, ParimateError, TaskId};

/// Active sessions keyed by `(owner, task)`. At most one session per key.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    active: Arc<DashMap<(OwnerId, TaskId), Uuid>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `(owner, task)`, failing with `SessionBusy` while
    /// another session holds it.
    pub fn acquire(
        &self,
        owner_id: OwnerId,
        task_id: TaskId,
        session_id: Uuid,
    ) -> Result<(), ParimateError> {
        match self.active.entry((owner_id, task_id)) {
            Entry::Occupied(_) => Err(ParimateError::SessionBusy { owner_id, task_id }),
            Entry::Vacant(slot) => {
                slot.insert(session_id);
                Ok(())
            }
        }
    }

    /// Free the slot if `session_id` still holds it.
    pub fn release(&self, owner_id: OwnerId, task_id: TaskId, session_id: Uuid) -> bool {
        self.active
            .remove_if(&(owner_id, task_id), |_, holder| *holder == session_id)
            .is_some()
    }

    pub fn active_session(&self, owner_id: OwnerId, task_id: TaskId) -> Option<Uuid> {
        self.active.get(&(owner_id, task_id)).map(|s| *s.value())
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_session_per_key() {
        let registry = SessionRegistry::new();
        let first = Uuid::new_v4();
        registry.acquire(OwnerId(1), TaskId(0), first).unwrap();

        let err = registry
            .acquire(OwnerId(1), TaskId(0), Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(
            err,
            ParimateError::SessionBusy {
                owner_id: OwnerId(1),
                task_id: TaskId(0)
            }
        ));

        // Other keys are independent.
        registry.acquire(OwnerId(1), TaskId(1), Uuid::new_v4()).unwrap();
        registry.acquire(OwnerId(2), TaskId(0), Uuid::new_v4()).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.active_session(OwnerId(1), TaskId(0)), Some(first));
    }

    #[test]
    fn test_release_only_by_holder() {
        let registry = SessionRegistry::new();
        let holder = Uuid::new_v4();
        registry.acquire(OwnerId(5), TaskId(2), holder).unwrap();

        assert!(!registry.release(OwnerId(5), TaskId(2), Uuid::new_v4()));
        assert!(registry.active_session(OwnerId(5), TaskId(2)).is_some());

        assert!(registry.release(OwnerId(5), TaskId(2), holder));
        assert!(registry.is_empty());
        registry.acquire(OwnerId(5), TaskId(2), Uuid::new_v4()).unwrap();
    }
}
