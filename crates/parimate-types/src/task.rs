use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Chat-side user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub i64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a task in the registry, assigned in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub usize);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A task a user commits to and later proves with a video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub owner_id: OwnerId,
    pub name: String,
    /// Free-text description of what the video should show.
    pub description: String,
    /// Keyword or sentence the user must say on camera.
    pub phrase: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory, append-only task list. Tasks are never mutated or removed.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<Vec<Task>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new task and return it with its assigned id.
    pub async fn create(
        &self,
        owner_id: OwnerId,
        name: impl Into<String>,
        description: impl Into<String>,
        phrase: impl Into<String>,
    ) -> Task {
        let mut tasks = self.tasks.write().await;
        let task = Task {
            id: TaskId(tasks.len()),
            owner_id,
            name: name.into(),
            description: description.into(),
            phrase: phrase.into(),
            created_at: Utc::now(),
        };
        tasks.push(task.clone());
        task
    }

    pub async fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks.read().await.get(id.0).cloned()
    }

    /// Tasks created by `owner`, oldest first.
    pub async fn tasks_for(&self, owner: OwnerId) -> Vec<Task> {
        self.tasks
            .read()
            .await
            .iter()
            .filter(|t| t.owner_id == owner)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ids_follow_creation_order() {
        let registry = TaskRegistry::new();
        let a = registry.create(OwnerId(1), "run", "a morning run", "sunrise").await;
        let b = registry.create(OwnerId(2), "read", "read a chapter", "charisma").await;
        assert_eq!(a.id, TaskId(0));
        assert_eq!(b.id, TaskId(1));
        assert_eq!(registry.get(TaskId(1)).await.unwrap().name, "read");
        assert!(registry.get(TaskId(2)).await.is_none());
    }

    #[tokio::test]
    async fn test_tasks_for_owner() {
        let registry = TaskRegistry::new();
        registry.create(OwnerId(7), "first", "d", "p").await;
        registry.create(OwnerId(8), "other", "d", "p").await;
        registry.create(OwnerId(7), "second", "d", "p").await;

        let mine: Vec<String> = registry
            .tasks_for(OwnerId(7))
            .await
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(mine, vec!["first", "second"]);
        assert_eq!(registry.len().await, 3);
    }
}
