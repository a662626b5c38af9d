//! Fan-out with a join barrier.
//!
//! Every future pushed into a [`TaskGroup`] runs as its own tokio task.
//! [`TaskGroup::join`] waits for all of them, never cancelling any, and
//! hands back the results indexed by spawn order rather than completion
//! order.

use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;
use tokio::task::{Id, JoinSet};

/// A task that panicked or was aborted instead of producing a value
#[derive(Debug, Clone, Error)]
#[error("task failed: {0}")]
pub struct TaskFailed(pub String);

pub struct TaskGroup<T> {
    set: JoinSet<T>,
    /// Spawn index of every task, keyed by its tokio task id
    slots: HashMap<Id, usize>,
}

impl<T: Send + 'static> TaskGroup<T> {
    pub fn new() -> Self {
        Self {
            set: JoinSet::new(),
            slots: HashMap::new(),
        }
    }

    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let index = self.slots.len();
        let handle = self.set.spawn(future);
        self.slots.insert(handle.id(), index);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Barrier: resolves once every task has finished.
    ///
    /// A task that panicked shows up as `Err(TaskFailed)` in its own slot;
    /// the other slots still carry their results.
    pub async fn join(mut self) -> Vec<Result<T, TaskFailed>> {
        let mut results: Vec<Option<Result<T, TaskFailed>>> = (0..self.slots.len()).map(|_| None).collect();

        while let Some(joined) = self.set.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, value)) => (id, Ok(value)),
                Err(err) => (err.id(), Err(TaskFailed(err.to_string()))),
            };
            if let Some(slot) = self.slots.get(&id).and_then(|&index| results.get_mut(index)) {
                *slot = Some(result);
            }
        }

        results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(TaskFailed("task did not report".to_string()))))
            .collect()
    }
}

impl<T: Send + 'static> Default for TaskGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn results_follow_spawn_order_not_completion_order() {
        let mut group = TaskGroup::new();
        for (i, delay) in [30u64, 5, 20, 0].into_iter().enumerate() {
            group.spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                i
            });
        }
        assert_eq!(group.len(), 4);

        let results: Vec<usize> = group.join().await.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(results, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn empty_group_joins_immediately() {
        let group: TaskGroup<u8> = TaskGroup::new();
        assert!(group.is_empty());
        assert!(group.join().await.is_empty());
    }

    #[tokio::test]
    async fn panicking_task_fails_only_its_slot() {
        let mut group = TaskGroup::new();
        group.spawn(async { 1 });
        group.spawn(async {
            if true {
                panic!("boom");
            }
            2
        });
        group.spawn(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            3
        });

        let results = group.join().await;
        assert_eq!(results.len(), 3);
        assert_eq!(*results[0].as_ref().unwrap(), 1);
        assert!(results[1].is_err());
        assert_eq!(*results[2].as_ref().unwrap(), 3);
    }

    #[tokio::test]
    async fn panic_messages_stay_with_their_task() {
        let mut group: TaskGroup<u8> = TaskGroup::new();
        group.spawn(async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            if true {
                panic!("slow failure");
            }
            1
        });
        group.spawn(async {
            if true {
                panic!("fast failure");
            }
            2
        });

        let results = group.join().await;
        let first = results[0].as_ref().unwrap_err();
        let second = results[1].as_ref().unwrap_err();
        assert!(first.0.contains("slow failure"), "got {}", first.0);
        assert!(second.0.contains("fast failure"), "got {}", second.0);
    }
}
