//! Single-owner registry for the shared probe.
//!
//! Many tasks on a checklist can ask the one probe for a reading, but only
//! the most recent requester is the *active reader*. Claiming is cooperative:
//! a new claim simply replaces the owner, and the previous owner notices on
//! its next ownership check (or through [`ReaderRegistry::subscribe`]).
//!
//! Every claim issues a fresh [`RequestToken`]. Tokens strictly increase, so
//! probe events tagged with an older token can be recognised as belonging to
//! a superseded request.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use dishtemp_types::{RequestToken, TaskId};

/// Snapshot of who owns the probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    /// The active reader, if any.
    pub owner: Option<TaskId>,
    /// Token of the active reader's request.
    pub token: Option<RequestToken>,
}

impl Ownership {
    /// Whether `task_id` is the active reader.
    pub fn is_owner(&self, task_id: &TaskId) -> bool {
        self.owner.as_ref() == Some(task_id)
    }
}

/// Source of truth for the active reader.
#[derive(Debug)]
pub struct ReaderRegistry {
    ownership: watch::Sender<Ownership>,
    next_sequence: AtomicU64,
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderRegistry {
    /// Create a registry with no owner.
    pub fn new() -> Self {
        let (ownership, _) = watch::channel(Ownership::default());
        Self {
            ownership,
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Make `task_id` the active reader and issue a new request token.
    ///
    /// Claiming again while already the owner still issues a new token, so
    /// events from the earlier request become stale.
    pub fn claim(&self, task_id: &TaskId) -> RequestToken {
        let token = RequestToken::new(self.next_sequence.fetch_add(1, Ordering::SeqCst));
        let previous = self.ownership.send_replace(Ownership {
            owner: Some(task_id.clone()),
            token: Some(token),
        });
        match previous.owner {
            Some(prev) if &prev != task_id => {
                debug!(task_id = %task_id, previous = %prev, token = %token, "Probe ownership preempted");
            }
            _ => debug!(task_id = %task_id, token = %token, "Probe claimed"),
        }
        token
    }

    /// Clear ownership if `task_id` still owns the probe with `token`.
    ///
    /// Returns `true` if ownership was released.
    pub fn release(&self, task_id: &TaskId, token: RequestToken) -> bool {
        let released = self.ownership.send_if_modified(|current| {
            if current.is_owner(task_id) && current.token == Some(token) {
                *current = Ownership::default();
                true
            } else {
                false
            }
        });
        if released {
            debug!(task_id = %task_id, token = %token, "Probe released");
        }
        released
    }

    /// Current ownership snapshot.
    pub fn current(&self) -> Ownership {
        self.ownership.borrow().clone()
    }

    /// The active reader, if any.
    pub fn owner(&self) -> Option<TaskId> {
        self.ownership.borrow().owner.clone()
    }

    /// Whether `task_id` is the active reader.
    pub fn is_owner(&self, task_id: &TaskId) -> bool {
        self.ownership.borrow().is_owner(task_id)
    }

    /// Token of the most recent claim, if the probe is owned.
    pub fn latest_token(&self) -> Option<RequestToken> {
        self.ownership.borrow().token
    }

    /// Subscribe to ownership changes.
    pub fn subscribe(&self) -> watch::Receiver<Ownership> {
        self.ownership.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_no_owner() {
        let registry = ReaderRegistry::new();
        assert_eq!(registry.owner(), None);
        assert_eq!(registry.latest_token(), None);
        assert!(!registry.is_owner(&TaskId::new("a")));
    }

    #[test]
    fn test_claim_sets_owner_and_token() {
        let registry = ReaderRegistry::new();
        let a = TaskId::new("a");
        let token = registry.claim(&a);
        assert_eq!(token, RequestToken::new(1));
        assert!(registry.is_owner(&a));
        assert_eq!(registry.latest_token(), Some(token));
    }

    #[test]
    fn test_new_claim_preempts() {
        let registry = ReaderRegistry::new();
        let a = TaskId::new("a");
        let b = TaskId::new("b");
        let first = registry.claim(&a);
        let second = registry.claim(&b);
        assert!(second > first);
        assert!(!registry.is_owner(&a));
        assert!(registry.is_owner(&b));
    }

    #[test]
    fn test_reclaim_issues_new_token() {
        let registry = ReaderRegistry::new();
        let a = TaskId::new("a");
        let first = registry.claim(&a);
        let second = registry.claim(&a);
        assert!(second > first);
        assert_eq!(registry.latest_token(), Some(second));
    }

    #[test]
    fn test_release_requires_matching_token() {
        let registry = ReaderRegistry::new();
        let a = TaskId::new("a");
        let b = TaskId::new("b");
        let stale = registry.claim(&a);
        let current = registry.claim(&a);

        assert!(!registry.release(&a, stale));
        assert!(!registry.release(&b, current));
        assert!(registry.is_owner(&a));

        assert!(registry.release(&a, current));
        assert_eq!(registry.current(), Ownership::default());
    }

    #[tokio::test]
    async fn test_subscribers_see_preemption() {
        let registry = ReaderRegistry::new();
        let mut rx = registry.subscribe();
        registry.claim(&TaskId::new("a"));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_owner(&TaskId::new("a")));

        registry.claim(&TaskId::new("b"));
        rx.changed().await.unwrap();
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.owner, Some(TaskId::new("b")));
        assert_eq!(seen.token, Some(RequestToken::new(2)));
    }
}
