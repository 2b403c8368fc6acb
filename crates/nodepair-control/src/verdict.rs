//! Write-once outcome shared by racing tasks.
//!
//! While the node waits, the payload receiver and the console watcher race to
//! decide how the wait ends. The first one to call [`Verdict::settle`] wins;
//! every later call is rejected and the caller must not act on its result.
//! Deciding also cancels every token handed out by [`Verdict::child_token`],
//! which is how the losing participant learns to stop.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// A first-writer-wins slot.
#[derive(Debug)]
pub struct Verdict<T> {
    slot: Mutex<Option<T>>,
    decided: CancellationToken,
}

impl<T> Verdict<T> {
    /// Create an undecided verdict.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            decided: CancellationToken::new(),
        }
    }

    /// Record `outcome` if nothing was recorded yet.
    ///
    /// Returns `true` if this call decided the verdict.
    pub fn settle(&self, outcome: T) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() || self.decided.is_cancelled() {
            return false;
        }
        *slot = Some(outcome);
        drop(slot);

        self.decided.cancel();
        true
    }

    /// Whether an outcome has been recorded.
    #[must_use]
    pub fn is_decided(&self) -> bool {
        self.decided.is_cancelled()
    }

    /// A token cancelled as soon as the verdict is decided.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.decided.child_token()
    }

    /// Wait until the verdict is decided and take the outcome.
    ///
    /// Returns `None` if the outcome was already taken.
    pub async fn wait(&self) -> Option<T> {
        self.decided.cancelled().await;
        self.slot.lock().take()
    }
}

impl<T> Default for Verdict<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn first_settle_wins() {
        let verdict = Verdict::new();
        assert!(!verdict.is_decided());

        assert!(verdict.settle("abort"));
        assert!(!verdict.settle("payload"));
        assert!(verdict.is_decided());
    }

    #[tokio::test]
    async fn wait_returns_winner() {
        let verdict = Verdict::new();
        verdict.settle(1);
        verdict.settle(2);

        assert_eq!(verdict.wait().await, Some(1));
        assert_eq!(verdict.wait().await, None);
    }

    #[tokio::test]
    async fn child_tokens_fire_on_decision() {
        let verdict = Verdict::<()>::new();
        let child = verdict.child_token();
        assert!(!child.is_cancelled());

        verdict.settle(());
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn concurrent_settles_have_one_winner() {
        let verdict = Arc::new(Verdict::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let verdict = Arc::clone(&verdict);
                tokio::spawn(async move { verdict.settle(i) })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert!(verdict.wait().await.is_some());
    }
}
