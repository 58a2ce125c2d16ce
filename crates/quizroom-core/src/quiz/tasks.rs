//! Delayed side effects tied to a conversation's lifecycle.
//!
//! Every task is scheduled against a conversation and aborted when that
//! conversation is torn down (restart or completion), so nothing fires
//! against state that no longer exists.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::events::ConversationId;

#[derive(Debug, Default)]
pub struct ConversationTasks {
    handles: Mutex<HashMap<ConversationId, Vec<JoinHandle<()>>>>,
}

impl ConversationTasks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConversationId, Vec<JoinHandle<()>>>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `task` after `delay` unless the conversation is cancelled first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F>(&self, conversation: ConversationId, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        let mut handles = self.lock();
        let entry = handles.entry(conversation).or_default();
        entry.retain(|h| !h.is_finished());
        entry.push(handle);
    }

    /// Abort every pending task of the conversation. Returns how many were
    /// still pending.
    pub fn cancel(&self, conversation: ConversationId) -> usize {
        let Some(handles) = self.lock().remove(&conversation) else {
            return 0;
        };
        let mut pending = 0;
        for handle in handles {
            if !handle.is_finished() {
                handle.abort();
                pending += 1;
            }
        }
        pending
    }

    /// Tasks scheduled for the conversation that have not finished yet.
    pub fn pending(&self, conversation: ConversationId) -> usize {
        self.lock()
            .get(&conversation)
            .map(|hs| hs.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }
}

impl Drop for ConversationTasks {
    fn drop(&mut self) {
        for handle in self.lock().drain().flat_map(|(_, hs)| hs) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const CONV: ConversationId = ConversationId(1);

    #[tokio::test(start_paused = true)]
    async fn scheduled_task_runs_after_delay() {
        let tasks = ConversationTasks::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        tasks.schedule(CONV, Duration::from_secs(5), async move {
            h.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(tasks.pending(CONV), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(tasks.pending(CONV), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_pending_tasks() {
        let tasks = ConversationTasks::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let h = Arc::clone(&hits);
            tasks.schedule(CONV, Duration::from_secs(5), async move {
                h.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(tasks.cancel(CONV), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(tasks.cancel(CONV), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_only_touches_one_conversation() {
        let tasks = ConversationTasks::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        tasks.schedule(ConversationId(2), Duration::from_secs(1), async move {
            h.fetch_add(1, Ordering::SeqCst);
        });
        tasks.cancel(CONV);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
