//! Per-conversation event queues.
//!
//! Each conversation gets its own worker task fed by an unbounded queue, so
//! its events are handled strictly in arrival order while different
//! conversations proceed concurrently. Idle workers shut themselves down.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error};

use super::channel::Channel;
use super::service::QuizService;
use crate::events::{ConversationId, QuizEvent};
use crate::storage::ResultLog;

type QueueMap = HashMap<ConversationId, UnboundedSender<QuizEvent>>;
type Queues = Arc<Mutex<QueueMap>>;

fn lock(queues: &Queues) -> MutexGuard<'_, QueueMap> {
    queues.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct Dispatcher<C, L: ?Sized> {
    service: Arc<QuizService<C, L>>,
    queues: Queues,
    idle_timeout: Duration,
}

impl<C: Channel, L: ResultLog + ?Sized + 'static> Dispatcher<C, L> {
    pub fn new(service: Arc<QuizService<C, L>>, idle_timeout: Duration) -> Self {
        Self {
            service,
            queues: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout,
        }
    }

    pub fn service(&self) -> &Arc<QuizService<C, L>> {
        &self.service
    }

    /// Queue an event behind every earlier event of the same conversation.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, conversation: ConversationId, event: QuizEvent) {
        let mut queues = lock(&self.queues);

        let event = match queues.get(&conversation) {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                // Worker died; start a new one with the returned event.
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(event).is_err() {
            return;
        }
        queues.insert(conversation, tx);
        drop(queues);

        tokio::spawn(run_worker(
            Arc::clone(&self.service),
            Arc::clone(&self.queues),
            conversation,
            rx,
            self.idle_timeout,
        ));
    }

    /// Conversations that currently have a live worker.
    pub fn active_conversations(&self) -> usize {
        lock(&self.queues).len()
    }
}

async fn run_worker<C, L>(
    service: Arc<QuizService<C, L>>,
    queues: Queues,
    conversation: ConversationId,
    mut rx: UnboundedReceiver<QuizEvent>,
    idle_timeout: Duration,
) where
    C: Channel,
    L: ResultLog + ?Sized + 'static,
{
    loop {
        match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(event)) => {
                if let Err(e) = service.handle(conversation, event).await {
                    error!(%conversation, error = %e, "event handling failed");
                }
            }
            Ok(None) => break,
            Err(_) => {
                // Senders only push while holding the map lock, so an empty
                // queue here cannot gain an event before the entry is gone.
                let mut queues = lock(&queues);
                if rx.is_empty() {
                    queues.remove(&conversation);
                    debug!(%conversation, "idle conversation worker stopped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::small_catalog;
    use crate::quiz::channel::recording::RecordingChannel;
    use crate::quiz::{
        QuizEngine, QuizTexts, ResultRecorder, ScoringResolver, ServiceSettings, SessionStore,
    };
    use crate::storage::Database;

    fn dispatcher() -> (
        Dispatcher<RecordingChannel, Database>,
        Arc<RecordingChannel>,
        Arc<Database>,
    ) {
        let catalog = Arc::new(small_catalog());
        let resolver = ScoringResolver::new(vec![], &catalog);
        let engine = QuizEngine::new(
            catalog,
            resolver,
            Arc::new(SessionStore::new()),
            QuizTexts::default(),
        );
        let channel = Arc::new(RecordingChannel::default());
        let db = Arc::new(Database::open_memory().unwrap());
        let service = QuizService::new(
            engine,
            Arc::clone(&channel),
            ResultRecorder::new(Arc::clone(&db), 0),
            ServiceSettings::default(),
        );
        (
            Dispatcher::new(Arc::new(service), Duration::from_secs(60)),
            channel,
            db,
        )
    }

    fn pick(value: &str) -> QuizEvent {
        QuizEvent::OptionSelected {
            question_id: None,
            value: value.into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn events_of_one_conversation_run_in_order() {
        let (dispatcher, channel, db) = dispatcher();
        let conv = ConversationId(1);
        dispatcher.dispatch(
            conv,
            QuizEvent::Start {
                participant: "alice".into(),
                announce: false,
            },
        );
        dispatcher.dispatch(conv, pick("b"));
        dispatcher.dispatch(conv, pick("a"));

        tokio::time::sleep(Duration::from_secs(5)).await;

        let records = db.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].answers[0].value, "b");
        assert_eq!(records[0].answers[1].value, "a");
        assert_eq!(records[0].winning_category, "C2");
        assert!(channel.bodies(conv)[0].starts_with("Question 1/2"));
    }

    #[tokio::test(start_paused = true)]
    async fn conversations_do_not_block_each_other() {
        let (dispatcher, _channel, db) = dispatcher();
        for id in 1..=3 {
            let conv = ConversationId(id);
            dispatcher.dispatch(
                conv,
                QuizEvent::Start {
                    participant: format!("user{id}"),
                    announce: false,
                },
            );
            dispatcher.dispatch(conv, pick("a"));
            dispatcher.dispatch(conv, pick("b"));
        }
        assert_eq!(dispatcher.active_conversations(), 3);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(db.read_all().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_workers_stop_and_restart_on_demand() {
        let (dispatcher, channel, _db) = dispatcher();
        let conv = ConversationId(9);
        dispatcher.dispatch(conv, QuizEvent::Greet);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(dispatcher.active_conversations(), 0);

        dispatcher.dispatch(conv, QuizEvent::Greet);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(channel.bodies(conv).len(), 2);
    }
}
