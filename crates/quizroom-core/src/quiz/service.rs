//! Async driver around the quiz engine.
//!
//! Translates [`QuizEvent`]s into engine transitions, delivers the resulting
//! prompts through a [`Channel`], applies the reveal delay, records finished
//! attempts and answers stats requests. Callers must not handle two events
//! of the same conversation concurrently; [`super::Dispatcher`] takes care
//! of that.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::{RngCore, SeedableRng};
use rand_pcg::Mcg128Xsl64;
use tracing::{debug, error, warn};

use super::channel::Channel;
use super::engine::{Completion, QuizEngine, Step};
use super::recorder::ResultRecorder;
use super::render;
use super::tasks::ConversationTasks;
use crate::analytics::{self, Analytics};
use crate::error::{CoreError, QuizError};
use crate::events::{ConversationId, MessageRef, Outbound, QuizEvent};
use crate::storage::ResultLog;

/// Timing and sampling knobs of the service.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Pause between "done" and the result reveal.
    pub reveal_delay: Duration,
    /// Delete answered question messages after this long. `None` keeps them.
    pub cleanup_delay: Option<Duration>,
    pub free_text_sample_size: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            reveal_delay: Duration::from_millis(1500),
            cleanup_delay: None,
            free_text_sample_size: analytics::DEFAULT_SAMPLE_SIZE,
        }
    }
}

pub struct QuizService<C, L: ?Sized> {
    engine: QuizEngine,
    recorder: ResultRecorder<L>,
    channel: Arc<C>,
    tasks: ConversationTasks,
    /// Last prompt sent to each conversation, deleted once answered.
    prompts: Mutex<HashMap<ConversationId, MessageRef>>,
    settings: ServiceSettings,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl<C: Channel, L: ResultLog + ?Sized + 'static> QuizService<C, L> {
    pub fn new(
        engine: QuizEngine,
        channel: Arc<C>,
        recorder: ResultRecorder<L>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            engine,
            recorder,
            channel,
            tasks: ConversationTasks::new(),
            prompts: Mutex::new(HashMap::new()),
            settings,
            rng: Mutex::new(Box::new(Mcg128Xsl64::from_entropy())),
        }
    }

    /// Replace the random source used for greetings and free-text samples.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Mutex::new(Box::new(rng));
        self
    }

    pub fn engine(&self) -> &QuizEngine {
        &self.engine
    }

    pub fn tasks(&self) -> &ConversationTasks {
        &self.tasks
    }

    fn rng(&self) -> MutexGuard<'_, Box<dyn RngCore + Send>> {
        self.rng.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn prompts(&self) -> MutexGuard<'_, HashMap<ConversationId, MessageRef>> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Handle one event of one conversation.
    ///
    /// Stale or duplicate input is ignored. Errors are channel failures or a
    /// result that could not be persisted.
    pub async fn handle(
        &self,
        conversation: ConversationId,
        event: QuizEvent,
    ) -> Result<(), CoreError> {
        let texts = self.engine.texts();
        match event {
            QuizEvent::Greet => {
                let greeting = {
                    let mut rng = self.rng();
                    self.engine
                        .catalog()
                        .greeting(&mut **rng)
                        .map(str::to_string)
                };
                self.channel
                    .send(conversation, &render::greeting(texts, greeting.as_deref()))
                    .await?;
            }
            QuizEvent::Start {
                participant,
                announce,
            } => {
                self.teardown(conversation);
                if announce {
                    self.channel
                        .send(conversation, &Outbound::text(&texts.already_reply))
                        .await?;
                }
                let step = self.engine.start(conversation, &participant);
                self.proceed(conversation, Ok(step)).await?;
            }
            QuizEvent::OptionSelected { question_id, value } => {
                let step = self
                    .engine
                    .select_option(conversation, &value, question_id.as_deref());
                self.proceed(conversation, step).await?;
            }
            QuizEvent::FreeTextSupplied { text } => {
                let step = self.engine.supply_free_text(conversation, &text);
                self.proceed(conversation, step).await?;
            }
            QuizEvent::ShowStats => {
                let report = self.stats_report();
                self.channel
                    .send(conversation, &Outbound::text(report))
                    .await?;
            }
        }
        Ok(())
    }

    /// Text rendering of the aggregate statistics over the whole result log.
    pub fn stats_report(&self) -> String {
        let records = analytics::load_records(self.recorder.log().as_ref());
        let analytics = Analytics::new(self.engine.catalog());
        let mut rng = self.rng();
        analytics
            .report(&records, self.settings.free_text_sample_size, &mut **rng)
            .render(self.engine.texts())
    }

    async fn proceed(
        &self,
        conversation: ConversationId,
        step: Result<Step, QuizError>,
    ) -> Result<(), CoreError> {
        let step = match step {
            Ok(step) => step,
            Err(e) if e.is_ignorable() => {
                debug!(%conversation, reason = %e, "event ignored");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        match step {
            Step::Prompt(prompt) => {
                let sent = self.channel.send(conversation, &prompt).await?;
                self.track_prompt(conversation, sent);
                Ok(())
            }
            Step::Completed(completion) => self.complete(conversation, completion).await,
        }
    }

    /// Remember the newest prompt and schedule deletion of the one it replaces.
    fn track_prompt(&self, conversation: ConversationId, sent: MessageRef) {
        let previous = self.prompts().insert(conversation, sent);
        let (Some(previous), Some(delay)) = (previous, self.settings.cleanup_delay) else {
            return;
        };
        let channel = Arc::clone(&self.channel);
        self.tasks.schedule(conversation, delay, async move {
            if let Err(e) = channel.delete(conversation, previous).await {
                debug!(%conversation, error = %e, "prompt clean-up failed");
            }
        });
    }

    /// Drop everything tied to the conversation's previous attempt.
    fn teardown(&self, conversation: ConversationId) {
        let cancelled = self.tasks.cancel(conversation);
        if cancelled > 0 {
            debug!(%conversation, cancelled, "pending clean-up cancelled");
        }
        self.prompts().remove(&conversation);
    }

    async fn complete(
        &self,
        conversation: ConversationId,
        completion: Completion,
    ) -> Result<(), CoreError> {
        let texts = self.engine.texts();
        self.teardown(conversation);

        if let Err(e) = self
            .channel
            .send(conversation, &Outbound::text(&texts.done))
            .await
        {
            warn!(%conversation, error = %e, "failed to announce completion");
        }

        tokio::time::sleep(self.settings.reveal_delay).await;

        // The session is kept until the record is durable.
        let record = match self.recorder.record(&completion) {
            Ok(record) => record,
            Err(e) => {
                error!(%conversation, error = %e, "result could not be persisted");
                self.engine.finish(conversation);
                if let Err(send_err) = self
                    .channel
                    .send(conversation, &Outbound::text(&texts.apology))
                    .await
                {
                    warn!(%conversation, error = %send_err, "failed to send apology");
                }
                return Err(e.into());
            }
        };
        self.engine.finish(conversation);

        if let Some(category) = self.engine.catalog().category(&record.winning_category) {
            let photo = render::result_photo(category);
            if let Err(e) = self.channel.send(conversation, &photo).await {
                warn!(%conversation, error = %e, "photo delivery failed, sending caption only");
                self.channel
                    .send(conversation, &Outbound::text(photo.body()))
                    .await?;
            }
        }
        self.channel
            .send(conversation, &render::stats_offer(texts))
            .await?;
        Ok(())
    }
}
