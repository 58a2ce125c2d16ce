//! Quiz state machine.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> AwaitingAnswer(0) -> ... -> AwaitingAnswer(n-1) -> Completed
//!              |                            ^
//!              +-> AwaitingFreeText(i) -----+
//! ```
//!
//! The engine is synchronous and performs no I/O. Each transition returns the
//! next [`Step`]; delivering prompts and recording results is the caller's job
//! (see [`super::QuizService`]). A completed session stays in the store,
//! rejecting further input, until [`QuizEngine::finish`] removes it.

use std::sync::Arc;

use tracing::{debug, info};

use super::render::{self, QuizTexts};
use super::scoring::{Resolution, ScoringResolver};
use super::session::{Answer, PendingFreeText, Session};
use super::store::SessionStore;
use crate::catalog::Catalog;
use crate::error::QuizError;
use crate::events::{ConversationId, Outbound};

/// What the caller should do after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Send this prompt; the quiz continues.
    Prompt(Outbound),
    /// Every question has been answered.
    Completed(Completion),
}

/// A finished attempt, ready to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub participant: String,
    pub resolution: Resolution,
    pub answers: Vec<Answer>,
}

impl Completion {
    pub fn winner(&self) -> &str {
        &self.resolution.winner
    }
}

pub struct QuizEngine {
    catalog: Arc<Catalog>,
    resolver: ScoringResolver,
    store: Arc<SessionStore>,
    texts: QuizTexts,
}

impl QuizEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        resolver: ScoringResolver,
        store: Arc<SessionStore>,
        texts: QuizTexts,
    ) -> Self {
        Self {
            catalog,
            resolver,
            store,
            texts,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn texts(&self) -> &QuizTexts {
        &self.texts
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a fresh attempt, discarding any session the conversation had.
    pub fn start(&self, conversation: ConversationId, participant: &str) -> Step {
        let mut session = Session::new(participant, &self.catalog);
        let step = self.next_step(&mut session);
        let replaced = self.store.insert(conversation, session).is_some();
        info!(%conversation, participant, replaced, "quiz started");
        step
    }

    /// Handle an option button.
    ///
    /// `question_id`, when known, must name the open question; selections for
    /// any other question are stale and ignored.
    pub fn select_option(
        &self,
        conversation: ConversationId,
        value: &str,
        question_id: Option<&str>,
    ) -> Result<Step, QuizError> {
        self.store
            .with_session(conversation, |session| {
                if let Some(pending) = session.pending_free_text() {
                    return Err(QuizError::AwaitingFreeText(pending.question_id.clone()));
                }
                let question = self
                    .catalog
                    .question(session.position())
                    .ok_or(QuizError::SessionCompleted)?;
                if let Some(got) = question_id {
                    if got != question.id {
                        return Err(QuizError::StaleSelection {
                            expected: question.id.clone(),
                            got: got.to_string(),
                        });
                    }
                }
                let option = question
                    .option(value)
                    .ok_or_else(|| QuizError::UnknownOption {
                        question: question.id.clone(),
                        value: value.to_string(),
                    })?;

                if option.free_text {
                    debug!(%conversation, question = %question.id, value, "awaiting free text");
                    session.set_pending(PendingFreeText {
                        question_id: question.id.clone(),
                        value: option.value.clone(),
                        categories: option.categories.clone(),
                    });
                    return Ok(Step::Prompt(Outbound::text(&self.texts.free_text_prompt)));
                }

                session.record(
                    Answer {
                        question_id: question.id.clone(),
                        value: option.value.clone(),
                        free_text: None,
                    },
                    &option.categories,
                );
                Ok(self.next_step(session))
            })
            .unwrap_or(Err(QuizError::NoActiveSession(conversation)))
    }

    /// Handle a text message answering a pending free-text option.
    pub fn supply_free_text(
        &self,
        conversation: ConversationId,
        text: &str,
    ) -> Result<Step, QuizError> {
        self.store
            .with_session(conversation, |session| {
                let pending = session.take_pending().ok_or(QuizError::NoPendingFreeText)?;
                session.record(
                    Answer {
                        question_id: pending.question_id,
                        value: pending.value,
                        free_text: Some(text.to_string()),
                    },
                    &pending.categories,
                );
                Ok(self.next_step(session))
            })
            .unwrap_or(Err(QuizError::NoActiveSession(conversation)))
    }

    /// Destroy the conversation's session once its result is recorded.
    pub fn finish(&self, conversation: ConversationId) -> Option<Session> {
        let session = self.store.remove(conversation);
        if session.is_some() {
            info!(%conversation, "session closed");
        }
        session
    }

    // ── Internals ────────────────────────────────────────────────────

    fn next_step(&self, session: &mut Session) -> Step {
        let total = self.catalog.question_count();
        match self.catalog.question(session.position()) {
            Some(question) => Step::Prompt(render::question(
                &self.texts,
                question,
                session.position(),
                total,
            )),
            None => Step::Completed(Completion {
                participant: session.participant().to_string(),
                resolution: self.resolver.resolve(session.scores(), &self.catalog),
                answers: session.answers().to_vec(),
            }),
        }
    }
}
