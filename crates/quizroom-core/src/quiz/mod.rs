//! Quiz sessions: state machine, scoring, recording and the async driver.

mod channel;
mod dispatch;
mod engine;
mod recorder;
pub mod render;
mod scoring;
mod service;
mod session;
mod store;
mod tasks;

pub use channel::Channel;
pub use dispatch::Dispatcher;
pub use engine::{Completion, QuizEngine, Step};
pub use recorder::ResultRecorder;
pub use render::QuizTexts;
pub use scoring::{Resolution, ScoringResolver, WeightingRule};
pub use service::{QuizService, ServiceSettings};
pub use session::{Answer, PendingFreeText, Scores, Session};
pub use store::SessionStore;
pub use tasks::ConversationTasks;
