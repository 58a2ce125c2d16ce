//! Telegram Bot API adapter.
//!
//! Long-polls `getUpdates`, turns updates into [`QuizEvent`]s and implements
//! [`Channel`] on top of `sendMessage`, `sendPhoto` and `deleteMessage`.
//! API endpoint: `<api_base>/bot<token>/<method>`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quizroom_core::catalog::QUESTION_ID_SEPARATOR;
use quizroom_core::{
    ButtonAction, Catalog, Channel, ChannelError, ConversationId, Database, Dispatcher,
    MessageRef, Outbound, QuizEvent, ResultLog,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

const START_QUIZ: &str = "start_quiz";
const ALREADY: &str = "already";
const SHOW_STATS: &str = "show_stats";

/// Telegram rejects `callback_data` longer than this many bytes.
pub const MAX_CALLBACK_DATA: usize = 64;

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

impl User {
    /// Username when set, numeric id otherwise.
    fn participant(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

// ── Update translation ──────────────────────────────────────────────

/// What one update asks the bot to do.
#[derive(Debug, Clone, PartialEq)]
pub struct Incoming {
    pub conversation: ConversationId,
    pub event: QuizEvent,
    /// Callback to acknowledge so the client stops its spinner.
    pub callback_id: Option<String>,
    /// The update was a `/start` command.
    pub is_start: bool,
}

/// Encode a button action as callback data.
///
/// Answers carry their question id (`q<id>:<value>`) so late presses on an
/// old question can be told apart from presses on the open one.
pub fn encode_action(action: &ButtonAction) -> String {
    match action {
        ButtonAction::StartQuiz => START_QUIZ.into(),
        ButtonAction::AlreadyPhilosopher => ALREADY.into(),
        ButtonAction::ShowStats => SHOW_STATS.into(),
        ButtonAction::Answer { question_id, value } => {
            format!("q{question_id}{QUESTION_ID_SEPARATOR}{value}")
        }
    }
}

/// Decode callback data. Anything unrecognised is a bare option value.
pub fn decode_callback(data: &str, participant: String) -> QuizEvent {
    match data {
        START_QUIZ => QuizEvent::Start {
            participant,
            announce: false,
        },
        ALREADY => QuizEvent::Start {
            participant,
            announce: true,
        },
        SHOW_STATS => QuizEvent::ShowStats,
        _ => match data
            .strip_prefix('q')
            .and_then(|rest| rest.split_once(QUESTION_ID_SEPARATOR))
        {
            Some((question_id, value)) => QuizEvent::OptionSelected {
                question_id: Some(question_id.to_string()),
                value: value.to_string(),
            },
            None => QuizEvent::OptionSelected {
                question_id: None,
                value: data.to_string(),
            },
        },
    }
}

/// Map an update onto a quiz event. Updates the bot does not react to
/// yield `None`.
pub fn translate(update: Update) -> Option<Incoming> {
    if let Some(query) = update.callback_query {
        let conversation = ConversationId(query.message.as_ref()?.chat.id);
        let data = query.data.as_deref()?;
        return Some(Incoming {
            conversation,
            event: decode_callback(data, query.from.participant()),
            callback_id: Some(query.id),
            is_start: false,
        });
    }

    let message = update.message?;
    let text = message.text?;
    let conversation = ConversationId(message.chat.id);
    let command = text.split_whitespace().next().unwrap_or_default();
    // Commands may be addressed as `/start@botname`.
    let command = command.split('@').next().unwrap_or_default();

    let (event, is_start) = match command {
        "/start" => (QuizEvent::Greet, true),
        "/stats" => (QuizEvent::ShowStats, false),
        _ => (QuizEvent::FreeTextSupplied { text }, false),
    };
    Some(Incoming {
        conversation,
        event,
        callback_id: None,
        is_start,
    })
}

/// Answer buttons whose callback data would exceed [`MAX_CALLBACK_DATA`],
/// as `(question id, option value)`.
pub fn oversized_callbacks(catalog: &Catalog) -> Vec<(String, String)> {
    catalog
        .questions()
        .iter()
        .flat_map(|q| q.options.iter().map(move |o| (q, o)))
        .filter(|(q, o)| {
            let action = ButtonAction::Answer {
                question_id: q.id.clone(),
                value: o.value.clone(),
            };
            encode_action(&action).len() > MAX_CALLBACK_DATA
        })
        .map(|(q, o)| (q.id.clone(), o.value.clone()))
        .collect()
}

fn reply_markup(buttons: &[quizroom_core::Button]) -> serde_json::Value {
    let rows: Vec<_> = buttons
        .iter()
        .map(|b| json!([{ "text": b.label, "callback_data": encode_action(&b.action) }]))
        .collect();
    json!({ "inline_keyboard": rows })
}

// ── Client ──────────────────────────────────────────────────────────

pub struct TelegramClient {
    client: reqwest::Client,
    /// `<api_base>/bot<token>/`
    base: Url,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self, ChannelError> {
        let root = Url::parse(&format!("{}/", api_base.trim_end_matches('/')))
            .map_err(|e| ChannelError::Transport(format!("invalid API base URL: {e}")))?;
        // Tokens contain ':', which would otherwise parse as a URL scheme.
        let base = root
            .join(&format!("./bot{token}/"))
            .map_err(|e| ChannelError::Transport(format!("invalid bot token: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }

    fn endpoint(&self, method: &str) -> Result<Url, ChannelError> {
        self.base
            .join(method)
            .map_err(|e| ChannelError::Transport(e.to_string()))
    }

    async fn decode<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, ChannelError> {
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidResponse(format!("{method}: {e}")))?;
        if !envelope.ok {
            return Err(ChannelError::Api {
                method: method.to_string(),
                description: envelope.description.unwrap_or_default(),
            });
        }
        envelope
            .result
            .ok_or_else(|| ChannelError::InvalidResponse(format!("{method}: missing result")))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, ChannelError> {
        let response = self
            .client
            .post(self.endpoint(method)?)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        Self::decode(method, response).await
    }

    /// Long-poll for updates newer than `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ChannelError> {
        let response = self
            .client
            .post(self.endpoint("getUpdates")?)
            .json(&json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            }))
            .timeout(Duration::from_secs(timeout_secs + 10))
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        Self::decode("getUpdates", response).await
    }

    pub async fn answer_callback_query(&self, id: &str) -> Result<(), ChannelError> {
        self.call::<bool>("answerCallbackQuery", json!({ "callback_query_id": id }))
            .await
            .map(|_| ())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        reference: &str,
        caption: &str,
    ) -> Result<Message, ChannelError> {
        let path = Path::new(reference);
        if !path.is_file() {
            // URL or file id already known to Telegram.
            return self
                .call(
                    "sendPhoto",
                    json!({ "chat_id": chat_id, "photo": reference, "caption": caption }),
                )
                .await;
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ChannelError::Transport(format!("{}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo.jpg".into());
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part(
                "photo",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );
        let response = self
            .client
            .post(self.endpoint("sendPhoto")?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        Self::decode("sendPhoto", response).await
    }
}

#[async_trait]
impl Channel for TelegramClient {
    async fn send(
        &self,
        conversation: ConversationId,
        message: &Outbound,
    ) -> Result<MessageRef, ChannelError> {
        let chat_id = conversation.0;
        let sent: Message = match message {
            Outbound::Text { text } => {
                self.call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
                    .await?
            }
            Outbound::Buttons { text, buttons } => {
                self.call(
                    "sendMessage",
                    json!({
                        "chat_id": chat_id,
                        "text": text,
                        "reply_markup": reply_markup(buttons),
                    }),
                )
                .await?
            }
            Outbound::Photo { reference, caption } => {
                self.send_photo(chat_id, reference, caption).await?
            }
        };
        Ok(MessageRef(sent.message_id))
    }

    async fn delete(
        &self,
        conversation: ConversationId,
        message: MessageRef,
    ) -> Result<(), ChannelError> {
        self.call::<bool>(
            "deleteMessage",
            json!({ "chat_id": conversation.0, "message_id": message.0 }),
        )
        .await
        .map(|_| ())
    }
}

// ── Polling loop ────────────────────────────────────────────────────

/// Poll until Ctrl-C, feeding every update into the dispatcher.
///
/// Transport errors are logged and retried after a short pause; one bad
/// update never stops the loop.
pub async fn run_polling<L>(
    client: Arc<TelegramClient>,
    dispatcher: Dispatcher<TelegramClient, L>,
    users: Arc<Database>,
    poll_timeout_secs: u64,
) where
    L: ResultLog + ?Sized + 'static,
{
    let mut offset = 0;
    info!("bot started, polling for updates");

    loop {
        let updates = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            updates = client.get_updates(offset, poll_timeout_secs) => updates,
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "getUpdates failed, retrying");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(incoming) = translate(update) else {
                continue;
            };

            if let Some(id) = &incoming.callback_id {
                if let Err(e) = client.answer_callback_query(id).await {
                    debug!(error = %e, "answerCallbackQuery failed");
                }
            }
            if incoming.is_start {
                match users.remember_user(incoming.conversation) {
                    Ok(true) => info!(conversation = %incoming.conversation, "new user"),
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "could not remember user"),
                }
            }
            dispatcher.dispatch(incoming.conversation, incoming.event);
        }
    }
}
