//! Outbound side of the conversational channel.

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::events::{ConversationId, MessageRef, Outbound};

/// Delivers quiz output to one conversation.
#[async_trait]
pub trait Channel: Send + Sync + 'static {
    /// Send a message and return a handle to it.
    async fn send(
        &self,
        conversation: ConversationId,
        message: &Outbound,
    ) -> Result<MessageRef, ChannelError>;

    /// Remove a previously sent message.
    async fn delete(
        &self,
        conversation: ConversationId,
        message: MessageRef,
    ) -> Result<(), ChannelError>;
}

/// In-memory channel that records everything it is asked to deliver.
#[cfg(test)]
pub(crate) mod recording {
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingChannel {
        next_id: AtomicI64,
        pub sent: Mutex<Vec<(ConversationId, Outbound)>>,
        pub deleted: Mutex<Vec<(ConversationId, MessageRef)>>,
        pub fail_sends: AtomicBool,
    }

    impl RecordingChannel {
        pub fn bodies(&self, conversation: ConversationId) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, _)| *c == conversation)
                .map(|(_, m)| m.body().to_string())
                .collect()
        }

        pub fn messages(&self, conversation: ConversationId) -> Vec<Outbound> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, _)| *c == conversation)
                .map(|(_, m)| m.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        async fn send(
            &self,
            conversation: ConversationId,
            message: &Outbound,
        ) -> Result<MessageRef, ChannelError> {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(ChannelError::Transport("offline".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((conversation, message.clone()));
            Ok(MessageRef(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
        }

        async fn delete(
            &self,
            conversation: ConversationId,
            message: MessageRef,
        ) -> Result<(), ChannelError> {
            self.deleted.lock().unwrap().push((conversation, message));
            Ok(())
        }
    }
}
