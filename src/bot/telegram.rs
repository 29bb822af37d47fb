//! Telegram client using teloxide.

use std::path::Path;

use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};
use tracing::{info, warn};

use crate::bot::pipeline::ChatSink;

/// Telegram API client wrapping the outbound calls the pipeline needs.
pub struct TelegramChat {
    bot: Bot,
}

impl TelegramChat {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl ChatSink for TelegramChat {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<i64, String> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|msg| msg.id.0 as i64)
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }

    async fn edit_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<(), String> {
        self.bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id as i32), text)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to edit message: {e}");
                warn!("{}", msg);
                msg
            })
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), String> {
        info!("🗑️ Deleting message {} in chat {}", message_id, chat_id);

        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id as i32))
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to delete message: {e}");
                warn!("{}", msg);
                msg
            })
    }

    async fn send_audio(&self, chat_id: i64, path: &Path, caption: &str) -> Result<(), String> {
        info!("🎵 Sending audio {} to chat {}", path.display(), chat_id);

        self.bot
            .send_audio(ChatId(chat_id), InputFile::file(path))
            .caption(caption)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send audio: {e}");
                warn!("{}", msg);
                msg
            })
    }

    async fn send_video(&self, chat_id: i64, path: &Path, caption: &str) -> Result<(), String> {
        info!("📺 Sending video {} to chat {}", path.display(), chat_id);

        self.bot
            .send_video(ChatId(chat_id), InputFile::file(path))
            .caption(caption)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send video: {e}");
                warn!("{}", msg);
                msg
            })
    }
}
