//! Command router - maps chat commands to delivery pipeline invocations.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::{BotCommands, ParseError};
use tracing::info;

use crate::AppState;
use crate::bot::pipeline::{DownloadRequest, MediaKind};

const HELP_TEXT: &str = "🎬 Welcome to the Free YouTube Downloader Bot!\n\n\
    Here are the commands to get your video or audio:\n\n\
    📺 /video <YouTube URL> - Downloads and sends the lowest quality video (MP4) for quick clips.\n\
    🎵 /audio <YouTube URL> - Downloads and sends the best audio (MP3/M4A) of the video. (Recommended for reliability)\n\n\
    ⚠️ A Note on File Limits (CRITICAL):\n\
    This bot uses free hosting, which imposes strict file size limits (usually ~50MB). \
    For long videos, the /video command will likely fail. The /audio command is the safest choice.";

const UNRECOGNIZED_TEXT: &str =
    "Sorry, I don't recognize that command. Use /start or /help to see my functions.";

/// Recognized commands. Anything else command-shaped gets the static
/// unrecognized reply from `handle_unrecognized`.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    Start,
    Help,
    // Pass the raw argument text through; the pipeline owns validation and
    // replies with usage text itself.
    #[command(parse_with = rest_as_args)]
    Audio(String),
    #[command(parse_with = rest_as_args)]
    Video(String),
}

fn rest_as_args(input: String) -> Result<(String,), ParseError> {
    Ok((input,))
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id.0;

    match cmd {
        Command::Start | Command::Help => {
            bot.send_message(msg.chat.id, HELP_TEXT).await?;
        }
        Command::Audio(args) => {
            let outcome = state
                .pipeline
                .deliver(DownloadRequest {
                    chat_id,
                    args,
                    kind: MediaKind::Audio,
                })
                .await;
            info!("audio request in chat {chat_id}: {outcome:?}");
        }
        Command::Video(args) => {
            let outcome = state
                .pipeline
                .deliver(DownloadRequest {
                    chat_id,
                    args,
                    kind: MediaKind::Video,
                })
                .await;
            info!("video request in chat {chat_id}: {outcome:?}");
        }
    }

    Ok(())
}

/// Static reply for command-shaped input that didn't parse as a command.
pub async fn handle_unrecognized(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, UNRECOGNIZED_TEXT).await?;
    Ok(())
}

/// True for messages that look like a command attempt.
pub fn is_command_shaped(msg: Message) -> bool {
    msg.text().is_some_and(|t| t.starts_with('/'))
}
