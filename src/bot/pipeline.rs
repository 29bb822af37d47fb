//! Delivery pipeline - validate, download, size-check, upload, clean up.

use std::path::Path;

use tracing::{info, warn};

use crate::bot::fetcher::{DownloadArtifact, FetchError, MediaFetcher};

/// Which kind of media the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Fixed policy table, one entry per kind.
    pub fn policy(&self) -> FormatPolicy {
        match self {
            Self::Audio => FormatPolicy {
                selector: "bestaudio[ext=m4a]",
                warning: "Audio files are generally small and should upload quickly.",
            },
            Self::Video => FormatPolicy {
                selector: "worstvideo[ext=mp4]+bestaudio/best[ext=mp4]/mp4",
                warning: "⚠️ Warning: Video files may exceed the 50MB bot limit. \
                          If the upload fails, please try the /audio command instead.",
            },
        }
    }
}

/// How to download one media kind and what to warn the user about.
pub struct FormatPolicy {
    /// yt-dlp format selector.
    pub selector: &'static str,
    /// Size-risk warning shown in the progress message.
    pub warning: &'static str,
}

/// One download command from a chat. Transient; nothing outlives the request.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub chat_id: i64,
    /// Raw argument text following the command, validated by the pipeline.
    pub args: String,
    pub kind: MediaKind,
}

/// Terminal state of one delivery. Every variant is user-visible through the
/// progress message; none are retried.
#[derive(Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Missing or non-YouTube URL. Rejected before anything was downloaded.
    InvalidRequest,
    /// The downloader produced no file.
    FetchFailure,
    /// Downloaded, but over the upload ceiling. File removed, nothing sent.
    FileTooLarge,
    /// Downloaded, but Telegram rejected the upload. File removed.
    UploadFailure,
    /// Media delivered to the chat.
    Delivered,
}

/// Downloader seam, implemented by `MediaFetcher` and by test stubs.
pub trait Fetch {
    async fn fetch(&self, url: &str, format_selector: &str) -> Result<DownloadArtifact, FetchError>;
}

impl Fetch for MediaFetcher {
    async fn fetch(&self, url: &str, format_selector: &str) -> Result<DownloadArtifact, FetchError> {
        MediaFetcher::fetch(self, url, format_selector).await
    }
}

impl<F: Fetch + Sync> Fetch for std::sync::Arc<F> {
    async fn fetch(&self, url: &str, format_selector: &str) -> Result<DownloadArtifact, FetchError> {
        (**self).fetch(url, format_selector).await
    }
}

/// Outbound chat capabilities the pipeline needs, implemented by
/// `TelegramChat` and by test stubs. Message ids are returned by sends so the
/// progress message can be edited in place.
pub trait ChatSink {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<i64, String>;
    async fn edit_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<(), String>;
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), String>;
    async fn send_audio(&self, chat_id: i64, path: &Path, caption: &str) -> Result<(), String>;
    async fn send_video(&self, chat_id: i64, path: &Path, caption: &str) -> Result<(), String>;
}

/// The download-and-deliver pipeline.
pub struct DeliveryPipeline<C, F> {
    chat: C,
    fetcher: F,
    max_upload_mib: u64,
}

impl<C: ChatSink, F: Fetch> DeliveryPipeline<C, F> {
    pub fn new(chat: C, fetcher: F, max_upload_mib: u64) -> Self {
        Self {
            chat,
            fetcher,
            max_upload_mib,
        }
    }

    /// Run one request to a terminal state.
    ///
    /// Linear: validate, post progress message, fetch, size-check, upload.
    /// The artifact removes its file when dropped, so cleanup happens on
    /// every exit path below without explicit calls.
    pub async fn deliver(&self, request: DownloadRequest) -> DeliveryOutcome {
        let kind = request.kind;

        let url = match validate_args(&request.args) {
            Ok(url) => url,
            Err(rejection) => {
                let text = match rejection {
                    Rejection::MissingUrl => format!(
                        "Please provide a YouTube link after the /{0} command. E.g., /{0} <link>",
                        kind.as_str()
                    ),
                    Rejection::NotYoutube => {
                        "That doesn't look like a valid YouTube link. \
                         Please send a full YouTube URL."
                            .to_string()
                    }
                };
                self.chat.send_text(request.chat_id, &text).await.ok();
                return DeliveryOutcome::InvalidRequest;
            }
        };

        let policy = kind.policy();
        let progress_text = format!(
            "⏳ Processing the link and downloading the {}... \
             This may take a minute, please wait.\n\n{}",
            kind.as_str(),
            policy.warning
        );
        let progress_id = match self.chat.send_text(request.chat_id, &progress_text).await {
            Ok(id) => id,
            Err(e) => {
                // Without a progress message there is no way to report the
                // outcome either; bail before spawning the downloader.
                warn!("Could not post progress message: {e}");
                return DeliveryOutcome::UploadFailure;
            }
        };

        let artifact = match self.fetcher.fetch(url, policy.selector).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!("Fetch failed for {url}: {e}");
                self.chat
                    .edit_text(
                        request.chat_id,
                        progress_id,
                        "❌ Download Failed.\nCould not download the content. \
                         Check the link, or if the video is restricted/private.",
                    )
                    .await
                    .ok();
                return DeliveryOutcome::FetchFailure;
            }
        };

        let size_mib = artifact.size_mib();
        if size_mib > self.max_upload_mib as f64 {
            info!("Rejecting {:.2} MB file (ceiling {} MB)", size_mib, self.max_upload_mib);
            self.chat
                .edit_text(
                    request.chat_id,
                    progress_id,
                    &format!(
                        "❌ Download Failed: File Too Large\n\
                         The requested file is {size_mib:.2} MB. Free bot hosting restricts \
                         uploads to {}MB.\n\
                         Please try the /audio command for smaller, audio-only files.",
                        self.max_upload_mib
                    ),
                )
                .await
                .ok();
            return DeliveryOutcome::FileTooLarge;
        }

        let caption = format!("✅ Download complete! Here is your {} file.", kind.as_str());
        let sent = match kind {
            MediaKind::Audio => {
                self.chat
                    .send_audio(request.chat_id, artifact.path(), &caption)
                    .await
            }
            MediaKind::Video => {
                self.chat
                    .send_video(request.chat_id, artifact.path(), &caption)
                    .await
            }
        };

        match sent {
            Ok(()) => {
                // The uploaded media carries its own caption now.
                self.chat
                    .delete_message(request.chat_id, progress_id)
                    .await
                    .ok();
                info!(
                    "Delivered {} ({size_mib:.2} MB) to chat {}",
                    kind.as_str(),
                    request.chat_id
                );
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                warn!("Telegram upload failed: {e}");
                self.chat
                    .edit_text(
                        request.chat_id,
                        progress_id,
                        "❌ Upload Failed.\nAn error occurred while sending the file to \
                         Telegram. The file might still be too large or there was a \
                         network issue.",
                    )
                    .await
                    .ok();
                DeliveryOutcome::UploadFailure
            }
        }
    }
}

enum Rejection {
    MissingUrl,
    NotYoutube,
}

/// Exactly one argument, and it must look like a YouTube URL.
fn validate_args(args: &str) -> Result<&str, Rejection> {
    let mut tokens = args.split_whitespace();
    let url = tokens.next().ok_or(Rejection::MissingUrl)?;
    if tokens.next().is_some() {
        return Err(Rejection::MissingUrl);
    }
    if url.contains("youtube.com") || url.contains("youtu.be") {
        Ok(url)
    } else {
        Err(Rejection::NotYoutube)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_youtube_urls() {
        assert!(validate_args("https://youtube.com/watch?v=abc").is_ok());
        assert!(validate_args("https://youtu.be/abc123").is_ok());
        assert!(validate_args("  https://m.youtube.com/watch?v=abc  ").is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_and_extra_args() {
        assert!(matches!(validate_args(""), Err(Rejection::MissingUrl)));
        assert!(matches!(validate_args("   "), Err(Rejection::MissingUrl)));
        assert!(matches!(
            validate_args("https://youtu.be/a https://youtu.be/b"),
            Err(Rejection::MissingUrl)
        ));
    }

    #[test]
    fn test_validate_rejects_foreign_hosts() {
        assert!(matches!(
            validate_args("https://vimeo.com/12345"),
            Err(Rejection::NotYoutube)
        ));
        assert!(matches!(validate_args("not-a-url"), Err(Rejection::NotYoutube)));
    }

    #[test]
    fn test_policy_table() {
        assert_eq!(MediaKind::Audio.policy().selector, "bestaudio[ext=m4a]");
        assert!(MediaKind::Video.policy().selector.contains("worstvideo"));
        assert!(MediaKind::Video.policy().warning.contains("50MB"));
    }
}
