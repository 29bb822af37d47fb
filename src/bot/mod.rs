//! Bot modules - relays download requests to yt-dlp and delivers the result.

pub mod commands;
pub mod fetcher;
pub mod pipeline;
pub mod telegram;


pub use fetcher::MediaFetcher;
pub use pipeline::DeliveryPipeline;
pub use telegram::TelegramChat;
