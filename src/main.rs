mod bot;
mod config;

use std::sync::Arc;

use axum::Json;
use axum::routing::get;
use serde::Serialize;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tracing::info;
use tracing_subscriber::prelude::*;

use bot::commands::{self, Command};
use bot::{DeliveryPipeline, MediaFetcher, TelegramChat};
use config::Config;

/// Shared state handed to command handlers through dptree.
pub struct AppState {
    pub pipeline: DeliveryPipeline<TelegramChat, Arc<MediaFetcher>>,
}

/// Body of the GET /ytdlp diagnostic route.
#[derive(Serialize)]
struct YtdlpStatus {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tubegrab: {e}");
            std::process::exit(1);
        }
    };

    let _log_guard = init_logging(&config);

    info!("🚀 Starting tubegrab...");
    info!("Listening on port {}", config.port);
    info!("Download directory: {}", config.download_dir.display());

    let bot = Bot::new(&config.bot_token);

    let fetcher = Arc::new(MediaFetcher::new(
        config.ytdlp_bin.clone(),
        config.download_dir.clone(),
        config.fetch_timeout,
    ));
    let state = Arc::new(AppState {
        pipeline: DeliveryPipeline::new(
            TelegramChat::new(bot.clone()),
            fetcher.clone(),
            config.max_upload_mib,
        ),
    });

    // Registers the webhook with Telegram once at startup; updates arrive as
    // HTTP POSTs from here on.
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let webhook_url = config
        .public_url
        .join("webhook")
        .expect("PUBLIC_URL must accept a /webhook path");
    let (listener, stop_flag, router) =
        webhooks::axum_to_router(bot.clone(), webhooks::Options::new(addr, webhook_url))
            .await
            .expect("failed to register webhook");

    let diag_fetcher = fetcher.clone();
    let router = router
        .route(
            "/",
            get(|| async { "Bot is running. Send POST requests to this URL." }),
        )
        .route(
            "/ytdlp",
            get(move || {
                let fetcher = diag_fetcher.clone();
                async move {
                    match fetcher.version().await {
                        Ok(version) => Json(YtdlpStatus {
                            ok: true,
                            version: Some(version),
                            error: None,
                        }),
                        Err(e) => Json(YtdlpStatus {
                            ok: false,
                            version: None,
                            error: Some(e.to_string()),
                        }),
                    }
                }
            }),
        );

    tokio::spawn(async move {
        let tcp = tokio::net::TcpListener::bind(addr)
            .await
            .expect("failed to bind webhook port");
        axum::serve(tcp, router)
            .with_graceful_shutdown(stop_flag)
            .await
            .expect("webhook server failed");
    });

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(commands::handle_command),
        )
        .branch(
            dptree::filter(commands::is_command_shaped).endpoint(commands::handle_unrecognized),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;
}

fn init_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        );

    let (file_layer, guard) = match config.log_dir {
        Some(ref dir) => {
            std::fs::create_dir_all(dir).ok();
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("tubegrab.log"))
                .expect("Failed to open log file");
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                );
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guard
}
