use std::{path::PathBuf, str::FromStr, sync::Arc};

use anyhow::Context;
use apalis::{
    layers::{retry::RetryPolicy, sentry::SentryLayer},
    prelude::*,
};
use apalis_cron::{CronStream, Tick};
use chrono_tz::Tz;
use clap::Parser;
use cron::Schedule;
use token_store::FileTokenStore;
use tokio_util::sync::CancellationToken;

use playlist_pulse::{
    auth::DeviceFlowAuthenticator,
    chat::matrix::MatrixChat,
    tracing::init_tracing_subscriber,
    types::{DedupPolicy, EmptyWindowPolicy},
    yt::client::YouTubeClient,
    PlaylistBot, PlaylistBotBuilder, PlaylistPublisher,
};

#[derive(Parser)]
#[command(name = "playlist-pulse", about = "Matrix-to-YouTube weekly playlist bot")]
struct Cli {
    /// Matrix homeserver URL
    #[arg(long, env = "MATRIX_SERVER")]
    matrix_server: String,

    /// Fully-qualified Matrix user id
    #[arg(long, env = "MATRIX_USER")]
    matrix_user: String,

    /// Matrix account password
    #[arg(long, env = "MATRIX_PASSWORD")]
    matrix_password: String,

    /// Room id or alias to watch
    #[arg(long, env = "MATRIX_ROOM")]
    matrix_room: String,

    /// Base title for the weekly playlists
    #[arg(long, env = "PLAYLIST_TITLE")]
    playlist_title: String,

    /// OAuth client id for the YouTube Data API
    #[arg(long, env = "YOUTUBE_CLIENT_ID")]
    youtube_client_id: String,

    /// OAuth client secret for the YouTube Data API
    #[arg(long, env = "YOUTUBE_CLIENT_SECRET")]
    youtube_client_secret: String,

    /// Cron expression for the flush schedule
    #[arg(long, env = "CRON_SCHEDULE", default_value = "0 0 0 * * Mon")]
    schedule: String,

    /// Directory for cached credentials and the sync cursor
    #[arg(long, env = "DATA_DIR", default_value = "/var/lib/playlist-pulse")]
    data_dir: PathBuf,

    /// Timezone used for week boundaries in playlist titles
    #[arg(long, env = "PLAYLIST_TIMEZONE", default_value = "UTC")]
    timezone: Tz,

    /// Whether a video shared twice in one week appears once or twice
    #[arg(long, env = "DEDUP_POLICY", value_enum, default_value = "first-seen-only")]
    dedup: DedupPolicy,

    /// What to do when a week accumulated nothing
    #[arg(long, env = "EMPTY_WINDOW_POLICY", value_enum, default_value = "skip")]
    empty_window: EmptyWindowPolicy,

    /// Only publish videos YouTube categorizes as music
    #[arg(long, env = "MUSIC_ONLY")]
    music_only: bool,

    /// Post an acknowledgment to the room for each captured link
    #[arg(long, env = "ACK_LINKS")]
    ack_links: bool,

    /// Process the room's history before going live (may exhaust your daily
    /// API quota)
    #[arg(long)]
    backfill: bool,
}

type Bot = PlaylistBot<MatrixChat, YouTubeClient<DeviceFlowAuthenticator<FileTokenStore>>, FileTokenStore>;

async fn handle_tick(_tick: Tick, bot: Data<Arc<Bot>>) -> anyhow::Result<()> {
    tracing::info!("Running scheduled flush...");
    bot.flush_and_publish().await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let _guard = sentry::init((
        std::env::var("SENTRY_DSN").unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some("production".into()),
            ..Default::default()
        },
    ));

    let cli = Cli::parse();
    init_tracing_subscriber()?;

    let store = FileTokenStore::new(&cli.data_dir);

    let auth = DeviceFlowAuthenticator::new(
        cli.youtube_client_id,
        cli.youtube_client_secret,
        store.clone(),
    )?;
    auth.bootstrap()
        .await
        .context("YouTube authorization failed")?;

    let publisher = PlaylistPublisher::new(YouTubeClient::new(auth)?)
        .with_dedup(cli.dedup)
        .with_music_only(cli.music_only);

    tracing::info!(room = %cli.matrix_room, "Logging in to Matrix...");
    let chat = MatrixChat::login(
        &cli.matrix_server,
        &cli.matrix_user,
        &cli.matrix_password,
        &cli.matrix_room,
    )
    .await
    .context("Matrix login failed")?;

    let bot = Arc::new(
        PlaylistBotBuilder::new(cli.playlist_title)
            .chat(chat)
            .publisher(publisher)
            .cursor_store(store)
            .timezone(cli.timezone)
            .empty_window(cli.empty_window)
            .ack_links(cli.ack_links)
            .build(),
    );

    if cli.backfill {
        tracing::info!("Starting backfill of room history...");
        bot.backfill().await?;
    }

    let shutdown = CancellationToken::new();
    let mut listener = tokio::spawn({
        let bot = bot.clone();
        let shutdown = shutdown.clone();
        async move { bot.listen(shutdown).await }
    });

    let schedule = Schedule::from_str(&cli.schedule)?;
    tracing::info!(schedule = %cli.schedule, "Starting flush scheduler...");
    let worker = WorkerBuilder::new("playlist-pulse-cron")
        .backend(CronStream::new(schedule))
        .retry(RetryPolicy::retries(3))
        .layer(SentryLayer::new())
        .data(bot.clone())
        .build(handle_tick);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
        result = &mut listener => {
            return result.context("Listener task failed")?;
        }
        result = worker.run() => {
            result?;
        }
    }

    shutdown.cancel();
    listener.await.context("Listener task failed")??;
    Ok(())
}
