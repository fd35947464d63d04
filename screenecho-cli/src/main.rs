use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Input;
use screenecho_client::config::DEFAULT_HOST;
use screenecho_client::{
    ClientConfig, CloseOutcome, RoomService, StreamAnnouncement, StreamsService, WebRtcService,
};
use screenecho_core::{ClientId, RoomId, StreamStats};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "screenecho")]
#[command(about = "Join a screen-share room and watch its streams")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a room, answer incoming calls and print remote streams.
    Join {
        /// Room to join; prompted for when omitted.
        room: Option<String>,

        #[arg(long, env = "SCREENECHO_HOST", default_value = DEFAULT_HOST)]
        host: String,

        /// Client ids to call once joined.
        #[arg(long = "call", value_name = "CLIENT_ID")]
        call: Vec<String>,

        #[arg(long, default_value_t = 5000)]
        stats_interval_ms: u64,
    },
    /// Print a fresh room id.
    NewRoom,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::NewRoom => {
            println!("{}", RoomId::generate());
        }
        Commands::Join {
            room,
            host,
            call,
            stats_interval_ms,
        } => {
            let room_id = match room {
                Some(room) => RoomId::from(room),
                None => RoomId::from(
                    Input::<String>::new()
                        .with_prompt("Room id")
                        .interact_text()
                        .context("failed to read room id")?,
                ),
            };
            join(room_id, host, call, Duration::from_millis(stats_interval_ms.max(1))).await?;
        }
    }

    Ok(())
}

async fn join(room_id: RoomId, host: String, call: Vec<String>, stats_interval: Duration) -> Result<()> {
    let room = RoomService::new(ClientConfig::default().with_host(host));

    println!("{}", format!("📡 Joining room {}...", room_id).green().bold());
    room.connect(&room_id)?;
    room.wait_until_open()
        .await
        .with_context(|| format!("could not reach {}", room.config().room_url(&room_id)))?;
    let local_id = room.wait_for_local_client_id().await?;
    println!("   🆔 You are {}", local_id.to_string().bold());

    let webrtc = WebRtcService::new(&room);
    let streams = StreamsService::new(&room);

    webrtc.subscribe(|event| {
        println!(
            "{} {} from {}",
            "🎬 Remote stream".cyan().bold(),
            event.stream.id(),
            event.client_id
        );
    });
    streams.subscribe(|announcement| match announcement {
        StreamAnnouncement::Started { name, quality } => {
            println!("{} {} ({})", "📺 Stream started:".cyan(), name, quality)
        }
        StreamAnnouncement::Stopped => println!("{}", "📴 A stream stopped".cyan()),
    });

    for remote in call {
        let remote = ClientId::from(remote);
        if remote == local_id || webrtc.has_peer_connection(&remote) {
            warn!("Skipping call to {}", remote);
            continue;
        }
        println!("   📞 Calling {}", remote);
        webrtc.establish_connection_with_peer(remote);
    }

    let mut ticker = tokio::time::interval(stats_interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, leaving room");
                break;
            }
            _ = room.closed() => {
                println!("{}", "⚠️  Room connection closed".yellow().bold());
                break;
            }
            _ = ticker.tick() => {
                for peer in webrtc.peer_ids() {
                    if let Some(stats) = webrtc.get_stats(&peer).await {
                        print_stats(&peer, &stats);
                    }
                }
            }
        }
    }

    streams.shutdown();
    webrtc.shutdown();
    if room.close() == CloseOutcome::NotYetCloseable {
        room.abort();
    }
    if tokio::time::timeout(CLOSE_TIMEOUT, room.closed()).await.is_err() {
        room.abort();
    }

    println!("{}", "👋 Left the room".green().bold());
    Ok(())
}

fn print_stats(peer: &ClientId, stats: &StreamStats) {
    let resolution = match (stats.frame_width, stats.frame_height) {
        (Some(width), Some(height)) => format!("{width}x{height}"),
        _ => "-".to_owned(),
    };
    let fps = stats
        .frames_per_second
        .map_or_else(|| "-".to_owned(), |fps| format!("{fps:.0}"));
    let jitter = stats
        .jitter
        .map_or_else(|| "-".to_owned(), |jitter| format!("{:.1}ms", jitter * 1000.0));

    println!(
        "   📊 {} codec={} resolution={} fps={} jitter={}",
        peer.to_string().dimmed(),
        stats.codec,
        resolution,
        fps,
        jitter
    );
}
