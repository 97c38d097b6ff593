use clap::{Parser, ValueEnum};
use client::games::{Caption, Ghostwriter};
use client::network::UdpTransport;
use client::session::{LogLifecycle, SessionCommand, SessionConfig, SessionCore};
use client::view::RenderFrame;
use log::info;
use shared::{topic, GameRules, RoomTransport, RosterEntry};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GameKind {
    Ghostwriter,
    Caption,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay address to connect to
    #[arg(short = 'r', long, default_value = "127.0.0.1:9000")]
    relay: String,

    /// Room to join
    #[arg(long, default_value = "lobby")]
    room: String,

    /// Stable player id, reused across reconnects
    #[arg(long)]
    id: String,

    /// Display name (defaults to the id)
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Run the authoritative host for this room
    #[arg(long)]
    host: bool,

    #[arg(short = 'g', long, value_enum, default_value = "ghostwriter")]
    game: GameKind,

    /// Rounds per game
    #[arg(long, default_value = "3")]
    rounds: u32,

    /// Override the game's minimum player count
    #[arg(long)]
    min_players: Option<usize>,

    /// Seconds between timer resyncs
    #[arg(long, default_value_t = shared::RESYNC_INTERVAL_SECS)]
    resync: u32,

    /// Delay before answering a state request, in milliseconds
    #[arg(long, default_value_t = shared::SNAPSHOT_REPLY_DELAY_MS)]
    snapshot_delay: u64,

    /// Seed content selection for reproducible games
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting participant {} in room {}", args.id, args.room);
    info!("Relay: {}", args.relay);
    info!("Type an answer or vote and press enter; /next, /reset and /quit are host commands");

    match args.game {
        GameKind::Ghostwriter => play(Ghostwriter::default(), &args).await,
        GameKind::Caption => play(Caption::default(), &args).await,
    }
}

async fn play<G: GameRules>(game: G, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let transport = UdpTransport::new(args.relay.parse()?);
    let (channel, events) = transport.join(&topic(&args.room, game.name()), &args.id)?;

    let local = RosterEntry::new(
        args.id.clone(),
        args.name.clone().unwrap_or_else(|| args.id.clone()),
    );
    let config = SessionConfig {
        room: args.room.clone(),
        local,
        is_host: args.host,
        max_rounds: args.rounds,
        min_players: args.min_players,
        resync_interval: args.resync,
        snapshot_delay: Duration::from_millis(args.snapshot_delay),
        seed: args.seed,
    };

    let mut last_line = String::new();
    let render = Box::new(move |frame: &RenderFrame<G>| {
        let line = frame.to_string();
        if line != last_line {
            println!("{}", line);
            if let Some(content) = &frame.content {
                println!("  {:?}", content);
            }
            last_line = line;
        }
    });

    let session = SessionCore::new(game, config, channel)
        .with_lifecycle(Box::new(LogLifecycle))
        .with_render(render);

    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let command = match line.trim() {
                "" => continue,
                "/next" => SessionCommand::Advance,
                "/reset" => SessionCommand::Reset,
                "/quit" => SessionCommand::Leave,
                text => SessionCommand::Text(text.to_string()),
            };
            if commands_tx.send(command).is_err() {
                break;
            }
        }
    });

    session.run(events, commands_rx).await?;
    Ok(())
}
