//! Headless bot for poking at a running server.
//!
//! Joins under a name, drives around with random commands for a while and
//! prints what it saw.

use clap::Parser;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{
    encode_command, parse_record, ControlCommand, FireMode, MoveDirection, ServerRecord, Vector2D,
    DEFAULT_PORT,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{interval, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Player name
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// How long to play, in seconds
    #[arg(short, long, default_value = "10")]
    duration: u64,

    /// Milliseconds between commands
    #[arg(short, long, default_value = "17")]
    interval_ms: u64,
}

#[derive(Debug, Default)]
struct Seen {
    lines: u64,
    walls: u64,
    tanks: u64,
    projectiles: u64,
    powerups: u64,
    beams: u64,
    unparsed: u64,
}

fn random_command(rng: &mut impl Rng) -> ControlCommand {
    let moving = *[
        MoveDirection::None,
        MoveDirection::Up,
        MoveDirection::Down,
        MoveDirection::Left,
        MoveDirection::Right,
    ]
    .choose(rng)
    .unwrap_or(&MoveDirection::None);

    let fire = match rng.gen_range(0..20) {
        0 => FireMode::Alt,
        1..=4 => FireMode::Main,
        _ => FireMode::None,
    };

    let angle = rng.gen_range(0.0..std::f64::consts::TAU);
    ControlCommand::new(moving, fire, Vector2D::new(angle.cos(), angle.sin()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    stream.set_nodelay(true)?;
    println!("Connected to {}", args.server);

    let (reader, mut writer) = stream.into_split();
    writer.write_all(format!("{}\n", args.name).as_bytes()).await?;

    let mut lines = BufReader::new(reader).lines();
    let id = lines.next_line().await?.ok_or("server closed during handshake")?;
    let size = lines.next_line().await?.ok_or("server closed during handshake")?;
    println!("Joined as player {} in a world of size {}", id.trim(), size.trim());

    let reader = tokio::spawn(async move {
        let mut seen = Seen::default();
        while let Ok(Some(line)) = lines.next_line().await {
            seen.lines += 1;
            match parse_record(&line) {
                Some(ServerRecord::Wall(_)) => seen.walls += 1,
                Some(ServerRecord::Tank(_)) => seen.tanks += 1,
                Some(ServerRecord::Projectile(_)) => seen.projectiles += 1,
                Some(ServerRecord::PowerUp(_)) => seen.powerups += 1,
                Some(ServerRecord::Beam(_)) => seen.beams += 1,
                None => seen.unparsed += 1,
            }
        }
        seen
    });

    let mut rng = rand::thread_rng();
    let mut ticker = interval(Duration::from_millis(args.interval_ms.max(1)));
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut sent = 0u64;

    while Instant::now() < deadline {
        ticker.tick().await;
        let command = encode_command(&random_command(&mut rng));
        if let Err(e) = writer.write_all(command.as_bytes()).await {
            println!("Server went away: {}", e);
            break;
        }
        sent += 1;
    }

    writer.shutdown().await?;
    drop(writer);

    let seen = tokio::time::timeout(Duration::from_secs(2), reader)
        .await
        .map_err(|_| "server kept the connection open")??;

    println!("Sent {} commands", sent);
    println!("Received {:#?}", seen);

    Ok(())
}
