use clap::Parser;
use env_logger::Env;
use log::{error, info};
use server::config::ServerSettings;
use server::network::Server;
use shared::DEFAULT_PORT;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Path to the settings file
    #[arg(short, long, default_value = "settings.json")]
    settings: String,

    /// Override the tick length from the settings file, in milliseconds
    #[arg(short, long)]
    tick_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut settings = match ServerSettings::load(&args.settings) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };
    if let Some(tick_ms) = args.tick_ms {
        settings.ms_per_frame = tick_ms;
        settings.validate()?;
    }

    info!(
        "Loaded {}: world {}, {} walls, {} power-ups, {}ms ticks",
        args.settings,
        settings.universe_size,
        settings.walls.len(),
        settings.max_powerups,
        settings.ms_per_frame
    );

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, &settings).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
