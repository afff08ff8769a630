use std::path::PathBuf;

use clap::{Parser, Subcommand};
use engine::EngineConfig;
use tools::{load_dataset, parse_session, read, replay};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless map view session runner")]
struct Args {
    /// Engine config JSON (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a recorded session and print the state after every step
    Replay {
        /// Directory holding `<category>.json` provider snapshots
        #[arg(long)]
        data: PathBuf,

        /// Session script (JSON)
        #[arg(long)]
        script: PathBuf,

        /// Pretty-print the report
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },

    /// Validate the config and print it with defaults filled in
    CheckConfig,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => {
            let text = read(path).map_err(|e| e.to_string())?;
            EngineConfig::from_json_str(&text).map_err(|e| e.to_string())?
        }
        None => EngineConfig::default(),
    };

    match args.command {
        Command::Replay {
            data,
            script,
            pretty,
        } => {
            let dataset = load_dataset(&data).map_err(|e| e.to_string())?;
            let session = parse_session(&read(&script).map_err(|e| e.to_string())?)
                .map_err(|e| e.to_string())?;
            info!(steps = session.steps.len(), "replaying session");
            let report = replay(config, dataset, &session).map_err(|e| e.to_string())?;
            let out = if pretty {
                serde_json::to_string_pretty(&report)
            } else {
                serde_json::to_string(&report)
            }
            .map_err(|e| e.to_string())?;
            println!("{out}");
        }
        Command::CheckConfig => {
            let out = serde_json::to_string_pretty(&config).map_err(|e| e.to_string())?;
            println!("{out}");
        }
    }
    Ok(())
}
