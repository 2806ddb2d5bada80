use rfscan_engine::Engine;
use rfscan_messages::{Command, DEFAULT_SERVER, ReconnectPolicy, SourceConfig};

use clap::Parser;
use log::LevelFilter;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "rfscan", about = "Live chart of RF scan frames", version)]
struct Cli {
    /// Base URL of the scanner server; frames are read from <URL>/scan/stream
    #[arg(long, default_value = DEFAULT_SERVER)]
    server: String,

    /// Replay scan logs from this directory instead of subscribing to the server
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Delay between replayed scan logs
    #[arg(long, default_value_t = 1000)]
    replay_interval_ms: u64,

    /// Delay before the first reconnect attempt
    #[arg(long, default_value_t = 3000)]
    retry_initial_ms: u64,

    /// Upper bound for the reconnect delay
    #[arg(long, default_value_t = 30_000)]
    retry_max_ms: u64,

    /// Give up after this many failed reconnects (retries forever if omitted)
    #[arg(long)]
    max_retries: Option<u32>,

    /// Enable verbose logging
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn source_config(&self) -> SourceConfig {
        match &self.replay {
            Some(dir) => SourceConfig::Replay {
                dir: dir.clone(),
                interval: Duration::from_millis(self.replay_interval_ms),
            },
            None => SourceConfig::Stream {
                server: self.server.clone(),
                reconnect: ReconnectPolicy {
                    initial_delay: Duration::from_millis(self.retry_initial_ms),
                    max_delay: Duration::from_millis(self.retry_max_ms),
                    max_attempts: self.max_retries,
                    ..ReconnectPolicy::default()
                },
            },
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let crate_level = if cli.verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };
    env_logger::builder()
        .format(|buf, record| {
            writeln!(
                buf,
                "{:<5} - mod path |{}| - target | {} | args: |{}|",
                record.level(),
                record.module_path().unwrap_or(""),
                record.target(),
                record.args()
            )
        })
        .filter_level(LevelFilter::Warn)
        .filter_module("rfscan", crate_level)
        .filter_module("rfscan_engine", crate_level)
        .filter_module("rfscan_ui", crate_level)
        .parse_default_env()
        .init();

    // Create flume channels for bidirectional communication
    let (cmd_tx, cmd_rx) = flume::unbounded();
    let (event_tx, event_rx) = flume::unbounded();

    let source_config = cli.source_config();
    log::info!("Starting with {:?}", source_config);

    // Spawn engine thread
    let engine_handle = std::thread::spawn(move || {
        let engine = Engine::new(cmd_rx, event_tx, source_config);
        engine.run()
    });

    // Run UI on main thread (blocking)
    rfscan_ui::run(event_rx, cmd_tx.clone())?;

    // UI has exited - send stop command to engine
    let _ = cmd_tx.send(Command::Stop);

    // Wait for engine thread to finish
    engine_handle
        .join()
        .map_err(|_| anyhow::anyhow!("Engine thread panicked"))??;

    Ok(())
}
