//! CLI for cimon — run collection sessions, inspect sources, upload batches.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cimon")]
#[command(about = "cimon — continuous background metric collection")]
#[command(version = cimon_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in data sources and whether this device supports them
    Sources,

    /// Run a collection session until Ctrl-C (or --duration elapses)
    Run {
        /// Database path
        #[arg(long, default_value = "cimon.db")]
        db: String,

        /// JSON schedule file: [{"group": "battery", "period_ms": 60000}, ...]
        /// Defaults to every supported source at its default period.
        #[arg(long)]
        schedule: Option<String>,

        /// Stop automatically after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Records accumulated before an asynchronous flush
        #[arg(long, default_value_t = cimon_core::DEFAULT_BATCH_THRESHOLD)]
        batch_size: usize,

        /// Master poll-tick interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        tick_ms: u64,
    },

    /// Upload committed rows to the collection server
    Upload {
        /// Database path
        #[arg(long, default_value = "cimon.db")]
        db: String,

        /// Collection-server endpoint
        #[arg(long)]
        endpoint: String,

        /// Device identifier echoed in every payload
        #[arg(long, default_value = "cimon-device")]
        device_id: String,

        /// Maximum rows per upload window
        #[arg(long, default_value_t = cimon_upload::DEFAULT_WINDOW)]
        window: usize,

        /// Keep uploading every N seconds until the store is drained
        #[arg(long)]
        repeat: Option<u64>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sources => commands::sources(),
        Commands::Run {
            db,
            schedule,
            duration,
            batch_size,
            tick_ms,
        } => commands::run(&db, schedule.as_deref(), duration, batch_size, tick_ms),
        Commands::Upload {
            db,
            endpoint,
            device_id,
            window,
            repeat,
        } => commands::upload(&db, &endpoint, &device_id, window, repeat),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
