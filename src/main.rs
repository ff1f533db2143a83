use clap::Parser;
use std::path::PathBuf;

use vmbroker::{Config, run};

#[derive(Debug, Parser)]
#[command(name = "vmbroker", about = "Chat-brokered VM lifecycle manager")]
struct Cli {
    /// Path to the config file. Falls back to the usual lookup chain.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database URL override, e.g. `sqlite::memory:`.
    #[arg(long)]
    database: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    if let Some(database) = cli.database {
        config.general.database_path = database;
    }

    let worker_threads = config.general.worker_threads;

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();

    if worker_threads > 0 {
        builder.worker_threads(worker_threads);
    }

    let runtime = builder.build()?;
    runtime.block_on(run(config))
}
