#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use alertroute::server;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "alertroute", about = "Alert routing and dispatch core")]
struct Cli {
    /// Path to the route configuration file (.toml or .json)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Path to a JSON file of alerts to evaluate and publish, then exit
    #[arg(short, long)]
    alerts: Option<PathBuf>,

    /// Keep running, polling the config file for changes and hot-reloading the tree
    #[arg(long, default_value_t = false)]
    watch: bool,

    /// Poll interval for --watch, in seconds
    #[arg(long, default_value_t = 30)]
    watch_interval_secs: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let worker_threads = server::runtime::get_container_cpu_limit();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    rt.block_on(server::bootstrap::run(server::bootstrap::BootstrapArgs {
        config_path: cli.config,
        alerts_path: cli.alerts,
        watch: cli.watch,
        watch_interval: Duration::from_secs(cli.watch_interval_secs),
    }))
}
