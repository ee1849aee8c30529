use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "finplan",
    about = "Personal-finance projection API (goal-weighted allocation, feasibility, compound-growth projection)"
)]
struct Cli {
    #[arg(long, default_value_t = 8000)]
    port: u16,
    #[arg(long, default_value = "data", help = "Directory for JSON collection files")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    finplan::api::run_http_server(cli.port, cli.data_dir).await
}
