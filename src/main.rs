use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = api_gateway::cli::Cli::parse();
    if let Err(e) = api_gateway::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
