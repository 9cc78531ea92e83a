use clap::{Parser, Subcommand};
use anyhow::Result;
use dotenvy::dotenv;

mod batch;
mod config;
mod crawler;
mod error;
mod llm;
#[cfg(feature = "mcp-server")]
mod mcp;
mod output;
mod ratelimit;
mod summarize;
mod summarizer;
mod telemetry;
mod util;

#[cfg(test)]
mod testing;

#[derive(Parser)]
#[command(name = "web-summarizer", about = "Crawl web pages and summarize them with Gemini")]
struct Cli {
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Summarize(summarize::SummarizeCmd),
    #[cfg(feature = "mcp-server")]
    Serve(mcp::ServeCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // logs go to stderr; respect RUST_LOG and SUMMARIZER_LOG_FORMAT
    telemetry::config::init_tracing();
    let settings = config::Settings::from_env();

    match cli.command {
        Commands::Summarize(args) => summarize::run(&settings, args).await?,
        #[cfg(feature = "mcp-server")]
        Commands::Serve(args) => mcp::run(&settings, args).await?,
    }

    Ok(())
}
