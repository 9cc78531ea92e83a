#![cfg(feature = "mcp-server")]

pub mod server;
pub mod types;
pub mod tools;

pub use cli::{run, ServeCmd};

mod cli {
    use anyhow::Result;
    use clap::Parser;

    use crate::config::Settings;

    #[derive(Debug, Parser, Default)]
    #[command(name = "serve", about = "Serve the summarize_web tool over MCP (stdio)")]
    pub struct ServeCmd {
        #[arg(long, help = "Maximum concurrent MCP tool calls (overrides MCP_MAX_CONCURRENCY)")]
        pub max_concurrency: Option<usize>,
    }

    pub async fn run(settings: &Settings, cmd: ServeCmd) -> Result<()> {
        let pipeline = settings.build_pipeline()?;
        super::server::run_server(pipeline, cmd.max_concurrency).await
    }
}
