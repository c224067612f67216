pub mod commands;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "travelmap-gateway")]
#[command(about = "Travel map API gateway - authenticated routing with scoped credentials")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the gateway HTTP server")]
    Serve {
        #[arg(long, short, help = "Port to listen on (overrides GATEWAY_PORT/PORT)")]
        port: Option<u16>,
    },

    #[command(about = "Print the bound route table")]
    Routes,

    #[command(about = "Print the effective configuration (secrets omitted)")]
    Config,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Serve { port } => commands::serve::handle(port).await,
        Commands::Routes => commands::routes::handle(output_format),
        Commands::Config => commands::config::handle(output_format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_with_port() {
        let cli = Cli::try_parse_from(["travelmap-gateway", "serve", "--port", "8080"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: Some(8080) }));
    }

    #[test]
    fn json_flag_is_global() {
        let cli = Cli::try_parse_from(["travelmap-gateway", "routes", "--json"]).unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
    }
}
