use anyhow::Context;

use crate::bootstrap::build_gateway;
use crate::cli::OutputFormat;
use crate::config;

pub fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let gateway = build_gateway(config::config()).context("failed to assemble gateway")?;
    let routes = gateway.dispatcher.routes();

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&routes)?);
        }
        OutputFormat::Text => {
            println!("{:<8} {:<16} {:<18} {:<6} TARGET", "VERB", "PATH", "AUTH", "SCOPE");
            for route in routes {
                let auth = serde_json::to_value(route.authorization)?;
                println!(
                    "{:<8} {:<16} {:<18} {:<6} {}",
                    route.verb.as_str(),
                    route.path,
                    auth.as_str().unwrap_or_default(),
                    route.permission.to_string(),
                    route.target_resource
                );
            }
        }
    }
    Ok(())
}
