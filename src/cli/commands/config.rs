use crate::cli::OutputFormat;
use crate::config;

pub fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => {
            println!("Environment:      {:?}", config.environment);
            println!("User pool:        {}", config.identity.user_pool_id);
            println!("Client:           {}", config.identity.client_id);
            println!(
                "Token check:      {}",
                config.identity.introspection_url.as_deref().unwrap_or("local JWT verification")
            );
            println!("Table:            {}", config.storage.table_name);
            println!("Read role:        {}", config.storage.read_role_id);
            println!("Write role:       {}", config.storage.write_role_id);
            println!("Pool access role: {}", config.identity.user_pool_access_role_id);
            println!("Port:             {}", config.api.port);
        }
    }
    Ok(())
}
