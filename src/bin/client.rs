use std::env;
use std::process;
use std::time::Duration;

use anyhow::Result;
use hailcast::{GreetingClient, Locator, LocatorConfig, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    if env::args().nth(1).is_some() {
        eprintln!("hailcast-client: too many arguments");
        eprintln!("usage: hailcast-client");
        process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hailcast=info".parse()?),
        )
        .init();

    let config_path = env::var("HAILCAST_CONFIG").unwrap_or_else(|_| "config/client".to_string());
    let settings = Settings::load_from(&config_path)?;

    let locator_config = LocatorConfig::new()
        .with_group(settings.discovery.group)
        .with_port(settings.discovery.port)
        .with_interface(settings.discovery.interface)
        .with_attempts(settings.client.attempts)
        .with_timeout(Duration::from_millis(settings.client.timeout_ms));

    let service = Locator::new(locator_config).locate().await?;
    info!("🔎 located service at {}", service.addr);

    let client = GreetingClient::connect(service.addr, service.identity).await?;
    let message = client.greet().await?;
    println!("{}", message);
    Ok(())
}
