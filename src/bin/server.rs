use std::env;
use std::process;

use anyhow::Result;
use hailcast::{shutdown_signal, App, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    if env::args().nth(1).is_some() {
        eprintln!("hailcast-server: too many arguments");
        eprintln!("usage: hailcast-server");
        process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hailcast=info".parse()?),
        )
        .init();

    let config_path = env::var("HAILCAST_CONFIG").unwrap_or_else(|_| "config/server".to_string());
    let settings = Settings::load_from(&config_path)?;

    let mut app = App::bootstrap(&settings).await?;
    info!("🚀 greeting service at {}", app.greeting_addr());
    info!("📢 answering lookups on {}", app.responder_addr());

    app.run(shutdown_signal()).await?;
    Ok(())
}
