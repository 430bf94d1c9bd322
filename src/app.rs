use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::config::Settings;
use crate::discovery::{DiscoveryError, DiscoveryResponder, ResponderConfig, ServiceRef};
use crate::endpoint::{Endpoint, EndpointConfig};
use crate::error::RpcError;
use crate::greeting::Greeter;
use crate::identity::Identity;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Endpoint error: {0}")]
    Endpoint(#[from] RpcError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Explicit application context owning both endpoints. There is no process
/// global; everything reachable from the outside hangs off this struct.
///
/// `bootstrap` binds, `run` activates and blocks on the shutdown future,
/// then drains both endpoints before returning.
pub struct App {
    endpoint: Endpoint,
    responder: DiscoveryResponder,
    greeting_identity: Identity,
    greeting_addr: SocketAddr,
    responder_addr: SocketAddr,
    service: ServiceRef,
}

impl App {
    /// Binds the greeting endpoint and the discovery responder and
    /// registers the greeting handler under a generated identity. If the
    /// responder fails to bind, the already-bound endpoint is torn down
    /// with it; no partially-serving process survives bootstrap.
    pub async fn bootstrap(settings: &Settings) -> Result<Self, AppError> {
        let endpoint_config = EndpointConfig::new(settings.greeting.bind.as_str())
            .with_drain_timeout(Duration::from_millis(settings.shutdown.drain_timeout_ms));
        let mut endpoint = Endpoint::new(endpoint_config);
        let greeting_addr = endpoint.bind().await?;

        let greeting_identity =
            endpoint.add_unique(Arc::new(Greeter::with_message(&settings.greeting.message)));

        let advertised = settings.greeting.advertise.unwrap_or(greeting_addr);
        let service = ServiceRef {
            addr: advertised,
            identity: greeting_identity.clone(),
        };

        let responder_config = ResponderConfig::new()
            .with_group(settings.discovery.group)
            .with_port(settings.discovery.port)
            .with_interface(settings.discovery.interface);
        let mut responder = DiscoveryResponder::new(responder_config, service.clone());
        let responder_addr = responder.bind()?;

        Ok(Self {
            endpoint,
            responder,
            greeting_identity,
            greeting_addr,
            responder_addr,
            service,
        })
    }

    pub fn greeting_addr(&self) -> SocketAddr {
        self.greeting_addr
    }

    pub fn responder_addr(&self) -> SocketAddr {
        self.responder_addr
    }

    pub fn greeting_identity(&self) -> &Identity {
        &self.greeting_identity
    }

    pub fn service(&self) -> &ServiceRef {
        &self.service
    }

    /// Starts serving on both endpoints, discovery first so a reference is
    /// never announced for an endpoint that cannot come up.
    pub fn activate(&mut self) -> Result<(), AppError> {
        self.responder.activate()?;
        self.endpoint.activate()?;
        info!("serving");
        Ok(())
    }

    /// Stops announcing, then drains the greeting endpoint.
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        info!("shutting down");
        self.responder.deactivate().await?;
        self.endpoint.deactivate().await?;
        info!("terminated cleanly");
        Ok(())
    }

    /// Serves until the given future resolves, then shuts down.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        self.activate()?;
        shutdown.await;
        self.shutdown().await
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiscoverySettings, GreetingSettings, ShutdownSettings};

    fn test_settings() -> Settings {
        Settings {
            greeting: GreetingSettings {
                bind: "127.0.0.1:0".to_string(),
                advertise: None,
                message: "Hello World!".to_string(),
            },
            discovery: DiscoverySettings {
                group: "239.255.1.1".parse().unwrap(),
                port: 0,
                interface: "127.0.0.1".parse().unwrap(),
            },
            client: Default::default(),
            shutdown: ShutdownSettings {
                drain_timeout_ms: 1000,
            },
        }
    }

    #[tokio::test]
    async fn test_bootstrap_binds_both_endpoints() {
        let app = App::bootstrap(&test_settings()).await.unwrap();

        assert_ne!(app.greeting_addr().port(), 0);
        assert_ne!(app.responder_addr().port(), 0);
        assert_eq!(app.service().identity, *app.greeting_identity());
        assert_eq!(app.service().addr, app.greeting_addr());
    }

    #[tokio::test]
    async fn test_advertise_override_is_announced() {
        let mut settings = test_settings();
        settings.greeting.advertise = Some("192.0.2.7:7777".parse().unwrap());

        let app = App::bootstrap(&settings).await.unwrap();
        assert_eq!(app.service().addr, "192.0.2.7:7777".parse().unwrap());
    }

    #[tokio::test]
    async fn test_activate_and_shutdown() {
        let mut app = App::bootstrap(&test_settings()).await.unwrap();
        app.activate().unwrap();
        app.shutdown().await.unwrap();
    }
}
