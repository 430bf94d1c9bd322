use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

/// Process configuration: defaults, then an optional TOML file, then
/// `HAILCAST_*` environment overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub greeting: GreetingSettings,

    #[serde(default)]
    pub discovery: DiscoverySettings,

    #[serde(default)]
    pub client: ClientSettings,

    #[serde(default)]
    pub shutdown: ShutdownSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GreetingSettings {
    /// Address the greeting endpoint binds; port 0 picks an ephemeral port.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Address handed out in discovery replies instead of the bound one.
    pub advertise: Option<SocketAddr>,

    #[serde(default = "default_message")]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySettings {
    #[serde(default = "default_group")]
    pub group: Ipv4Addr,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_interface")]
    pub interface: Ipv4Addr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownSettings {
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

fn default_bind() -> String {
    "0.0.0.0:0".to_string()
}

fn default_message() -> String {
    "Hello World!".to_string()
}

fn default_group() -> Ipv4Addr {
    crate::discovery::DEFAULT_GROUP
}

fn default_port() -> u16 {
    crate::discovery::DEFAULT_PORT
}

fn default_interface() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_attempts() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_drain_timeout_ms() -> u64 {
    5000
}

impl Default for GreetingSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            advertise: None,
            message: default_message(),
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            group: default_group(),
            port: default_port(),
            interface: default_interface(),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            greeting: GreetingSettings::default(),
            discovery: DiscoverySettings::default(),
            client: ClientSettings::default(),
            shutdown: ShutdownSettings::default(),
        }
    }
}

impl Settings {
    /// Loads settings from `path` (extension left to format detection, the
    /// file may be absent) with environment overrides applied on top.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref();

        let builder = Config::builder()
            .set_default("greeting.bind", default_bind())?
            .set_default("greeting.message", default_message())?
            .set_default("discovery.group", default_group().to_string())?
            .set_default("discovery.port", default_port() as i64)?
            .set_default("discovery.interface", default_interface().to_string())?
            .set_default("client.attempts", default_attempts() as i64)?
            .set_default("client.timeout_ms", default_timeout_ms() as i64)?
            .set_default("shutdown.drain_timeout_ms", default_drain_timeout_ms() as i64)?
            .add_source(
                File::with_name(config_path.to_str().unwrap_or("config/server")).required(false),
            )
            .add_source(Environment::with_prefix("HAILCAST").separator("__"));

        builder.build()?.try_deserialize()
    }
}
