//! Bridge server configuration.
//!
//! Loads a TOML file with `$VAR` / `${VAR}` environment expansion in string
//! values, so secrets stay out of the file itself.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 3000
//!
//! [gateway]
//! base_url = "https://mpesaemolatech.com"
//! client_id = "$GATEWAY_CLIENT_ID"
//! client_secret = "$GATEWAY_CLIENT_SECRET"
//! wallet_mpesa = "993607"
//! wallet_emola = "993606"
//!
//! [checkout]
//! amount = "297"
//! reference_prefix = "Premise"
//! redirect_url = "https://wa.me/message/EXAMPLE"
//!
//! [alerts]
//! push_url = "$PUSH_URL"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to the configuration file (default: `config.toml`)
//! - `HOST` / `PORT` — Override the bind address and port
//! - Anything referenced by `$VAR` inside the file

use std::net::IpAddr;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file '{path}': {source}")]
    Io {
        /// Attempted path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or misses required fields.
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port (default: `3000`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Mobile-money gateway connection settings.
    pub gateway: GatewaySection,

    /// Checkout parameters.
    #[serde(default)]
    pub checkout: CheckoutSection,

    /// Push-notification settings.
    pub alerts: AlertsSection,

    /// Poll throttling and store eviction.
    #[serde(default)]
    pub lifecycle: LifecycleSection,
}

/// `[gateway]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySection {
    /// Gateway base URL.
    pub base_url: String,
    /// OAuth client id. Supports `$VAR` expansion.
    pub client_id: String,
    /// OAuth client secret. Supports `$VAR` expansion.
    pub client_secret: String,
    /// Wallet id for M-Pesa payments.
    pub wallet_mpesa: String,
    /// Wallet id for E-Mola payments.
    pub wallet_emola: String,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// `[checkout]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSection {
    /// Amount charged per checkout, in meticais (default: 297).
    #[serde(default = "default_amount")]
    pub amount: Decimal,
    /// Prefix for generated references (default: `TX`).
    #[serde(default = "default_reference_prefix")]
    pub reference_prefix: String,
    /// Where to send the payer after a successful initiation.
    #[serde(default)]
    pub redirect_url: Option<String>,
}

impl Default for CheckoutSection {
    fn default() -> Self {
        Self {
            amount: default_amount(),
            reference_prefix: default_reference_prefix(),
            redirect_url: None,
        }
    }
}

/// `[alerts]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertsSection {
    /// Push-notification webhook URL. Supports `$VAR` expansion.
    pub push_url: String,
    /// Alert title override.
    #[serde(default)]
    pub title: Option<String>,
}

/// `[lifecycle]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleSection {
    /// Minimum seconds between gateway lookups for one reference
    /// (default: 5).
    #[serde(default = "default_min_poll_interval_secs")]
    pub min_poll_interval_secs: u64,
    /// Transactions older than this are evicted, in seconds
    /// (default: 86400).
    #[serde(default = "default_eviction_max_age_secs")]
    pub eviction_max_age_secs: u64,
    /// How often the eviction sweep runs, in seconds (default: 600).
    #[serde(default = "default_eviction_sweep_secs")]
    pub eviction_sweep_secs: u64,
}

impl Default for LifecycleSection {
    fn default() -> Self {
        Self {
            min_poll_interval_secs: default_min_poll_interval_secs(),
            eviction_max_age_secs: default_eviction_max_age_secs(),
            eviction_sweep_secs: default_eviction_sweep_secs(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
}

fn default_port() -> u16 {
    3000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_amount() -> Decimal {
    Decimal::from(297)
}

fn default_reference_prefix() -> String {
    "TX".to_owned()
}

fn default_min_poll_interval_secs() -> u64 {
    5
}

fn default_eviction_max_age_secs() -> u64 {
    86_400
}

fn default_eviction_sweep_secs() -> u64 {
    600
}

impl BridgeConfig {
    /// Loads configuration from the path in the `CONFIG` environment
    /// variable, falling back to `config.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file path, expanding environment
    /// variables and applying `HOST` / `PORT` overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let mut config: Self = toml::from_str(&expand_env_vars(&content))?;

        if let Ok(host) = std::env::var("HOST") {
            if let Ok(addr) = host.parse() {
                config.host = addr;
            }
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }

        Ok(config)
    }

    /// Gateway request timeout as a [`Duration`].
    #[must_use]
    pub const fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.timeout_secs)
    }

    /// Minimum poll interval as a [`Duration`].
    #[must_use]
    pub const fn min_poll_interval(&self) -> Duration {
        Duration::from_secs(self.lifecycle.min_poll_interval_secs)
    }
}

/// Expands `$VAR` and `${VAR}` references from the process environment.
/// Unresolved references are left as-is.
fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(idx) = rest.find('$') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx + 1..];

        let (name, consumed) = if let Some(stripped) = rest.strip_prefix('{') {
            match stripped.find('}') {
                Some(end) => (&stripped[..end], end + 2),
                None => {
                    out.push('$');
                    continue;
                }
            }
        } else {
            let end = rest
                .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .unwrap_or(rest.len());
            (&rest[..end], end)
        };

        if name.is_empty() {
            out.push('$');
            continue;
        }
        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                out.push('$');
                out.push_str(&rest[..consumed]);
            }
        }
        rest = &rest[consumed..];
    }

    out.push_str(rest);
    out
}
