use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;

use log::{debug, trace};
use once_cell::sync::Lazy;
use pingora::server::configuration::{Opt, ServerConf};
use pingora_error::{Error, ErrorType::*, OrErr, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:\d{1,3}\.){3}\d{1,3}|\[[0-9a-f:]+\]|[a-z0-9.-]+):\d+$")
        .expect("address pattern is valid")
});

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    pub pingora: ServerConf,

    #[validate(length(min = 1))]
    #[validate(nested)]
    pub listeners: Vec<Listener>,

    #[serde(default)]
    #[validate(nested)]
    pub cache: Cache,

    #[validate(nested)]
    pub backends: Backends,

    #[serde(default)]
    pub health: Health,

    pub log: Option<Log>,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).or_err_with(ReadError, || {
            format!("Unable to read conf file from {path}")
        })?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    // config file load entry point
    pub fn load_yaml_with_opt_override(opt: &Opt) -> Result<Self> {
        if let Some(path) = &opt.conf {
            let mut conf = Self::load_from_yaml(path)?;
            conf.merge_with_opt(opt);
            Ok(conf)
        } else {
            Error::e_explain(ReadError, "No path specified")
        }
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str).or_err_with(ReadError, || {
            format!("Unable to parse yaml conf {conf_str}")
        })?;

        trace!("Loaded conf: {conf:?}");

        conf.validate()
            .or_err_with(FileReadError, || "Conf file valid failed")?;

        Ok(conf)
    }

    pub fn merge_with_opt(&mut self, opt: &Opt) {
        if opt.daemon {
            self.pingora.daemon = true;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "Listener::validate_tls_for_offer_h2"))]
pub struct Listener {
    pub address: SocketAddr,
    pub tls: Option<Tls>,
    #[serde(default)]
    pub offer_h2: bool,
}

impl Listener {
    fn validate_tls_for_offer_h2(&self) -> Result<(), ValidationError> {
        if self.offer_h2 && self.tls.is_none() {
            Err(ValidationError::new("tls_required_for_h2"))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tls {
    pub cert_path: String,
    pub key_path: String,
}

/// Store groups; every cache namespace lives in exactly one of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreGroup {
    Profile,
    Blog,
    Offers,
    Orders,
    Reviews,
    Notifications,
    TwoFa,
}

impl StoreGroup {
    pub const ALL: [StoreGroup; 7] = [
        StoreGroup::Profile,
        StoreGroup::Blog,
        StoreGroup::Offers,
        StoreGroup::Orders,
        StoreGroup::Reviews,
        StoreGroup::Notifications,
        StoreGroup::TwoFa,
    ];
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Cache {
    /// Entry lifetime in seconds.
    #[serde(default = "Cache::default_ttl")]
    #[validate(range(min = 1))]
    pub ttl: u64,
    /// Treat store failures on reads and writes as a miss instead of failing.
    #[serde(default)]
    pub fail_open: bool,
    #[serde(default)]
    pub default: Store,
    #[serde(default)]
    pub stores: HashMap<StoreGroup, Store>,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            ttl: Self::default_ttl(),
            fail_open: false,
            default: Store::default(),
            stores: HashMap::new(),
        }
    }
}

impl Cache {
    fn default_ttl() -> u64 {
        300
    }

    pub fn store_for(&self, group: StoreGroup) -> &Store {
        self.stores.get(&group).unwrap_or(&self.default)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Store {
    #[default]
    Memory,
    Etcd(Etcd),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Etcd {
    pub host: Vec<String>,
    #[serde(default)]
    pub prefix: String,
    pub timeout: Option<u32>,
    pub connect_timeout: Option<u32>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Backends {
    #[serde(default)]
    pub retry: Retry,
    #[validate(nested)]
    pub auth: Backend,
    #[validate(nested)]
    pub profile: Backend,
    #[validate(nested)]
    pub orders: Backend,
    #[validate(nested)]
    pub offers: Backend,
    #[validate(nested)]
    pub reviews: Backend,
    #[validate(nested)]
    pub blog: Backend,
    #[validate(nested)]
    pub notifications: Backend,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Backend {
    #[validate(custom(function = "Backend::validate_address"))]
    pub address: String,
    /// Per-attempt timeout in seconds.
    #[serde(default = "Backend::default_timeout")]
    #[validate(range(min = 1))]
    pub timeout: u64,
    #[serde(default)]
    pub tls: bool,
    pub sni: Option<String>,
}

impl Backend {
    fn default_timeout() -> u64 {
        5
    }

    fn validate_address(address: &str) -> Result<(), ValidationError> {
        if ADDRESS_RE.is_match(address) {
            Ok(())
        } else {
            let mut err = ValidationError::new("invalid_backend_address");
            err.add_param("address".into(), &address.to_string());
            Err(err)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Retry {
    #[serde(default = "Retry::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "Retry::default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            backoff_ms: Self::default_backoff_ms(),
        }
    }
}

impl Retry {
    fn default_max_attempts() -> u32 {
        3
    }

    fn default_backoff_ms() -> u64 {
        100
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Health {
    /// Upper bound in seconds for each backend probe.
    #[serde(default = "Health::default_timeout")]
    pub timeout: u64,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            timeout: Self::default_timeout(),
        }
    }
}

impl Health {
    fn default_timeout() -> u64 {
        5
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Log {
    pub path: String,
}
