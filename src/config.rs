//! Environment-driven configuration.
//!
//! Mirrors the source system's `envReader.go` `getEnvInt`/`getEnvBool`-with-fallback
//! pattern, expressed as a typed loader rather than ad hoc getters. Loaded once at
//! process start and cached for the process lifetime (see [`Config::global`]).

use std::path::PathBuf;

use once_cell::sync::OnceCell;
use thiserror::Error;

const DEFAULT_MIN_PASSWORD_LEN: usize = 8;
const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;
const SAFE_PBKDF2_FLOOR: u32 = 10_000;

/// Configuration-loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable was absent.
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    /// A required environment variable was present but malformed.
    #[error("invalid configuration for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// `Config::load` was called twice.
    #[error("configuration already initialized")]
    AlreadyInitialized,
}

/// Password-complexity policy enforced by the (out-of-scope) signup collaborator.
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    pub min_len: usize,
    pub require_upper_lower: bool,
    pub require_special: bool,
    pub require_numbers: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_PASSWORD_LEN,
            require_upper_lower: true,
            require_special: true,
            require_numbers: true,
        }
    }
}

/// Filesystem paths to the four PEM files backing the token envelope (§6).
#[derive(Debug, Clone)]
pub struct KeyPaths {
    pub jwe_pub: PathBuf,
    pub jwe_priv: PathBuf,
    pub jws_pub: PathBuf,
    pub jws_priv: PathBuf,
}

/// Deployment-wide secrets that are not principal-specific.
#[derive(Debug, Clone)]
pub struct Secrets {
    /// Passphrase from which shared-key template wrapping keys are derived (§4.E).
    pub log_sharing_secret: String,
}

/// Process-wide configuration, read-only after initialization.
#[derive(Debug, Clone)]
pub struct Config {
    pub password_policy: PasswordPolicy,
    pub key_paths: KeyPaths,
    pub secrets: Secrets,
    /// PBKDF2-HMAC-SHA256 iteration count (§4.A, §9 open question 1).
    pub pbkdf2_iterations: u32,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

fn get_env_int(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

fn get_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// `jwePubKeyPath` / `jwePkPath` / `jwtPubKeyPath` / `jwtPkPath` and
    /// `logSharingSecret` have no defaults: their absence is a startup error rather
    /// than a silent fallback, since a missing sharing secret would mint
    /// unrecoverable shared-key templates.
    pub fn load() -> Result<Self, ConfigError> {
        let jwe_pub = require_path("JWE_PUB_KEY_PATH")?;
        let jwe_priv = require_path("JWE_PK_PATH")?;
        let jws_pub = require_path("JWT_PUB_KEY_PATH")?;
        let jws_priv = require_path("JWT_PK_PATH")?;
        let log_sharing_secret = std::env::var("LOG_SHARING_SECRET")
            .map_err(|_| ConfigError::Missing("LOG_SHARING_SECRET"))?;

        let password_policy = PasswordPolicy {
            min_len: get_env_int("MIN_PASSWORD_LEN", DEFAULT_MIN_PASSWORD_LEN as u32) as usize,
            require_upper_lower: get_env_bool("PASSWORD_UPPER_LOWER_RULE", true),
            require_special: get_env_bool("PASSWORD_SPECIAL_CHAR_RULE", true),
            require_numbers: get_env_bool("PASSWORD_NUMBERS_RULE", true),
        };

        let pbkdf2_iterations = get_env_int("PBKDF2_ITERATIONS", DEFAULT_PBKDF2_ITERATIONS);
        if pbkdf2_iterations < SAFE_PBKDF2_FLOOR {
            log::warn!(
                "PBKDF2_ITERATIONS={} is far below the recommended floor of {}; this is only \
                 acceptable for compatibility with pre-existing wrapped keys",
                pbkdf2_iterations,
                SAFE_PBKDF2_FLOOR
            );
        }

        Ok(Config {
            password_policy,
            key_paths: KeyPaths {
                jwe_pub,
                jwe_priv,
                jws_pub,
                jws_priv,
            },
            secrets: Secrets { log_sharing_secret },
            pbkdf2_iterations,
        })
    }

    /// Load configuration and install it as the process-wide global, once.
    pub fn init_global() -> Result<&'static Config, ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::AlreadyInitialized)?;
        Ok(CONFIG.get().expect("just set"))
    }

    /// Access the process-wide configuration.
    ///
    /// # Panics
    /// Panics if [`Config::init_global`] has not been called yet. This is a deliberate
    /// init-then-use lifecycle: requests must not race startup.
    pub fn global() -> &'static Config {
        CONFIG
            .get()
            .expect("Config::init_global must be called before Config::global")
    }
}

#[cfg(test)]
impl Config {
    /// Install a fixed, test-only configuration as the process-wide global, ignoring
    /// the "already initialized" error so every test in the binary can call this
    /// unconditionally. Used by modules (e.g. `permission.rs`) whose tests exercise
    /// code paths that read `Config::global()`.
    pub fn init_global_for_test() -> &'static Config {
        let _ = CONFIG.set(Config {
            password_policy: PasswordPolicy::default(),
            key_paths: KeyPaths {
                jwe_pub: PathBuf::new(),
                jwe_priv: PathBuf::new(),
                jws_pub: PathBuf::new(),
                jws_priv: PathBuf::new(),
            },
            secrets: Secrets {
                log_sharing_secret: "test-log-sharing-secret".into(),
            },
            pbkdf2_iterations: 1000,
        });
        CONFIG.get().expect("set above")
    }
}

fn require_path(key: &'static str) -> Result<PathBuf, ConfigError> {
    std::env::var(key)
        .map(PathBuf::from)
        .map_err(|_| ConfigError::Missing(key))
}
