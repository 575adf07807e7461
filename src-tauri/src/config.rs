//! Startup configuration.
//!
//! Sources, first hit wins:
//!   1. process environment
//!   2. `.env.local` / `.env` in the working directory, then in the project
//!      root (parent of `src-tauri/`), then `<config dir>/vision-assist/.env`
//!      (dotenvy never overrides 1)
//!   3. OS keychain, for the API key only
//!
//! A missing API key is fatal: the app refuses to open any window.

use std::path::{Path, PathBuf};

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const MODEL_VAR: &str = "OPENAI_VISION_MODEL";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
pub const SAVE_DIR_VAR: &str = "SAVE_DIRECTORY";
pub const CAPTURE_DELAY_VAR: &str = "CAPTURE_DELAY_MS";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SAVE_DIR: &str = "output";
/// Time the main window gets to disappear before a full-screen grab.
pub const DEFAULT_CAPTURE_DELAY_MS: u64 = 500;

const KEYCHAIN_SERVICE: &str = "vision-assist";
const KEYCHAIN_USER: &str = "openai";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_key: String,
    pub vision_model: String,
    pub api_base_url: String,
    pub output_dir: PathBuf,
    pub capture_delay_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set (environment, .env or OS keychain)")]
    MissingCredential,

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AppConfig {
    /// Load from every source, then make sure the output directory exists.
    pub fn load() -> Result<Self, ConfigError> {
        load_env_files();

        let config = Self::from_lookup(|key| {
            let value = std::env::var(key).ok().filter(|v| !v.trim().is_empty());
            if value.is_none() && key == API_KEY_VAR {
                return keychain_api_key();
            }
            value
        })?;

        ensure_dir(&config.output_dir)?;
        log::info!(
            "[CONFIG] model={} base_url={} output_dir={}",
            config.vision_model,
            config.api_base_url,
            config.output_dir.display()
        );
        Ok(config)
    }

    /// Build from a key lookup. No filesystem or environment access.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get(API_KEY_VAR).ok_or(ConfigError::MissingCredential)?;

        let capture_delay_ms = match get(CAPTURE_DELAY_VAR) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: CAPTURE_DELAY_VAR,
                value: raw,
            })?,
            None => DEFAULT_CAPTURE_DELAY_MS,
        };

        let api_base_url = get(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: BASE_URL_VAR,
                value: api_base_url,
            });
        }

        Ok(Self {
            api_key,
            vision_model: get(MODEL_VAR)
                .unwrap_or_else(|| crate::services::prompts::DEFAULT_MODEL.to_string()),
            api_base_url,
            output_dir: PathBuf::from(get(SAVE_DIR_VAR).unwrap_or_else(|| DEFAULT_SAVE_DIR.to_string())),
            capture_delay_ms,
        })
    }
}

fn load_env_files() {
    // CARGO_MANIFEST_DIR is src-tauri/; `tauri dev` runs from there.
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let project_root = manifest_dir.parent().unwrap_or(manifest_dir);

    let mut candidates = vec![PathBuf::from(".env.local"), PathBuf::from(".env")];
    candidates.extend([".env.local", ".env"].map(|name| project_root.join(name)));
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(KEYCHAIN_SERVICE).join(".env"));
    }

    'env_load: for path in candidates {
        if path.exists() {
            match dotenvy::from_path(&path) {
                Ok(_) => eprintln!("[STARTUP] Loaded {}", path.display()),
                Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
            }
            break 'env_load;
        }
    }
}

fn keychain_api_key() -> Option<String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_USER).ok()?;
    match entry.get_password() {
        Ok(key) if !key.is_empty() => {
            log::info!("[CONFIG] Loaded API key from OS keychain");
            Some(key)
        }
        _ => None,
    }
}

fn ensure_dir(path: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(path).map_err(|source| ConfigError::OutputDir {
        path: path.to_path_buf(),
        source,
    })
}
