use std::{net::SocketAddr, path::PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MODEL_FILE: &str = "greenmind_model.pt";

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Explicit artifact location, tried before the built-in candidates.
    pub model_path: Option<PathBuf>,
    pub bind_addr: SocketAddr,
    /// `LOG_PRED=1`: per-request diagnostics at info instead of debug.
    pub log_predictions: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            log_predictions: false,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same parse as [`ServiceConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_path = lookup("MODEL_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let port: u16 = lookup("PORT")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let bind_addr = match lookup("BIND_ADDR").filter(|s| !s.trim().is_empty()) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddr(raw.clone()))?,
            None => SocketAddr::from(([0, 0, 0, 0], port)),
        };

        let log_predictions = lookup("LOG_PRED").as_deref() == Some("1");

        Ok(Self {
            model_path,
            bind_addr,
            log_predictions,
        })
    }

    /// Ordered artifact locations: explicit path first, then workspace-relative,
    /// then next to the executable.
    pub fn model_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(4);
        if let Some(p) = &self.model_path {
            candidates.push(p.clone());
        }
        candidates.push(PathBuf::from(DEFAULT_MODEL_FILE));
        candidates.push(PathBuf::from("models").join(DEFAULT_MODEL_FILE));
        if let Ok(mut exe) = std::env::current_exe() {
            exe.pop(); // exe dir
            exe.push(DEFAULT_MODEL_FILE);
            candidates.push(exe);
        }
        candidates
    }
}
