//! Session settings, read from the environment.

use contrast_core::{Player, StartupPayload};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ENV_HUMAN_PLAYER: &str = "CONTRAST_HUMAN_PLAYER";
pub const ENV_SIMULATIONS: &str = "CONTRAST_SIMULATIONS";
pub const ENV_MODEL_PATH: &str = "CONTRAST_MODEL_PATH";
pub const ENV_SEED: &str = "CONTRAST_SEED";
pub const ENV_QUERY_TIMEOUT_MS: &str = "CONTRAST_QUERY_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be 0 (spectate), 1 or 2, got {value:?}")]
    InvalidPlayer { var: &'static str, value: String },

    #[error("{var} must be a positive integer, got {value:?}")]
    NotPositive { var: &'static str, value: String },

    #[error("{var} must be an unsigned integer, got {value:?}")]
    NotANumber { var: &'static str, value: String },
}

/// AI strength presets, in simulations per move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strength {
    Weak,
    Normal,
    Strong,
}

impl Strength {
    pub fn simulations(self) -> u32 {
        match self {
            Strength::Weak => 50,
            Strength::Normal => 200,
            Strength::Strong => 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Side the human plays; `None` lets the AI play both sides
    pub human_player: Option<Player>,
    /// Simulation budget per AI move
    pub simulations: u32,
    /// Optional model file with search parameters
    pub model_path: Option<PathBuf>,
    /// Fixed search seed for reproducible games
    pub seed: Option<u64>,
    /// Give up on legal destination queries after this long
    pub query_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            human_player: Some(Player::One),
            simulations: Strength::Normal.simulations(),
            model_path: None,
            seed: None,
            query_timeout: None,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source; unset variables keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_HUMAN_PLAYER) {
            config.human_player = parse_side(ENV_HUMAN_PLAYER, &value)?;
        }
        if let Some(value) = lookup(ENV_SIMULATIONS) {
            config.simulations = parse_positive(ENV_SIMULATIONS, &value)?;
        }
        if let Some(value) = lookup(ENV_MODEL_PATH) {
            if !value.trim().is_empty() {
                config.model_path = Some(PathBuf::from(value.trim()));
            }
        }
        if let Some(value) = lookup(ENV_SEED) {
            config.seed = Some(value.trim().parse().map_err(|_| ConfigError::NotANumber {
                var: ENV_SEED,
                value: value.clone(),
            })?);
        }
        if let Some(value) = lookup(ENV_QUERY_TIMEOUT_MS) {
            let millis = parse_positive(ENV_QUERY_TIMEOUT_MS, &value)?;
            config.query_timeout = Some(Duration::from_millis(millis.into()));
        }

        Ok(config)
    }

    pub fn startup_payload(&self) -> StartupPayload {
        StartupPayload {
            model_path: self.model_path.clone(),
            seed: self.seed,
        }
    }
}

/// Parse a side selector: 0 spectates, 1 and 2 pick a player.
pub fn parse_side(var: &'static str, value: &str) -> Result<Option<Player>, ConfigError> {
    match value.trim() {
        "0" => Ok(None),
        "1" => Ok(Some(Player::One)),
        "2" => Ok(Some(Player::Two)),
        _ => Err(ConfigError::InvalidPlayer {
            var,
            value: value.to_string(),
        }),
    }
}

fn parse_positive(var: &'static str, value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::NotPositive {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.human_player, Some(Player::One));
        assert_eq!(config.simulations, 200);
    }

    #[test]
    fn test_reads_every_variable() {
        let config = SessionConfig::from_lookup(lookup(&[
            (ENV_HUMAN_PLAYER, "2"),
            (ENV_SIMULATIONS, "50"),
            (ENV_MODEL_PATH, "model.json"),
            (ENV_SEED, "42"),
            (ENV_QUERY_TIMEOUT_MS, "1500"),
        ]))
        .unwrap();

        assert_eq!(config.human_player, Some(Player::Two));
        assert_eq!(config.simulations, 50);
        assert_eq!(config.model_path, Some(PathBuf::from("model.json")));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.query_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.startup_payload().seed, Some(42));
    }

    #[test]
    fn test_spectator_side() {
        let config = SessionConfig::from_lookup(lookup(&[(ENV_HUMAN_PLAYER, "0")])).unwrap();
        assert_eq!(config.human_player, None);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            SessionConfig::from_lookup(lookup(&[(ENV_HUMAN_PLAYER, "3")])),
            Err(ConfigError::InvalidPlayer { .. })
        ));
        assert!(matches!(
            SessionConfig::from_lookup(lookup(&[(ENV_SIMULATIONS, "0")])),
            Err(ConfigError::NotPositive { .. })
        ));
        assert!(matches!(
            SessionConfig::from_lookup(lookup(&[(ENV_SEED, "-1")])),
            Err(ConfigError::NotANumber { .. })
        ));
    }

    #[test]
    fn test_strength_presets() {
        assert_eq!(Strength::Weak.simulations(), 50);
        assert_eq!(Strength::Normal.simulations(), 200);
        assert_eq!(Strength::Strong.simulations(), 400);
    }
}
