use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::engine::FeeMode;
use crate::txn::{Address, MAX_GROUP_SIZE};

use super::SwapConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["algoswap.toml", "config/algoswap.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value in environment variable {var}: {message}")]
    Env { var: &'static str, message: String },
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid setting `{field}`: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

pub fn load_config(path: Option<PathBuf>) -> Result<SwapConfig, ConfigError> {
    let mut config = load_file(path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

fn load_file(path: Option<PathBuf>) -> Result<SwapConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            return Ok(config);
        }
    }

    Ok(SwapConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<SwapConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config = parse_config(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(config))
}

pub fn parse_config(contents: &str) -> Result<SwapConfig, toml::de::Error> {
    toml::from_str(contents)
}

/// 用环境变量覆盖文件配置。空值视为未设置；同一项有多个变量名时取第一个非空值。
pub fn apply_env_overrides<F>(config: &mut SwapConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |names: &[&str]| {
        names
            .iter()
            .filter_map(|name| lookup(name))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    };

    if let Some(value) = read(&["ALGOSWAP_API_KEY", "VITE_API_KEY"]) {
        config.aggregator.api_key = value;
    }
    if let Some(value) = read(&["ALGOD_SERVER"]) {
        config.algod.server = value;
    }
    if let Some(value) = read(&["ALGOD_TOKEN"]) {
        config.algod.token = value;
    }
    if let Some(value) = read(&["ALGOD_PORT"]) {
        let port = value.parse::<u16>().map_err(|err| ConfigError::Env {
            var: "ALGOD_PORT",
            message: format!("{value}: {err}"),
        })?;
        config.algod.port = Some(port);
    }
    if let Some(value) = read(&["ALGOSWAP_MNEMONIC", "MNEMONIC"]) {
        config.wallet.set_secret(value);
    }
    if let Some(value) = read(&["FEE_RECIPIENT_ADDRESS"]) {
        config.fee.recipient = Some(value);
    }
    if let Some(value) = read(&["FEE_PERCENTAGE"]) {
        let percentage = Decimal::from_str(&value).map_err(|err| ConfigError::Env {
            var: "FEE_PERCENTAGE",
            message: format!("{value}: {err}"),
        })?;
        config.fee.percentage = percentage;
    }
    if let Some(value) = read(&["REFERRER_ADDRESS"]) {
        config.aggregator.referrer = value;
    }
    Ok(())
}

impl SwapConfig {
    /// 报价所需：聚合器 API key 与 algod 地址。
    pub fn validate_for_quote(&self) -> Result<(), ConfigError> {
        if self.aggregator.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("aggregator.api_key"));
        }
        if self.aggregator.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("aggregator.base_url"));
        }
        if self.algod.server.trim().is_empty() {
            return Err(ConfigError::Missing("algod.server"));
        }
        let max_group = self.aggregator.max_group_size as usize;
        if max_group == 0 || max_group > MAX_GROUP_SIZE {
            return Err(ConfigError::Invalid {
                field: "aggregator.max_group_size",
                message: format!("必须在 1..={MAX_GROUP_SIZE} 之间，当前 {max_group}"),
            });
        }
        if !self.aggregator.referrer.is_empty() {
            Address::from_str(&self.aggregator.referrer).map_err(|err| ConfigError::Invalid {
                field: "aggregator.referrer",
                message: err.to_string(),
            })?;
        }
        Ok(())
    }

    pub fn validate_wallet(&self) -> Result<(), ConfigError> {
        if self.wallet.secret().is_none() {
            return Err(ConfigError::Missing("wallet.secret"));
        }
        Ok(())
    }

    /// 兑换流水线启动前的完整检查。
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_for_quote()?;
        self.validate_wallet()?;
        if self.bot.confirmation_rounds == 0 {
            return Err(ConfigError::Invalid {
                field: "bot.confirmation_rounds",
                message: "必须大于 0".into(),
            });
        }
        if self.fee.mode != FeeMode::Disabled {
            let recipient = self
                .fee
                .recipient
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing("fee.recipient"))?;
            Address::from_str(recipient).map_err(|err| ConfigError::Invalid {
                field: "fee.recipient",
                message: err.to_string(),
            })?;
            if self.fee.percentage.is_sign_negative() || self.fee.percentage > Decimal::ONE_HUNDRED {
                return Err(ConfigError::Invalid {
                    field: "fee.percentage",
                    message: format!("必须在 0..=100 之间，当前 {}", self.fee.percentage),
                });
            }
        }
        Ok(())
    }
}
