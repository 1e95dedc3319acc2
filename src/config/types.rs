use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use zeroize::Zeroizing;

use crate::engine::FeeMode;

#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub algod: AlgodConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub fee: FeeConfig,
    #[serde(default)]
    pub assembly: AssemblyConfig,
    #[serde(default)]
    pub bot: BotConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 聚合器与 algod HTTP 请求的超时。
    #[serde(default = "super::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default = "super::default_slow_request_warn_ms")]
    pub slow_request_warn_ms: u64,
    #[serde(default = "super::default_timezone_offset_hours")]
    pub timezone_offset_hours: i8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "super::default_aggregator_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "super::default_chain")]
    pub chain: String,
    /// 聚合器路由允许占用的最大交易数，需为手续费交易预留位置。
    #[serde(default = "super::default_max_group_size")]
    pub max_group_size: u32,
    #[serde(default)]
    pub atomic_only: bool,
    #[serde(default)]
    pub referrer: String,
    #[serde(
        default = "super::default_slippage_percent",
        with = "rust_decimal::serde::float"
    )]
    pub default_slippage_percent: Decimal,
    #[serde(default = "super::default_swap_validity_rounds")]
    pub swap_validity_rounds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlgodConfig {
    #[serde(default = "super::default_algod_server")]
    pub server: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "super::default_validity_rounds")]
    pub validity_rounds: u64,
    #[serde(default = "super::default_block_wait_timeout_secs")]
    pub block_wait_timeout_secs: u64,
}

impl AlgodConfig {
    /// 报价请求中携带的端口文本，未配置时按协议推断。
    pub fn port_text(&self) -> String {
        match self.port {
            Some(port) => port.to_string(),
            None if self.server.trim_start().starts_with("http://") => "80".to_string(),
            None => "443".to_string(),
        }
    }
}

/// 签名凭证：25 词助记词，或 base64 编码的种子/私钥。
#[derive(Clone, Default, Deserialize)]
pub struct WalletConfig {
    #[serde(default, alias = "mnemonic", deserialize_with = "deserialize_secret")]
    pub secret: Option<Zeroizing<String>>,
}

impl WalletConfig {
    pub fn secret(&self) -> Option<&str> {
        self.secret
            .as_deref()
            .map(|secret| secret.trim())
            .filter(|secret| !secret.is_empty())
    }

    pub fn set_secret(&mut self, value: String) {
        self.secret = Some(Zeroizing::new(value));
    }
}

impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("secret", &self.secret().map(|_| "<redacted>"))
            .finish()
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<Zeroizing<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(Zeroizing::new))
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    #[serde(default)]
    pub mode: FeeMode,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default = "super::default_fee_percentage", with = "rust_decimal::serde::float")]
    pub percentage: Decimal,
    #[serde(default = "super::default_fee_note_prefix")]
    pub note_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssemblyConfig {
    /// 预签名逻辑签名 blob 是否改绑到重新盖章后的交易。
    #[serde(default = "super::default_true")]
    pub rebind_logic_sigs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "super::default_confirmation_rounds")]
    pub confirmation_rounds: u64,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "super::default_prometheus_listen")]
    pub listen: String,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            aggregator: AggregatorConfig::default(),
            algod: AlgodConfig::default(),
            wallet: WalletConfig::default(),
            fee: FeeConfig::default(),
            assembly: AssemblyConfig::default(),
            bot: BotConfig::default(),
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            request_timeout_ms: super::default_request_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: super::default_logging_level(),
            json: false,
            slow_request_warn_ms: super::default_slow_request_warn_ms(),
            timezone_offset_hours: super::default_timezone_offset_hours(),
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            base_url: super::default_aggregator_base_url(),
            api_key: String::new(),
            chain: super::default_chain(),
            max_group_size: super::default_max_group_size(),
            atomic_only: false,
            referrer: String::new(),
            default_slippage_percent: super::default_slippage_percent(),
            swap_validity_rounds: super::default_swap_validity_rounds(),
        }
    }
}

impl Default for AlgodConfig {
    fn default() -> Self {
        Self {
            server: super::default_algod_server(),
            token: String::new(),
            port: None,
            validity_rounds: super::default_validity_rounds(),
            block_wait_timeout_secs: super::default_block_wait_timeout_secs(),
        }
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            mode: FeeMode::default(),
            recipient: None,
            percentage: super::default_fee_percentage(),
            note_prefix: super::default_fee_note_prefix(),
        }
    }
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            rebind_logic_sigs: true,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            confirmation_rounds: super::default_confirmation_rounds(),
            prometheus: PrometheusConfig::default(),
        }
    }
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enable: false,
            listen: super::default_prometheus_listen(),
        }
    }
}
