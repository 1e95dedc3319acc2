use std::ops::Deref;

use serde::Deserialize;
use serde_json::Value;

use super::response::{extract_confirmed_round, extract_transaction_id};

pub const NATIVE_ASSET_ID: u64 = 0;
pub const NATIVE_ASSET_DECIMALS: u32 = 6;
const FALLBACK_MIN_FEE: u64 = 1_000;

/// 当前网络参数。`first_valid`/`last_valid` 为交易有效轮次窗口。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub fee: u64,
    pub min_fee: u64,
    pub first_valid: u64,
    pub last_valid: u64,
    pub genesis_id: String,
    pub genesis_hash: Vec<u8>,
}

impl NetworkParams {
    /// 以最低手续费作为固定手续费。
    pub fn flat_fee(&self) -> u64 {
        if self.min_fee == 0 {
            FALLBACK_MIN_FEE
        } else {
            self.min_fee
        }
    }

    pub fn with_validity(&self, rounds: u64) -> Self {
        Self {
            last_valid: self.first_valid.saturating_add(rounds),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetInfo {
    pub asset_id: u64,
    pub decimals: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unit_name: Option<String>,
}

impl AssetInfo {
    pub fn native() -> Self {
        Self {
            asset_id: NATIVE_ASSET_ID,
            decimals: NATIVE_ASSET_DECIMALS,
            name: Some("Algorand".to_string()),
            unit_name: Some("ALGO".to_string()),
        }
    }
}

/// 提交接口的原始响应，字段名在不同节点版本间并不稳定。
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub raw: Value,
}

impl SubmitReceipt {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn transaction_id(&self) -> Option<String> {
        extract_transaction_id(&self.raw)
    }
}

/// 待确认交易记录，保留原始 JSON。
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub raw: Value,
    data: PendingTransactionPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PendingTransactionPayload {
    #[serde(rename = "pool-error", default)]
    pub pool_error: String,
}

impl PendingTransaction {
    pub fn try_from_value(value: Value) -> Result<Self, serde_json::Error> {
        let data: PendingTransactionPayload = serde_json::from_value(value.clone())?;
        Ok(Self { raw: value, data })
    }

    pub fn confirmed_round(&self) -> Option<u64> {
        extract_confirmed_round(&self.raw).filter(|round| *round > 0)
    }

    pub fn rejection(&self) -> Option<&str> {
        let reason = self.data.pool_error.trim();
        (!reason.is_empty()).then_some(reason)
    }
}

impl Deref for PendingTransaction {
    type Target = PendingTransactionPayload;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_id: String,
    pub confirmed_round: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validity_window_is_relative_to_first_round() {
        let params = NetworkParams {
            fee: 0,
            min_fee: 0,
            first_valid: 1_000,
            last_valid: 2_000,
            genesis_id: "testnet-v1.0".into(),
            genesis_hash: vec![1; 32],
        };
        let narrowed = params.with_validity(500);
        assert_eq!((narrowed.first_valid, narrowed.last_valid), (1_000, 1_500));
        assert_eq!(narrowed.flat_fee(), 1_000);
    }

    #[test]
    fn pending_record_reports_pool_error_and_round() {
        let pending =
            PendingTransaction::try_from_value(json!({"pool-error": "overspend", "confirmed-round": 0}))
                .expect("pending");
        assert_eq!(pending.rejection(), Some("overspend"));
        assert_eq!(pending.confirmed_round(), None);

        let confirmed = PendingTransaction::try_from_value(json!({"confirmed-round": 42}))
            .expect("confirmed");
        assert_eq!(confirmed.rejection(), None);
        assert_eq!(confirmed.confirmed_round(), Some(42));
    }
}
