use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use super::bundle::RawBundleEntry;

/// `/fetchExecuteSwapTxns` 请求体。
#[derive(Serialize, Debug, Clone)]
pub struct ExecuteSwapRequest {
    pub address: String,
    #[serde(rename = "txnPayloadJSON")]
    pub txn_payload: Value,
    #[serde(with = "rust_decimal::serde::float")]
    pub slippage: Decimal,
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

/// 交易包响应，条目顺序即路由执行顺序。
#[derive(Debug, Clone)]
pub struct ExecuteSwapResponse {
    pub raw: Value,
    entries: Vec<RawBundleEntry>,
}

impl ExecuteSwapResponse {
    pub fn try_from_value(value: Value) -> Result<Self, String> {
        let txns = value
            .get("txns")
            .and_then(Value::as_array)
            .ok_or_else(|| "响应缺少 txns 数组".to_string())?;
        let entries = txns
            .iter()
            .enumerate()
            .map(|(index, entry)| RawBundleEntry::from_value(index, entry))
            .collect();
        Ok(Self {
            raw: value,
            entries,
        })
    }

    pub fn entries(&self) -> &[RawBundleEntry] {
        &self.entries
    }
}
