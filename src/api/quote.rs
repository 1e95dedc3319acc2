use std::ops::Deref;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::serde_helpers::{option_base_units, option_decimal_from_number_or_string};

pub const FIXED_INPUT: &str = "fixed-input";

/// `/fetchQuote` 查询参数。
#[derive(Serialize, Debug, Clone)]
pub struct QuoteRequest {
    pub chain: String,
    #[serde(rename = "algodUri")]
    pub algod_uri: String,
    #[serde(rename = "algodToken")]
    pub algod_token: String,
    #[serde(rename = "algodPort")]
    pub algod_port: String,
    pub amount: u64,
    #[serde(rename = "type")]
    pub swap_type: String,
    #[serde(rename = "fromASAID")]
    pub from_asset_id: u64,
    #[serde(rename = "toASAID")]
    pub to_asset_id: u64,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(rename = "maxGroupSize")]
    pub max_group_size: u32,
    #[serde(rename = "atomicOnly")]
    pub atomic_only: bool,
    pub referrer: String,
}

/// 报价响应中关心的字段，其余字段保留在 `raw` 中。
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuotePayload {
    #[serde(default, deserialize_with = "option_base_units::deserialize")]
    pub quote: Option<u64>,
    #[serde(default)]
    pub txn_payload: Option<Value>,
    #[serde(default, deserialize_with = "option_decimal_from_number_or_string::deserialize")]
    pub user_price_impact: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal_from_number_or_string::deserialize")]
    pub usd_in: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal_from_number_or_string::deserialize")]
    pub usd_out: Option<Decimal>,
}

impl QuotePayload {
    /// 路由载荷缺失、为空字符串或 null 时视为无可用路由。
    pub fn route_payload(&self) -> Option<&Value> {
        match self.txn_payload.as_ref()? {
            Value::Null => None,
            Value::String(text) if text.trim().is_empty() => None,
            value => Some(value),
        }
    }
}

#[derive(Clone, Debug)]
pub struct QuoteResponse {
    pub raw: Value,
    data: QuotePayload,
}

impl QuoteResponse {
    pub fn try_from_value(value: Value) -> Result<Self, serde_json::Error> {
        let data: QuotePayload = serde_json::from_value(value.clone())?;
        Ok(Self { raw: value, data })
    }
}

impl Deref for QuoteResponse {
    type Target = QuotePayload;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
