use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

use crate::txn::{Address, GroupId};

use super::error::SwapError;

/// 一次兑换尝试的不可变输入。
#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
    pub from_asset_id: u64,
    pub to_asset_id: u64,
    pub amount: u64,
    pub slippage_percent: Decimal,
    pub sender: Address,
}

impl SwapRequest {
    pub fn validate(&self) -> Result<(), SwapError> {
        if self.amount == 0 {
            return Err(SwapError::InvalidRequest("兑换数量必须大于 0".into()));
        }
        if self.from_asset_id == self.to_asset_id {
            return Err(SwapError::InvalidRequest(format!(
                "买入与卖出资产相同: {}",
                self.from_asset_id
            )));
        }
        if self.slippage_percent <= Decimal::ZERO || self.slippage_percent > Decimal::ONE_HUNDRED {
            return Err(SwapError::InvalidRequest(format!(
                "滑点必须在 (0, 100] 之间，当前 {}",
                self.slippage_percent
            )));
        }
        Ok(())
    }
}

/// 解析文本形式的基础单位数量。空白、0 或非正数返回 `None`，小数或非数字报错。
pub fn parse_base_units(text: &str) -> Result<Option<u64>, SwapError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: Decimal = trimmed
        .parse()
        .map_err(|_| SwapError::InvalidRequest(format!("无法解析数量: {trimmed}")))?;
    if value <= Decimal::ZERO {
        return Ok(None);
    }
    if value.fract() != Decimal::ZERO {
        return Err(SwapError::InvalidRequest(format!(
            "数量必须是基础单位整数: {trimmed}"
        )));
    }
    value
        .to_u64()
        .map(Some)
        .ok_or_else(|| SwapError::InvalidRequest(format!("数量超出范围: {trimmed}")))
}

/// 基础单位换算为展示数量：raw / 10^decimals。
pub fn to_display_amount(raw: u64, decimals: u32) -> Decimal {
    Decimal::try_from_i128_with_scale(i128::from(raw), decimals)
        .unwrap_or_else(|_| Decimal::from(raw))
}

#[derive(Debug, Clone)]
pub struct Quote {
    pub quoted_amount: u64,
    pub route_payload: Value,
    pub price_impact_percent: Option<Decimal>,
    pub usd_in: Option<Decimal>,
    pub usd_out: Option<Decimal>,
    pub decimals: u32,
    pub display_amount: Decimal,
}

#[derive(Debug, Clone)]
pub enum QuoteOutcome {
    /// 数量为空或非正，未发起网络请求。
    NoQuote,
    Quoted(Quote),
}

impl QuoteOutcome {
    pub fn buy_amount(&self) -> Decimal {
        match self {
            Self::NoQuote => Decimal::ZERO,
            Self::Quoted(quote) => quote.display_amount,
        }
    }

    pub fn quote(&self) -> Option<&Quote> {
        match self {
            Self::NoQuote => None,
            Self::Quoted(quote) => Some(quote),
        }
    }
}

/// 已确认的兑换结果。
#[derive(Debug, Clone, PartialEq)]
pub struct SwapOutcome {
    pub transaction_id: String,
    pub confirmed_round: u64,
    pub quoted_amount: u64,
    pub group_size: usize,
    pub group_id: GroupId,
    pub opt_in_tx_id: Option<String>,
    pub fee_tx_id: Option<String>,
}

/// dry-run 结果：已签名但未提交的交易组。
#[derive(Debug, Clone)]
pub struct SimulatedSwap {
    pub quoted_amount: u64,
    pub group_id: GroupId,
    pub transaction_ids: Vec<String>,
    pub signed: Vec<Vec<u8>>,
    pub opt_in_required: bool,
    pub standalone_fee: bool,
}
