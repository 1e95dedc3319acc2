use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{FIXED_INPUT, QuoteRequest, SwapAggregator};
use crate::config::SwapConfig;
use crate::ledger::Ledger;

use super::error::SwapError;
use super::types::{Quote, QuoteOutcome, parse_base_units, to_display_amount};

/// 报价请求中与单次兑换无关的固定参数。
#[derive(Debug, Clone)]
pub struct QuoteSettings {
    pub chain: String,
    pub algod_uri: String,
    pub algod_token: String,
    pub algod_port: String,
    pub api_key: String,
    pub max_group_size: u32,
    pub atomic_only: bool,
    pub referrer: String,
}

impl QuoteSettings {
    pub fn from_config(config: &SwapConfig) -> Self {
        Self {
            chain: config.aggregator.chain.clone(),
            algod_uri: config.algod.server.clone(),
            algod_token: config.algod.token.clone(),
            algod_port: config.algod.port_text(),
            api_key: config.aggregator.api_key.clone(),
            max_group_size: config.aggregator.max_group_size,
            atomic_only: config.aggregator.atomic_only,
            referrer: config.aggregator.referrer.clone(),
        }
    }

    fn request(&self, from_asset_id: u64, to_asset_id: u64, amount: u64) -> QuoteRequest {
        QuoteRequest {
            chain: self.chain.clone(),
            algod_uri: self.algod_uri.clone(),
            algod_token: self.algod_token.clone(),
            algod_port: self.algod_port.clone(),
            amount,
            swap_type: FIXED_INPUT.to_string(),
            from_asset_id,
            to_asset_id,
            api_key: self.api_key.clone(),
            max_group_size: self.max_group_size,
            atomic_only: self.atomic_only,
            referrer: self.referrer.clone(),
        }
    }
}

#[derive(Clone)]
pub struct QuoteFetcher {
    aggregator: Arc<dyn SwapAggregator>,
    ledger: Arc<dyn Ledger>,
    settings: QuoteSettings,
}

impl QuoteFetcher {
    pub fn new(
        aggregator: Arc<dyn SwapAggregator>,
        ledger: Arc<dyn Ledger>,
        settings: QuoteSettings,
    ) -> Self {
        Self {
            aggregator,
            ledger,
            settings,
        }
    }

    /// 文本数量入口：空白或非正数直接返回 `NoQuote`。
    pub async fn fetch_quote_text(
        &self,
        from_asset_id: u64,
        to_asset_id: u64,
        amount: &str,
    ) -> Result<QuoteOutcome, SwapError> {
        match parse_base_units(amount)? {
            Some(units) => self.fetch_quote(from_asset_id, to_asset_id, units).await,
            None => Ok(QuoteOutcome::NoQuote),
        }
    }

    pub async fn fetch_quote(
        &self,
        from_asset_id: u64,
        to_asset_id: u64,
        amount: u64,
    ) -> Result<QuoteOutcome, SwapError> {
        if amount == 0 {
            debug!(target: "engine::quote", "数量为 0，跳过报价请求");
            return Ok(QuoteOutcome::NoQuote);
        }

        let request = self.settings.request(from_asset_id, to_asset_id, amount);
        let response = self.aggregator.fetch_quote(&request).await?;

        let quoted_amount = response
            .quote
            .filter(|quoted| *quoted > 0)
            .ok_or_else(|| {
                SwapError::QuoteUnavailable(format!(
                    "资产 {from_asset_id} -> {to_asset_id} 无报价数量"
                ))
            })?;
        let route_payload = response.route_payload().cloned().ok_or_else(|| {
            SwapError::QuoteUnavailable(format!(
                "资产 {from_asset_id} -> {to_asset_id} 报价缺少路由载荷"
            ))
        })?;

        // 精度必须来自账本资产元数据。
        let decimals = self.ledger.asset_info(to_asset_id).await?.decimals;
        let display_amount = to_display_amount(quoted_amount, decimals);

        info!(
            target: "engine::quote",
            from_asset = from_asset_id,
            to_asset = to_asset_id,
            amount,
            quoted_amount,
            decimals,
            display_amount = %display_amount,
            price_impact = ?response.user_price_impact,
            "获取报价成功"
        );

        Ok(QuoteOutcome::Quoted(Quote {
            quoted_amount,
            route_payload,
            price_impact_percent: response.user_price_impact,
            usd_in: response.usd_in,
            usd_out: response.usd_out,
            decimals,
            display_amount,
        }))
    }
}
