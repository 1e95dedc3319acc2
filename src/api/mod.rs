//! 聚合器 HTTP 客户端：报价与可执行交易包两个端点。

pub mod bundle;
pub mod execute;
pub mod quote;
pub mod serde_helpers;

use std::{error::Error as StdError, fmt, time::Duration};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LoggingConfig;
use crate::monitoring::metrics::prometheus_enabled;
use crate::monitoring::{LatencyMetadata, guard_with_level, summarize_error_body};

pub use bundle::{RawBundleEntry, SignatureBlob, SigningMode};
pub use execute::{ExecuteSwapRequest, ExecuteSwapResponse};
pub use quote::{FIXED_INPUT, QuotePayload, QuoteRequest, QuoteResponse};

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("failed to call aggregator API: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse response body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("API request to {endpoint} failed with status {status}: {body}")]
    ApiStatus {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("unexpected response schema: {0}")]
    Schema(String),
}

impl AggregatorError {
    pub fn describe(&self) -> String {
        let mut parts = vec![self.to_string()];
        let mut current = StdError::source(self);
        while let Some(source) = current {
            let text = source.to_string();
            if parts.last().map(|last| last == &text).unwrap_or(false) {
                current = source.source();
                continue;
            }
            parts.push(text);
            current = source.source();
        }
        parts.join(" | caused by: ")
    }
}

#[async_trait]
pub trait SwapAggregator: Send + Sync {
    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, AggregatorError>;

    async fn fetch_execute_swap_txns(
        &self,
        request: &ExecuteSwapRequest,
    ) -> Result<ExecuteSwapResponse, AggregatorError>;
}

#[derive(Clone)]
pub struct DeflexApiClient {
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
    slow_request_warn_ms: u64,
}

impl fmt::Debug for DeflexApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeflexApiClient")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("slow_request_warn_ms", &self.slow_request_warn_ms)
            .finish()
    }
}

impl DeflexApiClient {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        request_timeout: Duration,
        logging: &LoggingConfig,
    ) -> Self {
        Self {
            base_url,
            client,
            request_timeout,
            slow_request_warn_ms: logging.slow_request_warn_ms,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn read_json(
        &self,
        response: reqwest::Response,
        endpoint: &str,
        stage: &'static str,
    ) -> Result<Value, AggregatorError> {
        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|err| format!("<body decode failed: {err}>"));
            let body = summarize_error_body(body_text);
            self.record_metrics(stage, "http_error", None);
            let error = AggregatorError::ApiStatus {
                endpoint: endpoint.to_string(),
                status,
                body,
            };
            warn!(
                target: "aggregator::http",
                stage,
                status = status.as_u16(),
                error = %error.describe(),
                "聚合器返回非 200 状态"
            );
            return Err(error);
        }
        match response.json().await {
            Ok(value) => Ok(value),
            Err(err) => {
                self.record_metrics(stage, "decode_error", None);
                Err(AggregatorError::from(err))
            }
        }
    }

    fn observe_latency(&self, stage: &'static str, elapsed_ms: f64) {
        self.record_metrics(stage, "success", Some(elapsed_ms));
        if self.slow_request_warn_ms > 0 && elapsed_ms > self.slow_request_warn_ms as f64 {
            warn!(
                target: "aggregator::http",
                stage,
                elapsed_ms = format_args!("{elapsed_ms:.3}"),
                threshold_ms = self.slow_request_warn_ms,
                "聚合器请求耗时超过阈值"
            );
        }
    }

    fn record_metrics(&self, stage: &str, outcome: &str, elapsed_ms: Option<f64>) {
        if prometheus_enabled() {
            counter!(
                "algoswap_aggregator_request_total",
                "stage" => stage.to_string(),
                "outcome" => outcome.to_string(),
            )
            .increment(1);
            if let Some(value) = elapsed_ms {
                histogram!("algoswap_aggregator_latency_ms", "stage" => stage.to_string())
                    .record(value);
            }
        }
    }
}

#[async_trait]
impl SwapAggregator for DeflexApiClient {
    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, AggregatorError> {
        let url = self.endpoint("/fetchQuote");
        let metadata = LatencyMetadata::new(
            [
                ("stage".to_string(), "quote".to_string()),
                ("url".to_string(), url.clone()),
            ]
            .into_iter()
            .collect(),
        );
        let guard = guard_with_level("aggregator.quote", tracing::Level::DEBUG, metadata);

        debug!(
            target: "aggregator::quote",
            from_asset = request.from_asset_id,
            to_asset = request.to_asset_id,
            amount = request.amount,
            max_group_size = request.max_group_size,
            "开始请求聚合器报价"
        );

        let response = match self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .query(request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                self.record_metrics("quote", "transport_error", None);
                let error = AggregatorError::from(err);
                warn!(
                    target: "aggregator::quote",
                    url = %url,
                    error = %error.describe(),
                    "报价请求发送失败"
                );
                return Err(error);
            }
        };

        let value = self.read_json(response, &url, "quote").await?;
        let quote = QuoteResponse::try_from_value(value).map_err(|err| {
            self.record_metrics("quote", "schema_error", None);
            AggregatorError::Schema(format!("解析报价响应失败: {err}"))
        })?;

        let elapsed_ms = guard.finish().as_secs_f64() * 1_000.0;
        self.observe_latency("quote", elapsed_ms);
        debug!(
            target: "aggregator::quote",
            quote = ?quote.quote,
            price_impact = ?quote.user_price_impact,
            has_payload = quote.route_payload().is_some(),
            elapsed_ms = format_args!("{elapsed_ms:.3}"),
            "报价响应成功"
        );
        Ok(quote)
    }

    async fn fetch_execute_swap_txns(
        &self,
        request: &ExecuteSwapRequest,
    ) -> Result<ExecuteSwapResponse, AggregatorError> {
        let url = self.endpoint("/fetchExecuteSwapTxns");
        let metadata = LatencyMetadata::new(
            [
                ("stage".to_string(), "execute".to_string()),
                ("url".to_string(), url.clone()),
            ]
            .into_iter()
            .collect(),
        );
        let guard = guard_with_level("aggregator.execute", tracing::Level::DEBUG, metadata);

        let response = match self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                self.record_metrics("execute", "transport_error", None);
                let error = AggregatorError::from(err);
                warn!(
                    target: "aggregator::execute",
                    url = %url,
                    error = %error.describe(),
                    "交易包请求发送失败"
                );
                return Err(error);
            }
        };

        let value = self.read_json(response, &url, "execute").await?;
        let bundle = ExecuteSwapResponse::try_from_value(value).map_err(|err| {
            self.record_metrics("execute", "schema_error", None);
            AggregatorError::Schema(format!("解析交易包响应失败: {err}"))
        })?;

        let elapsed_ms = guard.finish().as_secs_f64() * 1_000.0;
        self.observe_latency("execute", elapsed_ms);
        debug!(
            target: "aggregator::execute",
            entries = bundle.entries().len(),
            user_signed = bundle
                .entries()
                .iter()
                .filter(|entry| entry.signing.requires_user_signature())
                .count(),
            elapsed_ms = format_args!("{elapsed_ms:.3}"),
            "已获取交易包"
        );
        Ok(bundle)
    }
}
