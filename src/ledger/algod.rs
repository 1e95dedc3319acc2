use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use metrics::{counter, histogram};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::{AlgodConfig, LoggingConfig};
use crate::monitoring::metrics::prometheus_enabled;
use crate::monitoring::{LatencyMetadata, guard_with_level, summarize_error_body};
use crate::txn::Address;

use super::error::LedgerError;
use super::types::{AssetInfo, NATIVE_ASSET_ID, NetworkParams, PendingTransaction, SubmitReceipt};
use super::Ledger;

const TOKEN_HEADER: &str = "X-Algo-API-Token";

#[derive(Clone)]
pub struct AlgodClient {
    base_url: Url,
    token: String,
    client: reqwest::Client,
    request_timeout: Duration,
    wait_timeout: Duration,
    validity_rounds: u64,
    slow_request_warn_ms: u64,
}

impl fmt::Debug for AlgodClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgodClient")
            .field("base_url", &self.base_url.as_str())
            .field("token_set", &!self.token.is_empty())
            .field("request_timeout", &self.request_timeout)
            .field("validity_rounds", &self.validity_rounds)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TransactionParamsPayload {
    #[serde(default)]
    fee: u64,
    #[serde(rename = "min-fee", default)]
    min_fee: u64,
    #[serde(rename = "last-round")]
    last_round: u64,
    #[serde(rename = "genesis-id")]
    genesis_id: String,
    #[serde(rename = "genesis-hash")]
    genesis_hash: String,
}

#[derive(Debug, Deserialize)]
struct AccountPayload {
    #[serde(default)]
    assets: Vec<AccountAssetHolding>,
}

#[derive(Debug, Deserialize)]
struct AccountAssetHolding {
    #[serde(rename = "asset-id")]
    asset_id: u64,
}

#[derive(Debug, Deserialize)]
struct AssetPayload {
    index: u64,
    params: AssetParamsPayload,
}

#[derive(Debug, Deserialize)]
struct AssetParamsPayload {
    #[serde(default)]
    decimals: u32,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "unit-name", default)]
    unit_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    #[serde(rename = "last-round")]
    last_round: u64,
}

impl AlgodClient {
    pub fn new(
        client: reqwest::Client,
        config: &AlgodConfig,
        request_timeout: Duration,
        logging: &LoggingConfig,
    ) -> Result<Self, LedgerError> {
        let base_url = resolve_base_url(&config.server, config.port)?;
        Ok(Self {
            base_url,
            token: config.token.clone(),
            client,
            request_timeout,
            wait_timeout: request_timeout.max(Duration::from_secs(config.block_wait_timeout_secs)),
            validity_rounds: config.validity_rounds,
            slow_request_warn_ms: logging.slow_request_warn_ms,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, LedgerError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| LedgerError::Endpoint(format!("拼接 {path} 失败: {err}")))
    }

    async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        stage: &'static str,
        timeout: Duration,
    ) -> Result<Value, LedgerError> {
        let url = self.endpoint(path)?;
        let metadata = LatencyMetadata::new(
            [
                ("stage".to_string(), stage.to_string()),
                ("path".to_string(), path.to_string()),
            ]
            .into_iter()
            .collect(),
        );
        let guard = guard_with_level("algod.request", tracing::Level::DEBUG, metadata);

        let mut request = self
            .client
            .request(method, url.clone())
            .timeout(timeout)
            .header(TOKEN_HEADER, &self.token);
        if let Some(bytes) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/x-binary")
                .body(bytes);
        }

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(err) => {
                self.record_metrics(stage, "transport_error", None);
                let error = LedgerError::from(err);
                warn!(
                    target: "ledger::algod",
                    stage,
                    url = %url,
                    error = %error.describe(),
                    "algod 请求发送失败"
                );
                return Err(error);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|err| format!("<body decode failed: {err}>"));
            let outcome = if status == StatusCode::NOT_FOUND {
                "not_found"
            } else {
                "http_error"
            };
            self.record_metrics(stage, outcome, None);
            return Err(LedgerError::ApiStatus {
                endpoint: url.to_string(),
                status,
                body: summarize_error_body(body_text),
            });
        }

        let value: Value = match response.json().await {
            Ok(value) => value,
            Err(err) => {
                self.record_metrics(stage, "decode_error", None);
                return Err(LedgerError::from(err));
            }
        };

        let elapsed_ms = guard.finish().as_secs_f64() * 1_000.0;
        self.record_metrics(stage, "success", Some(elapsed_ms));
        if self.slow_request_warn_ms > 0 && elapsed_ms > self.slow_request_warn_ms as f64 && stage != "wait_block" {
            warn!(
                target: "ledger::algod",
                stage,
                elapsed_ms = format_args!("{elapsed_ms:.3}"),
                "algod 请求耗时过长"
            );
        }
        Ok(value)
    }

    async fn get_json(&self, path: &str, stage: &'static str) -> Result<Value, LedgerError> {
        self.request_json(Method::GET, path, None, stage, self.request_timeout)
            .await
    }

    fn record_metrics(&self, stage: &str, outcome: &str, elapsed_ms: Option<f64>) {
        if prometheus_enabled() {
            counter!(
                "algoswap_algod_request_total",
                "stage" => stage.to_string(),
                "outcome" => outcome.to_string(),
            )
            .increment(1);
            if let Some(value) = elapsed_ms {
                histogram!("algoswap_algod_latency_ms", "stage" => stage.to_string()).record(value);
            }
        }
    }
}

#[async_trait]
impl Ledger for AlgodClient {
    async fn account_assets(&self, address: &Address) -> Result<BTreeSet<u64>, LedgerError> {
        let value = self
            .get_json(&format!("/v2/accounts/{address}"), "account")
            .await?;
        let account: AccountPayload = serde_json::from_value(value)
            .map_err(|err| LedgerError::Schema(format!("解析账户信息失败: {err}")))?;
        let assets: BTreeSet<u64> = account.assets.into_iter().map(|holding| holding.asset_id).collect();
        debug!(
            target: "ledger::algod",
            address = %address,
            holdings = assets.len(),
            "已获取账户持仓"
        );
        Ok(assets)
    }

    async fn suggested_params(&self) -> Result<NetworkParams, LedgerError> {
        let value = self.get_json("/v2/transactions/params", "params").await?;
        let payload: TransactionParamsPayload = serde_json::from_value(value)
            .map_err(|err| LedgerError::Schema(format!("解析网络参数失败: {err}")))?;
        let genesis_hash = BASE64_STANDARD
            .decode(payload.genesis_hash.as_bytes())
            .map_err(|err| LedgerError::Schema(format!("genesis-hash 不是合法 base64: {err}")))?;
        let params = NetworkParams {
            fee: payload.fee,
            min_fee: payload.min_fee,
            first_valid: payload.last_round,
            last_valid: payload.last_round.saturating_add(self.validity_rounds),
            genesis_id: payload.genesis_id,
            genesis_hash,
        };
        debug!(
            target: "ledger::algod",
            first_valid = params.first_valid,
            last_valid = params.last_valid,
            min_fee = params.min_fee,
            genesis_id = %params.genesis_id,
            "已获取网络参数"
        );
        Ok(params)
    }

    async fn asset_info(&self, asset_id: u64) -> Result<AssetInfo, LedgerError> {
        if asset_id == NATIVE_ASSET_ID {
            return Ok(AssetInfo::native());
        }
        let value = self
            .get_json(&format!("/v2/assets/{asset_id}"), "asset")
            .await?;
        let payload: AssetPayload = serde_json::from_value(value)
            .map_err(|err| LedgerError::Schema(format!("解析资产 {asset_id} 元数据失败: {err}")))?;
        Ok(AssetInfo {
            asset_id: payload.index,
            decimals: payload.params.decimals,
            name: payload.params.name,
            unit_name: payload.params.unit_name,
        })
    }

    async fn submit(&self, signed: &[Vec<u8>]) -> Result<SubmitReceipt, LedgerError> {
        if signed.is_empty() {
            return Err(LedgerError::Schema("提交的交易列表为空".into()));
        }
        let body: Vec<u8> = signed.concat();
        let size = body.len();
        let value = self
            .request_json(
                Method::POST,
                "/v2/transactions",
                Some(body),
                "submit",
                self.request_timeout,
            )
            .await?;
        debug!(
            target: "ledger::algod",
            transactions = signed.len(),
            bytes = size,
            "原始交易已提交"
        );
        Ok(SubmitReceipt::new(value))
    }

    async fn last_round(&self) -> Result<u64, LedgerError> {
        let value = self.get_json("/v2/status", "status").await?;
        let status: StatusPayload = serde_json::from_value(value)
            .map_err(|err| LedgerError::Schema(format!("解析节点状态失败: {err}")))?;
        Ok(status.last_round)
    }

    async fn pending_transaction(
        &self,
        tx_id: &str,
    ) -> Result<Option<PendingTransaction>, LedgerError> {
        match self
            .get_json(&format!("/v2/transactions/pending/{tx_id}"), "pending")
            .await
        {
            Ok(value) => PendingTransaction::try_from_value(value)
                .map(Some)
                .map_err(|err| LedgerError::Schema(format!("解析待确认交易失败: {err}"))),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn wait_for_block_after(&self, round: u64) -> Result<u64, LedgerError> {
        let value = self
            .request_json(
                Method::GET,
                &format!("/v2/status/wait-for-block-after/{round}"),
                None,
                "wait_block",
                self.wait_timeout,
            )
            .await?;
        let status: StatusPayload = serde_json::from_value(value)
            .map_err(|err| LedgerError::Schema(format!("解析节点状态失败: {err}")))?;
        Ok(status.last_round)
    }
}

/// 合并服务器地址与端口。端口为空、与 URL 已有端口冲突或等于协议默认端口时保持 URL 原样。
fn resolve_base_url(server: &str, port: Option<u16>) -> Result<Url, LedgerError> {
    let trimmed = server.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::Endpoint("algod 地址为空".into()));
    }
    let mut url = Url::parse(trimmed)
        .map_err(|err| LedgerError::Endpoint(format!("解析 algod 地址 {trimmed} 失败: {err}")))?;
    if let Some(port) = port {
        if url.port().is_none() && url.port_or_known_default() != Some(port) {
            url.set_port(Some(port))
                .map_err(|_| LedgerError::Endpoint(format!("无法为 {trimmed} 设置端口 {port}")))?;
        }
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
