use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{ExecuteSwapRequest, SwapAggregator};
use crate::config::SwapConfig;
use crate::ledger::{Ledger, NetworkParams};
use crate::monitoring::{measure_stage, metrics::record_swap_outcome, short_id};
use crate::txn::{DecodedTransaction, TransactionSigner};

use super::decoder::{BundleDecoder, RouteLeg};
use super::error::SwapError;
use super::fee::{FeeMode, FeePolicy};
use super::group::GroupAssembler;
use super::opt_in::OptInManager;
use super::quote::{QuoteFetcher, QuoteSettings};
use super::submission::Submitter;
use super::types::{Quote, QuoteOutcome, SimulatedSwap, SwapOutcome, SwapRequest};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub quote: QuoteSettings,
    pub fee: FeePolicy,
    pub swap_validity_rounds: u64,
    pub confirmation_rounds: u64,
    pub rebind_logic_sigs: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &SwapConfig) -> Result<Self, SwapError> {
        if config.bot.confirmation_rounds == 0 {
            return Err(SwapError::InvalidConfig(
                "bot.confirmation_rounds 必须大于 0".into(),
            ));
        }
        Ok(Self {
            quote: QuoteSettings::from_config(config),
            fee: FeePolicy::from_config(&config.fee)?,
            swap_validity_rounds: config.aggregator.swap_validity_rounds,
            confirmation_rounds: config.bot.confirmation_rounds,
            rebind_logic_sigs: config.assembly.rebind_logic_sigs,
        })
    }
}

/// 报价与交易包解码完成、尚未产生链上副作用的中间状态。
struct PreparedSwap {
    quote: Quote,
    legs: Vec<RouteLeg>,
    params: NetworkParams,
}

/// 单次兑换尝试的顺序流水线，每次调用独占自己的交易与签名状态。
pub struct SwapPipeline {
    aggregator: Arc<dyn SwapAggregator>,
    ledger: Arc<dyn Ledger>,
    signer: Arc<dyn TransactionSigner>,
    settings: PipelineSettings,
    quotes: QuoteFetcher,
    decoder: BundleDecoder,
    assembler: GroupAssembler,
    submitter: Submitter,
    opt_in: OptInManager,
}

impl SwapPipeline {
    pub fn new(
        aggregator: Arc<dyn SwapAggregator>,
        ledger: Arc<dyn Ledger>,
        signer: Arc<dyn TransactionSigner>,
        settings: PipelineSettings,
    ) -> Self {
        let quotes = QuoteFetcher::new(aggregator.clone(), ledger.clone(), settings.quote.clone());
        let decoder = BundleDecoder::new(settings.swap_validity_rounds);
        let assembler = GroupAssembler::new(signer.clone(), settings.rebind_logic_sigs);
        let submitter = Submitter::new(ledger.clone(), settings.confirmation_rounds);
        let opt_in = OptInManager::new(ledger.clone(), signer.clone(), submitter.clone());
        Self {
            aggregator,
            ledger,
            signer,
            settings,
            quotes,
            decoder,
            assembler,
            submitter,
            opt_in,
        }
    }

    pub fn quotes(&self) -> &QuoteFetcher {
        &self.quotes
    }

    pub fn opt_in(&self) -> &OptInManager {
        &self.opt_in
    }

    pub async fn quote(
        &self,
        from_asset_id: u64,
        to_asset_id: u64,
        amount: &str,
    ) -> Result<QuoteOutcome, SwapError> {
        self.quotes
            .fetch_quote_text(from_asset_id, to_asset_id, amount)
            .await
    }

    /// 报价、解码、opt-in、手续费、组装签名、提交并确认。
    pub async fn execute(&self, request: &SwapRequest) -> Result<SwapOutcome, SwapError> {
        let result = self.execute_inner(request).await;
        match &result {
            Ok(outcome) => {
                record_swap_outcome("confirmed");
                info!(
                    target: "engine::pipeline",
                    tx_id = %outcome.transaction_id,
                    confirmed_round = outcome.confirmed_round,
                    group_size = outcome.group_size,
                    "兑换完成"
                );
            }
            Err(err) => {
                record_swap_outcome(err.kind());
                warn!(
                    target: "engine::pipeline",
                    kind = err.kind(),
                    broadcast = ?err.broadcast_state(),
                    error = %err,
                    "兑换失败"
                );
            }
        }
        result
    }

    async fn execute_inner(&self, request: &SwapRequest) -> Result<SwapOutcome, SwapError> {
        let PreparedSwap {
            quote,
            legs,
            params,
        } = self.prepare(request).await?;

        let opt_in = measure_stage(
            "opt_in",
            self.opt_in.ensure_opted_in_detailed(request.to_asset_id),
        )
        .await?;

        let fee_tx_id = if self.settings.fee.mode() == FeeMode::Standalone {
            self.submit_standalone_fee(request, &params).await?
        } else {
            None
        };

        let fee = self.same_group_fee(request, &params);
        let group = self.assembler.assemble(legs, fee)?;
        let signed = self.assembler.sign(&group).await?;
        let confirmation =
            measure_stage("submit", self.submitter.submit_and_confirm(&signed)).await?;

        Ok(SwapOutcome {
            transaction_id: confirmation.tx_id,
            confirmed_round: confirmation.confirmed_round,
            quoted_amount: quote.quoted_amount,
            group_size: signed.len(),
            group_id: signed.group_id,
            opt_in_tx_id: opt_in.submitted_tx_id().map(str::to_string),
            fee_tx_id,
        })
    }

    /// 只组装与签名，不提交任何交易（包括 opt-in 与独立手续费）。
    pub async fn simulate(&self, request: &SwapRequest) -> Result<SimulatedSwap, SwapError> {
        let PreparedSwap {
            quote,
            legs,
            params,
        } = self.prepare(request).await?;

        let opt_in_required = self.opt_in.is_required(request.to_asset_id).await?;
        let standalone_fee = self.settings.fee.mode() == FeeMode::Standalone
            && self.build_fee(request, &params).is_some();
        let fee = self.same_group_fee(request, &params);
        let group = self.assembler.assemble(legs, fee)?;
        let signed = self.assembler.sign(&group).await?;

        info!(
            target: "engine::pipeline",
            group_id = %signed.group_id,
            size = signed.len(),
            first_tx = %signed.transaction_ids.first().map(|id| short_id(id)).unwrap_or_default(),
            opt_in_required,
            standalone_fee,
            "dry-run: 交易组已签名，未提交"
        );
        record_swap_outcome("dry_run");

        Ok(SimulatedSwap {
            quoted_amount: quote.quoted_amount,
            group_id: signed.group_id,
            transaction_ids: signed.transaction_ids,
            signed: signed.blobs,
            opt_in_required,
            standalone_fee,
        })
    }

    async fn prepare(&self, request: &SwapRequest) -> Result<PreparedSwap, SwapError> {
        request.validate()?;
        let signer = self.signer.address();
        if request.sender != signer {
            return Err(SwapError::InvalidRequest(format!(
                "发送方 {} 与签名地址 {signer} 不一致",
                request.sender
            )));
        }

        let quote = measure_stage(
            "quote",
            self.quotes
                .fetch_quote(request.from_asset_id, request.to_asset_id, request.amount),
        )
        .await?;
        let QuoteOutcome::Quoted(quote) = quote else {
            return Err(SwapError::QuoteUnavailable("数量为 0".into()));
        };

        let bundle_request = ExecuteSwapRequest {
            address: request.sender.to_string(),
            txn_payload: quote.route_payload.clone(),
            slippage: request.slippage_percent,
            api_key: self.settings.quote.api_key.clone(),
        };
        let bundle = measure_stage(
            "bundle",
            self.aggregator.fetch_execute_swap_txns(&bundle_request),
        )
        .await?;
        if bundle.entries().is_empty() {
            return Err(SwapError::QuoteUnavailable("聚合器返回空交易包".into()));
        }

        let params = self.ledger.suggested_params().await?;
        let legs = self.decoder.decode(bundle.entries(), &params)?;

        let extra = usize::from(
            self.settings.fee.mode() == FeeMode::SameGroup
                && self.build_fee(request, &params).is_some(),
        );
        GroupAssembler::check_capacity(&legs, extra)?;
        self.assembler.preflight(&legs)?;

        debug!(
            target: "engine::pipeline",
            legs = legs.len(),
            fee_member = extra,
            quoted_amount = quote.quoted_amount,
            "交易包解码完成"
        );
        Ok(PreparedSwap {
            quote,
            legs,
            params,
        })
    }

    fn build_fee(&self, request: &SwapRequest, params: &NetworkParams) -> Option<DecodedTransaction> {
        self.settings
            .fee
            .build(&request.sender, request.from_asset_id, request.amount, params)
    }

    fn same_group_fee(
        &self,
        request: &SwapRequest,
        params: &NetworkParams,
    ) -> Option<DecodedTransaction> {
        if self.settings.fee.mode() != FeeMode::SameGroup {
            return None;
        }
        self.build_fee(request, params)
    }

    async fn submit_standalone_fee(
        &self,
        request: &SwapRequest,
        params: &NetworkParams,
    ) -> Result<Option<String>, SwapError> {
        let Some(txn) = self.build_fee(request, params) else {
            return Ok(None);
        };
        let local_tx_id = txn.id()?;
        let blob = self
            .signer
            .sign(&txn)
            .await
            .map_err(|source| {
                SwapError::FeeTransferFailed(Box::new(SwapError::SigningFailed { index: 0, source }))
            })?;
        let confirmation = self
            .submitter
            .submit_single(blob, &local_tx_id)
            .await
            .map_err(|err| SwapError::FeeTransferFailed(Box::new(err)))?;
        info!(
            target: "engine::pipeline",
            tx_id = %confirmation.tx_id,
            "独立手续费交易已确认"
        );
        Ok(Some(confirmation.tx_id))
    }
}
