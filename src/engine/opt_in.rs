use std::sync::Arc;

use tracing::{debug, info};

use crate::ledger::{Ledger, NATIVE_ASSET_ID};
use crate::txn::{Address, TransactionSigner, builder};

use super::error::SwapError;
use super::submission::Submitter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptInStatus {
    AlreadyOptedIn,
    /// 原生资产无需 opt-in。
    NotRequired,
    OptedIn { tx_id: String, confirmed_round: u64 },
}

impl OptInStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AlreadyOptedIn => "already_opted_in",
            Self::NotRequired => "not_required",
            Self::OptedIn { .. } => "opted_in",
        }
    }

    pub fn submitted_tx_id(&self) -> Option<&str> {
        match self {
            Self::OptedIn { tx_id, .. } => Some(tx_id),
            _ => None,
        }
    }
}

/// 确保签名账户已 opt-in 目标资产。必要时单独提交并确认 opt-in 交易，
/// 且必须在兑换组签名之前完成。
#[derive(Clone)]
pub struct OptInManager {
    ledger: Arc<dyn Ledger>,
    signer: Arc<dyn TransactionSigner>,
    submitter: Submitter,
}

impl OptInManager {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        signer: Arc<dyn TransactionSigner>,
        submitter: Submitter,
    ) -> Self {
        Self {
            ledger,
            signer,
            submitter,
        }
    }

    /// 只查询，不产生副作用。
    pub async fn is_required(&self, asset_id: u64) -> Result<bool, SwapError> {
        if asset_id == NATIVE_ASSET_ID {
            return Ok(false);
        }
        let held = self
            .ledger
            .account_assets(&self.signer.address())
            .await
            .map_err(|err| opt_in_failed(asset_id, err.describe()))?;
        Ok(!held.contains(&asset_id))
    }

    /// 成功返回即表示账户已可持有该资产。只能为签名账户本身 opt-in。
    pub async fn ensure_opted_in(&self, address: &Address, asset_id: u64) -> Result<bool, SwapError> {
        let signer = self.signer.address();
        if *address != signer {
            return Err(opt_in_failed(
                asset_id,
                format!("账户 {address} 与签名地址 {signer} 不一致"),
            ));
        }
        self.ensure_opted_in_detailed(asset_id).await?;
        Ok(true)
    }

    pub async fn ensure_opted_in_detailed(&self, asset_id: u64) -> Result<OptInStatus, SwapError> {
        if asset_id == NATIVE_ASSET_ID {
            return Ok(OptInStatus::NotRequired);
        }
        if !self.is_required(asset_id).await? {
            debug!(target: "engine::opt_in", asset_id, "账户已持有资产，跳过 opt-in");
            return Ok(OptInStatus::AlreadyOptedIn);
        }

        let address = self.signer.address();
        let params = self
            .ledger
            .suggested_params()
            .await
            .map_err(|err| opt_in_failed(asset_id, err.describe()))?;
        let txn = builder::asset_opt_in(&address, asset_id, &params);
        let local_tx_id = txn.id()?;
        let blob = self
            .signer
            .sign(&txn)
            .await
            .map_err(|err| opt_in_failed(asset_id, err.to_string()))?;

        info!(
            target: "engine::opt_in",
            asset_id,
            address = %address,
            tx_id = %local_tx_id,
            "提交资产 opt-in 交易"
        );
        let confirmation = self
            .submitter
            .submit_single(blob, &local_tx_id)
            .await
            .map_err(|err| opt_in_failed(asset_id, err.to_string()))?;

        Ok(OptInStatus::OptedIn {
            tx_id: confirmation.tx_id,
            confirmed_round: confirmation.confirmed_round,
        })
    }
}

fn opt_in_failed(asset_id: u64, reason: String) -> SwapError {
    SwapError::OptInFailed { asset_id, reason }
}
