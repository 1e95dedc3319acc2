use std::sync::Arc;

use tracing::{info, warn};

use crate::ledger::{Confirmation, Ledger, LedgerError};
use crate::monitoring::{LatencyMetadata, guard_with_level};

use super::error::SwapError;
use super::group::SignedGroup;

/// 提交签名交易并以节点轮次为时钟等待确认。提交只发生一次。
#[derive(Clone)]
pub struct Submitter {
    ledger: Arc<dyn Ledger>,
    confirmation_rounds: u64,
}

impl Submitter {
    pub fn new(ledger: Arc<dyn Ledger>, confirmation_rounds: u64) -> Self {
        Self {
            ledger,
            confirmation_rounds,
        }
    }

    pub async fn submit_and_confirm(&self, group: &SignedGroup) -> Result<Confirmation, SwapError> {
        self.submit_blobs(&group.blobs, group.transaction_ids.first().map(String::as_str))
            .await
    }

    /// 单笔交易（opt-in、独立手续费）。
    pub async fn submit_single(
        &self,
        blob: Vec<u8>,
        local_tx_id: &str,
    ) -> Result<Confirmation, SwapError> {
        self.submit_blobs(&[blob], Some(local_tx_id)).await
    }

    async fn submit_blobs(
        &self,
        blobs: &[Vec<u8>],
        local_tx_id: Option<&str>,
    ) -> Result<Confirmation, SwapError> {
        let receipt = self
            .ledger
            .submit(blobs)
            .await
            .map_err(SwapError::SubmissionFailed)?;

        let Some(tx_id) = receipt.transaction_id() else {
            warn!(
                target: "engine::submit",
                local_tx_id = local_tx_id.unwrap_or_default(),
                "提交响应中没有交易 ID，无法轮询确认"
            );
            return Err(SwapError::MissingTransactionId);
        };
        if let Some(local) = local_tx_id.filter(|local| *local != tx_id) {
            warn!(
                target: "engine::submit",
                local_tx_id = local,
                tx_id = %tx_id,
                "节点返回的交易 ID 与本地计算不一致"
            );
        }
        info!(
            target: "engine::submit",
            tx_id = %tx_id,
            size = blobs.len(),
            rounds = self.confirmation_rounds,
            "交易已提交，等待确认"
        );

        let guard = guard_with_level(
            "swap.confirm",
            tracing::Level::DEBUG,
            LatencyMetadata::default().with("tx_id", tx_id.clone()),
        );
        let result = self
            .ledger
            .await_confirmation(&tx_id, self.confirmation_rounds)
            .await;
        guard.finish();

        match result {
            Ok(confirmation) => {
                info!(
                    target: "engine::submit",
                    tx_id = %confirmation.tx_id,
                    confirmed_round = confirmation.confirmed_round,
                    "交易已确认"
                );
                Ok(confirmation)
            }
            Err(err @ (LedgerError::NotConfirmed { .. } | LedgerError::Rejected { .. })) => {
                Err(err.into())
            }
            Err(source) => Err(SwapError::ConfirmationUnavailable { tx_id, source }),
        }
    }
}
