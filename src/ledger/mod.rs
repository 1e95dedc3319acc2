//! 账本节点能力面：账户持仓、网络参数、原始提交与确认轮询。

pub mod algod;
pub mod error;
pub mod response;
pub mod types;

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::txn::Address;

pub use algod::AlgodClient;
pub use error::LedgerError;
pub use types::{
    AssetInfo, Confirmation, NATIVE_ASSET_DECIMALS, NATIVE_ASSET_ID, NetworkParams,
    PendingTransaction, SubmitReceipt,
};

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn account_assets(&self, address: &Address) -> Result<BTreeSet<u64>, LedgerError>;

    async fn suggested_params(&self) -> Result<NetworkParams, LedgerError>;

    async fn asset_info(&self, asset_id: u64) -> Result<AssetInfo, LedgerError>;

    /// 作为一个整体提交有序的签名交易字节。
    async fn submit(&self, signed: &[Vec<u8>]) -> Result<SubmitReceipt, LedgerError>;

    /// 节点最新轮次。
    async fn last_round(&self) -> Result<u64, LedgerError>;

    /// 交易尚未对节点可见时返回 `None`。
    async fn pending_transaction(
        &self,
        tx_id: &str,
    ) -> Result<Option<PendingTransaction>, LedgerError>;

    /// 阻塞到 `round` 之后的区块产生，返回新的最新轮次。
    async fn wait_for_block_after(&self, round: u64) -> Result<u64, LedgerError>;

    /// 以节点轮次为时钟轮询确认，超出 `timeout_rounds` 仍未确认则返回 `NotConfirmed`。
    /// 此方法从不重新提交交易。
    async fn await_confirmation(
        &self,
        tx_id: &str,
        timeout_rounds: u64,
    ) -> Result<Confirmation, LedgerError> {
        let start_round = self.last_round().await?.saturating_add(1);
        let deadline = start_round.saturating_add(timeout_rounds);
        let mut current_round = start_round;

        while current_round < deadline {
            match self.pending_transaction(tx_id).await {
                Ok(Some(pending)) => {
                    if let Some(confirmed_round) = pending.confirmed_round() {
                        return Ok(Confirmation {
                            tx_id: tx_id.to_string(),
                            confirmed_round,
                        });
                    }
                    if let Some(reason) = pending.rejection() {
                        return Err(LedgerError::Rejected {
                            tx_id: tx_id.to_string(),
                            reason: reason.to_string(),
                        });
                    }
                }
                Ok(None) => {
                    debug!(target: "ledger::confirm", tx_id, current_round, "交易尚未进入节点交易池");
                }
                Err(err) => {
                    warn!(
                        target: "ledger::confirm",
                        tx_id,
                        current_round,
                        error = %err.describe(),
                        "查询待确认交易失败，继续等待"
                    );
                }
            }

            if let Err(err) = self.wait_for_block_after(current_round).await {
                warn!(
                    target: "ledger::confirm",
                    tx_id,
                    current_round,
                    error = %err.describe(),
                    "等待下一区块失败"
                );
            }
            current_round += 1;
        }

        Err(LedgerError::NotConfirmed {
            tx_id: tx_id.to_string(),
            rounds: timeout_rounds,
        })
    }
}
