use tracing::debug;

use crate::api::{RawBundleEntry, SigningMode};
use crate::ledger::NetworkParams;
use crate::txn::{DecodedTransaction, TxType, field};

use super::error::SwapError;

/// 解码后的路由腿，保持与交易包条目一一对应。
#[derive(Debug, Clone, PartialEq)]
pub struct RouteLeg {
    pub index: usize,
    pub transaction: DecodedTransaction,
    pub signing: SigningMode,
}

#[derive(Debug, Clone)]
pub struct BundleDecoder {
    validity_rounds: u64,
}

impl BundleDecoder {
    pub fn new(validity_rounds: u64) -> Self {
        Self { validity_rounds }
    }

    /// 任一条目失败即整体失败，不返回部分结果。
    pub fn decode(
        &self,
        entries: &[RawBundleEntry],
        params: &NetworkParams,
    ) -> Result<Vec<RouteLeg>, SwapError> {
        let window = params.with_validity(self.validity_rounds);
        entries
            .iter()
            .map(|entry| self.decode_entry(entry, &window))
            .collect()
    }

    fn decode_entry(
        &self,
        entry: &RawBundleEntry,
        params: &NetworkParams,
    ) -> Result<RouteLeg, SwapError> {
        if entry.encoded_transaction.trim().is_empty() {
            return Err(SwapError::Decode {
                index: entry.index,
                reason: "缺少交易数据".into(),
            });
        }
        let mut transaction = DecodedTransaction::from_base64(&entry.encoded_transaction)
            .map_err(|err| SwapError::Decode {
                index: entry.index,
                reason: err.to_string(),
            })?;

        let stripped_args = transaction.tx_type() == TxType::ApplicationCall
            && transaction.remove_field(field::APP_ARGS).is_some();
        transaction.set_validity(params.first_valid, params.last_valid);
        transaction.set_genesis(&params.genesis_id, &params.genesis_hash);
        let cleared_group = transaction.clear_group();

        debug!(
            target: "engine::decoder",
            index = entry.index,
            tx_type = %transaction.tx_type(),
            user_signed = entry.signing.requires_user_signature(),
            stripped_args,
            cleared_group,
            "交易包条目已解码"
        );

        Ok(RouteLeg {
            index: entry.index,
            transaction,
            signing: entry.signing.clone(),
        })
    }
}
