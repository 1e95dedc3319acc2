use thiserror::Error;

use crate::api::AggregatorError;
use crate::ledger::LedgerError;
use crate::txn::{CodecError, SignerError};

/// 兑换组的广播状态，供调用方区分“未广播”与“已广播未确认”。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastState {
    NotBroadcast,
    /// 提交请求在传输层失败，节点是否已收到未知。
    Unknown,
    BroadcastUnconfirmed,
    BroadcastRejected,
}

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("兑换请求不合法: {0}")]
    InvalidRequest(String),
    #[error("配置缺失或非法: {0}")]
    InvalidConfig(String),
    #[error("无可用报价: {0}")]
    QuoteUnavailable(String),
    #[error("聚合器请求失败: {0}")]
    Aggregator(#[from] AggregatorError),
    #[error("账本节点请求失败: {0}")]
    Network(#[source] LedgerError),
    #[error("第 {index} 笔交易解码失败: {reason}")]
    Decode { index: usize, reason: String },
    #[error("交易组共 {size} 笔交易，超过上限 {max}")]
    GroupTooLarge { size: usize, max: usize },
    #[error("第 {index} 笔交易的预签名 blob 格式无法识别 ({kind})")]
    UnrecognizedSignatureFormat { index: usize, kind: &'static str },
    #[error("第 {index} 笔交易尚未写入组 ID，拒绝签名")]
    SignedBeforeGrouping { index: usize },
    #[error("第 {index} 笔交易的发送方 {sender} 与签名地址 {signer} 不一致")]
    SignerMismatch {
        index: usize,
        sender: String,
        signer: String,
    },
    #[error("第 {index} 笔交易签名失败: {source}")]
    SigningFailed {
        index: usize,
        #[source]
        source: SignerError,
    },
    #[error("交易编码失败: {0}")]
    Codec(#[from] CodecError),
    #[error("资产 {asset_id} opt-in 失败: {reason}")]
    OptInFailed { asset_id: u64, reason: String },
    /// 广播状态沿用内部错误：手续费交易可能已提交但未确认。
    #[error("手续费转账失败: {0}")]
    FeeTransferFailed(#[source] Box<SwapError>),
    #[error("交易组提交失败: {0}")]
    SubmissionFailed(#[source] LedgerError),
    #[error("交易组已提交，但响应中没有交易 ID")]
    MissingTransactionId,
    #[error("交易 {tx_id} 在 {rounds} 轮内未确认")]
    NotConfirmed { tx_id: String, rounds: u64 },
    #[error("交易 {tx_id} 被节点拒绝: {reason}")]
    TransactionRejected { tx_id: String, reason: String },
    #[error("交易 {tx_id} 已提交，但无法查询确认状态: {source}")]
    ConfirmationUnavailable {
        tx_id: String,
        #[source]
        source: LedgerError,
    },
}

impl SwapError {
    pub fn broadcast_state(&self) -> BroadcastState {
        match self {
            Self::SubmissionFailed(LedgerError::ApiStatus { .. }) => BroadcastState::NotBroadcast,
            Self::SubmissionFailed(_) => BroadcastState::Unknown,
            Self::MissingTransactionId
            | Self::NotConfirmed { .. }
            | Self::ConfirmationUnavailable { .. } => BroadcastState::BroadcastUnconfirmed,
            Self::TransactionRejected { .. } => BroadcastState::BroadcastRejected,
            Self::FeeTransferFailed(inner) => inner.broadcast_state(),
            _ => BroadcastState::NotBroadcast,
        }
    }

    /// 简短的错误类别，用于指标标签与 CLI 输出。
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidConfig(_) => "invalid_config",
            Self::QuoteUnavailable(_) => "quote_unavailable",
            Self::Aggregator(_) | Self::Network(_) => "network",
            Self::Decode { .. } => "decode",
            Self::GroupTooLarge { .. } => "group_too_large",
            Self::UnrecognizedSignatureFormat { .. } => "unrecognized_signature",
            Self::SignedBeforeGrouping { .. } => "signed_before_grouping",
            Self::SignerMismatch { .. } => "signer_mismatch",
            Self::SigningFailed { .. } => "signing_failed",
            Self::Codec(_) => "codec",
            Self::OptInFailed { .. } => "opt_in_failed",
            Self::FeeTransferFailed(_) => "fee_transfer_failed",
            Self::SubmissionFailed(_) => "submission_failed",
            Self::MissingTransactionId => "missing_transaction_id",
            Self::NotConfirmed { .. } => "not_confirmed",
            Self::TransactionRejected { .. } => "rejected",
            Self::ConfirmationUnavailable { .. } => "confirmation_unavailable",
        }
    }
}

impl From<LedgerError> for SwapError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotConfirmed { tx_id, rounds } => Self::NotConfirmed { tx_id, rounds },
            LedgerError::Rejected { tx_id, reason } => Self::TransactionRejected { tx_id, reason },
            other => Self::Network(other),
        }
    }
}
