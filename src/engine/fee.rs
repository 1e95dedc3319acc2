use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::config::FeeConfig;
use crate::ledger::{NATIVE_ASSET_ID, NetworkParams};
use crate::txn::{Address, DecodedTransaction, builder};

use super::error::SwapError;

/// 手续费交易的提交方式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeeMode {
    /// 作为兑换原子组的成员，与兑换同成同败。
    #[default]
    SameGroup,
    /// 在兑换组之前单独提交并等待确认。
    Standalone,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct FeePolicy {
    mode: FeeMode,
    recipient: Option<Address>,
    percentage: Decimal,
    note_prefix: String,
}

impl FeePolicy {
    pub fn new(mode: FeeMode, recipient: Option<Address>, percentage: Decimal) -> Self {
        Self {
            mode,
            recipient,
            percentage,
            note_prefix: crate::config::default_fee_note_prefix(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(FeeMode::Disabled, None, Decimal::ZERO)
    }

    pub fn from_config(config: &FeeConfig) -> Result<Self, SwapError> {
        if config.mode == FeeMode::Disabled {
            return Ok(Self::disabled());
        }
        let recipient = config
            .recipient
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(Address::from_str)
            .transpose()
            .map_err(|err| SwapError::InvalidConfig(format!("fee.recipient: {err}")))?;
        Ok(Self {
            mode: config.mode,
            recipient,
            percentage: config.percentage,
            note_prefix: config.note_prefix.clone(),
        })
    }

    pub fn mode(&self) -> FeeMode {
        self.mode
    }

    /// floor(amount × percentage / 100)
    pub fn amount_for(&self, amount: u64) -> u64 {
        if self.percentage <= Decimal::ZERO {
            return 0;
        }
        (Decimal::from(amount) * self.percentage / Decimal::ONE_HUNDRED)
            .floor()
            .to_u64()
            .unwrap_or(0)
    }

    pub fn note(&self) -> String {
        format!("{}: {}%", self.note_prefix, self.percentage.normalize())
    }

    /// 构造手续费交易；模式关闭、未配置收款地址或金额为 0 时返回 `None`。
    /// 手续费以卖出资产计价。
    pub fn build(
        &self,
        sender: &Address,
        from_asset_id: u64,
        amount: u64,
        params: &NetworkParams,
    ) -> Option<DecodedTransaction> {
        if self.mode == FeeMode::Disabled {
            return None;
        }
        let recipient = self.recipient.as_ref()?;
        let fee_amount = self.amount_for(amount);
        if fee_amount == 0 {
            return None;
        }
        let note = self.note();
        let txn = if from_asset_id == NATIVE_ASSET_ID {
            builder::payment(sender, recipient, fee_amount, Some(note.as_bytes()), params)
        } else {
            builder::asset_transfer(
                sender,
                recipient,
                from_asset_id,
                fee_amount,
                Some(note.as_bytes()),
                params,
            )
        };
        Some(txn)
    }
}
