use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{SignatureBlob, SigningMode};
use crate::txn::codec::rebind_logic_sig;
use crate::txn::{
    Address, DecodedTransaction, GroupId, MAX_GROUP_SIZE, TransactionSigner, compute_group_id,
};

use super::decoder::RouteLeg;
use super::error::SwapError;

/// 已写入组 ID 但尚未签名的交易组成员。
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMember {
    pub transaction: DecodedTransaction,
    pub signing: SigningMode,
}

#[derive(Debug, Clone)]
pub struct AtomicGroup {
    group_id: GroupId,
    members: Vec<GroupMember>,
}

impl AtomicGroup {
    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn members(&self) -> &[GroupMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// 与交易组顺序一致的签名交易字节，可直接提交。
#[derive(Debug, Clone)]
pub struct SignedGroup {
    pub group_id: GroupId,
    pub blobs: Vec<Vec<u8>>,
    pub transaction_ids: Vec<String>,
}

impl SignedGroup {
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

pub struct GroupAssembler {
    signer: Arc<dyn TransactionSigner>,
    rebind_logic_sigs: bool,
}

impl GroupAssembler {
    pub fn new(signer: Arc<dyn TransactionSigner>, rebind_logic_sigs: bool) -> Self {
        Self {
            signer,
            rebind_logic_sigs,
        }
    }

    /// 在任何签名或链上副作用之前检查组容量。
    pub fn check_capacity(legs: &[RouteLeg], extra: usize) -> Result<(), SwapError> {
        let size = legs.len() + extra;
        if size > MAX_GROUP_SIZE {
            return Err(SwapError::GroupTooLarge {
                size,
                max: MAX_GROUP_SIZE,
            });
        }
        Ok(())
    }

    /// 在 opt-in、手续费或任何提交之前校验每条路由交易的签名来源：
    /// 预签名 blob 必须能归一化，需要用户签名的交易发送方必须是签名地址。
    pub fn preflight(&self, legs: &[RouteLeg]) -> Result<(), SwapError> {
        let signer_address = self.signer.address();
        for (index, leg) in legs.iter().enumerate() {
            match &leg.signing {
                SigningMode::RequiresUserSignature => {
                    check_sender(index, &leg.transaction, signer_address)?;
                }
                SigningMode::PreSigned(blob) => {
                    canonical_blob(index, blob)?;
                }
            }
        }
        debug!(target: "engine::assembly", legs = legs.len(), "签名来源预检通过");
        Ok(())
    }

    /// 按路由顺序组装，手续费交易追加在末尾，然后为每个成员写入同一组 ID。
    pub fn assemble(
        &self,
        legs: Vec<RouteLeg>,
        fee: Option<DecodedTransaction>,
    ) -> Result<AtomicGroup, SwapError> {
        let extra = usize::from(fee.is_some());
        Self::check_capacity(&legs, extra)?;

        let mut members: Vec<GroupMember> = legs
            .into_iter()
            .map(|leg| GroupMember {
                transaction: leg.transaction,
                signing: leg.signing,
            })
            .collect();
        if let Some(fee) = fee {
            members.push(GroupMember {
                transaction: fee,
                signing: SigningMode::RequiresUserSignature,
            });
        }
        if members.is_empty() {
            return Err(SwapError::QuoteUnavailable("交易包为空".into()));
        }

        let transactions: Vec<DecodedTransaction> =
            members.iter().map(|member| member.transaction.clone()).collect();
        let group_id = compute_group_id(&transactions)?;
        for member in &mut members {
            member.transaction.set_group(group_id);
        }

        debug!(
            target: "engine::assembly",
            group_id = %group_id,
            size = members.len(),
            "交易组已写入组 ID"
        );
        Ok(AtomicGroup { group_id, members })
    }

    /// 逐个成员签名。用户交易用签名器签名，预签名 blob 归一化后原样使用。
    pub async fn sign(&self, group: &AtomicGroup) -> Result<SignedGroup, SwapError> {
        let signer_address = self.signer.address();
        let mut blobs = Vec::with_capacity(group.len());
        let mut transaction_ids = Vec::with_capacity(group.len());

        for (index, member) in group.members.iter().enumerate() {
            if member.transaction.group() != Some(group.group_id) {
                return Err(SwapError::SignedBeforeGrouping { index });
            }
            transaction_ids.push(member.transaction.id()?);

            let blob = match &member.signing {
                SigningMode::RequiresUserSignature => {
                    check_sender(index, &member.transaction, signer_address)?;
                    self.signer
                        .sign(&member.transaction)
                        .await
                        .map_err(|source| SwapError::SigningFailed { index, source })?
                }
                SigningMode::PreSigned(blob) => {
                    let canonical = canonical_blob(index, blob)?;
                    self.rebind_if_logic_sig(index, canonical, &member.transaction)?
                }
            };

            if blob.is_empty() {
                return Err(SwapError::UnrecognizedSignatureFormat {
                    index,
                    kind: "empty",
                });
            }
            blobs.push(blob);
        }

        info!(
            target: "engine::assembly",
            group_id = %group.group_id,
            size = blobs.len(),
            "交易组签名完成"
        );
        Ok(SignedGroup {
            group_id: group.group_id,
            blobs,
            transaction_ids,
        })
    }

    fn rebind_if_logic_sig(
        &self,
        index: usize,
        blob: Vec<u8>,
        transaction: &DecodedTransaction,
    ) -> Result<Vec<u8>, SwapError> {
        if !self.rebind_logic_sigs {
            return Ok(blob);
        }
        match rebind_logic_sig(&blob, transaction)? {
            Some(rebound) => {
                debug!(target: "engine::assembly", index, "逻辑签名交易已重新绑定组 ID");
                Ok(rebound)
            }
            None => Ok(blob),
        }
    }
}

fn check_sender(
    index: usize,
    transaction: &DecodedTransaction,
    signer: Address,
) -> Result<(), SwapError> {
    let sender = transaction.sender();
    if sender != Some(signer) {
        return Err(SwapError::SignerMismatch {
            index,
            sender: sender.map(|addr| addr.to_string()).unwrap_or_default(),
            signer: signer.to_string(),
        });
    }
    Ok(())
}

fn canonical_blob(index: usize, blob: &SignatureBlob) -> Result<Vec<u8>, SwapError> {
    blob.to_canonical()
        .ok_or(SwapError::UnrecognizedSignatureFormat {
            index,
            kind: blob.kind(),
        })
}
