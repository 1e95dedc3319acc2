use crate::ledger::NetworkParams;

use super::address::Address;
use super::codec::{DecodedTransaction, TxType, field};

fn apply_params(txn: &mut DecodedTransaction, params: &NetworkParams) {
    txn.set_u64(field::FEE, params.flat_fee());
    txn.set_validity(params.first_valid, params.last_valid);
    txn.set_genesis(&params.genesis_id, &params.genesis_hash);
}

pub fn payment(
    sender: &Address,
    receiver: &Address,
    amount: u64,
    note: Option<&[u8]>,
    params: &NetworkParams,
) -> DecodedTransaction {
    let mut txn = DecodedTransaction::new(TxType::Payment);
    txn.set_address(field::SENDER, sender);
    txn.set_address(field::RECEIVER, receiver);
    txn.set_u64(field::AMOUNT, amount);
    if let Some(note) = note {
        txn.set_bytes(field::NOTE, note.to_vec());
    }
    apply_params(&mut txn, params);
    txn
}

pub fn asset_transfer(
    sender: &Address,
    receiver: &Address,
    asset_id: u64,
    amount: u64,
    note: Option<&[u8]>,
    params: &NetworkParams,
) -> DecodedTransaction {
    let mut txn = DecodedTransaction::new(TxType::AssetTransfer);
    txn.set_address(field::SENDER, sender);
    txn.set_address(field::ASSET_RECEIVER, receiver);
    txn.set_u64(field::ASSET_ID, asset_id);
    txn.set_u64(field::ASSET_AMOUNT, amount);
    if let Some(note) = note {
        txn.set_bytes(field::NOTE, note.to_vec());
    }
    apply_params(&mut txn, params);
    txn
}

/// 向自身转账 0 个资产，即资产 opt-in。
pub fn asset_opt_in(address: &Address, asset_id: u64, params: &NetworkParams) -> DecodedTransaction {
    let mut txn = DecodedTransaction::new(TxType::AssetTransfer);
    txn.set_address(field::SENDER, address);
    txn.set_address(field::ASSET_RECEIVER, address);
    txn.set_u64(field::ASSET_ID, asset_id);
    apply_params(&mut txn, params);
    txn
}
