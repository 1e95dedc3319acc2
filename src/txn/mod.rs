//! 交易编解码、地址、交易构造与签名。

pub mod address;
pub mod builder;
pub mod codec;
pub mod signer;

pub use address::Address;
pub use codec::{
    CodecError, DecodedTransaction, GroupId, MAX_GROUP_SIZE, TxType, compute_group_id, field,
};
pub use signer::{LocalSigner, SignerError, TransactionSigner};
