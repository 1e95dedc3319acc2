use std::collections::BTreeMap;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use rmpv::Value;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha512_256};
use thiserror::Error;

use super::address::Address;

/// 账本对原子组成员数量的硬性上限。
pub const MAX_GROUP_SIZE: usize = 16;

const TX_DOMAIN: &[u8] = b"TX";
const GROUP_DOMAIN: &[u8] = b"TG";

pub mod field {
    pub const TYPE: &str = "type";
    pub const SENDER: &str = "snd";
    pub const FEE: &str = "fee";
    pub const FIRST_VALID: &str = "fv";
    pub const LAST_VALID: &str = "lv";
    pub const GENESIS_ID: &str = "gen";
    pub const GENESIS_HASH: &str = "gh";
    pub const GROUP: &str = "grp";
    pub const NOTE: &str = "note";
    pub const RECEIVER: &str = "rcv";
    pub const AMOUNT: &str = "amt";
    pub const ASSET_ID: &str = "xaid";
    pub const ASSET_RECEIVER: &str = "arcv";
    pub const ASSET_AMOUNT: &str = "aamt";
    pub const APP_ARGS: &str = "apaa";
    pub const SIGNATURE: &str = "sig";
    pub const LOGIC_SIG: &str = "lsig";
    pub const TXN: &str = "txn";
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("base64 解码失败: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("msgpack 解码失败: {0}")]
    Decode(String),
    #[error("msgpack 编码失败: {0}")]
    Encode(String),
    #[error("msgpack 序列化失败: {0}")]
    Serialize(#[from] rmp_serde::encode::Error),
    #[error("交易结构不合法: {0}")]
    Malformed(String),
    #[error("地址不合法: {0}")]
    Address(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TxType {
    Payment,
    AssetTransfer,
    AssetConfig,
    AssetFreeze,
    ApplicationCall,
    KeyRegistration,
    Other(String),
}

impl TxType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "pay" => Self::Payment,
            "axfer" => Self::AssetTransfer,
            "acfg" => Self::AssetConfig,
            "afrz" => Self::AssetFreeze,
            "appl" => Self::ApplicationCall,
            "keyreg" => Self::KeyRegistration,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            Self::Payment => "pay",
            Self::AssetTransfer => "axfer",
            Self::AssetConfig => "acfg",
            Self::AssetFreeze => "afrz",
            Self::ApplicationCall => "appl",
            Self::KeyRegistration => "keyreg",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// 32 字节摘要，序列化为 msgpack `bin`。
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest32([u8; 32]);

impl Digest32 {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.0)
    }
}

impl fmt::Debug for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest32({})", self.to_base64())
    }
}

impl fmt::Display for Digest32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl Serialize for Digest32 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

pub type GroupId = Digest32;

/// 可变的结构化交易。字段以规范 msgpack 键保存，未知字段原样保留，
/// 以便重新编码后与聚合器给出的结构一致。
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTransaction {
    fields: BTreeMap<String, Value>,
}

impl DecodedTransaction {
    pub fn new(tx_type: TxType) -> Self {
        let mut txn = Self {
            fields: BTreeMap::new(),
        };
        txn.set_str(field::TYPE, tx_type.as_tag());
        txn
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CodecError> {
        let bytes = BASE64_STANDARD.decode(encoded.trim())?;
        Self::from_msgpack(&bytes)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = bytes;
        let value = rmpv::decode::read_value(&mut cursor)
            .map_err(|err| CodecError::Decode(err.to_string()))?;
        if !cursor.is_empty() {
            return Err(CodecError::Malformed(format!(
                "交易编码末尾存在 {} 字节多余数据",
                cursor.len()
            )));
        }
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, CodecError> {
        let Value::Map(entries) = value else {
            return Err(CodecError::Malformed("交易必须是 msgpack map".into()));
        };
        let mut fields = BTreeMap::new();
        for (key, value) in entries {
            let key = key
                .as_str()
                .ok_or_else(|| CodecError::Malformed("交易字段名必须是字符串".into()))?
                .to_string();
            fields.insert(key, value);
        }
        if !fields.contains_key(field::TYPE) {
            return Err(CodecError::Malformed("缺少 type 字段".into()));
        }
        Ok(Self { fields })
    }

    /// 按键排序输出的 msgpack map。
    pub fn to_value(&self) -> Value {
        Value::Map(
            self.fields
                .iter()
                .map(|(key, value)| (Value::from(key.as_str()), value.clone()))
                .collect(),
        )
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::with_capacity(256);
        rmpv::encode::write_value(&mut buf, &self.to_value())
            .map_err(|err| CodecError::Encode(err.to_string()))?;
        Ok(buf)
    }

    pub fn bytes_to_sign(&self) -> Result<Vec<u8>, CodecError> {
        let encoded = self.encode()?;
        let mut message = Vec::with_capacity(TX_DOMAIN.len() + encoded.len());
        message.extend_from_slice(TX_DOMAIN);
        message.extend_from_slice(&encoded);
        Ok(message)
    }

    pub fn raw_id(&self) -> Result<Digest32, CodecError> {
        Ok(Digest32(sha512_256(&self.bytes_to_sign()?)))
    }

    pub fn id(&self) -> Result<String, CodecError> {
        Ok(data_encoding::BASE32_NOPAD.encode(self.raw_id()?.as_bytes()))
    }

    pub fn tx_type(&self) -> TxType {
        self.get_str(field::TYPE)
            .map(TxType::from_tag)
            .unwrap_or_else(|| TxType::Other(String::new()))
    }

    pub fn sender(&self) -> Option<Address> {
        self.get_bytes(field::SENDER)
            .and_then(|bytes| Address::from_slice(bytes).ok())
    }

    pub fn first_valid(&self) -> u64 {
        self.get_u64(field::FIRST_VALID).unwrap_or_default()
    }

    pub fn last_valid(&self) -> u64 {
        self.get_u64(field::LAST_VALID).unwrap_or_default()
    }

    pub fn genesis_id(&self) -> Option<&str> {
        self.get_str(field::GENESIS_ID)
    }

    pub fn genesis_hash(&self) -> Option<&[u8]> {
        self.get_bytes(field::GENESIS_HASH)
    }

    pub fn group(&self) -> Option<GroupId> {
        let bytes = self.get_bytes(field::GROUP)?;
        let array: [u8; 32] = bytes.try_into().ok()?;
        Some(Digest32(array))
    }

    pub fn set_validity(&mut self, first_valid: u64, last_valid: u64) {
        self.set_u64(field::FIRST_VALID, first_valid);
        self.set_u64(field::LAST_VALID, last_valid);
    }

    pub fn set_genesis(&mut self, genesis_id: &str, genesis_hash: &[u8]) {
        self.set_str(field::GENESIS_ID, genesis_id);
        self.set_bytes(field::GENESIS_HASH, genesis_hash.to_vec());
    }

    pub fn set_group(&mut self, group: GroupId) {
        self.set_bytes(field::GROUP, group.as_bytes().to_vec());
    }

    pub fn clear_group(&mut self) -> bool {
        self.fields.remove(field::GROUP).is_some()
    }

    pub fn remove_field(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(Value::as_u64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        self.fields.get(key).and_then(Value::as_slice)
    }

    // 规范编码要求省略零值与空值，setter 统一处理。
    pub fn set_u64(&mut self, key: &str, value: u64) {
        if value == 0 {
            self.fields.remove(key);
        } else {
            self.fields.insert(key.to_string(), Value::from(value));
        }
    }

    pub fn set_str(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            self.fields.remove(key);
        } else {
            self.fields.insert(key.to_string(), Value::from(value));
        }
    }

    pub fn set_bytes(&mut self, key: &str, value: Vec<u8>) {
        if value.is_empty() {
            self.fields.remove(key);
        } else {
            self.fields.insert(key.to_string(), Value::Binary(value));
        }
    }

    pub fn set_address(&mut self, key: &str, address: &Address) {
        if *address == Address::default() {
            self.fields.remove(key);
        } else {
            self.set_bytes(key, address.as_bytes().to_vec());
        }
    }
}

#[derive(Serialize)]
struct GroupPreimage {
    txlist: Vec<Digest32>,
}

/// 计算绑定整个有序交易列表的组 ID。顺序、内容或数量任一变化都会改变结果。
pub fn compute_group_id(transactions: &[DecodedTransaction]) -> Result<GroupId, CodecError> {
    if transactions.is_empty() {
        return Err(CodecError::Malformed("空交易列表无法计算组 ID".into()));
    }
    let txlist = transactions
        .iter()
        .map(|txn| {
            let mut ungrouped = txn.clone();
            ungrouped.clear_group();
            ungrouped.raw_id()
        })
        .collect::<Result<Vec<_>, _>>()?;
    let encoded = rmp_serde::to_vec_named(&GroupPreimage { txlist })?;
    let mut preimage = Vec::with_capacity(GROUP_DOMAIN.len() + encoded.len());
    preimage.extend_from_slice(GROUP_DOMAIN);
    preimage.extend_from_slice(&encoded);
    Ok(Digest32(sha512_256(&preimage)))
}

struct SignatureBytes<'a>(&'a [u8; 64]);

impl Serialize for SignatureBytes<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(self.0)
    }
}

#[derive(Serialize)]
struct SignedEnvelope<'a> {
    sig: SignatureBytes<'a>,
    txn: &'a Value,
}

/// 将 ed25519 签名与交易打包为可提交的签名交易。
pub fn encode_signed_transaction(
    txn: &DecodedTransaction,
    signature: &[u8; 64],
) -> Result<Vec<u8>, CodecError> {
    let value = txn.to_value();
    let envelope = SignedEnvelope {
        sig: SignatureBytes(signature),
        txn: &value,
    };
    Ok(rmp_serde::to_vec_named(&envelope)?)
}

/// 若 blob 是携带逻辑签名的签名交易，则用重新盖章后的交易替换其中的 `txn`。
/// 逻辑签名不覆盖交易本体，替换后仍然有效；其它形态返回 `None`。
pub fn rebind_logic_sig(
    blob: &[u8],
    txn: &DecodedTransaction,
) -> Result<Option<Vec<u8>>, CodecError> {
    let mut cursor = blob;
    let Ok(Value::Map(entries)) = rmpv::decode::read_value(&mut cursor) else {
        return Ok(None);
    };
    if !cursor.is_empty() {
        return Ok(None);
    }
    let mut fields = BTreeMap::new();
    for (key, value) in entries {
        let Some(key) = key.as_str() else {
            return Ok(None);
        };
        fields.insert(key.to_string(), value);
    }
    if !fields.contains_key(field::LOGIC_SIG) {
        return Ok(None);
    }
    fields.insert(field::TXN.to_string(), txn.to_value());
    let rebuilt = Value::Map(
        fields
            .into_iter()
            .map(|(key, value)| (Value::from(key), value))
            .collect(),
    );
    let mut buf = Vec::with_capacity(blob.len());
    rmpv::encode::write_value(&mut buf, &rebuilt)
        .map_err(|err| CodecError::Encode(err.to_string()))?;
    Ok(Some(buf))
}

/// 从签名交易中取出内嵌交易，便于校验与日志。
pub fn decode_signed_transaction(blob: &[u8]) -> Result<DecodedTransaction, CodecError> {
    let mut cursor = blob;
    let value = rmpv::decode::read_value(&mut cursor)
        .map_err(|err| CodecError::Decode(err.to_string()))?;
    let Value::Map(entries) = value else {
        return Err(CodecError::Malformed("签名交易必须是 msgpack map".into()));
    };
    let txn = entries
        .into_iter()
        .find(|(key, _)| key.as_str() == Some(field::TXN))
        .map(|(_, value)| value)
        .ok_or_else(|| CodecError::Malformed("签名交易缺少 txn 字段".into()))?;
    DecodedTransaction::from_value(txn)
}

pub fn sha512_256(data: &[u8]) -> [u8; 32] {
    let digest = Sha512_256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}
