//! 聚合器返回的交易包。签名形态在解析响应时一次性分类。

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde_json::{Map, Value};

/// 聚合器预签名 blob 的几种已知编码。
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureBlob {
    Base64(String),
    Bytes(Vec<u8>),
    /// `{"type":"Buffer","data":[..]}`
    Buffer(Vec<u8>),
    /// `{"0":b0,"1":b1,..}`，键从 0 连续编号。
    IndexedMap(Vec<u8>),
    Unrecognized(Value),
}

impl SignatureBlob {
    /// 归一化为规范二进制；无法解码或为空时返回 `None`。
    pub fn to_canonical(&self) -> Option<Vec<u8>> {
        let bytes = match self {
            Self::Base64(encoded) => BASE64_STANDARD.decode(encoded.trim()).ok()?,
            Self::Bytes(bytes) | Self::Buffer(bytes) | Self::IndexedMap(bytes) => bytes.clone(),
            Self::Unrecognized(_) => return None,
        };
        (!bytes.is_empty()).then_some(bytes)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Base64(_) => "base64",
            Self::Bytes(_) => "bytes",
            Self::Buffer(_) => "buffer",
            Self::IndexedMap(_) => "indexed_map",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SigningMode {
    RequiresUserSignature,
    PreSigned(SignatureBlob),
}

impl SigningMode {
    /// `false`、null 或缺失表示需要终端用户签名。
    pub fn classify(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Self::RequiresUserSignature,
            Some(value) => Self::PreSigned(classify_blob(value)),
        }
    }

    pub fn requires_user_signature(&self) -> bool {
        matches!(self, Self::RequiresUserSignature)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawBundleEntry {
    pub index: usize,
    /// base64 编码的未签名交易，缺失时为空串。
    pub encoded_transaction: String,
    pub signing: SigningMode,
}

impl RawBundleEntry {
    pub fn from_value(index: usize, value: &Value) -> Self {
        let encoded_transaction = value
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self {
            index,
            encoded_transaction,
            signing: SigningMode::classify(value.get("logicSigBlob")),
        }
    }
}

fn classify_blob(value: &Value) -> SignatureBlob {
    match value {
        Value::String(encoded) => SignatureBlob::Base64(encoded.clone()),
        Value::Array(items) => byte_array(items)
            .map(SignatureBlob::Bytes)
            .unwrap_or_else(|| SignatureBlob::Unrecognized(value.clone())),
        Value::Object(map) => classify_object(map).unwrap_or_else(|| SignatureBlob::Unrecognized(value.clone())),
        _ => SignatureBlob::Unrecognized(value.clone()),
    }
}

fn classify_object(map: &Map<String, Value>) -> Option<SignatureBlob> {
    if map.get("type").and_then(Value::as_str) == Some("Buffer") {
        let items = map.get("data")?.as_array()?;
        return byte_array(items).map(SignatureBlob::Buffer);
    }
    if map.is_empty() {
        return None;
    }
    let mut indexed = BTreeMap::new();
    for (key, value) in map {
        let position: usize = key.parse().ok()?;
        indexed.insert(position, byte(value)?);
    }
    // 键必须恰好覆盖 0..len。
    let contiguous = indexed
        .keys()
        .enumerate()
        .all(|(expected, position)| expected == *position);
    contiguous.then(|| SignatureBlob::IndexedMap(indexed.into_values().collect()))
}

fn byte_array(items: &[Value]) -> Option<Vec<u8>> {
    items.iter().map(byte).collect()
}

fn byte(value: &Value) -> Option<u8> {
    value.as_u64().and_then(|n| u8::try_from(n).ok())
}
