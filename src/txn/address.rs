use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;
use serde::de::{Error as DeError, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512_256};

use super::codec::CodecError;

const CHECKSUM_LEN: usize = 4;
const ENCODED_LEN: usize = 58;

/// 32 字节 ed25519 公钥对应的账户地址，文本形式为 base32(pubkey ‖ checksum)。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 32]);

impl Address {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CodecError::Address(format!("期望 32 字节公钥，实际 {}", bytes.len())))?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn checksum(&self) -> [u8; CHECKSUM_LEN] {
        let digest = Sha512_256::digest(self.0);
        let mut checksum = [0u8; CHECKSUM_LEN];
        checksum.copy_from_slice(&digest[digest.len() - CHECKSUM_LEN..]);
        checksum
    }
}

impl FromStr for Address {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != ENCODED_LEN {
            return Err(CodecError::Address(format!(
                "地址长度应为 {ENCODED_LEN}，实际 {}",
                trimmed.len()
            )));
        }
        let decoded = BASE32_NOPAD
            .decode(trimmed.as_bytes())
            .map_err(|err| CodecError::Address(format!("base32 解码失败: {err}")))?;
        let (key, checksum) = decoded.split_at(32);
        let address = Self::from_slice(key)?;
        if address.checksum() != checksum {
            return Err(CodecError::Address(format!("地址校验和不匹配: {trimmed}")));
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut raw = Vec::with_capacity(32 + CHECKSUM_LEN);
        raw.extend_from_slice(&self.0);
        raw.extend_from_slice(&self.checksum());
        f.write_str(&BASE32_NOPAD.encode(&raw))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(AddressVisitor)
    }
}

struct AddressVisitor;

impl Visitor<'_> for AddressVisitor {
    type Value = Address;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a 58-character base32 account address")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        Address::from_str(value).map_err(E::custom)
    }
}
