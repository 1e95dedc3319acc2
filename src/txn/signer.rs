use std::fmt;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bip39::Language;
use ed25519_dalek::{Signer as _, SigningKey};
use thiserror::Error;
use zeroize::Zeroizing;

use super::address::Address;
use super::codec::{CodecError, DecodedTransaction, encode_signed_transaction, sha512_256};

const MNEMONIC_WORDS: usize = 25;
const BITS_PER_WORD: u32 = 11;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("签名凭证不合法: {0}")]
    InvalidCredential(String),
    #[error("助记词校验失败: {0}")]
    Mnemonic(String),
    #[error("交易编码失败: {0}")]
    Codec(#[from] CodecError),
    #[error("外部签名失败: {0}")]
    Delegated(String),
}

/// 终端用户签名能力：本地私钥或委托给外部钱包。
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    /// 返回可直接提交的签名交易字节。
    async fn sign(&self, txn: &DecodedTransaction) -> Result<Vec<u8>, SignerError>;
}

pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let seed = Zeroizing::new(seed);
        let key = SigningKey::from_bytes(&seed);
        let address = Address::new(key.verifying_key().to_bytes());
        Self { key, address }
    }

    /// 接受 25 词助记词，或 base64 编码的 32 字节种子 / 64 字节私钥。
    pub fn from_credential(raw: &str) -> Result<Self, SignerError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SignerError::InvalidCredential("签名凭证为空".into()));
        }
        if trimmed.split_whitespace().count() > 1 {
            return Self::from_mnemonic(trimmed);
        }

        let bytes = Zeroizing::new(
            BASE64_STANDARD
                .decode(trimmed)
                .map_err(|err| SignerError::InvalidCredential(format!("base64 解码失败: {err}")))?,
        );
        match bytes.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes);
                Ok(Self::from_seed(seed))
            }
            64 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes[..32]);
                let signer = Self::from_seed(seed);
                if signer.address.as_bytes()[..] != bytes[32..] {
                    return Err(SignerError::InvalidCredential(
                        "私钥后 32 字节与种子推导的公钥不一致".into(),
                    ));
                }
                Ok(signer)
            }
            other => Err(SignerError::InvalidCredential(format!(
                "期望 32 或 64 字节，实际 {other}"
            ))),
        }
    }

    pub fn from_mnemonic(phrase: &str) -> Result<Self, SignerError> {
        let seed = mnemonic_to_seed(phrase)?;
        Ok(Self::from_seed(*seed))
    }

    pub fn sign_bytes(&self, txn: &DecodedTransaction) -> Result<Vec<u8>, SignerError> {
        let message = txn.bytes_to_sign()?;
        let signature = self.key.sign(&message).to_bytes();
        Ok(encode_signed_transaction(txn, &signature)?)
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TransactionSigner for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign(&self, txn: &DecodedTransaction) -> Result<Vec<u8>, SignerError> {
        self.sign_bytes(txn)
    }
}

fn mnemonic_to_seed(phrase: &str) -> Result<Zeroizing<[u8; 32]>, SignerError> {
    let words: Vec<String> = phrase
        .split_whitespace()
        .map(|word| word.to_ascii_lowercase())
        .collect();
    if words.len() != MNEMONIC_WORDS {
        return Err(SignerError::Mnemonic(format!(
            "需要 {MNEMONIC_WORDS} 个单词，实际 {}",
            words.len()
        )));
    }

    let mut indices = Vec::with_capacity(MNEMONIC_WORDS);
    for word in &words {
        let index = Language::English
            .find_word(word)
            .ok_or_else(|| SignerError::Mnemonic(format!("未知单词: {word}")))?;
        indices.push(index);
    }

    let Some((checksum_word, key_words)) = indices.split_last() else {
        return Err(SignerError::Mnemonic("助记词为空".into()));
    };
    let bytes = Zeroizing::new(pack_11bit_words(key_words));
    // 24 个单词共 264 位，末字节只能是填充的 0。
    if bytes.len() != 33 || bytes[32] != 0 {
        return Err(SignerError::Mnemonic("助记词长度或填充位非法".into()));
    }
    let mut seed = Zeroizing::new([0u8; 32]);
    seed.copy_from_slice(&bytes[..32]);

    if checksum_index(&seed) != *checksum_word {
        return Err(SignerError::Mnemonic("校验词不匹配".into()));
    }
    Ok(seed)
}

fn pack_11bit_words(words: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 11 / 8 + 1);
    let mut acc: u32 = 0;
    let mut acc_bits: u32 = 0;
    for &word in words {
        acc |= u32::from(word) << acc_bits;
        acc_bits += BITS_PER_WORD;
        while acc_bits >= 8 {
            out.push((acc & 0xff) as u8);
            acc >>= 8;
            acc_bits -= 8;
        }
    }
    if acc_bits > 0 {
        out.push(acc as u8);
    }
    out
}

fn checksum_index(seed: &[u8; 32]) -> u16 {
    let digest = sha512_256(seed);
    ((u16::from(digest[1]) << 8) | u16::from(digest[0])) & 0x7ff
}

#[cfg(test)]
pub(crate) fn seed_to_mnemonic(seed: &[u8; 32]) -> String {
    let mut words = Vec::with_capacity(MNEMONIC_WORDS);
    let mut acc: u32 = 0;
    let mut acc_bits: u32 = 0;
    for &byte in seed {
        acc |= u32::from(byte) << acc_bits;
        acc_bits += 8;
        if acc_bits >= BITS_PER_WORD {
            words.push((acc & 0x7ff) as u16);
            acc >>= BITS_PER_WORD;
            acc_bits -= BITS_PER_WORD;
        }
    }
    if acc_bits > 0 {
        words.push(acc as u16);
    }
    words.push(checksum_index(seed));
    let list = Language::English.word_list();
    words
        .iter()
        .map(|&index| list[usize::from(index)])
        .collect::<Vec<_>>()
        .join(" ")
}
