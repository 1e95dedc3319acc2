use std::error::Error as StdError;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to call algod: {0}")]
    Http(#[from] reqwest::Error),
    #[error("algod request to {endpoint} failed with status {status}: {body}")]
    ApiStatus {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("unexpected algod response schema: {0}")]
    Schema(String),
    #[error("invalid algod endpoint: {0}")]
    Endpoint(String),
    #[error("transaction {tx_id} not confirmed after {rounds} rounds")]
    NotConfirmed { tx_id: String, rounds: u64 },
    #[error("transaction {tx_id} rejected by node: {reason}")]
    Rejected { tx_id: String, reason: String },
}

impl LedgerError {
    pub fn describe(&self) -> String {
        let mut parts = vec![self.to_string()];
        let mut current = StdError::source(self);
        while let Some(source) = current {
            let text = source.to_string();
            if parts.last().map(|last| last != &text).unwrap_or(true) {
                parts.push(text);
            }
            current = source.source();
        }
        parts.join(" | caused by: ")
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiStatus { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}
