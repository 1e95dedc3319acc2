use rust_decimal::Decimal;

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_slow_request_warn_ms() -> u64 {
    1_500
}

pub(crate) fn default_timezone_offset_hours() -> i8 {
    0
}

pub(crate) fn default_request_timeout_ms() -> u64 {
    10_000
}

pub(crate) fn default_aggregator_base_url() -> String {
    "https://deflex.txnlab.dev/api".to_string()
}

pub(crate) fn default_chain() -> String {
    "mainnet".to_string()
}

pub(crate) fn default_max_group_size() -> u32 {
    13
}

pub(crate) fn default_slippage_percent() -> Decimal {
    Decimal::ONE
}

pub(crate) fn default_swap_validity_rounds() -> u64 {
    500
}

pub(crate) fn default_algod_server() -> String {
    "https://mainnet-api.algonode.cloud".to_string()
}

pub(crate) fn default_validity_rounds() -> u64 {
    1_000
}

pub(crate) fn default_block_wait_timeout_secs() -> u64 {
    30
}

pub(crate) fn default_fee_percentage() -> Decimal {
    Decimal::ONE
}

pub(crate) fn default_fee_note_prefix() -> String {
    "swap fee".to_string()
}

pub(crate) fn default_confirmation_rounds() -> u64 {
    4
}

pub(crate) fn default_prometheus_listen() -> String {
    "0.0.0.0:9898".to_string()
}
