//! 兑换流水线：报价 → 交易包解码 → opt-in → 组装签名 → 提交确认。

mod decoder;
mod error;
mod fee;
mod group;
mod opt_in;
mod pipeline;
mod quote;
mod submission;
mod types;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

pub use decoder::{BundleDecoder, RouteLeg};
pub use error::{BroadcastState, SwapError};
pub use fee::{FeeMode, FeePolicy};
pub use group::{AtomicGroup, GroupAssembler, GroupMember, SignedGroup};
pub use opt_in::{OptInManager, OptInStatus};
pub use pipeline::{PipelineSettings, SwapPipeline};
pub use quote::{QuoteFetcher, QuoteSettings};
pub use submission::Submitter;
pub use types::{
    Quote, QuoteOutcome, SimulatedSwap, SwapOutcome, SwapRequest, parse_base_units,
    to_display_amount,
};
