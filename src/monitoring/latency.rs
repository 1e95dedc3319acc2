use std::borrow::Cow;
use std::future::Future;

use tracing::Level;

use super::types::{LatencyGuard, LatencyMetadata};

pub fn guard_with_level(
    operation: impl Into<Cow<'static, str>>,
    level: Level,
    metadata: LatencyMetadata,
) -> LatencyGuard {
    LatencyGuard::new(operation, level, metadata)
}

/// 以 INFO 级别记录一个流水线阶段的耗时。
pub async fn measure_stage<Fut, T, E>(stage: &'static str, fut: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    let guard = LatencyGuard::new(
        format!("swap.{stage}"),
        Level::INFO,
        LatencyMetadata::default().with("stage", stage),
    );
    let res = fut.await;
    guard.finish();
    res
}
