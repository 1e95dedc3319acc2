use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::Level;

/// 附加在耗时日志上的键值对。
#[derive(Debug, Clone, Default)]
pub struct LatencyMetadata {
    fields: BTreeMap<String, String>,
}

impl LatencyMetadata {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    fn summary(&self) -> Option<String> {
        if self.fields.is_empty() {
            return None;
        }
        Some(
            self.fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(" "),
        )
    }
}

/// 作用域耗时记录。显式 `finish` 或析构时输出一次日志。
#[derive(Debug)]
pub struct LatencyGuard {
    operation: Cow<'static, str>,
    start: Instant,
    level: Level,
    metadata: LatencyMetadata,
    finished: bool,
}

impl LatencyGuard {
    pub fn new(
        operation: impl Into<Cow<'static, str>>,
        level: Level,
        metadata: LatencyMetadata,
    ) -> Self {
        Self {
            operation: operation.into(),
            start: Instant::now(),
            level,
            metadata,
            finished: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(mut self) -> Duration {
        self.emit()
    }

    fn emit(&mut self) -> Duration {
        let elapsed = self.start.elapsed();
        if !self.finished {
            self.finished = true;
            log_latency(self.level, &self.operation, elapsed, &self.metadata);
        }
        elapsed
    }
}

impl Drop for LatencyGuard {
    fn drop(&mut self) {
        self.emit();
    }
}

fn log_latency(level: Level, operation: &str, elapsed: Duration, metadata: &LatencyMetadata) {
    let elapsed_us = elapsed.as_micros();
    let elapsed_ms = format!("{:.3}", elapsed.as_secs_f64() * 1_000.0);
    let metadata = metadata.summary().unwrap_or_default();

    macro_rules! log_event {
        ($macro:ident) => {
            tracing::$macro!(
                target: "latency",
                %operation,
                elapsed_us,
                elapsed_ms = %elapsed_ms,
                metadata = %metadata,
                "耗时统计"
            )
        };
    }

    match level {
        Level::ERROR => log_event!(error),
        Level::WARN => log_event!(warn),
        Level::INFO => log_event!(info),
        Level::DEBUG => log_event!(debug),
        Level::TRACE => log_event!(trace),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_summary_is_sorted() {
        let metadata = LatencyMetadata::default()
            .with("stage", "submit")
            .with("attempt", 1);
        assert_eq!(metadata.summary().as_deref(), Some("attempt=1 stage=submit"));
        assert_eq!(LatencyMetadata::default().summary(), None);
    }

    #[test]
    fn finish_reports_elapsed_once() {
        let guard = LatencyGuard::new("test.op", Level::TRACE, LatencyMetadata::default());
        let elapsed = guard.finish();
        assert!(elapsed >= Duration::ZERO);
    }
}
