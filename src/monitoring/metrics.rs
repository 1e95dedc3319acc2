use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

static EXPORTER: OnceCell<SocketAddr> = OnceCell::new();
static PROMETHEUS_ENABLED: AtomicBool = AtomicBool::new(false);

/// 安装 Prometheus HTTP 导出器，重复调用返回首次绑定的地址。
pub fn try_init_prometheus(listen: &str) -> Result<SocketAddr> {
    EXPORTER
        .get_or_try_init(|| {
            let addr: SocketAddr = listen
                .parse()
                .with_context(|| format!("invalid prometheus listen address: {listen}"))?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .context("failed to install prometheus exporter")?;
            PROMETHEUS_ENABLED.store(true, Ordering::Relaxed);
            Ok(addr)
        })
        .copied()
}

pub fn prometheus_enabled() -> bool {
    PROMETHEUS_ENABLED.load(Ordering::Relaxed)
}

/// 记录一次兑换尝试的结局。
pub fn record_swap_outcome(outcome: &str) {
    if prometheus_enabled() {
        counter!("algoswap_swap_total", "outcome" => outcome.to_string()).increment(1);
    }
}
