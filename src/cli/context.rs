use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use time::{UtcOffset, macros::format_description};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, fmt};

use crate::api::DeflexApiClient;
use crate::config::{ConfigError, LoggingConfig, SwapConfig, load_config};
use crate::engine::{
    OptInManager, PipelineSettings, QuoteFetcher, QuoteSettings, Submitter, SwapPipeline,
};
use crate::ledger::AlgodClient;
use crate::txn::LocalSigner;

/// 初始化 tracing，兼顾 JSON 与文本输出模式。
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let mut filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    const QUIET_TARGETS: &[(&str, &str)] = &[
        ("hyper", "warn"),
        ("hyper_util::client::legacy", "warn"),
        ("reqwest", "info"),
    ];
    for (module, level) in QUIET_TARGETS {
        if !config.level.contains(module) {
            if let Ok(directive) = format!("{module}={level}").parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    let time_format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");
    let offset = UtcOffset::from_hms(config.timezone_offset_hours, 0, 0).map_err(|err| {
        anyhow!(
            "invalid logging timezone offset {}: {err}",
            config.timezone_offset_hours
        )
    })?;
    let offset_timer = OffsetTime::new(offset, time_format);

    let base = fmt()
        .with_timer(offset_timer)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(true)
        .with_level(true);

    if config.json {
        base.json()
            .with_current_span(false)
            .with_span_list(false)
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    } else {
        base.with_env_filter(filter)
            .event_format(fmt::format().compact())
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    }
    Ok(())
}

/// 加载主配置；用于 `algoswap --config` 的入口。
pub fn load_configuration(path: Option<PathBuf>) -> Result<SwapConfig, ConfigError> {
    load_config(path)
}

pub fn request_timeout(config: &SwapConfig) -> Duration {
    Duration::from_millis(config.global.request_timeout_ms.max(1))
}

pub fn build_http_client(config: &SwapConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(request_timeout(config))
        .user_agent(concat!("algoswap/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("构建 HTTP 客户端失败")
}

/// 聚合器与账本客户端共享同一个 HTTP 连接池。
pub struct Clients {
    pub aggregator: Arc<DeflexApiClient>,
    pub ledger: Arc<AlgodClient>,
}

pub fn build_clients(config: &SwapConfig) -> Result<Clients> {
    let http = build_http_client(config)?;
    let timeout = request_timeout(config);
    let aggregator = DeflexApiClient::new(
        http.clone(),
        config.aggregator.base_url.clone(),
        timeout,
        &config.global.logging,
    );
    let ledger = AlgodClient::new(http, &config.algod, timeout, &config.global.logging)
        .map_err(|err| anyhow!(err.describe()))?;
    Ok(Clients {
        aggregator: Arc::new(aggregator),
        ledger: Arc::new(ledger),
    })
}

pub fn build_signer(config: &SwapConfig) -> Result<Arc<LocalSigner>> {
    let secret = config
        .wallet
        .secret()
        .ok_or_else(|| anyhow!(ConfigError::Missing("wallet.secret")))?;
    let signer = LocalSigner::from_credential(secret).map_err(|err| anyhow!("加载签名凭证失败: {err}"))?;
    Ok(Arc::new(signer))
}

pub fn build_quote_fetcher(config: &SwapConfig) -> Result<QuoteFetcher> {
    config.validate_for_quote()?;
    let clients = build_clients(config)?;
    Ok(QuoteFetcher::new(
        clients.aggregator,
        clients.ledger,
        QuoteSettings::from_config(config),
    ))
}

pub fn build_pipeline(config: &SwapConfig) -> Result<(SwapPipeline, Arc<LocalSigner>)> {
    config.validate()?;
    let clients = build_clients(config)?;
    let signer = build_signer(config)?;
    let settings = PipelineSettings::from_config(config).map_err(|err| anyhow!(err))?;
    let pipeline = SwapPipeline::new(clients.aggregator, clients.ledger, signer.clone(), settings);
    Ok((pipeline, signer))
}

/// opt-in 只依赖 algod 与签名凭证。
pub fn build_opt_in_manager(config: &SwapConfig) -> Result<(OptInManager, Arc<LocalSigner>)> {
    config.validate_wallet()?;
    if config.algod.server.trim().is_empty() {
        return Err(anyhow!(ConfigError::Missing("algod.server")));
    }
    let clients = build_clients(config)?;
    let signer = build_signer(config)?;
    let submitter = Submitter::new(clients.ledger.clone(), config.bot.confirmation_rounds.max(1));
    let manager = OptInManager::new(clients.ledger, signer.clone(), submitter);
    Ok((manager, signer))
}

pub fn init_configs(args: crate::cli::args::InitCmd) -> Result<()> {
    let output_dir = match args.output {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    fs::create_dir_all(&output_dir)?;

    let templates: [(&str, &str); 1] = [(
        "algoswap.toml",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/algoswap.toml")),
    )];

    for (filename, contents) in templates {
        let target_path = output_dir.join(filename);
        if target_path.exists() && !args.force {
            println!(
                "跳过 {}（文件已存在，如需覆盖请加 --force）",
                target_path.display()
            );
            continue;
        }

        fs::write(&target_path, contents)?;
        println!("已写入 {}", target_path.display());
    }

    Ok(())
}
