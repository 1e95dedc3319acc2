use anyhow::{Result, anyhow};
use serde_json::json;
use tracing::{info, warn};

use crate::cli::args::{Command, OptInCmd, QuoteCmd, SwapCmd};
use crate::cli::context::{
    build_opt_in_manager, build_pipeline, build_quote_fetcher, build_signer, init_configs,
};
use crate::config::SwapConfig;
use crate::engine::{BroadcastState, QuoteOutcome, SwapRequest, parse_base_units};
use crate::txn::TransactionSigner;

pub async fn run(command: Command, config: SwapConfig) -> Result<()> {
    if config.bot.prometheus.enable {
        let addr = crate::monitoring::try_init_prometheus(&config.bot.prometheus.listen)?;
        info!(target: "monitoring", listen = %addr, "Prometheus 导出器已启动");
    }

    match command {
        Command::Quote(args) => handle_quote(args, &config).await,
        Command::Swap(args) => handle_swap(args, &config).await,
        Command::OptIn(args) => handle_opt_in(args, &config).await,
        Command::Address => {
            let signer = build_signer(&config)?;
            println!("{}", signer.address());
            Ok(())
        }
        Command::Init(args) => init_configs(args),
    }
}

async fn handle_quote(args: QuoteCmd, config: &SwapConfig) -> Result<()> {
    let fetcher = build_quote_fetcher(config)?;
    let outcome = fetcher
        .fetch_quote_text(args.from, args.to, &args.amount)
        .await?;
    let output = match &outcome {
        QuoteOutcome::NoQuote => json!({ "buyAmount": "0", "quote": null }),
        QuoteOutcome::Quoted(quote) => json!({
            "buyAmount": quote.display_amount.to_string(),
            "quote": quote.quoted_amount,
            "decimals": quote.decimals,
            "userPriceImpact": quote.price_impact_percent.map(|value| value.to_string()),
            "usdIn": quote.usd_in.map(|value| value.to_string()),
            "usdOut": quote.usd_out.map(|value| value.to_string()),
        }),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn handle_swap(args: SwapCmd, config: &SwapConfig) -> Result<()> {
    let amount = parse_base_units(&args.amount)?
        .ok_or_else(|| anyhow!("兑换数量必须大于 0: {:?}", args.amount))?;
    let (pipeline, signer) = build_pipeline(config)?;
    let request = SwapRequest {
        from_asset_id: args.from,
        to_asset_id: args.to,
        amount,
        slippage_percent: args
            .slippage
            .unwrap_or(config.aggregator.default_slippage_percent),
        sender: signer.address(),
    };

    if args.dry_run || config.bot.dry_run {
        let simulated = pipeline.simulate(&request).await?;
        let output = json!({
            "dryRun": true,
            "quote": simulated.quoted_amount,
            "groupId": simulated.group_id.to_base64(),
            "txIds": simulated.transaction_ids,
            "optInRequired": simulated.opt_in_required,
            "standaloneFee": simulated.standalone_fee,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match pipeline.execute(&request).await {
        Ok(outcome) => {
            let output = json!({
                "txId": outcome.transaction_id,
                "confirmedRound": outcome.confirmed_round,
                "quote": outcome.quoted_amount,
                "groupSize": outcome.group_size,
                "groupId": outcome.group_id.to_base64(),
                "optInTxId": outcome.opt_in_tx_id,
                "feeTxId": outcome.fee_tx_id,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => {
            let state = err.broadcast_state();
            if state == BroadcastState::BroadcastUnconfirmed {
                warn!(
                    target: "engine::pipeline",
                    "交易组可能已广播，请在链上查询确认状态后再决定是否重试"
                );
            }
            Err(anyhow!(err).context(format!("兑换失败（{state:?}）")))
        }
    }
}

async fn handle_opt_in(args: OptInCmd, config: &SwapConfig) -> Result<()> {
    let (manager, signer) = build_opt_in_manager(config)?;
    let status = manager
        .ensure_opted_in_detailed(args.asset)
        .await?;
    let output = json!({
        "address": signer.address().to_string(),
        "asset": args.asset,
        "status": status.label(),
        "txId": status.submitted_tx_id(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
