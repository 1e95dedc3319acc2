use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

#[derive(Parser, Debug)]
#[command(name = "algoswap", version, about = "Algorand 聚合器兑换工具")]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 algoswap.toml 或 config/algoswap.toml）"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 请求聚合器报价
    Quote(QuoteCmd),
    /// 报价并执行一次兑换
    Swap(SwapCmd),
    /// 为签名账户 opt-in 指定资产
    #[command(name = "opt-in")]
    OptIn(OptInCmd),
    /// 打印签名账户地址
    Address,
    /// 初始化配置模版文件
    Init(InitCmd),
}

#[derive(Args, Debug)]
pub struct QuoteCmd {
    #[arg(long, help = "卖出资产 ID（0 为 ALGO）")]
    pub from: u64,
    #[arg(long, help = "买入资产 ID（0 为 ALGO）")]
    pub to: u64,
    #[arg(long, help = "卖出数量（基础单位）")]
    pub amount: String,
}

#[derive(Args, Debug)]
pub struct SwapCmd {
    #[arg(long, help = "卖出资产 ID（0 为 ALGO）")]
    pub from: u64,
    #[arg(long, help = "买入资产 ID（0 为 ALGO）")]
    pub to: u64,
    #[arg(long, help = "卖出数量（基础单位）")]
    pub amount: String,
    #[arg(long, help = "滑点百分比，默认取 aggregator.default_slippage_percent")]
    pub slippage: Option<Decimal>,
    #[arg(long, help = "只组装并签名，不提交")]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct OptInCmd {
    #[arg(long, help = "资产 ID")]
    pub asset: u64,
}

#[derive(Args, Debug)]
pub struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    pub output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    pub force: bool,
}
