//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `generate`: 随机扰动生成结构模型
//! - `run`: 批量 DFT 计算
//! - `atomize`: 批量计算 + 参考结构计算 + 原子化能
//! - `analyze`: 模型相对稳定结构的欧氏度量
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: generate, calc, analyze

pub mod analyze;
pub mod calc;
pub mod generate;

use clap::{ArgAction, Parser, Subcommand};

/// dftbatch - 高通量 DFT 批量计算与随机模型生成
#[derive(Parser)]
#[command(name = "dftbatch")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(
    about = "High-throughput DFT batch calculations and randomized crystal model generation",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v: per-structure outcomes, -vv: external commands)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress log output
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Generate randomly perturbed models from a structure
    Generate(generate::GenerateArgs),

    /// Run DFT calculations over a batch of structures
    Run(calc::RunArgs),

    /// Run a batch plus its elemental references and derive atomization energies
    Atomize(calc::AtomizeArgs),

    /// Measure how far generated models deviate from a stable structure
    Analyze(analyze::AnalyzeArgs),
}
