//! # analyze 子命令 CLI 定义
//!
//! 比较生成的模型与稳定结构之间的偏离程度。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/analyze.rs`

use clap::Args;
use std::path::PathBuf;

/// analyze 子命令参数
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Generated model file or directory of model files
    pub input: PathBuf,

    /// Stable (reference) structure the models are compared against
    #[arg(short, long)]
    pub stable: PathBuf,

    /// Glob pattern for model files (directory input)
    #[arg(short, long, default_value = "POSCAR*")]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Also write the metrics to this CSV file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
