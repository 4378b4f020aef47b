//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `batch/`, `calc/`, `model_gen/`, `parsers/`, `utils/`
//! - 子模块: generate, run, atomize, analyze

pub mod analyze;
pub mod atomize;
pub mod generate;
pub mod run;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Generate(args) => generate::execute(args),
        Commands::Run(args) => run::execute(args),
        Commands::Atomize(args) => atomize::execute(args),
        Commands::Analyze(args) => analyze::execute(args),
    }
}
