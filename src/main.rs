//! # dftbatch - 高通量 DFT 批量计算与随机模型生成
//!
//! 把一批晶体结构交给外部 DFT 程序计算，整理为结果表，
//! 并能从一个结构出发随机扰动生成大量模型。
//!
//! ## 子命令
//! - `generate` - 随机扰动生成结构模型
//! - `run`      - 批量 DFT 计算 (GPAW / VASP)
//! - `atomize`  - 批量计算 + 元素参考结构 + 原子化能
//! - `analyze`  - 模型相对稳定结构的欧氏度量
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── batch/      (输入文件收集)
//!   │     ├── calc/       (计算配置、后端、批量调度、原子化能)
//!   │     ├── model_gen/  (扰动、超胞、约束、分析)
//!   │     ├── parsers/    (格式解析器)
//!   │     ├── models/     (数据模型)
//!   │     ├── config.rs   (TOML 配置)
//!   │     └── report.rs   (CSV 与摘要表格)
//!   ├── utils/      (输出、进度条、日志)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod calc;
mod cli;
mod commands;
mod config;
mod error;
mod model_gen;
mod models;
mod parsers;
mod report;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    utils::logging::setup_logging(cli.verbose, cli.quiet);

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
