//! # run 命令实现
//!
//! 收集结构文件 -> 批量计算 -> 写出 CSV 并打印摘要表格。
//!
//! ## 依赖关系
//! - 使用 `cli/calc.rs` 定义的参数
//! - 使用 `config.rs`, `batch/collector.rs`, `calc/`, `report.rs`
//! - 使用 `utils/output.rs`
//! - `CalcContext` 也被 `commands/atomize.rs` 使用

use crate::batch::FileCollector;
use crate::calc::{Backend, BatchOrchestrator, CalculationBackend, CalculatorPolicy};
use crate::cli::calc::{CalcOptions, RunArgs};
use crate::config::{AppConfig, ConfigOverrides};
use crate::error::{DftBatchError, Result};
use crate::models::results::DEFAULT_COLUMNS;
use crate::models::{Relaxation, ResultsTable, Structure};
use crate::report;
use crate::utils::output;

use log::debug;
use std::fs;
use std::path::PathBuf;

/// 一次计算命令共用的后端、策略与运行参数
pub struct CalcContext {
    backend: Backend,
    policy: CalculatorPolicy,
    relaxation: Relaxation,
    input_path: Option<PathBuf>,
    jobs: usize,
    show_progress: bool,
}

impl CalcContext {
    /// 读取配置文件、合并命令行参数并探测后端
    pub fn from_options(calc: &CalcOptions) -> Result<Self> {
        let config = AppConfig::load(calc.config.as_deref())?.merge(ConfigOverrides {
            max_iterations: calc.max_iterations,
            xc: calc.xc.clone(),
            python: calc.python.clone(),
            vasp_command: calc.vasp_command.clone(),
            mpi_command: calc.mpi_command.clone(),
            work_dir: calc.work_dir.clone(),
        })?;
        debug!("Effective configuration: {:?}", config);

        if let Some(dir) = &calc.txt_dir {
            fs::create_dir_all(dir).map_err(|e| DftBatchError::FileWriteError {
                path: dir.display().to_string(),
                source: e,
            })?;
        }

        let kind = calc.backend;
        let backend = Backend::new(kind, &config.backend);
        match backend.availability() {
            Ok(()) => output::print_info(&format!("Backend: {}", kind)),
            Err(reason) => output::print_warning(&format!(
                "Backend {} is unavailable: {}",
                kind, reason
            )),
        }

        Ok(CalcContext {
            backend,
            policy: CalculatorPolicy::new(config.calculator)
                .with_output_dir(calc.txt_dir.clone()),
            relaxation: Relaxation::from_steps(calc.relax_steps),
            input_path: calc.potcar_dir.clone(),
            jobs: calc.jobs,
            show_progress: !calc.no_progress,
        })
    }

    /// 计算一批结构
    pub fn run_batch(&self, structures: &[(String, Structure)]) -> Result<ResultsTable> {
        BatchOrchestrator::new(&self.backend, self.policy.clone())
            .with_jobs(self.jobs)
            .with_progress(self.show_progress)
            .run(structures, self.relaxation, self.input_path.as_deref())
    }
}

/// 执行 run 命令
pub fn execute(args: RunArgs) -> Result<()> {
    output::print_header("Running DFT Batch");

    let context = CalcContext::from_options(&args.calc)?;

    let structures = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive)
        .load_structures()?;

    if structures.is_empty() {
        output::print_warning(&format!(
            "No files matched '{}' under {}",
            args.pattern,
            args.input.display()
        ));
        return Ok(());
    }

    output::print_info(&format!(
        "Calculating {} structures ({})",
        structures.len(),
        relaxation_label(context.relaxation)
    ));

    let results = context.run_batch(&structures)?;

    println!("{}", report::summary_table(&results));
    report::write_csv(&results, &DEFAULT_COLUMNS, &args.output)?;
    output::print_success(&format!("Results saved to '{}'", args.output.display()));
    output::print_done(&format!(
        "{}/{} structures succeeded",
        results.success_count(),
        results.len()
    ));
    Ok(())
}

fn relaxation_label(relaxation: Relaxation) -> String {
    match relaxation {
        Relaxation::NoRelaxation => "single point".to_string(),
        Relaxation::Relax(steps) => format!("relaxation, {} steps", steps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relaxation_label() {
        assert_eq!(relaxation_label(Relaxation::from_steps(1)), "single point");
        assert_eq!(
            relaxation_label(Relaxation::from_steps(50)),
            "relaxation, 50 steps"
        );
    }
}
