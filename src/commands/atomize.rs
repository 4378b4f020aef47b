//! # atomize 命令实现
//!
//! 1. 计算结构批次（或从 `--results` 读入已有结果）
//! 2. 对批次中出现的每种元素，读取 `{reference_dir}/{元素}/POSCAR` 并计算参考能量
//! 3. 用参考能量为每条记录计算原子化能，写出 CSV
//!
//! ## 依赖关系
//! - 使用 `cli/calc.rs` 定义的参数
//! - 使用 `commands/run.rs` 的 `CalcContext`
//! - 使用 `calc/atomization.rs`, `report.rs`
//! - 使用 `utils/output.rs`

use super::run::CalcContext;
use crate::batch::FileCollector;
use crate::calc::atomization::{self, ReferenceEnergyTable};
use crate::cli::calc::AtomizeArgs;
use crate::error::{DftBatchError, Result};
use crate::models::results::DEFAULT_COLUMNS;
use crate::report;
use crate::utils::output;

/// 执行 atomize 命令
pub fn execute(args: AtomizeArgs) -> Result<()> {
    output::print_header("Atomization Energies");

    let context = CalcContext::from_options(&args.calc)?;

    let mut results = match (&args.results, &args.input) {
        (Some(csv), _) => {
            let table = report::read_csv(csv)?;
            output::print_info(&format!(
                "Loaded {} results from '{}'",
                table.len(),
                csv.display()
            ));
            table
        }
        (None, Some(input)) => {
            let structures = FileCollector::new(input.clone())
                .with_pattern(&args.pattern)?
                .recursive(args.recursive)
                .load_structures()?;
            if structures.is_empty() {
                output::print_warning(&format!(
                    "No files matched '{}' under {}",
                    args.pattern,
                    input.display()
                ));
                return Ok(());
            }
            output::print_info(&format!("Calculating {} structures", structures.len()));
            context.run_batch(&structures)?
        }
        (None, None) => {
            return Err(DftBatchError::InvalidArgument(
                "either an input path or --results is required".to_string(),
            ))
        }
    };

    let species = atomization::species_in(&results);
    if species.is_empty() {
        output::print_warning("No successful structure with a formula; nothing to atomize");
        return Ok(());
    }

    output::print_info(&format!("Reference species: {}", species.join(", ")));
    let reference_structures = atomization::reference_structures(&args.reference_dir, &species)?;
    let reference_results = context.run_batch(&reference_structures)?;

    if let Some(path) = &args.reference_output {
        report::write_csv(&reference_results, &DEFAULT_COLUMNS, path)?;
        output::print_success(&format!("Reference results saved to '{}'", path.display()));
    }

    let references = ReferenceEnergyTable::from_results(&reference_results);
    for s in &species {
        if references.get(s).is_none() {
            output::print_warning(&format!(
                "No reference energy for {}; structures containing it are skipped",
                s
            ));
        }
    }

    atomization::apply(&mut results, &references);

    println!("{}", report::summary_table(&results));
    report::write_csv(&results, &DEFAULT_COLUMNS, &args.output)?;
    output::print_success(&format!("Results saved to '{}'", args.output.display()));

    let atomized = results
        .iter()
        .filter(|(_, r)| matches!(r.atomization, Some(Ok(_))))
        .count();
    output::print_done(&format!(
        "{}/{} structures have an atomization energy",
        atomized,
        results.len()
    ));
    Ok(())
}
