//! # generate 命令实现
//!
//! 从一个结构出发生成多个随机扰动模型。
//!
//! ## 功能
//! - 可选先扩展超胞到最少原子数（同时导出 `POSCAR_<name>_modified`）
//! - 对称 / 非对称扰动
//! - 可选晶格参数约束：不满足时丢弃并重试，超过次数则跳过该模型
//! - 每个模型写出 `POSCAR_<name>_<i>`
//!
//! ## 依赖关系
//! - 使用 `cli/generate.rs` 定义的参数
//! - 使用 `model_gen/`, `parsers/`, `batch/collector.rs`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::batch::collector::structure_name;
use crate::cli::generate::{GenerateArgs, GenerateMode};
use crate::error::{DftBatchError, Result};
use crate::model_gen::{CellBounds, StructurePerturber, UnsymmetricOptions};
use crate::parsers::{self, StructureFormat};
use crate::utils::{output, progress};

use log::debug;
use std::path::PathBuf;

/// 生成结果统计
#[derive(Debug, Default)]
pub struct GenerateSummary {
    /// 写出的模型文件
    pub written: Vec<PathBuf>,
    /// 超过重试次数而跳过的模型序号
    pub skipped: Vec<usize>,
    /// 扩展后导出的超胞文件
    pub expanded: Option<PathBuf>,
}

/// 执行 generate 命令
pub fn execute(args: GenerateArgs) -> Result<()> {
    output::print_header(&format!("Generating {} models", args.mode));

    let summary = generate(&args)?;

    if let Some(path) = &summary.expanded {
        output::print_info(&format!("Supercell written to '{}'", path.display()));
    }
    for i in &summary.skipped {
        output::print_warning(&format!(
            "Model {} skipped: no candidate met the cell constraints in {} attempts",
            i, args.max_retries
        ));
    }
    output::print_done(&format!(
        "{} models written to '{}'",
        summary.written.len(),
        args.output.display()
    ));
    Ok(())
}

fn validate(args: &GenerateArgs) -> Result<()> {
    if args.cell_min > args.cell_max {
        return Err(DftBatchError::InvalidArgument(format!(
            "--cell-min ({}) is larger than --cell-max ({})",
            args.cell_min, args.cell_max
        )));
    }
    if args.atom_min > args.atom_max {
        return Err(DftBatchError::InvalidArgument(format!(
            "--atom-min ({}) is larger than --atom-max ({})",
            args.atom_min, args.atom_max
        )));
    }
    if !(0.0..=100.0).contains(&args.atom_probability) {
        return Err(DftBatchError::InvalidArgument(format!(
            "--atom-probability must be within 0-100, got {}",
            args.atom_probability
        )));
    }
    if args.max_retries == 0 {
        return Err(DftBatchError::InvalidArgument(
            "--max-retries must be at least 1".to_string(),
        ));
    }
    check_range("--length-range", args.length_range.as_deref())?;
    check_range("--angle-range", args.angle_range.as_deref())?;
    Ok(())
}

/// 区间必须恰好是 "min,max" 两个数，且 min < max
fn check_range(flag: &str, values: Option<&[f64]>) -> Result<()> {
    match values {
        None => Ok(()),
        Some([min, max]) if min < max => Ok(()),
        Some([min, max]) => Err(DftBatchError::InvalidArgument(format!(
            "{} lower bound ({}) must be below the upper bound ({})",
            flag, min, max
        ))),
        Some(other) => Err(DftBatchError::InvalidArgument(format!(
            "{} takes exactly two values \"min,max\", got {}",
            flag,
            other.len()
        ))),
    }
}

/// 由命令行参数构造约束；未指定任何区间时返回 None
fn cell_bounds(args: &GenerateArgs) -> Option<CellBounds> {
    let mut bounds = CellBounds::default();
    let mut constrained = false;
    if let Some([min, max]) = args.length_range.as_deref() {
        bounds = bounds.with_lengths(*min, *max);
        constrained = true;
    }
    if let Some([min, max]) = args.angle_range.as_deref() {
        bounds = bounds.with_angles(*min, *max);
        constrained = true;
    }
    constrained.then_some(bounds)
}

fn unsymmetric_options(args: &GenerateArgs) -> UnsymmetricOptions {
    UnsymmetricOptions {
        modify_cell: !args.no_cell,
        modify_shape: args.shape,
        modify_atom: args.atoms,
        swap_atom: args.swap,
        cell_min: args.cell_min,
        cell_max: args.cell_max,
        atom_probability: args.atom_probability,
        atom_min: args.atom_min,
        atom_max: args.atom_max,
        swap_count: args.swap_count,
        swap_restrict: !args.swap_any,
    }
}

/// 生成模型并写出文件
pub fn generate(args: &GenerateArgs) -> Result<GenerateSummary> {
    validate(args)?;

    let mut structure = match &args.format {
        Some(format) => parsers::read_structure(&args.input, StructureFormat::from_name(format)?)?,
        None => parsers::parse_structure_file(&args.input)?,
    };
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| structure_name(&args.input));
    structure.name = name.clone();

    let mut perturber = match args.seed {
        Some(seed) => StructurePerturber::with_seed(structure, seed),
        None => StructurePerturber::new(structure),
    };

    let mut summary = GenerateSummary::default();

    if let Some(floor) = args.min_sites {
        if perturber.ensure_minimum_site_count(floor) {
            summary.expanded = Some(parsers::export_poscar(
                perturber.original(),
                &args.output,
                &name,
                true,
                None,
            )?);
        }
    }

    let bounds = cell_bounds(args);
    let options = unsymmetric_options(args);

    let pb = progress::create_progress_bar(args.count as u64, "Generating");
    for i in 0..args.count {
        let mut accepted = false;
        for attempt in 1..=args.max_retries {
            perturber.reset();
            match args.mode {
                GenerateMode::Symmetric => {
                    perturber.modify_symmetric(args.cell_min, args.cell_max);
                }
                GenerateMode::Unsymmetric => {
                    perturber.modify_unsymmetrical(&options);
                }
            }

            match &bounds {
                Some(b) if !perturber.check_constraints(b) => {
                    debug!("Model {} attempt {} rejected by cell constraints", i, attempt);
                }
                _ => {
                    accepted = true;
                    break;
                }
            }
        }

        if accepted {
            let filename = format!("POSCAR_{}_{}", name, i);
            let path = parsers::export_poscar(
                perturber.working(),
                &args.output,
                &name,
                false,
                Some(&filename),
            )?;
            summary.written.push(path);
        } else {
            summary.skipped.push(i);
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::path::Path;

    const FE_POSCAR: &str = "Fe\n1.0\n2.87 0 0\n0 2.87 0\n0 0 2.87\nFe\n2\nDirect\n0 0 0\n0.5 0.5 0.5\n";

    fn parse_args(extra: &[&str]) -> GenerateArgs {
        let mut argv = vec!["dftbatch", "generate"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Generate(args) => args,
            _ => unreachable!(),
        }
    }

    fn write_input(dir: &Path) -> String {
        let path = dir.join("POSCAR_Fe");
        fs::write(&path, FE_POSCAR).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_generate_writes_numbered_models() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let out = dir.path().join("models");
        let out_str = out.display().to_string();

        let args = parse_args(&[&input, "-o", &out_str, "-n", "3", "--seed", "7"]);
        let summary = generate(&args).unwrap();

        assert_eq!(summary.written.len(), 3);
        assert!(summary.skipped.is_empty());
        assert!(summary.expanded.is_none());
        for i in 0..3 {
            let model = parsers::parse_structure_file(&out.join(format!("POSCAR_Fe_{}", i))).unwrap();
            assert_eq!(model.num_sites(), 2);
        }
    }

    #[test]
    fn test_same_seed_same_models() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let a = dir.path().join("a").display().to_string();
        let b = dir.path().join("b").display().to_string();

        generate(&parse_args(&[&input, "-o", &a, "-n", "2", "--seed", "11", "--atoms"])).unwrap();
        generate(&parse_args(&[&input, "-o", &b, "-n", "2", "--seed", "11", "--atoms"])).unwrap();

        for i in 0..2 {
            let file = format!("POSCAR_Fe_{}", i);
            assert_eq!(
                fs::read_to_string(dir.path().join("a").join(&file)).unwrap(),
                fs::read_to_string(dir.path().join("b").join(&file)).unwrap()
            );
        }
    }

    #[test]
    fn test_min_sites_exports_supercell() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let out = dir.path().join("models");
        let out_str = out.display().to_string();

        let args = parse_args(&[&input, "-o", &out_str, "-n", "1", "--seed", "1", "--min-sites", "8"]);
        let summary = generate(&args).unwrap();

        let expanded = summary.expanded.unwrap();
        assert!(expanded.ends_with("POSCAR_Fe_modified"));
        assert_eq!(parsers::parse_structure_file(&expanded).unwrap().num_sites(), 8);
        let model = parsers::parse_structure_file(&summary.written[0]).unwrap();
        assert_eq!(model.num_sites(), 8);
    }

    #[test]
    fn test_unsatisfiable_constraints_skip_models() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());
        let out = dir.path().join("models").display().to_string();

        // 2.87 Å ± 1% 不可能落在 (10, 11) 内
        let args = parse_args(&[
            &input,
            "-o",
            &out,
            "-n",
            "2",
            "--seed",
            "3",
            "--length-range",
            "10,11",
            "--max-retries",
            "5",
        ]);
        let summary = generate(&args).unwrap();

        assert!(summary.written.is_empty());
        assert_eq!(summary.skipped, vec![0, 1]);
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path());

        let args = parse_args(&[&input, "--cell-min", "0.02", "--cell-max", "0.01"]);
        assert!(matches!(generate(&args), Err(DftBatchError::InvalidArgument(_))));

        let args = parse_args(&[&input, "--atom-probability", "150"]);
        assert!(matches!(generate(&args), Err(DftBatchError::InvalidArgument(_))));

        let args = parse_args(&[&input, "--format", "cif"]);
        assert!(matches!(generate(&args), Err(DftBatchError::UnsupportedFormat(_))));

        let args = parse_args(&[&input, "--length-range", "1,2,3"]);
        assert!(matches!(generate(&args), Err(DftBatchError::InvalidArgument(_))));

        let args = parse_args(&[&input, "--angle-range", "95"]);
        assert!(matches!(generate(&args), Err(DftBatchError::InvalidArgument(_))));

        let args = parse_args(&[&input, "--length-range", "4,3"]);
        assert!(matches!(generate(&args), Err(DftBatchError::InvalidArgument(_))));
    }

    #[test]
    fn test_range_flag_does_not_swallow_following_options() {
        let args = parse_args(&["POSCAR", "--length-range", "3,4", "-n", "2"]);
        assert_eq!(args.length_range, Some(vec![3.0, 4.0]));
        assert_eq!(args.count, 2);

        let args = parse_args(&["POSCAR", "--angle-range", "-5,95", "--seed", "9"]);
        assert_eq!(args.angle_range, Some(vec![-5.0, 95.0]));
        assert_eq!(args.seed, Some(9));
    }
}
