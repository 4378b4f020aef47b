//! # analyze 命令实现
//!
//! 读取一批生成的模型和一个稳定结构，逐个计算欧氏度量并打印表格。
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的参数
//! - 使用 `batch/collector.rs`, `model_gen/analyser.rs`
//! - 使用 `utils/output.rs`

use crate::batch::FileCollector;
use crate::cli::analyze::AnalyzeArgs;
use crate::error::{DftBatchError, Result};
use crate::model_gen::analyser;
use crate::parsers;
use crate::utils::output;

use std::path::Path;
use tabled::{Table, Tabled};

/// 度量表格行
#[derive(Debug, Clone, Tabled)]
struct MetricRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Euclid metric")]
    metric: String,
}

/// 执行 analyze 命令
pub fn execute(args: AnalyzeArgs) -> Result<()> {
    output::print_header("Analyzing Generated Models");

    let stable = parsers::parse_structure_file(&args.stable)?;
    output::print_info(&format!(
        "Stable structure: {} ({} sites)",
        args.stable.display(),
        stable.num_sites()
    ));

    let models = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive)
        .load_structures()?;

    if models.is_empty() {
        output::print_warning(&format!(
            "No files matched '{}' under {}",
            args.pattern,
            args.input.display()
        ));
        return Ok(());
    }

    let metrics = analyser::euclid_metrics(&models, &stable)?;

    let rows: Vec<MetricRow> = metrics
        .iter()
        .map(|(name, metric)| MetricRow {
            model: name.to_string(),
            metric: format!("{:.6}", metric),
        })
        .collect();
    println!("{}", Table::new(&rows));

    if let Some(path) = &args.output {
        save_metrics_csv(&metrics, path)?;
        output::print_success(&format!("Metrics saved to '{}'", path.display()));
    }

    output::print_done(&format!("Analyzed {} models", metrics.len()));
    Ok(())
}

/// 保存度量到 CSV
fn save_metrics_csv(metrics: &[(&str, f64)], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["name", "euclid_metric"])?;
    for (name, metric) in metrics {
        wtr.write_record([name.to_string(), metric.to_string()])?;
    }
    wtr.flush().map_err(|e| DftBatchError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(())
}
