//! # 结果报表
//!
//! - `write_csv`：按列名导出结果表，缺失值写为 "undefined"
//! - `read_csv`：重新读入之前导出的结果表，用于对旧批次做原子化能后处理
//! - `summary_table`：终端中显示的摘要表格
//!
//! ## 依赖关系
//! - 被 `commands/run.rs`, `commands/atomize.rs` 使用
//! - 使用 `models/results.rs`
//! - 使用 `csv`, `tabled`

use crate::error::{DftBatchError, Result};
use crate::models::results::UNDEFINED;
use crate::models::{BackendErrorKind, CalculationResult, Energies, ResultRecord, ResultsTable};

use std::collections::HashMap;
use std::path::Path;
use tabled::{Table, Tabled};

/// 导出 CSV，第一行为列名
pub fn write_csv(table: &ResultsTable, columns: &[&str], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).map_err(DftBatchError::CsvError)?;

    wtr.write_record(columns).map_err(DftBatchError::CsvError)?;
    for row in table.rows(columns) {
        wtr.write_record(&row).map_err(DftBatchError::CsvError)?;
    }
    wtr.flush().map_err(|e| DftBatchError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

/// 读入 CSV 结果表；空单元格和 "undefined" 视为缺失
pub fn read_csv(path: &Path) -> Result<ResultsTable> {
    let mut rdr = csv::Reader::from_path(path).map_err(DftBatchError::CsvError)?;
    let headers = rdr.headers().map_err(DftBatchError::CsvError)?.clone();
    let index: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();

    let name_col = *index.get("name").ok_or_else(|| DftBatchError::ParseError {
        format: "csv".to_string(),
        path: path.display().to_string(),
        reason: "missing 'name' column".to_string(),
    })?;

    let mut table = ResultsTable::new();
    for record in rdr.records() {
        let record = record.map_err(DftBatchError::CsvError)?;
        let cell = |column: &str| -> Option<&str> {
            index
                .get(column)
                .and_then(|&i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty() && *v != UNDEFINED)
        };

        let Some(name) = record.get(name_col).map(str::trim).filter(|n| !n.is_empty()) else {
            continue;
        };
        let number = |column: &str| cell(column).and_then(|v| v.parse::<f64>().ok());

        let outcome = rebuild_outcome(
            cell("status"),
            number("total_energy"),
            number("initial_energy"),
            cell("error"),
        );
        table.insert(
            name.to_string(),
            ResultRecord::new(outcome, cell("formula").map(String::from)),
        );
    }
    Ok(table)
}

/// 由状态列与能量列还原计算结局
fn rebuild_outcome(
    status: Option<&str>,
    total_energy: Option<f64>,
    initial_energy: Option<f64>,
    error: Option<&str>,
) -> CalculationResult {
    let message = error.unwrap_or("").to_string();
    let strip = |prefix: &str| {
        message
            .strip_prefix(prefix)
            .unwrap_or(&message)
            .to_string()
    };

    match (status, total_energy) {
        (Some("success") | None, Some(total_energy)) => CalculationResult::Success(Energies {
            total_energy,
            initial_energy,
            relaxed_structure: None,
        }),
        (Some("unconverged"), _) => CalculationResult::Unconverged,
        (Some("invalid_structure"), _) => {
            CalculationResult::InvalidStructure(strip("invalid structure: "))
        }
        (Some("backend_unavailable"), _) => CalculationResult::Error(
            BackendErrorKind::BackendUnavailable(strip("backend unavailable: ")),
        ),
        (Some("success") | None, None) => CalculationResult::Error(
            BackendErrorKind::OutputUnreadable("no total energy in results file".to_string()),
        ),
        (Some(_), _) => {
            CalculationResult::Error(BackendErrorKind::ExecutionFailed(strip("execution failed: ")))
        }
    }
}

/// 摘要表的一行
#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Structure")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Formula")]
    formula: String,
    #[tabled(rename = "Energy (eV)")]
    energy: String,
    #[tabled(rename = "E_atom (eV)")]
    atomization: String,
}

/// 终端摘要表格
pub fn summary_table(table: &ResultsTable) -> String {
    let columns = ["name", "status", "formula", "total_energy", "atomization_energy"];
    let rows: Vec<SummaryRow> = table
        .rows(&columns)
        .into_iter()
        .map(|mut r| {
            let mut take = |i: usize| std::mem::take(&mut r[i]);
            SummaryRow {
                name: take(0),
                status: take(1),
                formula: take(2),
                energy: take(3),
                atomization: take(4),
            }
        })
        .collect();
    Table::new(&rows).to_string()
}
