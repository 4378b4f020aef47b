//! # 结果表
//!
//! 以结构名为键、保持提交顺序的结果表，以及按列名渲染报表行的逻辑。
//!
//! ## 依赖关系
//! - 被 `calc/orchestrator.rs` 填充
//! - 被 `calc/atomization.rs` 扩展
//! - 被 `report.rs` 导出/导入

use super::calculation::CalculationResult;
use thiserror::Error;

/// 请求的列不存在时的占位值
pub const UNDEFINED: &str = "undefined";

/// 默认导出列
pub const DEFAULT_COLUMNS: [&str; 8] = [
    "name",
    "status",
    "formula",
    "total_energy",
    "initial_energy",
    "atomization_energy",
    "initial_atomization",
    "error",
];

/// 原子化能后处理失败原因
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AtomizationError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("unparseable formula: '{0}'")]
    UnparseableFormula(String),

    #[error("no reference energy for species: {0}")]
    MissingReference(String),
}

/// 原子化能 (eV)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtomizationEnergies {
    pub atomization_energy: f64,
    pub initial_atomization: Option<f64>,
}

/// 结果表中的一行
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub outcome: CalculationResult,
    pub formula: Option<String>,
    pub atomization: Option<std::result::Result<AtomizationEnergies, AtomizationError>>,
}

impl ResultRecord {
    pub fn new(outcome: CalculationResult, formula: Option<String>) -> Self {
        ResultRecord {
            outcome,
            formula,
            atomization: None,
        }
    }

    pub fn total_energy(&self) -> Option<f64> {
        self.outcome.energies().map(|e| e.total_energy)
    }

    pub fn initial_energy(&self) -> Option<f64> {
        self.outcome.energies().and_then(|e| e.initial_energy)
    }

    /// 按列名取值，不存在返回 None
    pub fn value(&self, column: &str) -> Option<String> {
        match column {
            "status" => Some(self.outcome.status().to_string()),
            "formula" => self.formula.clone(),
            "total_energy" => self.total_energy().map(|e| e.to_string()),
            "initial_energy" => self.initial_energy().map(|e| e.to_string()),
            "atomization_energy" => match &self.atomization {
                Some(Ok(a)) => Some(a.atomization_energy.to_string()),
                _ => None,
            },
            "initial_atomization" => match &self.atomization {
                Some(Ok(a)) => a.initial_atomization.map(|e| e.to_string()),
                _ => None,
            },
            "error" => match (&self.atomization, self.outcome.error_message()) {
                (_, Some(msg)) => Some(msg),
                (Some(Err(e)), None) => Some(e.to_string()),
                _ => None,
            },
            _ => None,
        }
    }
}

/// 结果表：键唯一，迭代顺序 = 插入顺序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTable {
    entries: Vec<(String, ResultRecord)>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入记录；同名记录原位替换，保持原顺序
    pub fn insert(&mut self, name: impl Into<String>, record: ResultRecord) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = record,
            None => self.entries.push((name, record)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ResultRecord> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResultRecord)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ResultRecord)> {
        self.entries.iter_mut().map(|(n, r)| (n.as_str(), r))
    }

    /// 成功计算的数量
    pub fn success_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, r)| r.outcome.is_success())
            .count()
    }

    /// 按列名渲染所有行；缺失值用 "undefined" 代替，永不失败
    pub fn rows(&self, columns: &[&str]) -> Vec<Vec<String>> {
        self.entries
            .iter()
            .map(|(name, record)| {
                columns
                    .iter()
                    .map(|column| {
                        if *column == "name" {
                            name.clone()
                        } else {
                            record
                                .value(column)
                                .unwrap_or_else(|| UNDEFINED.to_string())
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> ResultsTable {
        let mut table = ResultsTable::new();
        table.insert(
            "Fe4O",
            ResultRecord::new(CalculationResult::success(-100.0), Some("Fe4 O1".into())),
        );
        table.insert(
            "broken",
            ResultRecord::new(CalculationResult::Unconverged, Some("Fe1".into())),
        );
        table
    }

    #[test]
    fn test_insertion_order_and_replace() {
        let mut table = sample_table();
        table.insert(
            "Fe4O",
            ResultRecord::new(CalculationResult::success(-99.0), None),
        );

        let names: Vec<&str> = table.names().collect();
        assert_eq!(names, vec!["Fe4O", "broken"]);
        assert_eq!(table.get("Fe4O").unwrap().total_energy(), Some(-99.0));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_rows_use_sentinel_for_missing_columns() {
        let table = sample_table();
        let rows = table.rows(&["name", "total_energy", "no_such_column", "error"]);

        assert_eq!(rows[0], vec!["Fe4O", "-100", UNDEFINED, UNDEFINED]);
        assert_eq!(rows[1][0], "broken");
        assert_eq!(rows[1][1], UNDEFINED);
        assert_eq!(rows[1][3], "SCF did not converge");
    }

    #[test]
    fn test_atomization_error_rendered_in_error_column() {
        let mut table = sample_table();
        for (_, record) in table.iter_mut() {
            record.atomization = Some(Err(AtomizationError::MissingReference("O".into())));
        }

        let rows = table.rows(&["error", "atomization_energy"]);
        assert_eq!(rows[0][0], "no reference energy for species: O");
        assert_eq!(rows[0][1], UNDEFINED);
    }
}
