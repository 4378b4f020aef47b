//! # 原子化能后处理
//!
//! 原子化能 = 总能量 − Σ 参考能量[元素] / 参考原子数[元素] × 本结构中该元素个数
//!
//! 参考能量来自对参考结构（每种元素一个单质结构）的一次嵌套批量计算。
//! 单个结构缺少字段、化学式无法解析或缺少参考能量时，只在该记录上标注错误，
//! 不影响其余结构。
//!
//! ## 依赖关系
//! - 被 `commands/atomize.rs` 使用
//! - 使用 `models/results.rs`, `parsers/poscar.rs`
//! - 使用 `regex` 解析化学式

use crate::error::{DftBatchError, Result};
use crate::models::{AtomizationEnergies, AtomizationError, ResultRecord, ResultsTable, Structure};
use crate::parsers::poscar;

use log::{debug, warn};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

/// 化学式中的一项：非数字的元素符号 + 数量
static FORMULA_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\D+)(\d+(?:\.\d+)?)$").unwrap());

/// 单种元素的参考能量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceEnergy {
    /// 参考结构的总能量 (eV)
    pub total_energy: f64,
    /// 参考结构中的原子数
    pub formula_units: f64,
}

impl ReferenceEnergy {
    pub fn per_atom(&self) -> f64 {
        self.total_energy / self.formula_units
    }
}

/// 元素 -> 参考能量
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceEnergyTable {
    entries: BTreeMap<String, ReferenceEnergy>,
}

impl ReferenceEnergyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, species: impl Into<String>, reference: ReferenceEnergy) {
        self.entries.insert(species.into(), reference);
    }

    pub fn get(&self, species: &str) -> Option<&ReferenceEnergy> {
        self.entries.get(species)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    /// 从参考结构的计算结果构建
    ///
    /// 每个参考结构只能含一种元素；计算失败或化学式不符合要求的记录被跳过。
    pub fn from_results(results: &ResultsTable) -> Self {
        let mut table = Self::new();
        for (name, record) in results.iter() {
            let Some(total_energy) = record.total_energy() else {
                warn!(
                    "Reference '{}' has no energy ({}), skipped",
                    name,
                    record.outcome.status()
                );
                continue;
            };

            let parsed = record.formula.as_deref().map(parse_formula);
            match parsed {
                Some(Ok(tokens)) if tokens.len() == 1 => {
                    let (species, count) = tokens[0].clone();
                    debug!("Reference {}: {} eV / {} atoms", species, total_energy, count);
                    table.insert(
                        species,
                        ReferenceEnergy {
                            total_energy,
                            formula_units: count,
                        },
                    );
                }
                _ => warn!(
                    "Reference '{}' is not a single-species structure, skipped",
                    name
                ),
            }
        }
        table
    }
}

/// 解析 "Fe4 O1" 形式的化学式
pub fn parse_formula(formula: &str) -> std::result::Result<Vec<(String, f64)>, AtomizationError> {
    let unparseable = || AtomizationError::UnparseableFormula(formula.to_string());

    let tokens: Vec<(String, f64)> = formula
        .split_whitespace()
        .map(|token| -> std::result::Result<(String, f64), AtomizationError> {
            let caps = FORMULA_TOKEN.captures(token).ok_or_else(unparseable)?;
            let count: f64 = caps[2].parse().map_err(|_| unparseable())?;
            Ok((caps[1].to_string(), count))
        })
        .collect::<std::result::Result<_, AtomizationError>>()?;

    if tokens.is_empty() {
        return Err(unparseable());
    }
    Ok(tokens)
}

/// 计算单条记录的原子化能
pub fn atomization_of(
    record: &ResultRecord,
    references: &ReferenceEnergyTable,
) -> std::result::Result<AtomizationEnergies, AtomizationError> {
    let total = record
        .total_energy()
        .ok_or(AtomizationError::MissingField("total_energy"))?;
    let formula = record
        .formula
        .as_deref()
        .ok_or(AtomizationError::MissingField("formula"))?;

    let mut reference_sum = 0.0;
    for (species, count) in parse_formula(formula)? {
        let reference = references
            .get(&species)
            .ok_or_else(|| AtomizationError::MissingReference(species.clone()))?;
        reference_sum += reference.per_atom() * count;
    }

    Ok(AtomizationEnergies {
        atomization_energy: total - reference_sum,
        initial_atomization: record.initial_energy().map(|e| e - reference_sum),
    })
}

/// 为结果表中的每条记录计算原子化能
pub fn apply(results: &mut ResultsTable, references: &ReferenceEnergyTable) {
    for (name, record) in results.iter_mut() {
        let outcome = atomization_of(record, references);
        if let Err(e) = &outcome {
            debug!("{}: atomization skipped ({})", name, e);
        }
        record.atomization = Some(outcome);
    }
}

/// 结果表中出现的全部元素（按字母序）
pub fn species_in(results: &ResultsTable) -> Vec<String> {
    let mut species: Vec<String> = results
        .iter()
        .filter_map(|(_, r)| r.formula.as_deref())
        .filter_map(|f| parse_formula(f).ok())
        .flatten()
        .map(|(s, _)| s)
        .collect();
    species.sort();
    species.dedup();
    species
}

/// 读取参考结构 `{dir}/{元素}/POSCAR`，以元素符号命名
pub fn reference_structures(dir: &Path, species: &[String]) -> Result<Vec<(String, Structure)>> {
    if !dir.is_dir() {
        return Err(DftBatchError::DirectoryNotFound {
            path: dir.display().to_string(),
        });
    }

    species
        .iter()
        .map(|s| {
            let path = dir.join(s).join("POSCAR");
            if !path.is_file() {
                return Err(DftBatchError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            let mut structure = poscar::parse_poscar_file(&path)?;
            structure.name = s.clone();
            Ok((s.clone(), structure))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CalculationResult, Energies};

    fn references() -> ReferenceEnergyTable {
        let mut refs = ReferenceEnergyTable::new();
        refs.insert(
            "O",
            ReferenceEnergy {
                total_energy: -2.0,
                formula_units: 2.0,
            },
        );
        refs.insert(
            "Fe",
            ReferenceEnergy {
                total_energy: -8.0,
                formula_units: 1.0,
            },
        );
        refs
    }

    fn record(total: f64, formula: &str) -> ResultRecord {
        ResultRecord::new(CalculationResult::success(total), Some(formula.to_string()))
    }

    #[test]
    fn test_worked_example() {
        let a = atomization_of(&record(-100.0, "Fe4 O1"), &references()).unwrap();
        assert!((a.atomization_energy - (-67.0)).abs() < 1e-12);
        assert_eq!(a.initial_atomization, None);
    }

    #[test]
    fn test_initial_atomization_uses_same_reference_sum() {
        let rec = ResultRecord::new(
            CalculationResult::Success(Energies {
                total_energy: -100.0,
                initial_energy: Some(-95.0),
                relaxed_structure: None,
            }),
            Some("Fe4 O1".to_string()),
        );
        let a = atomization_of(&rec, &references()).unwrap();
        assert_eq!(a.initial_atomization, Some(-62.0));
    }

    #[test]
    fn test_parse_formula() {
        assert_eq!(
            parse_formula("Fe4 O1").unwrap(),
            vec![("Fe".to_string(), 4.0), ("O".to_string(), 1.0)]
        );
        assert!(matches!(
            parse_formula("Fe O1"),
            Err(AtomizationError::UnparseableFormula(_))
        ));
        assert!(parse_formula("").is_err());
        assert!(parse_formula("4Fe").is_err());
    }

    #[test]
    fn test_errors_are_recorded_per_structure() {
        let mut table = ResultsTable::new();
        table.insert("good", record(-100.0, "Fe4 O1"));
        table.insert("no_ref", record(-10.0, "Al2 O1"));
        table.insert(
            "failed",
            ResultRecord::new(CalculationResult::Unconverged, Some("Fe1".to_string())),
        );
        table.insert(
            "no_formula",
            ResultRecord::new(CalculationResult::success(-1.0), None),
        );
        table.insert("garbled", record(-1.0, "Fe4O"));

        apply(&mut table, &references());

        let get = |n: &str| table.get(n).unwrap().atomization.clone().unwrap();
        assert!(get("good").is_ok());
        assert_eq!(
            get("no_ref"),
            Err(AtomizationError::MissingReference("Al".to_string()))
        );
        assert_eq!(
            get("failed"),
            Err(AtomizationError::MissingField("total_energy"))
        );
        assert_eq!(
            get("no_formula"),
            Err(AtomizationError::MissingField("formula"))
        );
        assert!(matches!(
            get("garbled"),
            Err(AtomizationError::UnparseableFormula(_))
        ));
    }

    #[test]
    fn test_reference_table_from_results() {
        let mut results = ResultsTable::new();
        results.insert("O", record(-9.86, "O2"));
        results.insert("Fe", record(-8.3, "Fe1"));
        results.insert(
            "Al",
            ResultRecord::new(CalculationResult::Unconverged, Some("Al4".to_string())),
        );
        results.insert("FeO", record(-20.0, "Fe1 O1"));

        let refs = ReferenceEnergyTable::from_results(&results);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs.get("O").unwrap().formula_units, 2.0);
        assert!((refs.get("O").unwrap().per_atom() + 4.93).abs() < 1e-12);
        assert!(refs.get("Al").is_none());
    }

    #[test]
    fn test_species_in() {
        let mut table = ResultsTable::new();
        table.insert("a", record(-1.0, "Fe4 O1"));
        table.insert("b", record(-1.0, "Al2 O3"));
        assert_eq!(species_in(&table), vec!["Al", "Fe", "O"]);
    }

    #[test]
    fn test_reference_structures_layout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Fe")).unwrap();
        std::fs::write(
            dir.path().join("Fe").join("POSCAR"),
            "bcc Fe\n1.0\n2.87 0 0\n0 2.87 0\n0 0 2.87\nFe\n2\nDirect\n0 0 0\n0.5 0.5 0.5\n",
        )
        .unwrap();

        let refs = reference_structures(dir.path(), &["Fe".to_string()]).unwrap();
        assert_eq!(refs[0].0, "Fe");
        assert_eq!(refs[0].1.formula(), "Fe2");

        assert!(matches!(
            reference_structures(dir.path(), &["O".to_string()]),
            Err(DftBatchError::FileNotFound { .. })
        ));
    }
}
