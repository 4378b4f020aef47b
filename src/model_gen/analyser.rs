//! # 模型分析
//!
//! 用欧氏距离衡量生成的模型与稳定结构之间的偏离程度：
//! 三个晶格向量差的模之和，加上每个格点分数坐标差的模之和（按序列位置对应）。
//!
//! ## 依赖关系
//! - 被 `commands/analyze.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{DftBatchError, Result};
use crate::models::Structure;

fn norm(a: [f64; 3], b: [f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

/// 计算模型相对稳定结构的欧氏度量
pub fn euclid_metric(model: &Structure, stable: &Structure) -> Result<f64> {
    if model.num_sites() != stable.num_sites() {
        return Err(DftBatchError::InvalidArgument(format!(
            "'{}' has {} sites but the stable structure '{}' has {}",
            model.name,
            model.num_sites(),
            stable.name,
            stable.num_sites()
        )));
    }

    let lattice: f64 = model
        .lattice
        .matrix
        .iter()
        .zip(stable.lattice.matrix.iter())
        .map(|(a, b)| norm(*a, *b))
        .sum();

    let sites: f64 = model
        .sites
        .iter()
        .zip(stable.sites.iter())
        .map(|(a, b)| norm(a.frac, b.frac))
        .sum();

    Ok(lattice + sites)
}

/// 对一组模型逐个计算度量，保持输入顺序
pub fn euclid_metrics<'a>(
    models: &'a [(String, Structure)],
    stable: &Structure,
) -> Result<Vec<(&'a str, f64)>> {
    models
        .iter()
        .map(|(name, model)| Ok((name.as_str(), euclid_metric(model, stable)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lattice;

    fn fe2(a: f64, shift: f64) -> Structure {
        Structure::new(
            "Fe2",
            Lattice::cubic(a),
            vec![("Fe", [0.0, 0.0, 0.0]), ("Fe", [0.5 + shift, 0.5, 0.5])],
        )
    }

    #[test]
    fn test_identical_structures_have_zero_metric() {
        assert_eq!(euclid_metric(&fe2(2.87, 0.0), &fe2(2.87, 0.0)).unwrap(), 0.0);
    }

    #[test]
    fn test_metric_sums_lattice_and_sites() {
        // 每个晶格向量差 0.1，共 0.3；一个格点偏移 0.05
        let m = euclid_metric(&fe2(2.97, 0.05), &fe2(2.87, 0.0)).unwrap();
        assert!((m - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_site_count_mismatch() {
        let single = Structure::new("Fe", Lattice::cubic(2.87), vec![("Fe", [0.0; 3])]);
        assert!(matches!(
            euclid_metric(&single, &fe2(2.87, 0.0)),
            Err(DftBatchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_metrics_keep_order() {
        let models = vec![
            ("b".to_string(), fe2(2.87, 0.1)),
            ("a".to_string(), fe2(2.87, 0.0)),
        ];
        let metrics = euclid_metrics(&models, &fe2(2.87, 0.0)).unwrap();
        assert_eq!(metrics[0].0, "b");
        assert_eq!(metrics[1], ("a", 0.0));
    }
}
