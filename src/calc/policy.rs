//! # 计算配置策略
//!
//! 根据结构名称与原子数，从不可变的全局默认配置推导每个结构的具体计算配置。
//! 推导是纯函数，不修改任何共享状态，并行任务可各自调用。
//!
//! ## 依赖关系
//! - 被 `calc/orchestrator.rs` 使用
//! - 使用 `models/calculation.rs`

use crate::models::{CalculatorConfig, CalculatorDefaults, KpointMesh};
use std::path::PathBuf;

/// 原子数小于该值时使用 4x4x4 k 点
pub const SMALL_CELL_SITES: usize = 5;
/// 原子数小于该值时使用 2x2x2 k 点，否则 1x1x1
pub const MEDIUM_CELL_SITES: usize = 20;

/// k 点网格：原胞越大网格越粗
pub fn kpoints_for(site_count: usize) -> KpointMesh {
    if site_count < SMALL_CELL_SITES {
        KpointMesh::uniform(4)
    } else if site_count < MEDIUM_CELL_SITES {
        KpointMesh::uniform(2)
    } else {
        KpointMesh::uniform(1)
    }
}

/// 计算配置策略
#[derive(Debug, Clone, Default)]
pub struct CalculatorPolicy {
    defaults: CalculatorDefaults,
    /// 文本日志目录，None 表示不写日志
    output_dir: Option<PathBuf>,
}

impl CalculatorPolicy {
    pub fn new(defaults: CalculatorDefaults) -> Self {
        Self {
            defaults,
            output_dir: None,
        }
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    /// 推导单个结构的计算配置
    pub fn derive(&self, name: &str, site_count: usize) -> CalculatorConfig {
        CalculatorConfig {
            max_iterations: self.defaults.max_iterations,
            xc: self.defaults.xc.clone(),
            kpoints: kpoints_for(site_count),
            txt_output: self
                .output_dir
                .as_ref()
                .map(|dir| dir.join(format!("{}.txt", name))),
            extra: self.defaults.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_kpoint_thresholds() {
        assert_eq!(kpoints_for(1), KpointMesh([4, 4, 4]));
        assert_eq!(kpoints_for(4), KpointMesh([4, 4, 4]));
        assert_eq!(kpoints_for(5), KpointMesh([2, 2, 2]));
        assert_eq!(kpoints_for(19), KpointMesh([2, 2, 2]));
        assert_eq!(kpoints_for(20), KpointMesh([1, 1, 1]));
        assert_eq!(kpoints_for(500), KpointMesh([1, 1, 1]));
    }

    #[test]
    fn test_derive_carries_defaults() {
        let mut defaults = CalculatorDefaults::default();
        defaults.extra.insert("mode".to_string(), "pw".to_string());
        let policy = CalculatorPolicy::new(defaults);

        let config = policy.derive("Fe4O", 5);
        assert_eq!(config.max_iterations, 300);
        assert_eq!(config.xc, "PBE");
        assert_eq!(config.txt_output, None);
        assert_eq!(config.extra.get("mode").map(String::as_str), Some("pw"));
    }

    #[test]
    fn test_derive_is_independent_per_structure() {
        let policy = CalculatorPolicy::default().with_output_dir(Some(PathBuf::from("logs")));

        let small = policy.derive("small", 2);
        let large = policy.derive("large", 40);
        let again = policy.derive("small", 2);

        assert_eq!(small.txt_output.as_deref(), Some(Path::new("logs/small.txt")));
        assert_eq!(large.txt_output.as_deref(), Some(Path::new("logs/large.txt")));
        assert_eq!(small.kpoints, KpointMesh([4, 4, 4]));
        assert_eq!(large.kpoints, KpointMesh([1, 1, 1]));
        assert_eq!(small, again);
    }
}
