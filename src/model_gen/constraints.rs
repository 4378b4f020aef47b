//! # 晶胞约束
//!
//! 晶格参数的开区间约束，供调用方在扰动后做"拒绝-重试"。
//!
//! ## 依赖关系
//! - 被 `model_gen/perturber.rs` 和 `commands/generate.rs` 使用

use crate::models::CellParameters;

/// 六个晶格参数的开区间 (min, max)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub a: (f64, f64),
    pub b: (f64, f64),
    pub c: (f64, f64),
    pub alpha: (f64, f64),
    pub beta: (f64, f64),
    pub gamma: (f64, f64),
}

impl Default for CellBounds {
    fn default() -> Self {
        CellBounds {
            a: (-1.0, 100.0),
            b: (-1.0, 100.0),
            c: (-1.0, 100.0),
            alpha: (0.0, 360.0),
            beta: (0.0, 360.0),
            gamma: (0.0, 360.0),
        }
    }
}

fn strictly_inside(value: f64, (min, max): (f64, f64)) -> bool {
    min < value && value < max
}

impl CellBounds {
    pub fn with_lengths(mut self, min: f64, max: f64) -> Self {
        self.a = (min, max);
        self.b = (min, max);
        self.c = (min, max);
        self
    }

    pub fn with_angles(mut self, min: f64, max: f64) -> Self {
        self.alpha = (min, max);
        self.beta = (min, max);
        self.gamma = (min, max);
        self
    }

    /// 六个参数是否都严格位于各自区间内（NaN 永远不满足）
    pub fn contains(&self, p: &CellParameters) -> bool {
        strictly_inside(p.a, self.a)
            && strictly_inside(p.b, self.b)
            && strictly_inside(p.c, self.c)
            && strictly_inside(p.alpha, self.alpha)
            && strictly_inside(p.beta, self.beta)
            && strictly_inside(p.gamma, self.gamma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lattice;

    #[test]
    fn test_bounds_are_open_intervals() {
        let bounds = CellBounds::default().with_lengths(3.0, 4.0);

        assert!(bounds.contains(&Lattice::cubic(3.5).parameters()));
        assert!(!bounds.contains(&Lattice::cubic(4.0).parameters()));
        assert!(!bounds.contains(&Lattice::cubic(3.0).parameters()));
    }

    #[test]
    fn test_nan_parameters_rejected() {
        let degenerate = Lattice::from_vectors([[0.0; 3], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(!CellBounds::default().contains(&degenerate.parameters()));
    }
}
