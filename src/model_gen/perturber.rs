//! # 结构扰动器
//!
//! 保存一份不可变的原始结构和一份工作副本，在工作副本上进行随机扰动：
//! - 对称扰动：晶格整体等比缩放
//! - 非对称扰动：晶格长度 / 晶胞形状 / 原子分数坐标 / 原子交换
//!
//! 扰动不做任何合法性检查，调用方通过 `check_constraints` 自行决定是否拒绝重试。
//!
//! ## 依赖关系
//! - 被 `commands/generate.rs` 使用
//! - 使用 `model_gen/supercell.rs`, `model_gen/constraints.rs`
//! - 使用 `rand` 生成随机数

use super::constraints::CellBounds;
use super::supercell;
use crate::models::element::is_metal;
use crate::models::Structure;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 非对称扰动的开关与参数
#[derive(Debug, Clone, PartialEq)]
pub struct UnsymmetricOptions {
    /// 是否修改晶胞
    pub modify_cell: bool,
    /// 修改晶胞时是否同时改变形状（角度）
    pub modify_shape: bool,
    /// 是否修改原子分数坐标
    pub modify_atom: bool,
    /// 是否交换原子
    pub swap_atom: bool,
    /// 晶胞变化范围（相对值）
    pub cell_min: f64,
    pub cell_max: f64,
    /// 每个坐标被修改的概率 (%)
    pub atom_probability: f64,
    /// 分数坐标变化范围
    pub atom_min: f64,
    pub atom_max: f64,
    /// 交换次数
    pub swap_count: usize,
    /// 是否只允许金属-金属 / 非金属-非金属交换
    pub swap_restrict: bool,
}

impl Default for UnsymmetricOptions {
    fn default() -> Self {
        UnsymmetricOptions {
            modify_cell: true,
            modify_shape: false,
            modify_atom: false,
            swap_atom: false,
            cell_min: -0.01,
            cell_max: 0.01,
            atom_probability: 10.0,
            atom_min: -0.01,
            atom_max: 0.01,
            swap_count: 10,
            swap_restrict: true,
        }
    }
}

/// `lo + (hi - lo) * u`，u ∈ [0, 1)；lo >= hi 时不会 panic
fn uniform<R: Rng>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    lo + (hi - lo) * rng.gen::<f64>()
}

/// 结构扰动器
pub struct StructurePerturber<R: Rng = StdRng> {
    original: Structure,
    working: Structure,
    rng: R,
}

impl StructurePerturber<StdRng> {
    /// 使用系统熵初始化随机数
    pub fn new(structure: Structure) -> Self {
        Self::with_rng(structure, StdRng::from_entropy())
    }

    /// 固定种子，结果可复现
    pub fn with_seed(structure: Structure, seed: u64) -> Self {
        Self::with_rng(structure, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> StructurePerturber<R> {
    pub fn with_rng(structure: Structure, rng: R) -> Self {
        StructurePerturber {
            working: structure.clone(),
            original: structure,
            rng,
        }
    }

    /// 当前提交的原始结构
    pub fn original(&self) -> &Structure {
        &self.original
    }

    /// 当前工作副本
    pub fn working(&self) -> &Structure {
        &self.working
    }

    /// 对称扰动：所有晶格分量乘以同一个因子 v ~ U(1+min, 1+max)
    pub fn modify_symmetric(&mut self, min: f64, max: f64) -> &mut Self {
        let v = uniform(&mut self.rng, 1.0 + min, 1.0 + max);
        for x in self.working.lattice.matrix.iter_mut().flatten() {
            *x *= v;
        }
        self
    }

    /// 晶格长度扰动：与对称扰动相同的整体缩放，作为非对称扰动中的晶胞部分
    pub fn modify_cell_length(&mut self, min: f64, max: f64) -> &mut Self {
        self.modify_symmetric(min, max)
    }

    /// 晶胞形状扰动：每个分量 (x + s) * m，s ~ U(min, max)，m ~ U(1+min, 1+max)
    ///
    /// 加法项使原本为 0 的分量也会变化，因此角度会改变。
    pub fn modify_cell_shape(&mut self, min: f64, max: f64) -> &mut Self {
        for x in self.working.lattice.matrix.iter_mut().flatten() {
            let shift = uniform(&mut self.rng, min, max);
            let factor = uniform(&mut self.rng, 1.0 + min, 1.0 + max);
            *x = (*x + shift) * factor;
        }
        self
    }

    /// 原子坐标扰动：每个分数坐标以 probability% 的概率加上 U(min, max)，不做回绕
    pub fn modify_atom_coordinates(&mut self, probability: f64, min: f64, max: f64) -> &mut Self {
        for site in self.working.sites.iter_mut() {
            for coord in site.frac.iter_mut() {
                if self.rng.gen::<f64>() * 100.0 < probability {
                    *coord += uniform(&mut self.rng, min, max);
                }
            }
        }
        self
    }

    /// 随机交换 `count` 对原子的元素（坐标不动），最后按元素稳定排序
    ///
    /// 排序会改变格点在序列中的位置；返回值按稳定 id 记录每次交换的两个格点。
    pub fn swap_atoms(&mut self, count: usize, restrict_to_same_class: bool) -> Vec<(usize, usize)> {
        let n = self.working.num_sites();
        if n == 0 {
            return Vec::new();
        }

        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            let (i, j) = loop {
                let i = self.rng.gen_range(0..n);
                let j = self.rng.gen_range(0..n);
                let sites = &self.working.sites;
                if !restrict_to_same_class
                    || is_metal(&sites[i].species) == is_metal(&sites[j].species)
                {
                    break (i, j);
                }
            };

            // i == j 时交换无效果，但仍计入次数
            if i != j {
                let (lo, hi) = (i.min(j), i.max(j));
                let (head, tail) = self.working.sites.split_at_mut(hi);
                std::mem::swap(&mut head[lo].species, &mut tail[0].species);
            }

            pairs.push((self.working.sites[i].id, self.working.sites[j].id));
        }

        self.working.sort_by_species();
        pairs
    }

    /// 组合的非对称扰动：晶胞 -> 原子坐标 -> 原子交换
    pub fn modify_unsymmetrical(&mut self, options: &UnsymmetricOptions) -> &mut Self {
        if options.modify_cell {
            if options.modify_shape {
                self.modify_cell_shape(options.cell_min, options.cell_max);
            } else {
                self.modify_cell_length(options.cell_min, options.cell_max);
            }
        }
        if options.modify_atom {
            self.modify_atom_coordinates(
                options.atom_probability,
                options.atom_min,
                options.atom_max,
            );
        }
        if options.swap_atom {
            let pairs = self.swap_atoms(options.swap_count, options.swap_restrict);
            debug!("Swapped {} site pairs", pairs.len());
        }
        self
    }

    /// 工作副本的晶格参数是否严格位于所有区间内
    pub fn check_constraints(&self, bounds: &CellBounds) -> bool {
        bounds.contains(&self.working.lattice.parameters())
    }

    /// 丢弃工作副本，从原始结构恢复
    pub fn reset(&mut self) -> &Structure {
        self.working = self.original.clone();
        &self.working
    }

    /// 确保原子数不少于 `floor`
    ///
    /// 发生扩展时替换原始结构（之后的 `reset` 恢复到扩展后的结构），
    /// 并从新的原始结构重建工作副本。返回是否发生了扩展。
    pub fn ensure_minimum_site_count(&mut self, floor: usize) -> bool {
        let before = self.original.num_sites();
        let (expanded, changed) = supercell::expand_to_minimum(self.original.clone(), floor);
        if changed {
            info!(
                "Expanded '{}' to a supercell: {} -> {} sites",
                self.original.name,
                before,
                expanded.num_sites()
            );
            self.original = expanded;
            self.working = self.original.clone();
        }
        changed
    }
}
