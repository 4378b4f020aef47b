//! # 超胞扩展
//!
//! 沿最短晶格向量反复加倍，直到原子数达到下限。
//!
//! ## 依赖关系
//! - 被 `model_gen/perturber.rs` 和 `commands/` 使用
//! - 使用 `models/structure.rs`

use crate::models::{Lattice, Structure};
use log::debug;

/// 对角超胞：沿 a, b, c 分别复制 `dims` 次
///
/// 每个原格点的所有镜像连续排列，新格点重新分配 id。
pub fn make_supercell(structure: &Structure, dims: [usize; 3]) -> Structure {
    let mut matrix = structure.lattice.matrix;
    for (row, &n) in matrix.iter_mut().zip(dims.iter()) {
        for x in row.iter_mut() {
            *x *= n as f64;
        }
    }

    let mut sites = Vec::with_capacity(structure.num_sites() * dims.iter().product::<usize>());
    for site in &structure.sites {
        for i in 0..dims[0] {
            for j in 0..dims[1] {
                for k in 0..dims[2] {
                    let shift = [i as f64, j as f64, k as f64];
                    let frac = [
                        (site.frac[0] + shift[0]) / dims[0] as f64,
                        (site.frac[1] + shift[1]) / dims[1] as f64,
                        (site.frac[2] + shift[2]) / dims[2] as f64,
                    ];
                    sites.push((site.species.clone(), frac));
                }
            }
        }
    }

    Structure::new(structure.name.clone(), Lattice::from_vectors(matrix), sites)
}

/// 最短晶格向量的下标；长度相同时按 a, b, c 顺序取第一个
pub fn shortest_axis(lattice: &Lattice) -> usize {
    let lengths = lattice.lengths();
    let mut best = 0;
    for axis in 1..3 {
        if lengths[axis] < lengths[best] {
            best = axis;
        }
    }
    best
}

/// 扩展超胞直到原子数 ≥ `floor`
///
/// 返回 (结构, 是否发生了扩展)。空结构无法达到正的下限，原样返回。
pub fn expand_to_minimum(structure: Structure, floor: usize) -> (Structure, bool) {
    if structure.num_sites() == 0 {
        return (structure, false);
    }

    let mut current = structure;
    let mut expanded = false;

    while current.num_sites() < floor {
        let axis = shortest_axis(&current.lattice);
        let mut dims = [1, 1, 1];
        dims[axis] = 2;
        debug!(
            "Doubling axis {} ({} sites < {})",
            ["a", "b", "c"][axis],
            current.num_sites(),
            floor
        );
        current = make_supercell(&current, dims);
        expanded = true;
    }

    (current, expanded)
}
