//! # 晶体结构数据模型
//!
//! 定义统一的晶体结构表示：晶格 + 有序的格点列表。
//!
//! 每个格点在创建时分配一个稳定的 `id`，与其在序列中的位置无关，
//! 因此排序/交换之后仍然可以通过 `id` 找到同一个格点。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `model_gen/`, `calc/` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 晶格参数 (a, b, c, alpha, beta, gamma)，角度单位：度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellParameters {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

/// 晶格表示
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

fn norm(v: [f64; 3]) -> f64 {
    (v[0].powi(2) + v[1].powi(2) + v[2].powi(2)).sqrt()
}

fn dot(u: [f64; 3], v: [f64; 3]) -> f64 {
    u.iter().zip(v.iter()).map(|(x, y)| x * y).sum()
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let cos_gamma = gamma.to_radians().cos();
        let sin_gamma = gamma.to_radians().sin();

        let a_vec = [a, 0.0, 0.0];
        let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).sqrt();

        Lattice {
            matrix: [a_vec, b_vec, [c1, c2, c3]],
        }
    }

    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 立方晶格
    pub fn cubic(a: f64) -> Self {
        Lattice::from_vectors([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]])
    }

    /// 三个晶格向量的长度 [a, b, c]
    pub fn lengths(&self) -> [f64; 3] {
        [
            norm(self.matrix[0]),
            norm(self.matrix[1]),
            norm(self.matrix[2]),
        ]
    }

    /// 获取晶格参数
    pub fn parameters(&self) -> CellParameters {
        let [a_vec, b_vec, c_vec] = self.matrix;
        let [a, b, c] = self.lengths();

        let alpha = (dot(b_vec, c_vec) / (b * c)).acos().to_degrees();
        let beta = (dot(a_vec, c_vec) / (a * c)).acos().to_degrees();
        let gamma = (dot(a_vec, b_vec) / (a * b)).acos().to_degrees();

        CellParameters {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
        }
    }

    /// 计算晶格体积（有符号，行列式）
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.matrix;
        a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0])
    }

    /// 所有分量有限、没有零长度向量、体积非零
    pub fn is_non_degenerate(&self) -> bool {
        let finite = self.matrix.iter().flatten().all(|x| x.is_finite());
        finite && self.lengths().iter().all(|l| *l > 1e-8) && self.volume().abs() > 1e-8
    }

    /// 分数坐标转笛卡尔坐标
    pub fn frac_to_cart(&self, frac: [f64; 3]) -> [f64; 3] {
        let m = self.matrix;
        [
            frac[0] * m[0][0] + frac[1] * m[1][0] + frac[2] * m[2][0],
            frac[0] * m[0][1] + frac[1] * m[1][1] + frac[2] * m[2][1],
            frac[0] * m[0][2] + frac[1] * m[1][2] + frac[2] * m[2][2],
        ]
    }

    /// 笛卡尔坐标转分数坐标，奇异晶格返回 None
    pub fn cart_to_frac(&self, cart: [f64; 3]) -> Option<[f64; 3]> {
        let m = self.matrix;
        let det = self.volume();
        if det.abs() < 1e-10 {
            return None;
        }

        let inv = [
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / det,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / det,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / det,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
            ],
        ];

        // 行向量约定：cart = frac · M，因此 frac = cart · M⁻¹
        Some([
            cart[0] * inv[0][0] + cart[1] * inv[1][0] + cart[2] * inv[2][0],
            cart[0] * inv[0][1] + cart[1] * inv[1][1] + cart[2] * inv[2][1],
            cart[0] * inv[0][2] + cart[1] * inv[1][2] + cart[2] * inv[2][2],
        ])
    }
}

/// 格点：一个原子的元素与分数坐标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// 稳定标识，创建时分配，不随排序改变
    pub id: usize,

    /// 元素符号
    pub species: String,

    /// 分数坐标 [a, b, c]，不强制在 [0, 1) 内
    pub frac: [f64; 3],
}

/// 晶体结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// 结构名称（注释行）
    pub name: String,

    /// 晶格
    pub lattice: Lattice,

    /// 格点列表
    pub sites: Vec<Site>,
}

impl Structure {
    /// 创建结构，按顺序分配格点 id
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        lattice: Lattice,
        sites: impl IntoIterator<Item = (S, [f64; 3])>,
    ) -> Self {
        let sites = sites
            .into_iter()
            .enumerate()
            .map(|(id, (species, frac))| Site {
                id,
                species: species.into(),
                frac,
            })
            .collect();

        Structure {
            name: name.into(),
            lattice,
            sites,
        }
    }

    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn site_by_id(&self, id: usize) -> Option<&Site> {
        self.sites.iter().find(|s| s.id == id)
    }

    /// 按出现顺序列出不重复的元素
    pub fn species(&self) -> Vec<String> {
        let mut species: Vec<String> = Vec::new();
        for site in &self.sites {
            if !species.contains(&site.species) {
                species.push(site.species.clone());
            }
        }
        species
    }

    /// 元素 -> 原子数
    pub fn composition(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for site in &self.sites {
            *counts.entry(site.species.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// 化学式，形如 "Fe4 O1"（元素按字母排序，计数总是显式写出）
    pub fn formula(&self) -> String {
        self.composition()
            .into_iter()
            .map(|(el, count)| format!("{}{}", el, count))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 按元素符号稳定排序格点
    pub fn sort_by_species(&mut self) {
        self.sites.sort_by(|a, b| a.species.cmp(&b.species));
    }
}
