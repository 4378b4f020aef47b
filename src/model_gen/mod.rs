//! # 模型生成模块
//!
//! 随机扰动晶体结构以生成采样构型（"模型"）。
//!
//! ## 依赖关系
//! - 被 `commands/generate.rs`, `commands/analyze.rs` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: perturber, supercell, constraints, analyser

pub mod analyser;
pub mod constraints;
pub mod perturber;
pub mod supercell;

pub use constraints::CellBounds;
pub use perturber::{StructurePerturber, UnsymmetricOptions};
