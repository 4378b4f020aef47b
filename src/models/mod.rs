//! # 数据模型模块
//!
//! 定义统一的晶体结构、计算配置与计算结果数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `model_gen/`, `calc/`, `commands/` 使用
//! - 子模块: element, structure, calculation, results

pub mod calculation;
pub mod element;
pub mod results;
pub mod structure;

pub use calculation::{
    BackendErrorKind, BackendKind, CalculationResult, CalculatorConfig, CalculatorDefaults,
    Energies, KpointMesh, Relaxation,
};
pub use results::{AtomizationEnergies, AtomizationError, ResultRecord, ResultsTable};
pub use structure::{CellParameters, Lattice, Structure};
