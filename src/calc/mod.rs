//! # 计算调度模块
//!
//! 把一批结构映射到各自的计算配置，交给外部 DFT 程序，
//! 并把结果统一整理为结果表，最后可做原子化能后处理。
//!
//! ## 依赖关系
//! - 被 `commands/run.rs`, `commands/atomize.rs` 使用
//! - 使用 `models/`, `parsers/`, `utils/progress.rs`
//! - 子模块: policy, backend, orchestrator, atomization

pub mod atomization;
pub mod backend;
pub mod orchestrator;
pub mod policy;

pub use backend::{Backend, BackendSettings, CalculationBackend};
pub use orchestrator::BatchOrchestrator;
pub use policy::CalculatorPolicy;
