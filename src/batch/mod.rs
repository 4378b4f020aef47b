//! # 批量输入模块
//!
//! 把文件或目录输入整理为命名结构批次。
//!
//! ## 依赖关系
//! - 被各命令模块使用
//! - 使用 `walkdir`, `glob`

pub mod collector;

pub use collector::FileCollector;
