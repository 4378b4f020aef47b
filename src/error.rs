//! # 统一错误处理模块
//!
//! 定义 dftbatch 的所有错误类型，使用 `thiserror` 派生。
//!
//! 单个结构的计算失败（不收敛、结构无效、后端不可用等）不属于这里的错误，
//! 它们作为数据记录在结果表中；这里只包含会中止整个调用的错误。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// dftbatch 统一错误类型
#[derive(Error, Debug)]
pub enum DftBatchError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    // ─────────────────────────────────────────────────────────────
    // 配置错误（在任何计算开始之前检测）
    // ─────────────────────────────────────────────────────────────
    #[error("Backend '{backend}' requires an input path ({what})")]
    MissingInputPath { backend: String, what: String },

    #[error("Duplicate structure name in batch: {0}")]
    DuplicateStructure(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Failed to parse config file: {path}")]
    TomlError {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    // ─────────────────────────────────────────────────────────────
    // CSV 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, DftBatchError>;
