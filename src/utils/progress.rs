//! # 进度条工具
//!
//! 封装 `indicatif` 提供统一的进度条样式。
//!
//! ## 依赖关系
//! - 被 `commands/generate.rs`, `calc/orchestrator.rs` 使用
//! - 使用 `indicatif` crate

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// 创建标准进度条
pub fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// 批量计算进度条：消息显示当前结构名，单个结构可能要跑很久，
/// 所以 spinner 持续转动；`visible == false` 时不绘制
pub fn create_batch_bar(len: u64, visible: bool) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if !visible {
        pb.set_draw_target(ProgressDrawTarget::hidden());
        return pb;
    }
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(200));
    pb
}
