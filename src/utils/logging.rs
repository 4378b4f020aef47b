//! # 日志初始化
//!
//! 库内诊断信息走 `log` 门面，由 `env_logger` 输出到 stderr。
//! 默认只显示警告；`-v` 显示每个结构的计算结局，`-vv` 显示外部命令，
//! 设置了 `RUST_LOG` 时以环境变量为准。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `log`, `env_logger`

use log::LevelFilter;

/// 命令行 verbosity 对应的日志级别
pub fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Off;
    }
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// 初始化全局日志；重复调用时静默忽略
pub fn setup_logging(verbosity: u8, quiet: bool) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level_for(verbosity, quiet))
        .format_target(false)
        .format_timestamp(None);

    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }

    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for(0, false), LevelFilter::Warn);
        assert_eq!(level_for(1, false), LevelFilter::Info);
        assert_eq!(level_for(2, false), LevelFilter::Debug);
        assert_eq!(level_for(7, false), LevelFilter::Trace);
        assert_eq!(level_for(3, true), LevelFilter::Off);
    }

    #[test]
    fn test_setup_twice_is_harmless() {
        setup_logging(1, false);
        setup_logging(2, false);
        log::info!("logger initialised");
    }
}
