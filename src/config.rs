//! # 配置文件
//!
//! 可选的 TOML 配置文件，通过 `--config` 指定：
//!
//! ```toml
//! [calculator]
//! max-iterations = 300
//! xc = "PBE"
//! extra = { mode = "pw" }
//!
//! [backend]
//! python = "python3"
//! vasp-command = "vasp_std"
//! mpi-command = "mpirun -np 4"
//! work-dir = "dftbatch_work"
//! ```
//!
//! 命令行参数优先于配置文件中的值。
//!
//! ## 依赖关系
//! - 被 `commands/run.rs`, `commands/atomize.rs` 使用
//! - 使用 `serde`, `toml`

use crate::calc::BackendSettings;
use crate::error::{DftBatchError, Result};
use crate::models::CalculatorDefaults;

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub calculator: CalculatorDefaults,
    #[serde(default)]
    pub backend: BackendSettings,
}

/// 会覆盖配置文件的命令行参数
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_iterations: Option<u32>,
    pub xc: Option<String>,
    pub python: Option<String>,
    pub vasp_command: Option<String>,
    pub mpi_command: Option<String>,
    pub work_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| DftBatchError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content, path)
    }

    fn from_toml(content: &str, path: &Path) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).map_err(|e| DftBatchError::TomlError {
            path: path.display().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 有配置文件就读取，否则使用默认值
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.calculator.max_iterations == 0 {
            return Err(DftBatchError::ConfigError(
                "calculator.max-iterations must be positive".to_string(),
            ));
        }
        if self.calculator.xc.trim().is_empty() {
            return Err(DftBatchError::ConfigError(
                "calculator.xc must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// 用命令行参数覆盖
    pub fn merge(mut self, overrides: ConfigOverrides) -> Result<Self> {
        if let Some(n) = overrides.max_iterations {
            self.calculator.max_iterations = n;
        }
        if let Some(xc) = overrides.xc {
            self.calculator.xc = xc;
        }
        if let Some(python) = overrides.python {
            self.backend.python = python;
        }
        if let Some(cmd) = overrides.vasp_command {
            self.backend.vasp_command = cmd;
        }
        if overrides.mpi_command.is_some() {
            self.backend.mpi_command = overrides.mpi_command;
        }
        if let Some(dir) = overrides.work_dir {
            self.backend.work_dir = dir;
        }
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_file() {
        let content = r#"
[calculator]
max-iterations = 120
xc = "PBEsol"
extra = { encut = "520" }

[backend]
vasp-command = "vasp_gam"
work-dir = "/scratch/runs"
"#;
        let config = AppConfig::from_toml(content, Path::new("dftbatch.toml")).unwrap();
        assert_eq!(config.calculator.max_iterations, 120);
        assert_eq!(config.calculator.xc, "PBEsol");
        assert_eq!(config.calculator.extra["encut"], "520");
        assert_eq!(config.backend.vasp_command, "vasp_gam");
        assert_eq!(config.backend.work_dir, PathBuf::from("/scratch/runs"));
        assert_eq!(config.backend.python, "python3");
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AppConfig::from_toml("", Path::new("empty.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = AppConfig::from_toml("[calculator]\nmaxiter = 3\n", Path::new("bad.toml"))
            .unwrap_err();
        assert!(matches!(err, DftBatchError::TomlError { .. }));
    }

    #[test]
    fn test_cli_overrides_file() {
        let config = AppConfig::default()
            .merge(ConfigOverrides {
                max_iterations: Some(50),
                mpi_command: Some("srun".to_string()),
                ..ConfigOverrides::default()
            })
            .unwrap();
        assert_eq!(config.calculator.max_iterations, 50);
        assert_eq!(config.calculator.xc, "PBE");
        assert_eq!(config.backend.mpi_command.as_deref(), Some("srun"));

        assert!(AppConfig::default()
            .merge(ConfigOverrides {
                max_iterations: Some(0),
                ..ConfigOverrides::default()
            })
            .is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dftbatch.toml");
        std::fs::write(&path, "[calculator]\nxc = \"LDA\"\n").unwrap();

        assert_eq!(AppConfig::load(Some(&path)).unwrap().calculator.xc, "LDA");
        assert!(matches!(
            AppConfig::load(Some(&dir.path().join("missing.toml"))),
            Err(DftBatchError::FileReadError { .. })
        ));
    }
}
