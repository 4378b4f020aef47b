//! # DFT 计算配置与结果数据模型
//!
//! - `CalculatorDefaults`：不可变的全局默认配置
//! - `CalculatorConfig`：针对单个结构推导出的具体配置
//! - `Relaxation`：是否做结构弛豫
//! - `CalculationResult`：一次计算的统一结果
//!
//! ## 依赖关系
//! - 被 `calc/` 全部子模块使用
//! - 被 `models/results.rs`, `report.rs` 使用

use super::structure::Structure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// DFT 后端类型（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// 实空间网格 / 平面波代码 (GPAW)
    Grid,
    /// 赝势平面波代码 (VASP)
    Pseudopotential,
}

impl BackendKind {
    /// 按名称选择后端
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "gpaw" | "grid" => Some(BackendKind::Grid),
            "vasp" | "pseudopotential" => Some(BackendKind::Pseudopotential),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Grid => write!(f, "gpaw"),
            BackendKind::Pseudopotential => write!(f, "vasp"),
        }
    }
}

/// k 点网格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpointMesh(pub [u32; 3]);

impl KpointMesh {
    pub fn uniform(n: u32) -> Self {
        KpointMesh([n, n, n])
    }
}

impl std::fmt::Display for KpointMesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.0[0], self.0[1], self.0[2])
    }
}

fn default_max_iterations() -> u32 {
    300
}

fn default_xc() -> String {
    "PBE".to_string()
}

/// 全局默认计算配置，构造后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CalculatorDefaults {
    /// 自洽迭代上限
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// 交换关联泛函
    #[serde(default = "default_xc")]
    pub xc: String,

    /// 透传给后端的额外选项
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Default for CalculatorDefaults {
    fn default() -> Self {
        CalculatorDefaults {
            max_iterations: default_max_iterations(),
            xc: default_xc(),
            extra: BTreeMap::new(),
        }
    }
}

/// 单个结构的具体计算配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorConfig {
    pub max_iterations: u32,
    pub xc: String,
    pub kpoints: KpointMesh,
    /// 文本日志输出路径，None 表示不输出
    pub txt_output: Option<PathBuf>,
    pub extra: BTreeMap<String, String>,
}

/// 结构弛豫设置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relaxation {
    /// 只做单点能计算
    NoRelaxation,
    /// 弛豫指定步数后取能量
    Relax(u32),
}

impl Relaxation {
    /// 由 `--relax-steps` 转换：1 步表示单点能计算。
    ///
    /// 0 步（命令行默认值）同样按单点能处理，不会得到 `Relax(0)`；
    /// 只有 2 步及以上才弛豫。
    pub fn from_steps(steps: u32) -> Self {
        if steps <= 1 {
            Relaxation::NoRelaxation
        } else {
            Relaxation::Relax(steps)
        }
    }
}

/// 后端错误类别
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackendErrorKind {
    /// 运行环境中没有所选后端
    BackendUnavailable(String),
    /// 外部程序启动失败或非零退出
    ExecutionFailed(String),
    /// 外部程序运行结束但输出无法读取
    OutputUnreadable(String),
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendErrorKind::BackendUnavailable(msg) => write!(f, "backend unavailable: {}", msg),
            BackendErrorKind::ExecutionFailed(msg) => write!(f, "execution failed: {}", msg),
            BackendErrorKind::OutputUnreadable(msg) => write!(f, "output unreadable: {}", msg),
        }
    }
}

/// 成功计算得到的能量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Energies {
    /// 总能量 (eV)
    pub total_energy: f64,
    /// 弛豫前能量 (eV)
    pub initial_energy: Option<f64>,
    /// 弛豫后结构
    pub relaxed_structure: Option<Structure>,
}

/// 单个结构的计算结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CalculationResult {
    Success(Energies),
    Unconverged,
    InvalidStructure(String),
    Error(BackendErrorKind),
}

impl CalculationResult {
    pub fn success(total_energy: f64) -> Self {
        CalculationResult::Success(Energies {
            total_energy,
            initial_energy: None,
            relaxed_structure: None,
        })
    }

    /// 状态标签，用于报表
    pub fn status(&self) -> &'static str {
        match self {
            CalculationResult::Success(_) => "success",
            CalculationResult::Unconverged => "unconverged",
            CalculationResult::InvalidStructure(_) => "invalid_structure",
            CalculationResult::Error(BackendErrorKind::BackendUnavailable(_)) => {
                "backend_unavailable"
            }
            CalculationResult::Error(_) => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CalculationResult::Success(_))
    }

    pub fn energies(&self) -> Option<&Energies> {
        match self {
            CalculationResult::Success(e) => Some(e),
            _ => None,
        }
    }

    /// 失败原因（成功时为 None）
    pub fn error_message(&self) -> Option<String> {
        match self {
            CalculationResult::Success(_) => None,
            CalculationResult::Unconverged => Some("SCF did not converge".to_string()),
            CalculationResult::InvalidStructure(reason) => {
                Some(format!("invalid structure: {}", reason))
            }
            CalculationResult::Error(kind) => Some(kind.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relaxation_from_steps() {
        assert_eq!(Relaxation::from_steps(0), Relaxation::NoRelaxation);
        assert_eq!(Relaxation::from_steps(1), Relaxation::NoRelaxation);
        assert_eq!(Relaxation::from_steps(5), Relaxation::Relax(5));
    }

    #[test]
    fn test_zero_steps_means_single_point() {
        // 默认值 0 不会生成 Relax(0)
        assert_eq!(Relaxation::from_steps(0), Relaxation::NoRelaxation);
        assert_ne!(Relaxation::from_steps(0), Relaxation::Relax(0));
        assert_eq!(Relaxation::from_steps(2), Relaxation::Relax(2));
    }

    #[test]
    fn test_backend_kind_by_name() {
        assert_eq!(BackendKind::from_name("GPAW"), Some(BackendKind::Grid));
        assert_eq!(
            BackendKind::from_name("vasp"),
            Some(BackendKind::Pseudopotential)
        );
        assert_eq!(BackendKind::from_name("castep"), None);
    }

    #[test]
    fn test_result_status() {
        assert_eq!(CalculationResult::success(-1.0).status(), "success");
        assert_eq!(CalculationResult::Unconverged.status(), "unconverged");
        assert_eq!(
            CalculationResult::Error(BackendErrorKind::BackendUnavailable("gpaw".into())).status(),
            "backend_unavailable"
        );
        assert!(CalculationResult::success(-1.0).error_message().is_none());
    }

    #[test]
    fn test_defaults_from_toml() {
        let defaults: CalculatorDefaults = toml::from_str(
            r#"
max-iterations = 120
[extra]
mode = "pw"
"#,
        )
        .unwrap();

        assert_eq!(defaults.max_iterations, 120);
        assert_eq!(defaults.xc, "PBE");
        assert_eq!(defaults.extra["mode"], "pw");
    }
}
