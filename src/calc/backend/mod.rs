//! # DFT 计算后端
//!
//! 将单个结构交给外部 DFT 程序计算，并把各种结局统一为 `CalculationResult`。
//!
//! ## 后端
//! - `GridBackend`：通过 Python 驱动 ASE/GPAW
//! - `PseudopotentialBackend`：写入 VASP 输入文件并运行 VASP
//!
//! 后端在构造时探测运行环境；不可用时不会报错，而是在 `compute` 时返回
//! `Error(BackendUnavailable)`，批量中的其他结构照常处理。
//!
//! ## 依赖关系
//! - 被 `calc/orchestrator.rs`, `commands/run.rs`, `commands/atomize.rs` 使用
//! - 使用 `models/`, `parsers/`
//! - 子模块: grid, pseudo

pub mod grid;
pub mod pseudo;

pub use grid::GridBackend;
pub use pseudo::PseudopotentialBackend;

use crate::models::element::is_known_element;
use crate::models::{
    BackendErrorKind, BackendKind, CalculationResult, CalculatorConfig, Relaxation, Structure,
};

use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;

/// 计算后端接口
pub trait CalculationBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// 运行环境是否可用，不可用时给出原因
    fn availability(&self) -> std::result::Result<(), String>;

    /// 需要调用方提供的输入路径说明；None 表示不需要
    fn required_input(&self) -> Option<&'static str> {
        None
    }

    /// 计算单个结构，所有失败都以数据形式返回
    fn compute(
        &self,
        name: &str,
        structure: &Structure,
        config: &CalculatorConfig,
        relaxation: Relaxation,
        input_path: Option<&Path>,
    ) -> CalculationResult;
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_vasp_command() -> String {
    "vasp_std".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("dftbatch_work")
}

/// 后端运行设置（配置文件 `[backend]` 段）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BackendSettings {
    /// 用于 GPAW 的 Python 解释器
    #[serde(default = "default_python")]
    pub python: String,

    /// VASP 可执行命令（可带参数）
    #[serde(default = "default_vasp_command")]
    pub vasp_command: String,

    /// MPI 启动前缀，如 `mpirun -np 4`
    #[serde(default)]
    pub mpi_command: Option<String>,

    /// 每个结构在该目录下有独立的工作子目录
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings {
            python: default_python(),
            vasp_command: default_vasp_command(),
            mpi_command: None,
            work_dir: default_work_dir(),
        }
    }
}

/// 后端的封闭集合
pub enum Backend {
    Grid(GridBackend),
    Pseudopotential(PseudopotentialBackend),
}

impl Backend {
    /// 构造并探测所选后端
    pub fn new(kind: BackendKind, settings: &BackendSettings) -> Self {
        match kind {
            BackendKind::Grid => Backend::Grid(GridBackend::new(settings)),
            BackendKind::Pseudopotential => {
                Backend::Pseudopotential(PseudopotentialBackend::new(settings))
            }
        }
    }

    fn inner(&self) -> &dyn CalculationBackend {
        match self {
            Backend::Grid(b) => b,
            Backend::Pseudopotential(b) => b,
        }
    }
}

impl CalculationBackend for Backend {
    fn kind(&self) -> BackendKind {
        self.inner().kind()
    }

    fn availability(&self) -> std::result::Result<(), String> {
        self.inner().availability()
    }

    fn required_input(&self) -> Option<&'static str> {
        self.inner().required_input()
    }

    fn compute(
        &self,
        name: &str,
        structure: &Structure,
        config: &CalculatorConfig,
        relaxation: Relaxation,
        input_path: Option<&Path>,
    ) -> CalculationResult {
        self.inner()
            .compute(name, structure, config, relaxation, input_path)
    }
}

// ─────────────────────────────────────────────────────────────
// 结构校验
// ─────────────────────────────────────────────────────────────

/// 结构无法转换为外部程序输入的原因
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("structure has no sites")]
    NoSites,

    #[error("degenerate lattice")]
    DegenerateLattice,

    #[error("unknown species '{0}'")]
    UnknownSpecies(String),

    #[error("non-finite coordinates on site {0}")]
    NonFiniteCoordinates(usize),
}

/// 交给外部程序前校验过的结构
#[derive(Debug, Clone, PartialEq)]
pub struct NativeCell {
    pub lattice: [[f64; 3]; 3],
    pub species: Vec<String>,
    /// 笛卡尔坐标 (Å)
    pub positions: Vec<[f64; 3]>,
}

impl NativeCell {
    /// 校验并转换，失败原因用于 `InvalidStructure`
    pub fn from_structure(structure: &Structure) -> std::result::Result<Self, ConversionError> {
        if structure.sites.is_empty() {
            return Err(ConversionError::NoSites);
        }
        if !structure.lattice.is_non_degenerate() {
            return Err(ConversionError::DegenerateLattice);
        }

        let mut species = Vec::with_capacity(structure.num_sites());
        let mut positions = Vec::with_capacity(structure.num_sites());
        for site in &structure.sites {
            if !is_known_element(&site.species) {
                return Err(ConversionError::UnknownSpecies(site.species.clone()));
            }
            if site.frac.iter().any(|x| !x.is_finite()) {
                return Err(ConversionError::NonFiniteCoordinates(site.id));
            }
            species.push(site.species.clone());
            positions.push(structure.lattice.frac_to_cart(site.frac));
        }

        Ok(NativeCell {
            lattice: structure.lattice.matrix,
            species,
            positions,
        })
    }
}

// ─────────────────────────────────────────────────────────────
// 外部程序
// ─────────────────────────────────────────────────────────────

/// 在 PATH 中查找可执行文件；带路径分隔符的名称直接检查
pub fn find_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}

/// 运行外部程序并收集输出，启动失败归为 `ExecutionFailed`
pub(crate) fn run_program(
    program: &str,
    args: &[&str],
    work_dir: &Path,
) -> std::result::Result<Output, BackendErrorKind> {
    debug!("Running `{} {}` in {}", program, args.join(" "), work_dir.display());
    Command::new(program)
        .args(args)
        .current_dir(work_dir)
        .output()
        .map_err(|e| BackendErrorKind::ExecutionFailed(format!("{}: {}", program, e)))
}

/// 输出末尾几行，用于错误信息
pub(crate) fn tail(text: &[u8], lines: usize) -> String {
    let text = String::from_utf8_lossy(text);
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// 创建结构的工作目录（绝对路径）
pub(crate) fn prepare_work_dir(root: &Path, name: &str) -> std::result::Result<PathBuf, BackendErrorKind> {
    let dir = root.join(name);
    fs::create_dir_all(&dir).map_err(|e| {
        BackendErrorKind::ExecutionFailed(format!("cannot create {}: {}", dir.display(), e))
    })?;
    dir.canonicalize().map_err(|e| {
        BackendErrorKind::ExecutionFailed(format!("cannot resolve {}: {}", dir.display(), e))
    })
}

pub(crate) fn write_input(dir: &Path, file: &str, content: &str) -> std::result::Result<(), BackendErrorKind> {
    let path = dir.join(file);
    fs::write(&path, content).map_err(|e| {
        BackendErrorKind::ExecutionFailed(format!("cannot write {}: {}", path.display(), e))
    })
}
