//! # generate 子命令 CLI 定义
//!
//! 从一个结构出发，随机扰动生成多个模型并写出 POSCAR。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/generate.rs`

use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// 扰动方式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum GenerateMode {
    /// Isotropic scaling of the whole cell (angles preserved)
    Symmetric,
    /// Cell length/shape, atom coordinate and atom swap perturbations
    Unsymmetric,
}

impl std::fmt::Display for GenerateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerateMode::Symmetric => write!(f, "symmetric"),
            GenerateMode::Unsymmetric => write!(f, "unsymmetric"),
        }
    }
}

/// generate 子命令参数
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Input structure file (POSCAR, .cell or .json)
    pub input: PathBuf,

    /// Input format (poscar, cell, json); detected from the file name by default
    #[arg(short, long)]
    pub format: Option<String>,

    /// Output directory for generated models
    #[arg(short, long, default_value = "models")]
    pub output: PathBuf,

    /// Structure name used in output file names (default: derived from the input file)
    #[arg(long)]
    pub name: Option<String>,

    /// Perturbation mode
    #[arg(short, long, value_enum, default_value = "unsymmetric")]
    pub mode: GenerateMode,

    /// Number of models to generate
    #[arg(short = 'n', long, default_value_t = 10)]
    pub count: usize,

    /// Random seed for reproducible models
    #[arg(long)]
    pub seed: Option<u64>,

    /// Expand to a supercell until it has at least this many sites
    #[arg(long)]
    pub min_sites: Option<usize>,

    // ─────────────────────────────────────────────────────────────
    // 晶胞扰动
    // ─────────────────────────────────────────────────────────────
    /// Lower bound of the relative cell change
    #[arg(long, default_value_t = -0.01, allow_hyphen_values = true)]
    pub cell_min: f64,

    /// Upper bound of the relative cell change
    #[arg(long, default_value_t = 0.01, allow_hyphen_values = true)]
    pub cell_max: f64,

    /// Keep the cell untouched (unsymmetric mode)
    #[arg(long, default_value_t = false)]
    pub no_cell: bool,

    /// Also change cell angles (unsymmetric mode)
    #[arg(long, default_value_t = false)]
    pub shape: bool,

    // ─────────────────────────────────────────────────────────────
    // 原子扰动
    // ─────────────────────────────────────────────────────────────
    /// Perturb fractional coordinates (unsymmetric mode)
    #[arg(long, default_value_t = false)]
    pub atoms: bool,

    /// Probability (%) that each coordinate is perturbed
    #[arg(long, default_value_t = 10.0)]
    pub atom_probability: f64,

    /// Lower bound of the fractional coordinate change
    #[arg(long, default_value_t = -0.01, allow_hyphen_values = true)]
    pub atom_min: f64,

    /// Upper bound of the fractional coordinate change
    #[arg(long, default_value_t = 0.01, allow_hyphen_values = true)]
    pub atom_max: f64,

    /// Swap species between random site pairs (unsymmetric mode)
    #[arg(long, default_value_t = false)]
    pub swap: bool,

    /// Number of swaps per model
    #[arg(long, default_value_t = 10)]
    pub swap_count: usize,

    /// Allow metal/non-metal swaps
    #[arg(long, default_value_t = false)]
    pub swap_any: bool,

    // ─────────────────────────────────────────────────────────────
    // 约束
    // ─────────────────────────────────────────────────────────────
    /// Open interval for a, b and c in Å, e.g. "3.0,4.0"
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub length_range: Option<Vec<f64>>,

    /// Open interval for alpha, beta and gamma in degrees, e.g. "85,95"
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub angle_range: Option<Vec<f64>>,

    /// Attempts per model before giving up on the constraints
    #[arg(long, default_value_t = 100)]
    pub max_retries: usize,
}
