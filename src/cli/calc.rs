//! # run / atomize 子命令 CLI 定义
//!
//! 两个子命令共用后端与计算配置参数 (`CalcOptions`)。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/run.rs`, `commands/atomize.rs`

use crate::models::BackendKind;
use clap::Args;
use std::path::PathBuf;

/// 解析后端名称
fn parse_backend(name: &str) -> Result<BackendKind, String> {
    BackendKind::from_name(name)
        .ok_or_else(|| format!("Unknown backend '{}'. Use gpaw or vasp", name))
}

/// 后端与计算配置参数
#[derive(Args, Debug, Clone)]
pub struct CalcOptions {
    /// DFT program used for every structure: gpaw (grid) or vasp (pseudopotential, needs --potcar-dir)
    #[arg(short, long, value_parser = parse_backend, default_value = "gpaw")]
    pub backend: BackendKind,

    /// TOML configuration file ([calculator] and [backend] tables)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding <species>/POTCAR files (VASP)
    #[arg(long, env = "DFTBATCH_POTCAR_DIR")]
    pub potcar_dir: Option<PathBuf>,

    /// Structural relaxation steps (0 or 1 = single point)
    #[arg(long, default_value_t = 0)]
    pub relax_steps: u32,

    /// Write per-structure text logs into this directory
    #[arg(long)]
    pub txt_dir: Option<PathBuf>,

    /// Number of structures computed at once (0 = all cores)
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Do not draw the progress bar
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,

    /// Maximum SCF iterations (overrides the config file)
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Exchange-correlation functional (overrides the config file)
    #[arg(long)]
    pub xc: Option<String>,

    /// Python interpreter with GPAW installed (overrides the config file)
    #[arg(long)]
    pub python: Option<String>,

    /// VASP executable (overrides the config file)
    #[arg(long)]
    pub vasp_command: Option<String>,

    /// MPI launcher prefix, e.g. "mpirun -np 4" (overrides the config file)
    #[arg(long)]
    pub mpi_command: Option<String>,

    /// Root of the per-structure working directories (overrides the config file)
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
}

/// run 子命令参数
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Structure file or directory of structure files
    pub input: PathBuf,

    /// Glob pattern for input files (directory input)
    #[arg(short, long, default_value = "POSCAR*,*.cell,*.json")]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Results CSV file
    #[arg(short, long, default_value = "results.csv")]
    pub output: PathBuf,

    #[command(flatten)]
    pub calc: CalcOptions,
}

/// atomize 子命令参数
#[derive(Args, Debug)]
pub struct AtomizeArgs {
    /// Structure file or directory (ignored with --results)
    pub input: Option<PathBuf>,

    /// Reuse a results CSV written by `run` instead of calculating the batch
    #[arg(long, conflicts_with = "input")]
    pub results: Option<PathBuf>,

    /// Directory holding <species>/POSCAR reference structures
    #[arg(long)]
    pub reference_dir: PathBuf,

    /// Glob pattern for input files (directory input)
    #[arg(short, long, default_value = "POSCAR*,*.cell,*.json")]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Results CSV file with atomization energies
    #[arg(short, long, default_value = "atomization.csv")]
    pub output: PathBuf,

    /// Also write the reference results to this CSV file
    #[arg(long)]
    pub reference_output: Option<PathBuf>,

    #[command(flatten)]
    pub calc: CalcOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend() {
        assert_eq!(parse_backend("VASP"), Ok(BackendKind::Pseudopotential));
        assert_eq!(parse_backend("grid"), Ok(BackendKind::Grid));
        assert!(parse_backend("castep").is_err());
    }
}
