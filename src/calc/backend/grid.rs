//! # GPAW 后端
//!
//! 在结构的工作目录中写入 extended XYZ 几何与一个 ASE/GPAW 驱动脚本，
//! 用配置的 Python 解释器运行脚本，从标准输出读取 `key=value` 结果行。
//!
//! 驱动脚本输出约定：
//! - `UNCONVERGED`：自洽迭代在上限内未收敛
//! - `initial_energy=<eV>`：弛豫前能量（仅弛豫时）
//! - `total_energy=<eV>`：最终能量
//!
//! 弛豫后的结构由脚本写为 `CONTCAR`。
//!
//! ## 依赖关系
//! - 被 `calc/backend/mod.rs` 使用
//! - 使用 `parsers/xyz.rs` 写出几何，`parsers/poscar.rs` 读取弛豫结构

use super::{
    find_executable, prepare_work_dir, run_program, tail, write_input, BackendSettings,
    CalculationBackend, NativeCell,
};
use crate::models::{
    BackendErrorKind, BackendKind, CalculationResult, CalculatorConfig, Energies, Relaxation,
    Structure,
};
use crate::parsers::{poscar, xyz};

use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

const GEOMETRY_FILE: &str = "structure.xyz";
const SCRIPT_FILE: &str = "run_gpaw.py";
const RELAXED_FILE: &str = "CONTCAR";

/// GPAW 后端
pub struct GridBackend {
    python: String,
    work_dir: PathBuf,
    availability: std::result::Result<(), String>,
}

impl GridBackend {
    pub fn new(settings: &BackendSettings) -> Self {
        let availability = probe(&settings.python);
        if let Err(reason) = &availability {
            debug!("GPAW backend unavailable: {}", reason);
        }
        GridBackend {
            python: settings.python.clone(),
            work_dir: settings.work_dir.clone(),
            availability,
        }
    }
}

/// 解释器存在且能导入 gpaw
fn probe(python: &str) -> std::result::Result<(), String> {
    if find_executable(python).is_none() {
        return Err(format!("python interpreter '{}' not found in PATH", python));
    }
    match Command::new(python).args(["-c", "import gpaw"]).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(format!("GPAW is not importable by '{}'", python)),
        Err(e) => Err(format!("cannot run '{}': {}", python, e)),
    }
}

/// 额外选项作为 GPAW 关键字参数：数字和布尔值原样，其余作为字符串
fn python_literal(value: &str) -> String {
    match value {
        "True" | "False" | "None" => value.to_string(),
        "true" => "True".to_string(),
        "false" => "False".to_string(),
        _ if value.parse::<f64>().is_ok() => value.to_string(),
        _ => format!("{:?}", value),
    }
}

fn format_kwargs(extra: &BTreeMap<String, String>) -> String {
    extra
        .iter()
        .map(|(k, v)| format!(", {}={}", k, python_literal(v)))
        .collect()
}

/// 生成驱动脚本
pub fn driver_script(
    geometry: &Path,
    relaxed: &Path,
    config: &CalculatorConfig,
    relaxation: Relaxation,
) -> String {
    let txt = match &config.txt_output {
        Some(path) => format!("{:?}", path.display().to_string()),
        None => "None".to_string(),
    };
    let k = config.kpoints.0;

    let mut script = format!(
        r#"import sys
from ase.io import read, write
from gpaw import GPAW, KohnShamConvergenceError

atoms = read({geometry:?})
atoms.calc = GPAW(maxiter={maxiter}, xc={xc:?}, kpts={{"size": ({k0}, {k1}, {k2})}}, txt={txt}{extra})
try:
"#,
        geometry = geometry.display().to_string(),
        maxiter = config.max_iterations,
        xc = config.xc,
        k0 = k[0],
        k1 = k[1],
        k2 = k[2],
        txt = txt,
        extra = format_kwargs(&config.extra),
    );

    if let Relaxation::Relax(steps) = relaxation {
        script.push_str(&format!(
            r#"    from ase.optimize import QuasiNewton
    print("initial_energy=%.10f" % float(atoms.get_potential_energy()))
    QuasiNewton(atoms, logfile=None).run(steps={steps})
    write({relaxed:?}, atoms, format="vasp", direct=True)
"#,
            steps = steps,
            relaxed = relaxed.display().to_string(),
        ));
    }

    script.push_str(
        r#"    print("total_energy=%.10f" % float(atoms.get_potential_energy()))
except KohnShamConvergenceError:
    print("UNCONVERGED")
    sys.exit(0)
"#,
    );
    script
}

/// 驱动脚本标准输出的解析结果
#[derive(Debug, Default, PartialEq)]
pub struct DriverOutput {
    pub unconverged: bool,
    pub initial_energy: Option<f64>,
    pub total_energy: Option<f64>,
}

pub fn parse_driver_output(stdout: &str) -> DriverOutput {
    let mut out = DriverOutput::default();
    for line in stdout.lines().map(str::trim) {
        if line == "UNCONVERGED" {
            out.unconverged = true;
        } else if let Some(v) = line.strip_prefix("initial_energy=") {
            out.initial_energy = v.trim().parse().ok();
        } else if let Some(v) = line.strip_prefix("total_energy=") {
            out.total_energy = v.trim().parse().ok();
        }
    }
    out
}

impl GridBackend {
    fn run(
        &self,
        name: &str,
        structure: &Structure,
        config: &CalculatorConfig,
        relaxation: Relaxation,
    ) -> std::result::Result<CalculationResult, BackendErrorKind> {
        let dir = prepare_work_dir(&self.work_dir, name)?;
        let geometry = dir.join(GEOMETRY_FILE);
        let relaxed = dir.join(RELAXED_FILE);

        // 脚本在工作目录中运行，相对的日志路径需要先转为绝对路径
        let mut config = config.clone();
        if let Some(txt) = config.txt_output.as_mut() {
            if txt.is_relative() {
                if let Ok(cwd) = std::env::current_dir() {
                    *txt = cwd.join(&*txt);
                }
            }
        }

        write_input(&dir, GEOMETRY_FILE, &xyz::to_extxyz_string(structure))?;
        write_input(
            &dir,
            SCRIPT_FILE,
            &driver_script(&geometry, &relaxed, &config, relaxation),
        )?;

        let output = run_program(&self.python, &[SCRIPT_FILE], &dir)?;
        let parsed = parse_driver_output(&String::from_utf8_lossy(&output.stdout));

        if parsed.unconverged {
            return Ok(CalculationResult::Unconverged);
        }
        if !output.status.success() {
            return Err(BackendErrorKind::ExecutionFailed(format!(
                "{} exited with {}\n{}",
                self.python,
                output.status,
                tail(&output.stderr, 10)
            )));
        }

        let total_energy = parsed.total_energy.ok_or_else(|| {
            BackendErrorKind::OutputUnreadable("no total_energy line in driver output".to_string())
        })?;

        let relaxed_structure = match relaxation {
            Relaxation::NoRelaxation => None,
            Relaxation::Relax(_) => match poscar::parse_poscar_file(&relaxed) {
                Ok(mut s) => {
                    s.name = name.to_string();
                    Some(s)
                }
                Err(e) => {
                    warn!("Relaxed geometry of '{}' unreadable: {}", name, e);
                    None
                }
            },
        };

        Ok(CalculationResult::Success(Energies {
            total_energy,
            initial_energy: parsed.initial_energy,
            relaxed_structure,
        }))
    }
}

impl CalculationBackend for GridBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Grid
    }

    fn availability(&self) -> std::result::Result<(), String> {
        self.availability.clone()
    }

    fn compute(
        &self,
        name: &str,
        structure: &Structure,
        config: &CalculatorConfig,
        relaxation: Relaxation,
        _input_path: Option<&Path>,
    ) -> CalculationResult {
        if let Err(reason) = &self.availability {
            return CalculationResult::Error(BackendErrorKind::BackendUnavailable(reason.clone()));
        }
        if let Err(reason) = NativeCell::from_structure(structure) {
            return CalculationResult::InvalidStructure(reason.to_string());
        }

        self.run(name, structure, config, relaxation)
            .unwrap_or_else(CalculationResult::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KpointMesh, Lattice};

    fn config() -> CalculatorConfig {
        let mut extra = BTreeMap::new();
        extra.insert("mode".to_string(), "pw".to_string());
        extra.insert("h".to_string(), "0.2".to_string());
        CalculatorConfig {
            max_iterations: 300,
            xc: "PBE".to_string(),
            kpoints: KpointMesh::uniform(4),
            txt_output: Some(PathBuf::from("/tmp/logs/Fe.txt")),
            extra,
        }
    }

    #[test]
    fn test_driver_script_single_point() {
        let script = driver_script(
            Path::new("/w/structure.xyz"),
            Path::new("/w/CONTCAR"),
            &config(),
            Relaxation::NoRelaxation,
        );

        assert!(script.contains(r#"atoms = read("/w/structure.xyz")"#));
        assert!(script.contains(
            r#"GPAW(maxiter=300, xc="PBE", kpts={"size": (4, 4, 4)}, txt="/tmp/logs/Fe.txt", h=0.2, mode="pw")"#
        ));
        assert!(!script.contains("QuasiNewton"));
        assert!(script.contains("print(\"UNCONVERGED\")"));
    }

    #[test]
    fn test_driver_script_relaxation() {
        let script = driver_script(
            Path::new("/w/structure.xyz"),
            Path::new("/w/CONTCAR"),
            &config(),
            Relaxation::Relax(5),
        );
        assert!(script.contains("run(steps=5)"));
        assert!(script.contains(r#"write("/w/CONTCAR", atoms"#));
        assert!(script.contains("initial_energy="));
    }

    #[test]
    fn test_parse_driver_output() {
        let out = parse_driver_output("noise\ninitial_energy=-10.5\ntotal_energy=-12.25\n");
        assert_eq!(out.initial_energy, Some(-10.5));
        assert_eq!(out.total_energy, Some(-12.25));
        assert!(!out.unconverged);

        assert!(parse_driver_output("UNCONVERGED\n").unconverged);
    }

    #[test]
    fn test_driver_prints_plain_floats() {
        let script = driver_script(
            Path::new("/w/structure.xyz"),
            Path::new("/w/CONTCAR"),
            &config(),
            Relaxation::Relax(5),
        );
        // numpy 标量的 repr 形如 np.float64(-12.5)，必须先转成 float
        assert!(script.contains(r#"print("initial_energy=%.10f" % float(atoms.get_potential_energy()))"#));
        assert!(script.contains(r#"print("total_energy=%.10f" % float(atoms.get_potential_energy()))"#));
        assert!(!script.contains("%r"));

        let out = parse_driver_output("initial_energy=-12.2500000000\ntotal_energy=-12.5000000000\n");
        assert_eq!(out.initial_energy, Some(-12.25));
        assert_eq!(out.total_energy, Some(-12.5));

        let numpy_repr = parse_driver_output("total_energy=np.float64(-12.5)\n");
        assert_eq!(numpy_repr.total_energy, None);
    }

    #[test]
    fn test_unavailable_backend_reports_data() {
        let settings = BackendSettings {
            python: "no-such-python-interpreter-xyz".to_string(),
            ..BackendSettings::default()
        };
        let backend = GridBackend::new(&settings);
        assert!(backend.availability().is_err());

        let s = Structure::new("Fe", Lattice::cubic(2.87), vec![("Fe", [0.0; 3])]);
        let result = backend.compute("Fe", &s, &config(), Relaxation::NoRelaxation, None);
        assert_eq!(result.status(), "backend_unavailable");
    }
}
