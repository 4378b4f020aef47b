//! # VASP 后端
//!
//! 在结构的工作目录中写入 POSCAR / INCAR / KPOINTS / POTCAR，运行 VASP，
//! 从 OUTCAR 读取能量与收敛情况，从 CONTCAR 读取弛豫后的结构。
//!
//! POTCAR 由 `{potcar_dir}/{元素}/POTCAR` 按 POSCAR 元素行的顺序拼接而成，
//! 因此调用方必须提供 POTCAR 目录。
//!
//! ## 依赖关系
//! - 被 `calc/backend/mod.rs` 使用
//! - 使用 `parsers/poscar.rs`
//! - 使用 `regex` 解析 OUTCAR 中的电子步

use super::{
    find_executable, prepare_work_dir, run_program, tail, write_input, BackendSettings,
    CalculationBackend, NativeCell,
};
use crate::models::{
    BackendErrorKind, BackendKind, CalculationResult, CalculatorConfig, Energies, Relaxation,
    Structure,
};
use crate::parsers::poscar;

use log::{debug, warn};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// 电子步标记行 `Iteration  <离子步>( <电子步>)`
static ITERATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Iteration\s+(\d+)\s*\(\s*(\d+)\)").unwrap());

/// VASP 后端
pub struct PseudopotentialBackend {
    command: Vec<String>,
    work_dir: PathBuf,
    availability: std::result::Result<(), String>,
}

impl PseudopotentialBackend {
    pub fn new(settings: &BackendSettings) -> Self {
        let mut command: Vec<String> = settings
            .mpi_command
            .iter()
            .flat_map(|m| m.split_whitespace())
            .map(String::from)
            .collect();
        command.extend(settings.vasp_command.split_whitespace().map(String::from));

        let availability = probe(settings);
        if let Err(reason) = &availability {
            debug!("VASP backend unavailable: {}", reason);
        }

        PseudopotentialBackend {
            command,
            work_dir: settings.work_dir.clone(),
            availability,
        }
    }
}

fn probe(settings: &BackendSettings) -> std::result::Result<(), String> {
    let programs = settings
        .mpi_command
        .iter()
        .chain(std::iter::once(&settings.vasp_command))
        .filter_map(|cmd| cmd.split_whitespace().next());

    for program in programs {
        if find_executable(program).is_none() {
            return Err(format!("'{}' not found in PATH", program));
        }
    }
    if settings.vasp_command.trim().is_empty() {
        return Err("empty VASP command".to_string());
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────
// 输入文件
// ─────────────────────────────────────────────────────────────

/// 泛函名称对应的 INCAR `GGA` 标签；LDA 不写
fn gga_tag(xc: &str) -> Option<&'static str> {
    match xc.to_uppercase().as_str() {
        "PBE" => Some("PE"),
        "PBESOL" => Some("PS"),
        "RPBE" => Some("RP"),
        "REVPBE" => Some("RE"),
        "PW91" => Some("91"),
        _ => None,
    }
}

/// 生成 INCAR
pub fn incar_string(name: &str, config: &CalculatorConfig, relaxation: Relaxation) -> String {
    let mut lines = vec![
        format!("SYSTEM = {}", name),
        format!("NELM = {}", config.max_iterations),
    ];
    if let Some(tag) = gga_tag(&config.xc) {
        lines.push(format!("GGA = {}", tag));
    }
    match relaxation {
        Relaxation::NoRelaxation => {
            lines.push("IBRION = -1".to_string());
            lines.push("NSW = 0".to_string());
        }
        Relaxation::Relax(steps) => {
            lines.push("IBRION = 2".to_string());
            lines.push(format!("NSW = {}", steps));
        }
    }
    for (key, value) in &config.extra {
        lines.push(format!("{} = {}", key.to_uppercase(), value));
    }

    let mut result = lines.join("\n");
    result.push('\n');
    result
}

/// 生成 Gamma 中心的 KPOINTS
pub fn kpoints_string(config: &CalculatorConfig) -> String {
    let k = config.kpoints.0;
    format!(
        "Automatic mesh\n0\nGamma\n  {} {} {}\n  0 0 0\n",
        k[0], k[1], k[2]
    )
}

/// 按 POSCAR 元素行的顺序拼接 POTCAR
pub fn assemble_potcar(
    potcar_dir: &Path,
    structure: &Structure,
) -> std::result::Result<String, BackendErrorKind> {
    let mut potcar = String::new();
    for (species, _) in poscar::species_groups(structure) {
        let path = potcar_dir.join(species).join("POTCAR");
        let content = fs::read_to_string(&path).map_err(|e| {
            BackendErrorKind::ExecutionFailed(format!(
                "cannot read POTCAR for {} at {}: {}",
                species,
                path.display(),
                e
            ))
        })?;
        potcar.push_str(&content);
    }
    Ok(potcar)
}

// ─────────────────────────────────────────────────────────────
// OUTCAR
// ─────────────────────────────────────────────────────────────

/// OUTCAR 中提取的信息
#[derive(Debug, Default, PartialEq)]
pub struct OutcarSummary {
    /// 每个离子步结束时的 `free energy TOTEN`
    pub energies: Vec<f64>,
    /// 最后一个离子步用掉的电子步数
    pub last_electronic_steps: Option<u32>,
}

impl OutcarSummary {
    /// 最后一个离子步的电子步数达到上限即视为未收敛
    pub fn is_converged(&self, max_iterations: u32) -> bool {
        match self.last_electronic_steps {
            Some(n) => n < max_iterations,
            None => false,
        }
    }
}

pub fn parse_outcar_content(content: &str) -> OutcarSummary {
    let mut summary = OutcarSummary::default();
    for line in content.lines() {
        // "  free  energy   TOTEN  =       -34.38190505 eV"
        if line.contains("free  energy   TOTEN") {
            if let Some(val) = extract_number_before(line, "eV") {
                summary.energies.push(val);
            }
        } else if let Some(caps) = ITERATION.captures(line) {
            summary.last_electronic_steps = caps[2].parse().ok();
        }
    }
    summary
}

/// 从字符串中提取指定标记之前的数字
fn extract_number_before(s: &str, marker: &str) -> Option<f64> {
    let pos = s.find(marker)?;
    s[..pos].split_whitespace().last()?.parse().ok()
}

impl PseudopotentialBackend {
    fn run(
        &self,
        name: &str,
        structure: &Structure,
        config: &CalculatorConfig,
        relaxation: Relaxation,
        potcar_dir: &Path,
    ) -> std::result::Result<CalculationResult, BackendErrorKind> {
        let dir = prepare_work_dir(&self.work_dir, name)?;

        write_input(&dir, "POSCAR", &poscar::to_poscar_string(structure))?;
        write_input(&dir, "INCAR", &incar_string(name, config, relaxation))?;
        write_input(&dir, "KPOINTS", &kpoints_string(config))?;
        write_input(&dir, "POTCAR", &assemble_potcar(potcar_dir, structure)?)?;

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| BackendErrorKind::ExecutionFailed("empty VASP command".to_string()))?;
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = run_program(program, &args, &dir)?;

        if let Some(txt) = &config.txt_output {
            if let Err(e) = fs::write(txt, &output.stdout) {
                warn!("Cannot write text output {}: {}", txt.display(), e);
            }
        }

        if !output.status.success() {
            return Err(BackendErrorKind::ExecutionFailed(format!(
                "{} exited with {}\n{}",
                program,
                output.status,
                tail(&output.stderr, 10)
            )));
        }

        let outcar_path = dir.join("OUTCAR");
        let outcar = fs::read_to_string(&outcar_path).map_err(|e| {
            BackendErrorKind::OutputUnreadable(format!("{}: {}", outcar_path.display(), e))
        })?;
        let summary = parse_outcar_content(&outcar);

        if !summary.is_converged(config.max_iterations) {
            return Ok(CalculationResult::Unconverged);
        }
        let total_energy = *summary.energies.last().ok_or_else(|| {
            BackendErrorKind::OutputUnreadable("no TOTEN in OUTCAR".to_string())
        })?;

        let (initial_energy, relaxed_structure) = match relaxation {
            Relaxation::NoRelaxation => (None, None),
            Relaxation::Relax(_) => {
                let relaxed = match poscar::parse_poscar_file(&dir.join("CONTCAR")) {
                    Ok(mut s) => {
                        s.name = name.to_string();
                        Some(s)
                    }
                    Err(e) => {
                        warn!("CONTCAR of '{}' unreadable: {}", name, e);
                        None
                    }
                };
                (summary.energies.first().copied(), relaxed)
            }
        };

        Ok(CalculationResult::Success(Energies {
            total_energy,
            initial_energy,
            relaxed_structure,
        }))
    }
}

impl CalculationBackend for PseudopotentialBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Pseudopotential
    }

    fn availability(&self) -> std::result::Result<(), String> {
        self.availability.clone()
    }

    fn required_input(&self) -> Option<&'static str> {
        Some("directory of POTCAR files")
    }

    fn compute(
        &self,
        name: &str,
        structure: &Structure,
        config: &CalculatorConfig,
        relaxation: Relaxation,
        input_path: Option<&Path>,
    ) -> CalculationResult {
        if let Err(reason) = &self.availability {
            return CalculationResult::Error(BackendErrorKind::BackendUnavailable(reason.clone()));
        }
        if let Err(reason) = NativeCell::from_structure(structure) {
            return CalculationResult::InvalidStructure(reason.to_string());
        }
        let Some(potcar_dir) = input_path else {
            return CalculationResult::Error(BackendErrorKind::ExecutionFailed(
                "no POTCAR directory given".to_string(),
            ));
        };

        self.run(name, structure, config, relaxation, potcar_dir)
            .unwrap_or_else(CalculationResult::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KpointMesh, Lattice};
    use std::collections::BTreeMap;

    fn config() -> CalculatorConfig {
        let mut extra = BTreeMap::new();
        extra.insert("encut".to_string(), "520".to_string());
        CalculatorConfig {
            max_iterations: 60,
            xc: "PBE".to_string(),
            kpoints: KpointMesh::uniform(2),
            txt_output: None,
            extra,
        }
    }

    const OUTCAR: &str = "\
 ----------------------------------------- Iteration    1(   1)  ---------------------------------------
 ----------------------------------------- Iteration    1(  14)  ---------------------------------------
  free  energy   TOTEN  =       -34.10000000 eV
 ----------------------------------------- Iteration    2(   1)  ---------------------------------------
 ----------------------------------------- Iteration    2(   9)  ---------------------------------------
  free  energy   TOTEN  =       -34.38190505 eV
";

    #[test]
    fn test_incar() {
        let single = incar_string("Fe4O", &config(), Relaxation::NoRelaxation);
        assert!(single.contains("NELM = 60\n"));
        assert!(single.contains("GGA = PE\n"));
        assert!(single.contains("NSW = 0\n"));
        assert!(single.contains("ENCUT = 520\n"));

        let relax = incar_string("Fe4O", &config(), Relaxation::Relax(5));
        assert!(relax.contains("IBRION = 2\nNSW = 5\n"));
    }

    #[test]
    fn test_kpoints() {
        assert_eq!(
            kpoints_string(&config()),
            "Automatic mesh\n0\nGamma\n  2 2 2\n  0 0 0\n"
        );
    }

    #[test]
    fn test_parse_outcar() {
        let summary = parse_outcar_content(OUTCAR);
        assert_eq!(summary.energies, vec![-34.1, -34.38190505]);
        assert_eq!(summary.last_electronic_steps, Some(9));
        assert!(summary.is_converged(60));
        assert!(!summary.is_converged(9));
        assert!(!parse_outcar_content("").is_converged(60));
    }

    #[test]
    fn test_assemble_potcar_in_poscar_order() {
        let dir = tempfile::tempdir().unwrap();
        for species in ["Fe", "O"] {
            fs::create_dir_all(dir.path().join(species)).unwrap();
            fs::write(
                dir.path().join(species).join("POTCAR"),
                format!("PAW_PBE {}\n", species),
            )
            .unwrap();
        }
        let s = Structure::new(
            "FeO",
            Lattice::cubic(4.3),
            vec![("O", [0.5; 3]), ("Fe", [0.0; 3]), ("Fe", [0.5, 0.0, 0.0])],
        );

        assert_eq!(
            assemble_potcar(dir.path(), &s).unwrap(),
            "PAW_PBE O\nPAW_PBE Fe\n"
        );

        let missing = Structure::new("Al", Lattice::cubic(4.0), vec![("Al", [0.0; 3])]);
        assert!(matches!(
            assemble_potcar(dir.path(), &missing),
            Err(BackendErrorKind::ExecutionFailed(_))
        ));
    }

    #[test]
    fn test_command_includes_mpi_prefix() {
        let settings = BackendSettings {
            vasp_command: "no-such-vasp-xyz".to_string(),
            mpi_command: Some("mpirun -np 4".to_string()),
            ..BackendSettings::default()
        };
        let backend = PseudopotentialBackend::new(&settings);
        assert_eq!(backend.command, vec!["mpirun", "-np", "4", "no-such-vasp-xyz"]);
        assert!(backend.availability().is_err());
        assert_eq!(backend.required_input(), Some("directory of POTCAR files"));
    }
}
