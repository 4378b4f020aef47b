//! # 解析器模块
//!
//! 提供结构文件的读取与写出。
//!
//! ## 支持格式
//! - POSCAR / CONTCAR (VASP)
//! - .cell (CASTEP，仅读取)
//! - .json (`Structure` 的 serde 表示，无损)
//! - extended XYZ（仅写出，供网格后端使用）
//!
//! ## 依赖关系
//! - 被 `commands/`, `calc/`, `model_gen/` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: poscar, cell, xyz

pub mod cell;
pub mod poscar;
pub mod xyz;

use crate::error::{DftBatchError, Result};
use crate::models::Structure;
use std::fs;
use std::path::{Path, PathBuf};

/// 结构文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormat {
    Poscar,
    Cell,
    Json,
}

impl StructureFormat {
    /// 按名称选择格式，未知名称总是报错
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "poscar" | "contcar" | "vasp" => Ok(StructureFormat::Poscar),
            "cell" | "castep" => Ok(StructureFormat::Cell),
            "json" => Ok(StructureFormat::Json),
            other => Err(DftBatchError::UnsupportedFormat(other.to_string())),
        }
    }

    /// 从文件路径推断格式
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "cell" => Ok(StructureFormat::Cell),
            "json" => Ok(StructureFormat::Json),
            "vasp" | "poscar" => Ok(StructureFormat::Poscar),
            _ => {
                // 可能是 POSCAR/CONTCAR (无扩展名或带后缀)
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if name.starts_with("POSCAR") || name.starts_with("CONTCAR") {
                        return Ok(StructureFormat::Poscar);
                    }
                }
                Err(DftBatchError::UnsupportedFormat(format!(
                    "Cannot determine format for: {}",
                    path.display()
                )))
            }
        }
    }
}

impl std::fmt::Display for StructureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructureFormat::Poscar => write!(f, "poscar"),
            StructureFormat::Cell => write!(f, "cell"),
            StructureFormat::Json => write!(f, "json"),
        }
    }
}

/// 按指定格式读取结构文件
pub fn read_structure(path: &Path, format: StructureFormat) -> Result<Structure> {
    match format {
        StructureFormat::Poscar => poscar::parse_poscar_file(path),
        StructureFormat::Cell => cell::parse_cell_file(path),
        StructureFormat::Json => {
            let content = fs::read_to_string(path).map_err(|e| DftBatchError::FileReadError {
                path: path.display().to_string(),
                source: e,
            })?;
            serde_json::from_str(&content).map_err(|e| DftBatchError::ParseError {
                format: "json".to_string(),
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        }
    }
}

/// 从文件路径推断格式并解析
pub fn parse_structure_file(path: &Path) -> Result<Structure> {
    read_structure(path, StructureFormat::detect(path)?)
}

/// 将结构转换为指定格式的字符串
pub fn to_format_string(structure: &Structure, format: StructureFormat) -> Result<String> {
    match format {
        StructureFormat::Poscar => Ok(poscar::to_poscar_string(structure)),
        StructureFormat::Cell => Err(DftBatchError::UnsupportedFormat(
            "cell (read-only; write POSCAR or JSON instead)".to_string(),
        )),
        StructureFormat::Json => Ok(serde_json::to_string_pretty(structure)?),
    }
}

/// 写出结构文件
pub fn write_structure(structure: &Structure, path: &Path, format: StructureFormat) -> Result<()> {
    let content = to_format_string(structure, format)?;
    fs::write(path, content).map_err(|e| DftBatchError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 导出 POSCAR 到 `dir`，文件名为 `POSCAR_<name>[_modified]`，
/// 或使用调用方指定的文件名
pub fn export_poscar(
    structure: &Structure,
    dir: &Path,
    name: &str,
    modified: bool,
    filename: Option<&str>,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| DftBatchError::FileWriteError {
        path: dir.display().to_string(),
        source: e,
    })?;

    let filename = match filename {
        Some(f) => f.to_string(),
        None if modified => format!("POSCAR_{}_modified", name),
        None => format!("POSCAR_{}", name),
    };
    let path = dir.join(filename);
    write_structure(structure, &path, StructureFormat::Poscar)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lattice;

    #[test]
    fn test_format_from_name() {
        assert_eq!(
            StructureFormat::from_name("POSCAR").unwrap(),
            StructureFormat::Poscar
        );
        assert_eq!(
            StructureFormat::from_name("cell").unwrap(),
            StructureFormat::Cell
        );
        assert!(matches!(
            StructureFormat::from_name("cif"),
            Err(DftBatchError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            StructureFormat::detect(Path::new("dir/POSCAR_Fe4O")).unwrap(),
            StructureFormat::Poscar
        );
        assert_eq!(
            StructureFormat::detect(Path::new("a.cell")).unwrap(),
            StructureFormat::Cell
        );
        assert!(StructureFormat::detect(Path::new("a.res")).is_err());
    }

    #[test]
    fn test_export_poscar_naming() {
        let dir = tempfile::tempdir().unwrap();
        let structure = Structure::new("Fe", Lattice::cubic(2.87), vec![("Fe", [0.0, 0.0, 0.0])]);

        let modified = export_poscar(&structure, dir.path(), "Fe", true, None).unwrap();
        let plain = export_poscar(&structure, dir.path(), "Fe", false, None).unwrap();
        let custom = export_poscar(&structure, dir.path(), "Fe", false, Some("POSCAR7")).unwrap();

        assert!(modified.ends_with("POSCAR_Fe_modified"));
        assert!(plain.ends_with("POSCAR_Fe"));
        assert!(custom.ends_with("POSCAR7"));
        assert_eq!(parse_structure_file(&plain).unwrap().num_sites(), 1);
    }

    #[test]
    fn test_json_file_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let structure = Structure::new(
            "odd",
            Lattice::from_parameters(3.1, 4.2, 5.3, 81.0, 97.0, 113.0),
            vec![("Fe", [0.123456789012345, -0.2, 1.7]), ("O", [0.1, 0.2, 0.3])],
        );

        write_structure(&structure, &path, StructureFormat::Json).unwrap();
        assert_eq!(parse_structure_file(&path).unwrap(), structure);
    }

    #[test]
    fn test_cell_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Fe.cell");
        let structure = Structure::new("Fe", Lattice::cubic(2.87), vec![("Fe", [0.0, 0.0, 0.0])]);

        assert!(matches!(
            write_structure(&structure, &path, StructureFormat::Cell),
            Err(DftBatchError::UnsupportedFormat(_))
        ));
        assert!(!path.exists());
    }
}
