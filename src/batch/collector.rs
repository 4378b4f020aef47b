//! # 结构文件收集器
//!
//! 根据输入路径和 glob 模式收集待计算的结构文件，并读入为命名结构批次。
//!
//! ## 功能
//! - 支持单文件和目录输入
//! - 逗号分隔的多个 glob 模式
//! - 可选递归搜索
//! - 结构名取自文件名（去掉 `POSCAR_` 前缀与扩展名）
//!
//! ## 依赖关系
//! - 被 `commands/run.rs`, `commands/atomize.rs`, `commands/analyze.rs` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配文件名
//! - 使用 `parsers/` 读取结构

use crate::error::{DftBatchError, Result};
use crate::models::Structure;
use crate::parsers;

use log::debug;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 结构文件收集器
pub struct FileCollector {
    /// 输入路径
    input: PathBuf,
    /// 匹配模式列表
    patterns: Vec<glob::Pattern>,
    /// 是否递归
    recursive: bool,
}

impl FileCollector {
    /// 创建新的文件收集器，默认匹配所有文件
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            patterns: Vec::new(),
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.patterns = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| {
                    DftBatchError::InvalidArgument(format!("Invalid pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<_>>()?;
        Ok(self)
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有匹配的文件（按路径排序）
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if self.input.is_file() {
            return Ok(vec![self.input.clone()]);
        }

        if !self.input.is_dir() {
            return Err(DftBatchError::FileNotFound {
                path: self.input.display().to_string(),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|entry| self.matches_patterns(entry.path()))
            .map(|e| e.path().to_path_buf())
            .collect();

        files.sort();
        Ok(files)
    }

    /// 检查文件名是否匹配任一模式；没有模式时全部匹配
    fn matches_patterns(&self, path: &Path) -> bool {
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };

        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(filename))
    }

    /// 收集并读取结构，返回 (名称, 结构) 批次
    pub fn load_structures(&self) -> Result<Vec<(String, Structure)>> {
        self.collect()?
            .iter()
            .map(|path| {
                let mut structure = parsers::parse_structure_file(path)?;
                let name = structure_name(path);
                debug!("Loaded '{}' ({} sites) from {}", name, structure.num_sites(), path.display());
                structure.name = name.clone();
                Ok((name, structure))
            })
            .collect()
    }
}

/// 由文件名推导结构名：`POSCAR_Fe4O` -> `Fe4O`，`Fe4O.cell` -> `Fe4O`
pub fn structure_name(path: &Path) -> String {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("structure");

    if let Some(rest) = file_name
        .strip_prefix("POSCAR_")
        .or_else(|| file_name.strip_prefix("CONTCAR_"))
    {
        if !rest.is_empty() {
            return rest.to_string();
        }
    }

    if matches!(file_name, "POSCAR" | "CONTCAR") {
        // 目录/POSCAR 形式用目录名
        if let Some(dir) = path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()) {
            return dir.to_string();
        }
    }

    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("structure")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const POSCAR: &str = "Fe\n1.0\n2.87 0 0\n0 2.87 0\n0 0 2.87\nFe\n1\nDirect\n0 0 0\n";

    #[test]
    fn test_structure_name() {
        assert_eq!(structure_name(Path::new("runs/POSCAR_Fe4O")), "Fe4O");
        assert_eq!(structure_name(Path::new("runs/POSCAR_Fe4O_3")), "Fe4O_3");
        assert_eq!(structure_name(Path::new("refs/Fe/POSCAR")), "Fe");
        assert_eq!(structure_name(Path::new("TiC.cell")), "TiC");
    }

    #[test]
    fn test_collect_with_patterns() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["POSCAR_a", "POSCAR_b", "notes.txt", "c.cell"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("POSCAR_d"), "").unwrap();

        let flat = FileCollector::new(dir.path().to_path_buf())
            .with_pattern("POSCAR*, *.cell")
            .unwrap()
            .collect()
            .unwrap();
        let names: Vec<String> = flat.iter().map(|p| structure_name(p)).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let deep = FileCollector::new(dir.path().to_path_buf())
            .with_pattern("POSCAR*")
            .unwrap()
            .recursive(true)
            .collect()
            .unwrap();
        assert_eq!(deep.len(), 3);
    }

    #[test]
    fn test_invalid_pattern_and_missing_input() {
        assert!(FileCollector::new(PathBuf::from("."))
            .with_pattern("[")
            .is_err());
        assert!(matches!(
            FileCollector::new(PathBuf::from("/no/such/input")).collect(),
            Err(DftBatchError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_load_structures_names_by_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("POSCAR_bcc"), POSCAR).unwrap();

        let batch = FileCollector::new(dir.path().to_path_buf())
            .load_structures()
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].0, "bcc");
        assert_eq!(batch[0].1.name, "bcc");
    }
}
