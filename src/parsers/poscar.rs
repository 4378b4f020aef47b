//! # VASP POSCAR 格式解析器
//!
//! 解析与生成 VASP POSCAR/CONTCAR 文件格式。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1               # atom positions
//! ...
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 被 `calc/backend/pseudo.rs` 用于写入 POSCAR、读取 CONTCAR
//! - 使用 `models/structure.rs`

use crate::error::{DftBatchError, Result};
use crate::models::{Lattice, Structure};
use std::fs;
use std::path::Path;

fn parse_error(name: &str, reason: impl Into<String>) -> DftBatchError {
    DftBatchError::ParseError {
        format: "poscar".to_string(),
        path: name.to_string(),
        reason: reason.into(),
    }
}

/// 解析 POSCAR/CONTCAR 文件
pub fn parse_poscar_file(path: &Path) -> Result<Structure> {
    let content = fs::read_to_string(path).map_err(|e| DftBatchError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_poscar_content(
        &content,
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown"),
    )
}

/// 从字符串内容解析 POSCAR 格式
pub fn parse_poscar_content(content: &str, default_name: &str) -> Result<Structure> {
    let lines: Vec<&str> = content.lines().collect();

    if lines.len() < 8 {
        return Err(parse_error(default_name, "File too short"));
    }

    // Line 0: Comment/name
    let name = lines[0].trim().to_string();
    let name = if name.is_empty() {
        default_name.to_string()
    } else {
        name
    };

    // Line 1: Scaling factor
    let scale: f64 = lines[1]
        .trim()
        .parse()
        .map_err(|_| parse_error(&name, "Invalid scaling factor"))?;

    // Lines 2-4: Lattice vectors
    let mut matrix = [[0.0; 3]; 3];
    for i in 0..3 {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(parse_error(
                &name,
                format!("Invalid lattice vector at line {}", 3 + i),
            ));
        }
        matrix[i] = [parts[0] * scale, parts[1] * scale, parts[2] * scale];
    }
    let lattice = Lattice::from_vectors(matrix);

    // Line 5: 元素符号 (VASP 5+)；VASP 4 没有元素行，无法确定元素，直接报错
    let elements: Vec<String> = lines[5].split_whitespace().map(str::to_string).collect();
    if elements.is_empty() || elements[0].parse::<usize>().is_ok() {
        return Err(parse_error(
            &name,
            "Missing element symbol line (VASP 4 format is not supported)",
        ));
    }
    let counts: Vec<usize> = lines[6]
        .split_whitespace()
        .map(|s| s.parse())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| parse_error(&name, "Invalid atom count line"))?;
    if counts.len() != elements.len() {
        return Err(parse_error(
            &name,
            format!(
                "{} element symbols but {} atom counts",
                elements.len(),
                counts.len()
            ),
        ));
    }

    // Check for "Selective dynamics" line
    let mut coord_line = 7;
    if lines[coord_line]
        .trim()
        .to_lowercase()
        .starts_with('s')
    {
        coord_line += 1;
    }

    if lines.len() <= coord_line {
        return Err(parse_error(&name, "Missing coordinate type line"));
    }

    let coord_type = lines[coord_line].trim().to_lowercase();
    let is_cartesian = coord_type.starts_with('c') || coord_type.starts_with('k');

    // Parse atom positions
    let mut sites: Vec<(String, [f64; 3])> = Vec::new();
    let mut line_idx = coord_line + 1;

    for (elem, &count) in elements.iter().zip(counts.iter()) {
        for _ in 0..count {
            let parts: Vec<f64> = lines
                .get(line_idx)
                .map(|l| {
                    l.split_whitespace()
                        .take(3)
                        .filter_map(|s| s.parse().ok())
                        .collect()
                })
                .unwrap_or_default();

            if parts.len() < 3 {
                return Err(parse_error(
                    &name,
                    format!("Invalid or missing position at line {}", line_idx + 1),
                ));
            }

            let position = if is_cartesian {
                let cart = [parts[0] * scale, parts[1] * scale, parts[2] * scale];
                lattice
                    .cart_to_frac(cart)
                    .ok_or_else(|| parse_error(&name, "Singular lattice matrix"))?
            } else {
                [parts[0], parts[1], parts[2]]
            };
            sites.push((elem.clone(), position));
            line_idx += 1;
        }
    }

    Ok(Structure::new(name, lattice, sites))
}

/// 相邻同种元素的分组 (元素, 个数)，与写出的元素行一致
pub fn species_groups(structure: &Structure) -> Vec<(&str, usize)> {
    let mut groups: Vec<(&str, usize)> = Vec::new();
    for site in &structure.sites {
        match groups.last_mut() {
            Some((elem, count)) if *elem == site.species => *count += 1,
            _ => groups.push((site.species.as_str(), 1)),
        }
    }
    groups
}

/// 将 Structure 转换为 POSCAR 格式字符串
///
/// 相邻的同种元素合并为一组，格点顺序保持不变。
pub fn to_poscar_string(structure: &Structure) -> String {
    let groups = species_groups(structure);

    let mut result = String::new();

    // Line 0: Comment
    let name = if structure.name.trim().is_empty() {
        "structure"
    } else {
        structure.name.trim()
    };
    result.push_str(&format!("{}\n", name));

    // Line 1: Scale
    result.push_str("1.0\n");

    // Lines 2-4: Lattice
    for row in &structure.lattice.matrix {
        result.push_str(&format!(
            "  {:20.14}  {:20.14}  {:20.14}\n",
            row[0], row[1], row[2]
        ));
    }

    // Line 5-6: Elements / counts
    let elements: Vec<&str> = groups.iter().map(|(e, _)| *e).collect();
    let counts: Vec<String> = groups.iter().map(|(_, n)| n.to_string()).collect();
    result.push_str(&format!("   {}\n", elements.join("   ")));
    result.push_str(&format!("   {}\n", counts.join("   ")));

    result.push_str("Direct\n");

    for site in &structure.sites {
        result.push_str(&format!(
            "  {:20.14}  {:20.14}  {:20.14}\n",
            site.frac[0], site.frac[1], site.frac[2]
        ));
    }

    result
}
