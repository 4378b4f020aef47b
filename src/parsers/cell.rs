//! # CASTEP .cell 格式解析器
//!
//! 解析与生成 CASTEP 输入文件 .cell 格式。
//!
//! ## .cell 格式说明
//! ```text
//! %BLOCK LATTICE_CART
//! ang
//! a1 a2 a3
//! b1 b2 b3
//! c1 c2 c3
//! %ENDBLOCK LATTICE_CART
//!
//! %BLOCK POSITIONS_FRAC
//! Element x y z
//! ...
//! %ENDBLOCK POSITIONS_FRAC
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{DftBatchError, Result};
use crate::models::{Lattice, Structure};
use std::fs;
use std::path::Path;

const BOHR_TO_ANGSTROM: f64 = 0.529_177_210_903;

fn parse_error(name: &str, reason: impl Into<String>) -> DftBatchError {
    DftBatchError::ParseError {
        format: "cell".to_string(),
        path: name.to_string(),
        reason: reason.into(),
    }
}

/// 解析 .cell 文件
pub fn parse_cell_file(path: &Path) -> Result<Structure> {
    let content = fs::read_to_string(path).map_err(|e| DftBatchError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_cell_content(
        &content,
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown"),
    )
}

/// 从字符串内容解析 .cell 格式
pub fn parse_cell_content(content: &str, default_name: &str) -> Result<Structure> {
    let lines: Vec<&str> = content.lines().collect();

    let lattice = if let Some(block) = block_lines(&lines, "LATTICE_CART") {
        parse_lattice_cart(&block, default_name)?
    } else if let Some(block) = block_lines(&lines, "LATTICE_ABC") {
        parse_lattice_abc(&block, default_name)?
    } else {
        return Err(parse_error(
            default_name,
            "Missing LATTICE_CART or LATTICE_ABC block",
        ));
    };

    let sites = if let Some(block) = block_lines(&lines, "POSITIONS_FRAC") {
        parse_positions(&block, default_name)?.1
    } else if let Some(block) = block_lines(&lines, "POSITIONS_ABS") {
        let (scale, sites) = parse_positions(&block, default_name)?;
        sites
            .into_iter()
            .map(|(el, p)| {
                lattice
                    .cart_to_frac([p[0] * scale, p[1] * scale, p[2] * scale])
                    .map(|frac| (el, frac))
                    .ok_or_else(|| parse_error(default_name, "Singular lattice matrix"))
            })
            .collect::<Result<Vec<_>>>()?
    } else {
        return Err(parse_error(
            default_name,
            "Missing POSITIONS_FRAC or POSITIONS_ABS block",
        ));
    };

    Ok(Structure::new(default_name, lattice, sites))
}

/// 取出 %BLOCK NAME ... %ENDBLOCK NAME 之间的有效行（去掉注释与空行）
fn block_lines<'a>(lines: &[&'a str], block_name: &str) -> Option<Vec<&'a str>> {
    let start = lines.iter().position(|l| {
        let mut parts = l.split_whitespace();
        matches!(parts.next(), Some(t) if t.eq_ignore_ascii_case("%BLOCK"))
            && matches!(parts.next(), Some(n) if n.eq_ignore_ascii_case(block_name))
    })?;

    Some(
        lines
            .iter()
            .skip(start + 1)
            .map(|l| l.trim())
            .take_while(|l| !l.to_uppercase().starts_with("%ENDBLOCK"))
            .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('!'))
            .collect(),
    )
}

/// 块首行的长度单位，返回 (换算到 Å 的系数, 是否为单位行)
fn unit_scale(line: &str) -> Option<f64> {
    match line.to_lowercase().as_str() {
        "ang" | "angstrom" => Some(1.0),
        "bohr" | "a0" => Some(BOHR_TO_ANGSTROM),
        "nm" => Some(10.0),
        _ => None,
    }
}

fn split_unit<'a>(block: &'a [&'a str]) -> (f64, &'a [&'a str]) {
    match block.first().and_then(|l| unit_scale(l)) {
        Some(scale) => (scale, &block[1..]),
        None => (1.0, block),
    }
}

/// 解析 LATTICE_CART 块
fn parse_lattice_cart(block: &[&str], name: &str) -> Result<Lattice> {
    let (scale, rows) = split_unit(block);
    let mut matrix = [[0.0; 3]; 3];
    let mut row_idx = 0;

    for line in rows {
        let parts: Vec<f64> = line
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();

        if parts.len() >= 3 && row_idx < 3 {
            matrix[row_idx] = [parts[0] * scale, parts[1] * scale, parts[2] * scale];
            row_idx += 1;
        }
    }

    if row_idx < 3 {
        return Err(parse_error(name, "Incomplete LATTICE_CART block"));
    }

    Ok(Lattice::from_vectors(matrix))
}

/// 解析 LATTICE_ABC 块
fn parse_lattice_abc(block: &[&str], name: &str) -> Result<Lattice> {
    let (scale, rows) = split_unit(block);
    let params: Vec<f64> = rows
        .iter()
        .flat_map(|l| l.split_whitespace())
        .filter_map(|s| s.parse().ok())
        .collect();

    if params.len() < 6 {
        return Err(parse_error(
            name,
            "Incomplete LATTICE_ABC block (need a b c alpha beta gamma)",
        ));
    }

    Ok(Lattice::from_parameters(
        params[0] * scale,
        params[1] * scale,
        params[2] * scale,
        params[3],
        params[4],
        params[5],
    ))
}

/// 解析原子位置块，返回 (长度单位系数, 格点)
fn parse_positions(block: &[&str], name: &str) -> Result<(f64, Vec<(String, [f64; 3])>)> {
    let (scale, rows) = split_unit(block);
    let mut sites = Vec::new();

    for line in rows {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let coords = (
            parts.get(1).and_then(|s| s.parse::<f64>().ok()),
            parts.get(2).and_then(|s| s.parse::<f64>().ok()),
            parts.get(3).and_then(|s| s.parse::<f64>().ok()),
        );
        match coords {
            (Some(x), Some(y), Some(z)) => sites.push((parts[0].to_string(), [x, y, z])),
            _ => return Err(parse_error(name, format!("Invalid position line '{}'", line))),
        }
    }

    Ok((scale, sites))
}

/// 将 Structure 转换为 .cell 格式字符串
#[cfg(test)]
pub fn to_cell_string(structure: &Structure) -> String {
    let mut result = String::new();

    result.push_str("%BLOCK LATTICE_CART\nang\n");
    for row in &structure.lattice.matrix {
        result.push_str(&format!(
            "{:20.14} {:20.14} {:20.14}\n",
            row[0], row[1], row[2]
        ));
    }
    result.push_str("%ENDBLOCK LATTICE_CART\n\n");

    result.push_str("%BLOCK POSITIONS_FRAC\n");
    for site in &structure.sites {
        result.push_str(&format!(
            "{:4} {:20.14} {:20.14} {:20.14}\n",
            site.species, site.frac[0], site.frac[1], site.frac[2]
        ));
    }
    result.push_str("%ENDBLOCK POSITIONS_FRAC\n");

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_lattice_cart() {
        let content = r#"
%BLOCK LATTICE_CART
ang
5.0 0.0 0.0
0.0 5.0 0.0
0.0 0.0 5.0
%ENDBLOCK LATTICE_CART

%BLOCK POSITIONS_FRAC
Na 0.0 0.0 0.0
Cl 0.5 0.5 0.5
%ENDBLOCK POSITIONS_FRAC
"#;
        let structure = parse_cell_content(content, "NaCl").unwrap();
        assert_eq!(structure.num_sites(), 2);
        assert!((structure.lattice.parameters().c - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_cell_lattice_abc() {
        let content = r#"
%block lattice_abc
ang
5.64 5.64 5.64
90.0 90.0 90.0
%endblock lattice_abc

%BLOCK POSITIONS_FRAC
Na 0.0 0.0 0.0
Cl 0.5 0.5 0.5
%ENDBLOCK POSITIONS_FRAC
"#;
        let p = parse_cell_content(content, "NaCl")
            .unwrap()
            .lattice
            .parameters();

        assert!((p.a - 5.64).abs() < 0.01);
        assert!((p.alpha - 90.0).abs() < 0.01);
        assert!((p.gamma - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_cell_positions_abs_bohr() {
        let content = r#"
%BLOCK LATTICE_CART
4.0 0.0 0.0
0.0 4.0 0.0
0.0 0.0 4.0
%ENDBLOCK LATTICE_CART

%BLOCK POSITIONS_ABS
bohr
Fe 0.0 0.0 0.0
Fe 3.779452 0.0 0.0
%ENDBLOCK POSITIONS_ABS
"#;
        let structure = parse_cell_content(content, "Fe").unwrap();
        assert!((structure.sites[1].frac[0] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_cell_round_trip() {
        let structure = Structure::new(
            "Si-diamond",
            Lattice::cubic(5.43),
            vec![("Si", [0.0, 0.0, 0.0]), ("Si", [0.25, 0.25, 0.25])],
        );

        let parsed = parse_cell_content(&to_cell_string(&structure), "round_trip").unwrap();

        assert_eq!(parsed.num_sites(), 2);
        assert!((parsed.sites[1].frac[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_parse_cell_with_comments() {
        let content = r#"
# This is a comment
! Another comment
%BLOCK LATTICE_CART
ang
3.0 0.0 0.0
0.0 3.0 0.0
0.0 0.0 3.0
%ENDBLOCK LATTICE_CART

%BLOCK POSITIONS_FRAC
# Fe at origin
Fe 0.0 0.0 0.0
%ENDBLOCK POSITIONS_FRAC
"#;
        let structure = parse_cell_content(content, "Fe").unwrap();
        assert_eq!(structure.num_sites(), 1);
        assert_eq!(structure.sites[0].species, "Fe");
    }

    #[test]
    fn test_missing_lattice_block() {
        let content = "%BLOCK POSITIONS_FRAC\nFe 0 0 0\n%ENDBLOCK POSITIONS_FRAC\n";
        assert!(parse_cell_content(content, "Fe").is_err());
    }
}
