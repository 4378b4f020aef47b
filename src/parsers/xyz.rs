//! # extended XYZ 写出
//!
//! 生成带晶格信息的 extended XYZ 文本，ASE 可直接读取。
//!
//! ## 依赖关系
//! - 被 `calc/backend/grid.rs` 使用
//! - 使用 `models/structure.rs`

use crate::models::Structure;

/// 转换为 extended XYZ 格式（笛卡尔坐标，周期性边界）
pub fn to_extxyz_string(structure: &Structure) -> String {
    let m = structure.lattice.matrix;
    let lattice = m
        .iter()
        .flat_map(|row| row.iter())
        .map(|x| format!("{:.14}", x))
        .collect::<Vec<_>>()
        .join(" ");

    let mut result = String::new();
    result.push_str(&format!("{}\n", structure.num_sites()));
    result.push_str(&format!(
        "Lattice=\"{}\" Properties=species:S:1:pos:R:3 pbc=\"T T T\"\n",
        lattice
    ));

    for site in &structure.sites {
        let cart = structure.lattice.frac_to_cart(site.frac);
        result.push_str(&format!(
            "{} {:20.14} {:20.14} {:20.14}\n",
            site.species, cart[0], cart[1], cart[2]
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lattice;

    #[test]
    fn test_extxyz_header_and_positions() {
        let structure = Structure::new(
            "NaCl",
            Lattice::cubic(2.0),
            vec![("Na", [0.0, 0.0, 0.0]), ("Cl", [0.5, 0.5, 0.5])],
        );
        let text = to_extxyz_string(&structure);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "2");
        assert!(lines[1].starts_with("Lattice=\"2.00000000000000 0.00000000000000"));
        let cl: Vec<f64> = lines[3]
            .split_whitespace()
            .skip(1)
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(cl, vec![1.0, 1.0, 1.0]);
    }
}
