// ==========================================
// 保险修复估价系统 - 领域类型定义
// ==========================================
// 依据: 价目项计量单位表 / 宏数量派生规则
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 计量单位 (Unit of Measure)
// ==========================================
// 序列化格式: 大写缩写 (与 Xactimate 价目一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Unit {
    Ea,  // 个
    Sf,  // 平方英尺
    Sq,  // 屋面方 (100 SF)
    Sy,  // 平方码
    Lf,  // 延长英尺
    Hr,  // 小时
    Da,  // 天
    Bdl, // 捆
    Rol, // 卷
    Gal, // 加仑
    Ls,  // 总价项
}

impl Unit {
    /// 全部单位（按价目表惯用顺序）
    pub const ALL: [Unit; 11] = [
        Unit::Ea,
        Unit::Sf,
        Unit::Sq,
        Unit::Sy,
        Unit::Lf,
        Unit::Hr,
        Unit::Da,
        Unit::Bdl,
        Unit::Rol,
        Unit::Gal,
        Unit::Ls,
    ];

    /// 从字符串解析单位（大小写不敏感）
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "EA" => Some(Unit::Ea),
            "SF" => Some(Unit::Sf),
            "SQ" => Some(Unit::Sq),
            "SY" => Some(Unit::Sy),
            "LF" => Some(Unit::Lf),
            "HR" => Some(Unit::Hr),
            "DA" => Some(Unit::Da),
            "BDL" => Some(Unit::Bdl),
            "ROL" => Some(Unit::Rol),
            "GAL" => Some(Unit::Gal),
            "LS" => Some(Unit::Ls),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Unit::Ea => "EA",
            Unit::Sf => "SF",
            Unit::Sq => "SQ",
            Unit::Sy => "SY",
            Unit::Lf => "LF",
            Unit::Hr => "HR",
            Unit::Da => "DA",
            Unit::Bdl => "BDL",
            Unit::Rol => "ROL",
            Unit::Gal => "GAL",
            Unit::Ls => "LS",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 数量派生类型 (Quantity Type)
// ==========================================
// fixed: 固定数量 × 倍数
// calculated: 测量输入值 × 倍数
// per_square: total_squares × 倍数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityType {
    Fixed,
    Calculated,
    PerSquare,
}

impl fmt::Display for QuantityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl QuantityType {
    /// 从字符串解析数量派生类型
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Some(QuantityType::Fixed),
            "calculated" => Some(QuantityType::Calculated),
            "per_square" => Some(QuantityType::PerSquare),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            QuantityType::Fixed => "fixed",
            QuantityType::Calculated => "calculated",
            QuantityType::PerSquare => "per_square",
        }
    }
}

// ==========================================
// 测量输入数值类型 (Input Numeric Type)
// ==========================================
// 仅用于表单渲染，引擎统一按 f64 计算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputNumericType {
    Integer,
    Decimal,
}

impl fmt::Display for InputNumericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputNumericType::Integer => write!(f, "integer"),
            InputNumericType::Decimal => write!(f, "decimal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_parse_case_insensitive() {
        assert_eq!(Unit::from_str("sq"), Some(Unit::Sq));
        assert_eq!(Unit::from_str(" BDL "), Some(Unit::Bdl));
        assert_eq!(Unit::from_str("XYZ"), None);
    }

    #[test]
    fn test_unit_db_str_round_trip_all() {
        for unit in Unit::ALL {
            assert_eq!(Unit::from_str(unit.to_db_str()), Some(unit));
        }
    }

    #[test]
    fn test_quantity_type_serde_snake_case() {
        let json = serde_json::to_string(&QuantityType::PerSquare).unwrap();
        assert_eq!(json, "\"per_square\"");
        let parsed: QuantityType = serde_json::from_str("\"calculated\"").unwrap();
        assert_eq!(parsed, QuantityType::Calculated);
    }
}
