// ==========================================
// 保险修复估价系统 - 宏计算结果模型
// ==========================================
// 用途: 宏计算引擎输出（逐明细 + 汇总 + 诊断）
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Add, AddAssign};

/// 测量输入值: 字段名 → 数值
pub type MeasurementValues = HashMap<String, f64>;

// ==========================================
// CostBreakdown - 费用拆分
// ==========================================
// 注意: total 由 unit_price（或 price_override）独立计算，
//       不保证等于 material + labor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub material: f64,
    pub labor: f64,
    pub total: f64,
}

impl CostBreakdown {
    pub const ZERO: CostBreakdown = CostBreakdown {
        material: 0.0,
        labor: 0.0,
        total: 0.0,
    };

    pub fn new(material: f64, labor: f64, total: f64) -> Self {
        Self {
            material,
            labor,
            total,
        }
    }
}

impl Add for CostBreakdown {
    type Output = CostBreakdown;

    fn add(self, rhs: CostBreakdown) -> CostBreakdown {
        CostBreakdown {
            material: self.material + rhs.material,
            labor: self.labor + rhs.labor,
            total: self.total + rhs.total,
        }
    }
}

impl AddAssign for CostBreakdown {
    fn add_assign(&mut self, rhs: CostBreakdown) {
        self.material += rhs.material;
        self.labor += rhs.labor;
        self.total += rhs.total;
    }
}

impl std::iter::Sum for CostBreakdown {
    fn sum<I: Iterator<Item = CostBreakdown>>(iter: I) -> CostBreakdown {
        iter.fold(CostBreakdown::ZERO, |acc, c| acc + c)
    }
}

// ==========================================
// BindingEvaluation - 单条明细计算结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingEvaluation {
    pub binding_id: String,
    pub catalog_item_id: String,
    pub item_code: String,        // 展示快照
    pub description: String,      // 展示快照
    pub group_name: Option<String>,
    pub is_included: bool,
    pub is_optional: bool,
    pub quantity: f64,            // 含损耗后的数量
    pub material: f64,
    pub labor: f64,
    pub total: f64,
}

impl BindingEvaluation {
    pub fn cost(&self) -> CostBreakdown {
        CostBreakdown::new(self.material, self.labor, self.total)
    }
}

// ==========================================
// EvaluationDiagnostic - 计算诊断
// ==========================================
// 红线: 诊断只提示，不中断计算
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationDiagnostic {
    /// 明细引用的价目项不存在（计为 0）
    ReferenceMissing {
        binding_id: String,
        catalog_item_id: String,
    },
    /// 测量输入未提供（按 0 计算）
    UnresolvedInput {
        binding_id: String,
        input_field_name: String,
    },
    /// calculated 明细引用的字段未在宏的测量输入中声明
    UndeclaredInput {
        binding_id: String,
        input_field_name: String,
    },
}

impl EvaluationDiagnostic {
    pub fn binding_id(&self) -> &str {
        match self {
            EvaluationDiagnostic::ReferenceMissing { binding_id, .. }
            | EvaluationDiagnostic::UnresolvedInput { binding_id, .. }
            | EvaluationDiagnostic::UndeclaredInput { binding_id, .. } => binding_id,
        }
    }
}

// ==========================================
// MacroEvaluation - 宏计算结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroEvaluation {
    pub macro_id: String,
    pub macro_code: String,
    pub items: Vec<BindingEvaluation>, // 按 sort_order 排列
    pub totals: CostBreakdown,
    pub diagnostics: Vec<EvaluationDiagnostic>,
}

impl MacroEvaluation {
    pub fn has_warnings(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}
