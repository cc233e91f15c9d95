// ==========================================
// 保险修复估价系统 - 定价宏领域模型
// ==========================================
// 依据: 定价宏构建器 (macro builder) 数据结构
// ==========================================
// 职责: 定义宏、宏测量输入、宏明细绑定
// 红线: calculated_* 为展示缓存，引擎不得读取
// ==========================================

use crate::domain::types::{InputNumericType, QuantityType, Unit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// RequiredInput - 宏测量输入声明
// ==========================================
// name 在同一个宏内唯一，是 calculated 明细的绑定键
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredInput {
    pub name: String,                  // 字段名（如 total_squares / ridge_length）
    pub label: String,                 // 展示名
    pub unit: Unit,                    // 计量单位
    pub numeric_type: InputNumericType, // 数值类型
}

impl RequiredInput {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        unit: Unit,
        numeric_type: InputNumericType,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            unit,
            numeric_type,
        }
    }
}

// ==========================================
// MacroDefinition - 定价宏
// ==========================================
// 对齐: macro_definition 表（required_inputs 以 JSON 存储）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroDefinition {
    // ===== 主键与标识 =====
    pub id: String,
    pub code: String,               // 宏代码（如 ROOF-COMP-25）
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,

    // ===== 测量输入 =====
    pub required_inputs: Vec<RequiredInput>,

    // ===== 展示缓存（仅在重算成功后回写）=====
    pub calculated_material_total: f64,
    pub calculated_labor_total: f64,
    pub calculated_total: f64,
    pub totals_refreshed_at: Option<DateTime<Utc>>,

    // ===== 状态与审计 =====
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MacroDefinition {
    /// 按名称查找测量输入声明
    pub fn find_input(&self, name: &str) -> Option<&RequiredInput> {
        self.required_inputs.iter().find(|input| input.name == name)
    }

    /// 是否声明了指定测量输入
    pub fn declares_input(&self, name: &str) -> bool {
        self.find_input(name).is_some()
    }
}

// ==========================================
// MacroDraft - 宏写入载荷
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroDraft {
    pub id: Option<String>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub required_inputs: Vec<RequiredInput>,
    pub is_active: bool,
}

impl MacroDraft {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            code: code.into(),
            name: name.into(),
            description: None,
            category: None,
            required_inputs: Vec::new(),
            is_active: true,
        }
    }

    pub fn with_input(mut self, input: RequiredInput) -> Self {
        self.required_inputs.push(input);
        self
    }
}

// ==========================================
// MacroItemBinding - 宏明细绑定
// ==========================================
// 红线: item_code/description/unit 是绑定时的展示快照，不参与计算；
//       价格字段不复制，始终实时取自价目项（除非覆写）
// 对齐: macro_item 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroItemBinding {
    // ===== 主键与关联 =====
    pub id: String,
    pub macro_id: String,
    pub catalog_item_id: String,

    // ===== 展示快照 =====
    pub item_code: String,
    pub description: String,
    pub unit: Unit,

    // ===== 数量派生 =====
    pub quantity_type: QuantityType,
    pub fixed_quantity: f64,
    pub input_field_name: Option<String>,
    pub quantity_multiplier: f64,

    // ===== 单项覆写 =====
    pub price_override: Option<f64>,
    pub material_override: Option<f64>,
    pub labor_override: Option<f64>,
    pub waste_factor_override: Option<f64>,

    // ===== 展示/包含标志 =====
    pub is_included: bool, // false: 计为 0 但仍列出
    pub is_optional: bool,  // 仅提示
    pub sort_order: i32,
    pub group_name: Option<String>,

    pub created_at: DateTime<Utc>,
}

// ==========================================
// BindingDraft - 宏明细写入载荷
// ==========================================
// 用途: 新建/修改绑定；展示快照由服务层从价目项复制
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingDraft {
    pub id: Option<String>,
    pub macro_id: String,
    pub catalog_item_id: String,
    pub quantity_type: QuantityType,
    pub fixed_quantity: f64,
    pub input_field_name: Option<String>,
    pub quantity_multiplier: f64,
    pub price_override: Option<f64>,
    pub material_override: Option<f64>,
    pub labor_override: Option<f64>,
    pub waste_factor_override: Option<f64>,
    pub is_included: bool,
    pub is_optional: bool,
    pub sort_order: i32,
    pub group_name: Option<String>,
}

impl BindingDraft {
    /// 固定数量明细
    pub fn fixed(macro_id: impl Into<String>, catalog_item_id: impl Into<String>, quantity: f64) -> Self {
        Self::base(macro_id.into(), catalog_item_id.into(), QuantityType::Fixed, quantity, None)
    }

    /// 按测量输入计算的明细
    pub fn calculated(
        macro_id: impl Into<String>,
        catalog_item_id: impl Into<String>,
        input_field_name: impl Into<String>,
    ) -> Self {
        Self::base(
            macro_id.into(),
            catalog_item_id.into(),
            QuantityType::Calculated,
            0.0,
            Some(input_field_name.into()),
        )
    }

    /// 按屋面方数计算的明细
    pub fn per_square(macro_id: impl Into<String>, catalog_item_id: impl Into<String>) -> Self {
        Self::base(macro_id.into(), catalog_item_id.into(), QuantityType::PerSquare, 0.0, None)
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.quantity_multiplier = multiplier;
        self
    }

    fn base(
        macro_id: String,
        catalog_item_id: String,
        quantity_type: QuantityType,
        fixed_quantity: f64,
        input_field_name: Option<String>,
    ) -> Self {
        Self {
            id: None,
            macro_id,
            catalog_item_id,
            quantity_type,
            fixed_quantity,
            input_field_name,
            quantity_multiplier: 1.0,
            price_override: None,
            material_override: None,
            labor_override: None,
            waste_factor_override: None,
            is_included: true,
            is_optional: false,
            sort_order: 0,
            group_name: None,
        }
    }
}
