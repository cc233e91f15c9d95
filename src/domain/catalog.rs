// ==========================================
// 保险修复估价系统 - 价目项领域模型
// ==========================================
// 依据: Xactimate 价目项字段 (item code / unit / M-L-E 三段价)
// ==========================================

use crate::domain::types::Unit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 代码规范化: TRIM + 合并连续空白 + UPPER
///
/// 价目代码、分类代码、宏代码在人工维护和导入两条路径上都以此形式入库，
/// 之后按规范化后的代码精确匹配
pub fn normalize_code(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}

// ==========================================
// CatalogItem - 价目项
// ==========================================
// 红线: unit_price = material + labor + equipment（保存时重算，不允许静默偏离）
// 用途: 导入层/人工维护写入,宏引擎只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    // ===== 主键 =====
    pub id: String, // 价目项 ID（UUID）

    // ===== 标识 =====
    pub item_code: String,           // 价目代码（如 "RFG LAMI<"）
    pub description: String,         // 描述
    pub category_id: Option<String>, // 所属分类 ID
    pub selector_code: Option<String>, // 选择码（Xactimate selector）

    // ===== 计价 =====
    pub unit: Unit,             // 计量单位
    pub material_price: f64,    // 材料单价
    pub labor_price: f64,       // 人工单价
    pub equipment_price: f64,   // 设备单价
    pub unit_price: f64,        // 综合单价（三段之和）
    pub waste_factor: f64,      // 损耗率（百分比 0-100，作用于数量）
    pub labor_minimum: f64,     // 人工最低收费
    pub is_taxable: bool,       // 是否计税

    // ===== 折旧 =====
    pub useful_life: Option<i32>,          // 使用年限（年）
    pub depreciation_percent: Option<f64>, // 折旧百分比

    // ===== 状态与审计 =====
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    /// 三段单价之和
    pub fn component_sum(&self) -> f64 {
        self.material_price + self.labor_price + self.equipment_price
    }
}

// ==========================================
// CatalogItemDraft - 价目项写入载荷
// ==========================================
// 用途: upsert 入参（id 为空则新建）
// 说明: unit_price 为 None 时由三段单价重算
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItemDraft {
    pub id: Option<String>,
    pub item_code: String,
    pub description: String,
    pub category_id: Option<String>,
    pub selector_code: Option<String>,
    pub unit: Unit,
    pub material_price: f64,
    pub labor_price: f64,
    pub equipment_price: f64,
    pub unit_price: Option<f64>,
    pub waste_factor: f64,
    pub labor_minimum: f64,
    pub is_taxable: bool,
    pub useful_life: Option<i32>,
    pub depreciation_percent: Option<f64>,
    pub is_active: bool,
}

impl CatalogItemDraft {
    /// 以最少字段创建草稿（其余取默认值）
    pub fn new(item_code: impl Into<String>, description: impl Into<String>, unit: Unit) -> Self {
        Self {
            id: None,
            item_code: item_code.into(),
            description: description.into(),
            category_id: None,
            selector_code: None,
            unit,
            material_price: 0.0,
            labor_price: 0.0,
            equipment_price: 0.0,
            unit_price: None,
            waste_factor: 0.0,
            labor_minimum: 0.0,
            is_taxable: true,
            useful_life: None,
            depreciation_percent: None,
            is_active: true,
        }
    }

    /// 设置三段单价
    pub fn with_prices(mut self, material: f64, labor: f64, equipment: f64) -> Self {
        self.material_price = material;
        self.labor_price = labor;
        self.equipment_price = equipment;
        self
    }

    /// 设置损耗率
    pub fn with_waste_factor(mut self, waste_factor: f64) -> Self {
        self.waste_factor = waste_factor;
        self
    }

    /// 三段单价之和
    pub fn component_sum(&self) -> f64 {
        self.material_price + self.labor_price + self.equipment_price
    }

    /// 生成待保存的价目项（unit_price 由调用方解析）
    pub fn into_item(
        self,
        id: String,
        unit_price: f64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> CatalogItem {
        CatalogItem {
            id,
            item_code: self.item_code,
            description: self.description,
            category_id: self.category_id,
            selector_code: self.selector_code,
            unit: self.unit,
            material_price: self.material_price,
            labor_price: self.labor_price,
            equipment_price: self.equipment_price,
            unit_price,
            waste_factor: self.waste_factor,
            labor_minimum: self.labor_minimum,
            is_taxable: self.is_taxable,
            useful_life: self.useful_life,
            depreciation_percent: self.depreciation_percent,
            is_active: self.is_active,
            created_at,
            updated_at,
        }
    }
}

impl From<&CatalogItem> for CatalogItemDraft {
    fn from(item: &CatalogItem) -> Self {
        Self {
            id: Some(item.id.clone()),
            item_code: item.item_code.clone(),
            description: item.description.clone(),
            category_id: item.category_id.clone(),
            selector_code: item.selector_code.clone(),
            unit: item.unit,
            material_price: item.material_price,
            labor_price: item.labor_price,
            equipment_price: item.equipment_price,
            // 编辑时不回填 unit_price，保存时按三段重算
            unit_price: None,
            waste_factor: item.waste_factor,
            labor_minimum: item.labor_minimum,
            is_taxable: item.is_taxable,
            useful_life: item.useful_life,
            depreciation_percent: item.depreciation_percent,
            is_active: item.is_active,
        }
    }
}

// ==========================================
// CatalogFilter - 价目项查询条件
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFilter {
    pub is_active: Option<bool>,     // 启用状态
    pub category_id: Option<String>, // 分类
    pub search: Option<String>,      // 代码/描述模糊匹配（大小写不敏感）
}

impl CatalogFilter {
    /// 判断价目项是否命中过滤条件
    pub fn matches(&self, item: &CatalogItem) -> bool {
        if let Some(active) = self.is_active {
            if item.is_active != active {
                return false;
            }
        }

        if let Some(ref category_id) = self.category_id {
            if item.category_id.as_deref() != Some(category_id.as_str()) {
                return false;
            }
        }

        if let Some(ref search) = self.search {
            let needle = search.trim().to_lowercase();
            if !needle.is_empty()
                && !item.item_code.to_lowercase().contains(&needle)
                && !item.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        true
    }
}

// ==========================================
// Category - 价目分类
// ==========================================
// 导入时按 code 精确匹配
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub code: String,
    pub name: String,
    pub sort_order: i32,
}

// ==========================================
// RemoveOutcome - 价目项删除结果
// ==========================================
// 删除价目项后，引用它的宏明细不会被删除（保留展示快照），
// 但需要把受影响的明细 ID 返回给调用方提示用户
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveOutcome {
    pub removed_id: String,
    pub affected_binding_ids: Vec<String>,
}

impl RemoveOutcome {
    /// 是否存在悬空引用
    pub fn has_dangling_references(&self) -> bool {
        !self.affected_binding_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  rfg   lami< "), "RFG LAMI<");
        assert_eq!(normalize_code("DRY 1/2"), "DRY 1/2");
        assert_eq!(normalize_code("   "), "");
    }

    fn sample_item(code: &str, description: &str) -> CatalogItem {
        CatalogItem {
            id: "ci-1".to_string(),
            item_code: code.to_string(),
            description: description.to_string(),
            category_id: Some("cat-rfg".to_string()),
            selector_code: None,
            unit: Unit::Sq,
            material_price: 145.0,
            labor_price: 122.52,
            equipment_price: 0.0,
            unit_price: 267.52,
            waste_factor: 10.0,
            labor_minimum: 0.0,
            is_taxable: true,
            useful_life: None,
            depreciation_percent: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_filter_search_case_insensitive_over_code_and_description() {
        let item = sample_item("RFG LAMI<", "Laminated - comp. shingle rfg");

        let by_code = CatalogFilter {
            search: Some("lami".to_string()),
            ..Default::default()
        };
        assert!(by_code.matches(&item));

        let by_description = CatalogFilter {
            search: Some("SHINGLE".to_string()),
            ..Default::default()
        };
        assert!(by_description.matches(&item));

        let miss = CatalogFilter {
            search: Some("drywall".to_string()),
            ..Default::default()
        };
        assert!(!miss.matches(&item));
    }

    #[test]
    fn test_filter_active_and_category() {
        let mut item = sample_item("RFG FELT15", "Roofing felt - 15 lb.");

        let filter = CatalogFilter {
            is_active: Some(true),
            category_id: Some("cat-rfg".to_string()),
            search: None,
        };
        assert!(filter.matches(&item));

        item.is_active = false;
        assert!(!filter.matches(&item));

        item.is_active = true;
        item.category_id = None;
        assert!(!filter.matches(&item));
    }

    #[test]
    fn test_draft_from_item_drops_unit_price() {
        let item = sample_item("RFG LAMI<", "Laminated");
        let draft = CatalogItemDraft::from(&item);
        assert_eq!(draft.id.as_deref(), Some("ci-1"));
        assert_eq!(draft.unit_price, None);
        assert!((draft.component_sum() - 267.52).abs() < 1e-9);
    }
}
