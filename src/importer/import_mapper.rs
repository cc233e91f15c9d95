// ==========================================
// 保险修复估价系统 - 导入行 → 价目项映射
// ==========================================
// 规则:
// - labor_price = labor_cost + labor_overhead（固定规则，不可配置）
// - waste_factor 取配置默认值（源格式无此列）
// - category_code 按 code 精确匹配，未匹配则不关联分类（不报错）
// - unit_price 由三段单价重算；unit_cost 与之偏差超出容差时记警告
// ==========================================

use crate::domain::catalog::CatalogItemDraft;
use crate::domain::import::{ImportRowWarning, ParsedImportRow};
use crate::domain::types::Unit;
use crate::importer::error::{ImportError, ImportResult};
use std::collections::HashMap;

/// 映射参数（整批共用）
#[derive(Debug, Clone)]
pub struct MappingContext {
    pub category_index: HashMap<String, String>, // 分类 code → id
    pub default_waste_factor: f64,
    pub unit_cost_tolerance: f64,
}

impl Default for MappingContext {
    fn default() -> Self {
        Self {
            category_index: HashMap::new(),
            default_waste_factor: 0.0,
            unit_cost_tolerance: crate::engine::price_rollup::DEFAULT_UNIT_PRICE_TOLERANCE,
        }
    }
}

/// 单行映射结果
#[derive(Debug, Clone)]
pub struct MappedRow {
    pub draft: CatalogItemDraft,
    pub warnings: Vec<ImportRowWarning>,
}

pub struct ImportMapper;

impl ImportMapper {
    /// 将已清洗、已校验的行映射为价目项草稿
    pub fn map_row(&self, row: &ParsedImportRow, ctx: &MappingContext) -> ImportResult<MappedRow> {
        let item_code = row.item_code.clone().ok_or_else(|| ImportError::MissingField {
            row: row.row_number,
            field: "item_code".to_string(),
        })?;
        let unit_raw = row.unit.as_deref().unwrap_or_default();
        let unit = Unit::from_str(unit_raw).ok_or_else(|| ImportError::UnknownUnit {
            row: row.row_number,
            value: unit_raw.to_string(),
        })?;

        let mut warnings = Vec::new();

        let category_id = match row.category_code.as_deref() {
            None => None,
            Some(code) => match ctx.category_index.get(code) {
                Some(id) => Some(id.clone()),
                None => {
                    warnings.push(ImportRowWarning {
                        row: row.row_number,
                        item_code: Some(item_code.clone()),
                        field: "category_code".to_string(),
                        message: format!("分类 {} 不存在，未关联分类", code),
                    });
                    None
                }
            },
        };

        let mut draft = CatalogItemDraft::new(
            item_code.clone(),
            row.description.clone().unwrap_or_default(),
            unit,
        )
        .with_prices(
            row.material_cost,
            row.labor_cost + row.labor_overhead,
            row.equipment_cost,
        )
        .with_waste_factor(ctx.default_waste_factor);

        draft.category_id = category_id;
        draft.selector_code = row.selector_code.clone();
        draft.labor_minimum = row.labor_minimum;
        draft.is_taxable = row.is_taxable;
        draft.useful_life = row.useful_life;
        draft.depreciation_percent = row.depreciation_percent;

        // unit_cost 为 0 视为未提供
        let component_sum = draft.component_sum();
        if row.unit_cost != 0.0 && (row.unit_cost - component_sum).abs() > ctx.unit_cost_tolerance {
            warnings.push(ImportRowWarning {
                row: row.row_number,
                item_code: Some(item_code),
                field: "unit_cost".to_string(),
                message: format!(
                    "unit_cost {:.2} 与三段单价之和 {:.2} 不一致，按三段之和保存",
                    row.unit_cost, component_sum
                ),
            });
        }

        Ok(MappedRow { draft, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ParsedImportRow {
        let mut row = ParsedImportRow::empty(2);
        row.item_code = Some("RFG LAMI<".to_string());
        row.category_code = Some("RFG".to_string());
        row.description = Some("Laminated".to_string());
        row.unit = Some("SQ".to_string());
        row.unit_cost = 267.52;
        row.material_cost = 145.0;
        row.labor_cost = 100.0;
        row.labor_overhead = 22.52;
        row
    }

    fn ctx() -> MappingContext {
        let mut ctx = MappingContext::default();
        ctx.category_index.insert("RFG".to_string(), "cat-rfg".to_string());
        ctx
    }

    #[test]
    fn test_labor_is_cost_plus_overhead() {
        let mapped = ImportMapper.map_row(&row(), &ctx()).unwrap();
        assert!((mapped.draft.labor_price - 122.52).abs() < 1e-9);
        assert_eq!(mapped.draft.unit_price, None);
        assert_eq!(mapped.draft.waste_factor, 0.0);
        assert_eq!(mapped.draft.category_id.as_deref(), Some("cat-rfg"));
        assert!(mapped.warnings.is_empty());
    }

    #[test]
    fn test_unresolved_category_is_warning_not_error() {
        let mut r = row();
        r.category_code = Some("XYZ".to_string());
        let mapped = ImportMapper.map_row(&r, &ctx()).unwrap();
        assert_eq!(mapped.draft.category_id, None);
        assert_eq!(mapped.warnings.len(), 1);
        assert_eq!(mapped.warnings[0].field, "category_code");
    }

    #[test]
    fn test_unit_cost_mismatch_warns() {
        let mut r = row();
        r.unit_cost = 300.0;
        let mapped = ImportMapper.map_row(&r, &ctx()).unwrap();
        assert!(mapped.warnings.iter().any(|w| w.field == "unit_cost"));
    }

    #[test]
    fn test_default_waste_factor_applied() {
        let mut c = ctx();
        c.default_waste_factor = 10.0;
        let mapped = ImportMapper.map_row(&row(), &c).unwrap();
        assert_eq!(mapped.draft.waste_factor, 10.0);
    }
}
