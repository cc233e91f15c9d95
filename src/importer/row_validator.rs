// ==========================================
// 保险修复估价系统 - 导入行校验器实现
// ==========================================
// 职责: 必填字段 / 数值范围 / 计量单位可识别
// 说明: 校验失败的行记入报告错误，不中断批次
// ==========================================

use crate::domain::import::ParsedImportRow;
use crate::domain::types::Unit;
use crate::importer::catalog_importer_trait::RowValidator as RowValidatorTrait;
use crate::importer::error::{ImportError, ImportResult};

pub struct RowValidator;

impl RowValidatorTrait for RowValidator {
    fn validate_row(&self, row: &ParsedImportRow) -> ImportResult<()> {
        let r = row.row_number;

        // 必填字段
        if row.item_code.is_none() {
            return Err(ImportError::MissingField {
                row: r,
                field: "item_code".to_string(),
            });
        }
        if row.description.is_none() {
            return Err(ImportError::MissingField {
                row: r,
                field: "description".to_string(),
            });
        }
        let unit = row.unit.as_deref().ok_or_else(|| ImportError::MissingField {
            row: r,
            field: "unit".to_string(),
        })?;
        if Unit::from_str(unit).is_none() {
            return Err(ImportError::UnknownUnit {
                row: r,
                value: unit.to_string(),
            });
        }

        // 金额非负
        for (field, value) in [
            ("unit_cost", row.unit_cost),
            ("material_cost", row.material_cost),
            ("labor_cost", row.labor_cost),
            ("labor_overhead", row.labor_overhead),
            ("equipment_cost", row.equipment_cost),
            ("labor_minimum", row.labor_minimum),
        ] {
            check_range(r, field, value, 0.0, f64::MAX)?;
        }

        if let Some(pct) = row.depreciation_percent {
            check_range(r, "depreciation_percent", pct, 0.0, 100.0)?;
        }
        if let Some(years) = row.useful_life {
            check_range(r, "useful_life", years as f64, 0.0, 200.0)?;
        }

        Ok(())
    }
}

fn check_range(row: usize, field: &str, value: f64, min: f64, max: f64) -> ImportResult<()> {
    if value < min || value > max {
        return Err(ImportError::ValueRangeError {
            row,
            field: field.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}
