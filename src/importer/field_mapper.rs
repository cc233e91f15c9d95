// ==========================================
// 保险修复估价系统 - 字段映射器实现
// ==========================================
// 依据: Xactimate 价目表导出列
// 职责: 源列名（含别名）→ 标准字段 + 类型转换
// 说明: 列名匹配忽略大小写、空格与标点
// ==========================================

use crate::domain::import::ParsedImportRow;
use crate::importer::catalog_importer_trait::{FieldMapper as FieldMapperTrait, RawImportRow};
use crate::importer::error::{ImportError, ImportResult};
use std::collections::HashMap;

pub struct FieldMapper;

impl FieldMapperTrait for FieldMapper {
    fn map_to_parsed_row(&self, row: &RawImportRow) -> ImportResult<ParsedImportRow> {
        let normalized = normalize_headers(&row.cells);
        let row_number = row.row_number;

        Ok(ParsedImportRow {
            // 标识
            item_code: self.get_string(&normalized, "item_code"),
            category_code: self.get_string(&normalized, "category_code"),
            selector_code: self.get_string(&normalized, "selector_code"),
            description: self.get_string(&normalized, "description"),
            unit: self.get_string(&normalized, "unit"),

            // 计价
            unit_cost: self.parse_money(&normalized, "unit_cost", row_number)?,
            material_cost: self.parse_money(&normalized, "material_cost", row_number)?,
            labor_cost: self.parse_money(&normalized, "labor_cost", row_number)?,
            labor_overhead: self.parse_money(&normalized, "labor_overhead", row_number)?,
            equipment_cost: self.parse_money(&normalized, "equipment_cost", row_number)?,
            labor_minimum: self.parse_money(&normalized, "labor_minimum", row_number)?,

            // 折旧
            useful_life: self.parse_i32(&normalized, "useful_life", row_number)?,
            depreciation_percent: self.parse_f64(&normalized, "depreciation_percent", row_number)?,

            is_taxable: self
                .parse_bool(&normalized, "is_taxable", row_number)?
                .unwrap_or(true),

            raw_data: row
                .cells
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            row_number,
        })
    }
}

/// 标准字段 → 可接受的列名（已归一化）
fn aliases(field: &str) -> &'static [&'static str] {
    match field {
        "item_code" => &["itemcode", "code", "item", "lineitemcode"],
        "category_code" => &["categorycode", "category", "cat"],
        "selector_code" => &["selectorcode", "selector", "sel"],
        "description" => &["description", "desc"],
        "unit" => &["unit", "uom", "unitofmeasure"],
        "unit_cost" => &["unitcost", "unitprice", "total", "price"],
        "material_cost" => &["materialcost", "material", "mat"],
        "labor_cost" => &["laborcost", "labor", "lab"],
        "labor_overhead" => &["laboroverhead", "laborburden", "overhead"],
        "equipment_cost" => &["equipmentcost", "equipment", "equip", "eqp"],
        "labor_minimum" => &["laborminimum", "labormin", "minimum"],
        "useful_life" => &["usefullife", "life", "lifeyears"],
        "depreciation_percent" => &["depreciationpercent", "depreciation", "dep", "deppercent"],
        "is_taxable" => &["istaxable", "taxable", "tax"],
        _ => &[],
    }
}

/// 列名归一化: 小写，只保留字母数字
fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn normalize_headers(cells: &HashMap<String, String>) -> HashMap<String, &str> {
    cells
        .iter()
        .map(|(k, v)| (normalize_header(k), v.as_str()))
        .collect()
}

impl FieldMapper {
    /// 提取字符串字段，按别名顺序取第一个非空值
    fn get_string(&self, row: &HashMap<String, &str>, field: &str) -> Option<String> {
        aliases(field)
            .iter()
            .filter_map(|alias| row.get(*alias))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// 解析浮点数（允许 $ , % 与空格）
    fn parse_f64(
        &self,
        row: &HashMap<String, &str>,
        field: &str,
        row_number: usize,
    ) -> ImportResult<Option<f64>> {
        match self.get_string(row, field) {
            None => Ok(None),
            Some(value) => {
                let stripped: String = value
                    .chars()
                    .filter(|c| !matches!(c, '$' | ',' | '%' | ' '))
                    .collect();
                stripped
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(Some)
                    .ok_or_else(|| ImportError::TypeConversionError {
                        row: row_number,
                        field: field.to_string(),
                        message: format!("无法解析为数值: {}", value),
                    })
            }
        }
    }

    /// 金额字段（缺失记为 0）
    fn parse_money(
        &self,
        row: &HashMap<String, &str>,
        field: &str,
        row_number: usize,
    ) -> ImportResult<f64> {
        Ok(self.parse_f64(row, field, row_number)?.unwrap_or(0.0))
    }

    /// 解析整数（允许 "20.0" 这类 Excel 数值）
    fn parse_i32(
        &self,
        row: &HashMap<String, &str>,
        field: &str,
        row_number: usize,
    ) -> ImportResult<Option<i32>> {
        match self.parse_f64(row, field, row_number)? {
            None => Ok(None),
            Some(v) if v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64 => {
                Ok(Some(v as i32))
            }
            Some(v) => Err(ImportError::TypeConversionError {
                row: row_number,
                field: field.to_string(),
                message: format!("无法解析为整数: {}", v),
            }),
        }
    }

    /// 解析布尔值
    fn parse_bool(
        &self,
        row: &HashMap<String, &str>,
        field: &str,
        row_number: usize,
    ) -> ImportResult<Option<bool>> {
        match self.get_string(row, field) {
            None => Ok(None),
            Some(value) => match value.to_lowercase().as_str() {
                "y" | "yes" | "true" | "t" | "1" | "x" => Ok(Some(true)),
                "n" | "no" | "false" | "f" | "0" => Ok(Some(false)),
                _ => Err(ImportError::TypeConversionError {
                    row: row_number,
                    field: field.to_string(),
                    message: format!("无法解析为布尔值: {}", value),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawImportRow {
        RawImportRow {
            row_number: 2,
            cells: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_maps_xactimate_headers() {
        let row = raw(&[
            ("Cat", "RFG"),
            ("Sel", "LAMI<"),
            ("Item Code", "RFG LAMI<"),
            ("Desc", "Laminated - comp. shingle rfg"),
            ("Unit", "SQ"),
            ("Unit Cost", "$267.52"),
            ("Material", "145.00"),
            ("Labor", "100.00"),
            ("Labor Overhead", "22.52"),
            ("Equipment", ""),
            ("Taxable", "N"),
            ("Useful Life", "25"),
            ("Depreciation %", "4%"),
        ]);

        let parsed = FieldMapper.map_to_parsed_row(&row).unwrap();

        assert_eq!(parsed.item_code.as_deref(), Some("RFG LAMI<"));
        assert_eq!(parsed.category_code.as_deref(), Some("RFG"));
        assert_eq!(parsed.selector_code.as_deref(), Some("LAMI<"));
        assert_eq!(parsed.unit_cost, 267.52);
        assert_eq!(parsed.labor_overhead, 22.52);
        assert_eq!(parsed.equipment_cost, 0.0);
        assert!(!parsed.is_taxable);
        assert_eq!(parsed.useful_life, Some(25));
        assert_eq!(parsed.depreciation_percent, Some(4.0));
        assert_eq!(parsed.raw_data.len(), 13);
        assert_eq!(parsed.row_number, 2);
    }

    #[test]
    fn test_non_numeric_cell_is_type_error() {
        let row = raw(&[("Item Code", "X"), ("Material", "twelve")]);
        let err = FieldMapper.map_to_parsed_row(&row).unwrap_err();
        assert!(matches!(
            err,
            ImportError::TypeConversionError { row: 2, ref field, .. } if field == "material_cost"
        ));
    }

    #[test]
    fn test_taxable_defaults_to_true() {
        let row = raw(&[("item_code", "X")]);
        let parsed = FieldMapper.map_to_parsed_row(&row).unwrap();
        assert!(parsed.is_taxable);
        assert_eq!(parsed.useful_life, None);
    }

    #[test]
    fn test_header_normalization() {
        assert_eq!(normalize_header(" Labor Overhead "), "laboroverhead");
        assert_eq!(normalize_header("Depreciation %"), "depreciation");
        assert_eq!(normalize_header("item_code"), "itemcode");
    }
}
