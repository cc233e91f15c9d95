// ==========================================
// 保险修复估价系统 - 数据清洗器实现
// ==========================================
// 职责: TRIM / UPPER / NULL 标准化 / 计量单位别名
// ==========================================

use crate::domain::catalog::normalize_code;
use crate::domain::import::ParsedImportRow;
use crate::domain::types::Unit;
use crate::importer::catalog_importer_trait::DataCleaner as DataCleanerTrait;

pub struct DataCleaner;

impl DataCleanerTrait for DataCleaner {
    fn clean_text(&self, value: &str, uppercase: bool) -> String {
        let trimmed = value.trim();
        if uppercase {
            trimmed.to_uppercase()
        } else {
            trimmed.to_string()
        }
    }

    fn normalize_null(&self, value: Option<String>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn normalize_unit(&self, value: &str) -> Option<Unit> {
        let key: String = value
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_uppercase())
            .collect();

        if let Some(unit) = Unit::from_str(&key) {
            return Some(unit);
        }

        match key.as_str() {
            "EACH" => Some(Unit::Ea),
            "SQFT" | "SQUAREFOOT" | "SQUAREFEET" => Some(Unit::Sf),
            "SQUARE" | "SQUARES" => Some(Unit::Sq),
            "SQYD" | "SQUAREYARD" => Some(Unit::Sy),
            "LINFT" | "LINEARFOOT" | "LINEARFEET" => Some(Unit::Lf),
            "HOUR" | "HOURS" | "HRS" => Some(Unit::Hr),
            "DAY" | "DAYS" => Some(Unit::Da),
            "BUNDLE" | "BUNDLES" => Some(Unit::Bdl),
            "ROLL" | "ROLLS" => Some(Unit::Rol),
            "GALLON" | "GALLONS" => Some(Unit::Gal),
            "LUMPSUM" => Some(Unit::Ls),
            _ => None,
        }
    }

    fn clean_row(&self, row: ParsedImportRow) -> ParsedImportRow {
        ParsedImportRow {
            item_code: self.clean_code(row.item_code),
            category_code: self.clean_code(row.category_code),
            selector_code: self.clean_code(row.selector_code),
            description: self.normalize_null(row.description),
            unit: self
                .normalize_null(row.unit)
                .map(|u| match self.normalize_unit(&u) {
                    Some(unit) => unit.to_db_str().to_string(),
                    None => self.clean_text(&u, true), // 保留原值，由校验器报告
                }),
            ..row
        }
    }
}

impl DataCleaner {
    /// 代码字段: TRIM + UPPER + 合并连续空白
    pub fn clean_code(&self, value: Option<String>) -> Option<String> {
        self.normalize_null(value).map(|v| normalize_code(&v))
    }
}
