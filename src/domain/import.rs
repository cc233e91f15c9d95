// ==========================================
// 保险修复估价系统 - 价目导入领域模型
// ==========================================
// 依据: Xactimate 价目表导出格式（逐行）
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// ParsedImportRow - 导入中间结构体
// ==========================================
// 用途: 文件解析 → 字段映射 → 此结构 → 价目项
// 生命周期: 仅在导入流程内
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedImportRow {
    pub item_code: Option<String>,
    pub category_code: Option<String>,
    pub selector_code: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub unit_cost: f64,
    pub material_cost: f64,
    pub labor_cost: f64,
    pub labor_overhead: f64,
    pub equipment_cost: f64,
    pub labor_minimum: f64,
    pub useful_life: Option<i32>,
    pub depreciation_percent: Option<f64>,
    pub is_taxable: bool,
    pub raw_data: BTreeMap<String, String>, // 原始行（列名 → 值）

    // 元信息
    pub row_number: usize, // 原始文件行号（用于导入报告）
}

impl ParsedImportRow {
    /// 空行模板（数值为 0，计税默认开启）
    pub fn empty(row_number: usize) -> Self {
        Self {
            item_code: None,
            category_code: None,
            selector_code: None,
            description: None,
            unit: None,
            unit_cost: 0.0,
            material_cost: 0.0,
            labor_cost: 0.0,
            labor_overhead: 0.0,
            equipment_cost: 0.0,
            labor_minimum: 0.0,
            useful_life: None,
            depreciation_percent: None,
            is_taxable: true,
            raw_data: BTreeMap::new(),
            row_number,
        }
    }
}

// ==========================================
// ImportRowError - 行级错误
// ==========================================
// 红线: 单行失败不影响批次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRowError {
    pub row: usize,
    pub item_code: Option<String>,
    pub message: String,
}

// ==========================================
// ImportRowWarning - 行级警告（允许导入）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRowWarning {
    pub row: usize,
    pub item_code: Option<String>,
    pub field: String,
    pub message: String,
}

// ==========================================
// ImportReport - 导入报告
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub batch_id: String,
    pub total_rows: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize, // 已存在且配置为不更新
    pub errors: Vec<ImportRowError>,
    pub warnings: Vec<ImportRowWarning>,
    pub elapsed_ms: u128,
}

impl ImportReport {
    pub fn new(batch_id: impl Into<String>, total_rows: usize) -> Self {
        Self {
            batch_id: batch_id.into(),
            total_rows,
            ..Default::default()
        }
    }

    pub fn push_error(&mut self, row: usize, item_code: Option<String>, message: impl Into<String>) {
        self.errors.push(ImportRowError {
            row,
            item_code,
            message: message.into(),
        });
    }

    /// 成功落库行数
    pub fn written(&self) -> usize {
        self.created + self.updated
    }
}

// ==========================================
// ImportBatch - 导入批次
// ==========================================
// 对齐: catalog_import_batch 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportBatch {
    pub batch_id: String,
    pub file_name: Option<String>,
    pub total_rows: i32,
    pub created_rows: i32,
    pub updated_rows: i32,
    pub skipped_rows: i32,
    pub error_rows: i32,
    pub imported_at: DateTime<Utc>,
    pub imported_by: Option<String>,
    pub elapsed_ms: i64,
    pub report_json: Option<String>,
}

impl ImportBatch {
    /// 由导入报告生成批次记录
    pub fn from_report(report: &ImportReport, file_name: Option<String>) -> Self {
        Self {
            batch_id: report.batch_id.clone(),
            file_name,
            total_rows: report.total_rows as i32,
            created_rows: report.created as i32,
            updated_rows: report.updated as i32,
            skipped_rows: report.skipped as i32,
            error_rows: report.errors.len() as i32,
            imported_at: Utc::now(),
            imported_by: Some("system".to_string()),
            elapsed_ms: report.elapsed_ms as i64,
            report_json: serde_json::to_string(report).ok(),
        }
    }
}
