// ==========================================
// 保险修复估价系统 - 价目导入 Trait
// ==========================================
// 职责: 定义价目导入管道各阶段接口（不包含实现）
// 管道: 文件解析 → 字段映射 → 清洗 → 行校验 → 映射为价目项 → 落库
// ==========================================

use crate::domain::import::{ImportReport, ParsedImportRow};
use crate::domain::types::Unit;
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

// ==========================================
// RawImportRow - 文件解析后的原始行
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct RawImportRow {
    pub row_number: usize,               // 文件中的行号（表头为第 1 行）
    pub cells: HashMap<String, String>,  // 列名 → 原始值（已 trim）
}

// ==========================================
// CatalogImporter Trait
// ==========================================
// 用途: 价目导入主接口
// 实现者: CatalogImporterImpl
#[async_trait]
pub trait CatalogImporter: Send + Sync {
    /// 从文件导入（按扩展名选择 CSV / Excel 解析器）
    ///
    /// # 返回
    /// - Ok(ImportReport): 导入报告（含行级错误与警告）
    /// - Err: 文件无法读取、存储失败等批次级错误
    async fn import_file<P: AsRef<Path> + Send>(&self, file_path: P) -> ImportResult<ImportReport>;

    /// 导入已解析的行（外部解析器产出）
    ///
    /// # 参数
    /// - rows: 有序行列表
    /// - source_name: 来源名称（记录在导入批次中）
    async fn import_rows(
        &self,
        rows: Vec<ParsedImportRow>,
        source_name: Option<String>,
    ) -> ImportResult<ImportReport>;

    /// 批量导入多个文件（并发执行）
    ///
    /// # 说明
    /// - 每个文件的导入是独立的，某个文件失败不影响其他文件
    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
    ) -> Vec<Result<ImportReport, String>>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件为原始行记录（跳过完全空白的行）
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<Vec<RawImportRow>>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
pub trait FieldMapper: Send + Sync {
    /// 将原始行映射为 ParsedImportRow（列名别名 + 类型转换）
    ///
    /// # 返回
    /// - Err(TypeConversionError): 数值/布尔列无法解析
    fn map_to_parsed_row(&self, row: &RawImportRow) -> ImportResult<ParsedImportRow>;
}

// ==========================================
// DataCleaner Trait
// ==========================================
pub trait DataCleaner: Send + Sync {
    /// 清洗文本字段（TRIM，可选 UPPER）
    fn clean_text(&self, value: &str, uppercase: bool) -> String;

    /// 标准化 NULL 值（空字符串/空白 → None）
    fn normalize_null(&self, value: Option<String>) -> Option<String>;

    /// 计量单位标准化（含常见别名）
    fn normalize_unit(&self, value: &str) -> Option<Unit>;

    /// 整行清洗
    fn clean_row(&self, row: ParsedImportRow) -> ParsedImportRow;
}

// ==========================================
// RowValidator Trait
// ==========================================
pub trait RowValidator: Send + Sync {
    /// 行级校验（必填字段、数值范围、单位可识别）
    fn validate_row(&self, row: &ParsedImportRow) -> ImportResult<()>;
}
