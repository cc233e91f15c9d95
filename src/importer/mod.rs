// ==========================================
// 保险修复估价系统 - 导入层
// ==========================================
// 职责: 外部价目表导入,生成价目项
// 支持: Excel, CSV, 已解析行
// ==========================================

// 模块声明
pub mod catalog_importer_impl;
pub mod catalog_importer_trait;
pub mod data_cleaner;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod import_mapper;
pub mod row_validator;

// 重导出核心类型
pub use catalog_importer_impl::CatalogImporterImpl;
pub use data_cleaner::DataCleaner as DataCleanerImpl;
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper as FieldMapperImpl;
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use import_mapper::{ImportMapper, MappedRow, MappingContext};
pub use row_validator::RowValidator as RowValidatorImpl;

// 重导出 Trait 接口
pub use catalog_importer_trait::{
    CatalogImporter, DataCleaner, FieldMapper, FileParser, RawImportRow, RowValidator,
};
