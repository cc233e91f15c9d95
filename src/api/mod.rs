// ==========================================
// 保险修复估价系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令行与宿主程序调用
// ==========================================

pub mod catalog_api;
pub mod error;
pub mod import_api;
pub mod macro_api;

// 重导出核心类型
pub use catalog_api::CatalogApi;
pub use error::{ApiError, ApiResult};
pub use import_api::{FileImportOutcome, ImportApi};
pub use macro_api::MacroApi;
