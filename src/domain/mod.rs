// ==========================================
// 保险修复估价系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、计算结果结构
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod catalog;
pub mod estimate;
pub mod import;
pub mod pricing_macro;
pub mod types;

// 重导出核心类型
pub use catalog::{
    normalize_code, CatalogFilter, CatalogItem, CatalogItemDraft, Category, RemoveOutcome,
};
pub use estimate::{
    BindingEvaluation, CostBreakdown, EvaluationDiagnostic, MacroEvaluation, MeasurementValues,
};
pub use import::{ImportBatch, ImportReport, ImportRowError, ImportRowWarning, ParsedImportRow};
pub use pricing_macro::{
    BindingDraft, MacroDefinition, MacroDraft, MacroItemBinding, RequiredInput,
};
pub use types::{InputNumericType, QuantityType, Unit};
