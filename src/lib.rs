// ==========================================
// 保险修复估价系统 - 核心库
// ==========================================
// 定位: 价目库 + 定价宏 + 价目导入
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 价格规则与宏计算
pub mod engine;

// 导入层 - 外部价目表
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{InputNumericType, QuantityType, Unit};

// 领域实体
pub use domain::{
    BindingDraft, BindingEvaluation, CatalogFilter, CatalogItem, CatalogItemDraft, Category,
    CostBreakdown, EvaluationDiagnostic, ImportBatch, ImportReport, MacroDefinition, MacroDraft,
    MacroEvaluation, MacroItemBinding, MeasurementValues, ParsedImportRow, RemoveOutcome,
    RequiredInput,
};

// 引擎
pub use engine::{CatalogLookup, MacroEvaluationEngine, PriceRollup};

// 导入器
pub use importer::{CatalogImporter, CatalogImporterImpl};

// API
pub use api::{ApiError, ApiResult, CatalogApi, ImportApi, MacroApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "保险修复估价系统";
