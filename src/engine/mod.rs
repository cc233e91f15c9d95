// ==========================================
// 保险修复估价系统 - 引擎层
// ==========================================
// 职责: 价目单价规则、宏绑定校验、宏估价计算
// 红线: Engine 不拼 SQL, 计算不写库, 诊断不打断计算
// ==========================================

pub mod binding_rules;
pub mod error;
pub mod macro_evaluation;
pub mod price_rollup;

// 重导出核心引擎
pub use binding_rules::{audit_bindings, validate_binding, validate_required_inputs};
pub use error::{EngineError, EngineResult};
pub use macro_evaluation::{index_catalog, CatalogLookup, MacroEvaluationEngine, TOTAL_SQUARES_FIELD};
pub use price_rollup::{PriceRollup, DEFAULT_UNIT_PRICE_TOLERANCE};
