// ==========================================
// 保险修复估价系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 仅用于写入前的规则校验；宏计算本身不返回错误
// ==========================================

use thiserror::Error;

/// 引擎层规则校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    // ===== 价目项规则 =====
    #[error("单价不一致 (item_code={item_code}): 提供 {supplied:.4}，三段单价之和 {expected:.4}")]
    InvariantViolation {
        item_code: String,
        supplied: f64,
        expected: f64,
    },

    #[error("价格字段非法 (字段 {field}): {value}")]
    InvalidPrice { field: String, value: f64 },

    #[error("损耗率超出范围 (字段 {field}): {value}，允许 [0, 100]")]
    WasteFactorOutOfRange { field: String, value: f64 },

    // ===== 宏定义规则 =====
    #[error("测量输入名称为空 (位置 {0})")]
    EmptyInputName(usize),

    #[error("测量输入名称重复: {0}")]
    DuplicateInputName(String),

    // ===== 宏明细规则 =====
    #[error("明细所属宏不一致: 期望 {expected}，实际 {actual}")]
    MacroMismatch { expected: String, actual: String },

    #[error("calculated 明细缺少 input_field_name")]
    MissingInputField,

    #[error("测量输入 {field} 未在宏 {macro_code} 中声明")]
    UndeclaredInput { field: String, macro_code: String },

    #[error("数值非法 (字段 {field}): {value}")]
    NonFiniteValue { field: String, value: f64 },
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
