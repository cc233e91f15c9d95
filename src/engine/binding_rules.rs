// ==========================================
// 保险修复估价系统 - 宏明细绑定规则
// ==========================================
// 职责: 绑定时校验（严格）+ 已有明细的数据质量审计（只报告）
// 说明: 计算期保持宽容，绑定期拒绝明显错误的输入
// ==========================================

use crate::domain::estimate::EvaluationDiagnostic;
use crate::domain::pricing_macro::{BindingDraft, MacroDefinition, MacroItemBinding, RequiredInput};
use crate::domain::types::QuantityType;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::macro_evaluation::CatalogLookup;
use crate::engine::price_rollup::validate_waste_factor;
use std::collections::HashSet;

/// 校验宏测量输入声明: 名称非空且唯一
pub fn validate_required_inputs(inputs: &[RequiredInput]) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for (idx, input) in inputs.iter().enumerate() {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(EngineError::EmptyInputName(idx));
        }
        if !seen.insert(name) {
            return Err(EngineError::DuplicateInputName(name.to_string()));
        }
    }
    Ok(())
}

/// 绑定时校验明细
///
/// # 参数
/// - macro_def: 明细所属宏
/// - draft: 待保存的明细
///
/// # 返回
/// - Err: 所属宏不一致 / calculated 缺少或引用未声明输入 / 数值非法 / 损耗率越界
pub fn validate_binding(macro_def: &MacroDefinition, draft: &BindingDraft) -> EngineResult<()> {
    if draft.macro_id != macro_def.id {
        return Err(EngineError::MacroMismatch {
            expected: macro_def.id.clone(),
            actual: draft.macro_id.clone(),
        });
    }

    ensure_finite("fixed_quantity", draft.fixed_quantity)?;
    ensure_finite("quantity_multiplier", draft.quantity_multiplier)?;

    for (field, value) in [
        ("price_override", draft.price_override),
        ("material_override", draft.material_override),
        ("labor_override", draft.labor_override),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(EngineError::InvalidPrice {
                    field: field.to_string(),
                    value: v,
                });
            }
        }
    }

    if let Some(waste) = draft.waste_factor_override {
        validate_waste_factor("waste_factor_override", waste)?;
    }

    if draft.quantity_type == QuantityType::Calculated {
        let field = draft
            .input_field_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(EngineError::MissingInputField)?;

        if !macro_def.declares_input(field) {
            return Err(EngineError::UndeclaredInput {
                field: field.to_string(),
                macro_code: macro_def.code.clone(),
            });
        }
    }

    Ok(())
}

/// 审计已有明细（不依赖测量输入）
///
/// 报告悬空价目引用和未声明的测量输入，供列表页提示
pub fn audit_bindings<C>(
    macro_def: &MacroDefinition,
    bindings: &[MacroItemBinding],
    catalog: &C,
) -> Vec<EvaluationDiagnostic>
where
    C: CatalogLookup + ?Sized,
{
    let mut diagnostics = Vec::new();

    for binding in bindings {
        if catalog.lookup(&binding.catalog_item_id).is_none() {
            diagnostics.push(EvaluationDiagnostic::ReferenceMissing {
                binding_id: binding.id.clone(),
                catalog_item_id: binding.catalog_item_id.clone(),
            });
        }

        if binding.quantity_type == QuantityType::Calculated {
            let field = binding.input_field_name.clone().unwrap_or_default();
            if !macro_def.declares_input(&field) {
                diagnostics.push(EvaluationDiagnostic::UndeclaredInput {
                    binding_id: binding.id.clone(),
                    input_field_name: field,
                });
            }
        }
    }

    diagnostics
}

fn ensure_finite(field: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::NonFiniteValue {
            field: field.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{InputNumericType, Unit};
    use chrono::Utc;
    use std::collections::HashMap;

    fn macro_def() -> MacroDefinition {
        MacroDefinition {
            id: "m1".to_string(),
            code: "ROOF-COMP-25".to_string(),
            name: "Comp roof".to_string(),
            description: None,
            category: None,
            required_inputs: vec![RequiredInput::new(
                "ridge_length",
                "Ridge",
                Unit::Lf,
                InputNumericType::Decimal,
            )],
            calculated_material_total: 0.0,
            calculated_labor_total: 0.0,
            calculated_total: 0.0,
            totals_refreshed_at: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_calculated_binding_requires_declared_input() {
        let m = macro_def();
        assert!(validate_binding(&m, &BindingDraft::calculated("m1", "ci", "ridge_length")).is_ok());

        let err = validate_binding(&m, &BindingDraft::calculated("m1", "ci", "valley_length")).unwrap_err();
        assert!(matches!(err, EngineError::UndeclaredInput { .. }));

        let mut blank = BindingDraft::calculated("m1", "ci", "");
        assert_eq!(validate_binding(&m, &blank), Err(EngineError::MissingInputField));
        blank.input_field_name = None;
        assert_eq!(validate_binding(&m, &blank), Err(EngineError::MissingInputField));
    }

    #[test]
    fn test_binding_value_checks() {
        let m = macro_def();

        let mut waste = BindingDraft::fixed("m1", "ci", 1.0);
        waste.waste_factor_override = Some(120.0);
        assert!(matches!(
            validate_binding(&m, &waste),
            Err(EngineError::WasteFactorOutOfRange { .. })
        ));

        let nan = BindingDraft::fixed("m1", "ci", f64::NAN);
        assert!(matches!(validate_binding(&m, &nan), Err(EngineError::NonFiniteValue { .. })));

        // 负倍数允许（按原值传递）
        let negative = BindingDraft::per_square("m1", "ci").with_multiplier(-1.0);
        assert!(validate_binding(&m, &negative).is_ok());

        let other = BindingDraft::fixed("m2", "ci", 1.0);
        assert!(matches!(validate_binding(&m, &other), Err(EngineError::MacroMismatch { .. })));
    }

    #[test]
    fn test_required_inputs_unique() {
        let inputs = vec![
            RequiredInput::new("total_squares", "Squares", Unit::Sq, InputNumericType::Decimal),
            RequiredInput::new("total_squares", "Squares again", Unit::Sq, InputNumericType::Decimal),
        ];
        assert_eq!(
            validate_required_inputs(&inputs),
            Err(EngineError::DuplicateInputName("total_squares".to_string()))
        );
        assert_eq!(
            validate_required_inputs(&[RequiredInput::new(" ", "x", Unit::Ea, InputNumericType::Integer)]),
            Err(EngineError::EmptyInputName(0))
        );
    }

    #[test]
    fn test_audit_reports_missing_reference() {
        let m = macro_def();
        let binding = MacroItemBinding {
            id: "b1".to_string(),
            macro_id: "m1".to_string(),
            catalog_item_id: "gone".to_string(),
            item_code: "RFG FELT15".to_string(),
            description: "Felt".to_string(),
            unit: Unit::Sq,
            quantity_type: QuantityType::Fixed,
            fixed_quantity: 1.0,
            input_field_name: None,
            quantity_multiplier: 1.0,
            price_override: None,
            material_override: None,
            labor_override: None,
            waste_factor_override: None,
            is_included: true,
            is_optional: false,
            sort_order: 0,
            group_name: None,
            created_at: Utc::now(),
        };

        let catalog: HashMap<String, crate::domain::catalog::CatalogItem> = HashMap::new();
        let report = audit_bindings(&m, &[binding], &catalog);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].binding_id(), "b1");
    }
}
