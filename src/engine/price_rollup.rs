// ==========================================
// 保险修复估价系统 - 价目项单价汇总
// ==========================================
// 职责: 价目项保存前的价格校验与 unit_price 重算
// 红线: unit_price = material + labor + equipment，偏差超出容差直接拒绝
// ==========================================

use crate::domain::catalog::CatalogItemDraft;
use crate::engine::error::{EngineError, EngineResult};
use tracing::debug;

/// 默认单价容差（半美分）
pub const DEFAULT_UNIT_PRICE_TOLERANCE: f64 = 0.005;

// ==========================================
// PriceRollup - 单价汇总器
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct PriceRollup {
    tolerance: f64,
}

impl Default for PriceRollup {
    fn default() -> Self {
        Self::new(DEFAULT_UNIT_PRICE_TOLERANCE)
    }
}

impl PriceRollup {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    /// 解析待保存的 unit_price
    ///
    /// # 返回
    /// - Ok(component_sum): 未提供 unit_price，或提供值与三段之和在容差内
    /// - Err(InvariantViolation): 提供值偏离三段之和
    pub fn resolve_unit_price(&self, draft: &CatalogItemDraft) -> EngineResult<f64> {
        validate_component_prices(draft)?;

        let expected = draft.component_sum();
        match draft.unit_price {
            None => Ok(expected),
            Some(supplied) if !supplied.is_finite() => Err(EngineError::InvalidPrice {
                field: "unit_price".to_string(),
                value: supplied,
            }),
            Some(supplied) if (supplied - expected).abs() <= self.tolerance => {
                debug!(item_code = %draft.item_code, supplied, expected, "unit_price 在容差内，按三段之和保存");
                Ok(expected)
            }
            Some(supplied) => Err(EngineError::InvariantViolation {
                item_code: draft.item_code.clone(),
                supplied,
                expected,
            }),
        }
    }
}

/// 三段单价与损耗率的取值校验
pub fn validate_component_prices(draft: &CatalogItemDraft) -> EngineResult<()> {
    for (field, value) in [
        ("material_price", draft.material_price),
        ("labor_price", draft.labor_price),
        ("equipment_price", draft.equipment_price),
        ("labor_minimum", draft.labor_minimum),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(EngineError::InvalidPrice {
                field: field.to_string(),
                value,
            });
        }
    }

    validate_waste_factor("waste_factor", draft.waste_factor)
}

/// 损耗率必须落在 [0, 100]
pub fn validate_waste_factor(field: &str, value: f64) -> EngineResult<()> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(EngineError::WasteFactorOutOfRange {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Unit;

    fn draft() -> CatalogItemDraft {
        CatalogItemDraft::new("RFG LAMI<", "Laminated comp shingle", Unit::Sq).with_prices(145.0, 122.52, 0.0)
    }

    #[test]
    fn test_missing_unit_price_is_recomputed() {
        let price = PriceRollup::default().resolve_unit_price(&draft()).unwrap();
        assert!((price - 267.52).abs() < 1e-9);
    }

    #[test]
    fn test_unit_price_within_tolerance_snaps_to_sum() {
        let mut d = draft();
        d.unit_price = Some(267.524);
        let price = PriceRollup::default().resolve_unit_price(&d).unwrap();
        assert!((price - 267.52).abs() < 1e-9);
    }

    #[test]
    fn test_divergent_unit_price_is_rejected() {
        let mut d = draft();
        d.unit_price = Some(300.0);
        let err = PriceRollup::default().resolve_unit_price(&d).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation { .. }));
    }

    #[test]
    fn test_negative_component_is_rejected() {
        let d = draft().with_prices(-1.0, 0.0, 0.0);
        let err = PriceRollup::default().resolve_unit_price(&d).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidPrice {
                field: "material_price".to_string(),
                value: -1.0
            }
        );
    }

    #[test]
    fn test_waste_factor_range() {
        assert!(validate_waste_factor("waste_factor", 0.0).is_ok());
        assert!(validate_waste_factor("waste_factor", 100.0).is_ok());
        assert!(validate_waste_factor("waste_factor", 100.5).is_err());
        assert!(validate_component_prices(&draft().with_waste_factor(-3.0)).is_err());
    }
}
