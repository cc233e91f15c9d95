// ==========================================
// 保险修复估价系统 - 定价宏计算引擎
// ==========================================
// 职责: 测量输入 → 明细数量 → 材料/人工/合计 → 宏汇总
// 输入: MacroDefinition + MacroItemBinding[] + 价目项查找表 + 测量输入
// 输出: MacroEvaluation（逐明细 + 汇总 + 诊断）
// ==========================================
// 红线: 纯函数，不读写数据库，不读取宏上的 calculated_* 缓存
// 红线: 缺失价目项/测量输入只产生诊断，不中断汇总
// ==========================================

use crate::domain::catalog::CatalogItem;
use crate::domain::estimate::{
    BindingEvaluation, CostBreakdown, EvaluationDiagnostic, MacroEvaluation, MeasurementValues,
};
use crate::domain::pricing_macro::{MacroDefinition, MacroItemBinding};
use crate::domain::types::QuantityType;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// per_square 明细固定读取的测量字段
pub const TOTAL_SQUARES_FIELD: &str = "total_squares";

// ==========================================
// CatalogLookup - 价目项查找接口
// ==========================================
pub trait CatalogLookup {
    fn lookup(&self, catalog_item_id: &str) -> Option<&CatalogItem>;
}

impl CatalogLookup for HashMap<String, CatalogItem> {
    fn lookup(&self, catalog_item_id: &str) -> Option<&CatalogItem> {
        self.get(catalog_item_id)
    }
}

/// 将价目项列表索引为 id → CatalogItem
pub fn index_catalog(items: Vec<CatalogItem>) -> HashMap<String, CatalogItem> {
    items.into_iter().map(|item| (item.id.clone(), item)).collect()
}

// ==========================================
// MacroEvaluationEngine - 定价宏计算引擎
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroEvaluationEngine;

impl MacroEvaluationEngine {
    /// 创建新的宏计算引擎
    pub fn new() -> Self {
        Self
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 计算明细数量（含损耗）
    ///
    /// 规则:
    /// - fixed: fixed_quantity × quantity_multiplier
    /// - calculated: values[input_field_name]（缺失为 0）× quantity_multiplier
    /// - per_square: values["total_squares"]（缺失为 0）× quantity_multiplier
    /// - 损耗率: waste_factor_override ?? catalog_item.waste_factor ?? 0
    /// - 结果 = base × (1 + waste / 100)
    ///
    /// 负数不截断，按原值传递
    pub fn compute_binding_quantity(
        &self,
        binding: &MacroItemBinding,
        catalog_item: Option<&CatalogItem>,
        values: &MeasurementValues,
    ) -> f64 {
        let base = self.base_quantity(binding, values) * binding.quantity_multiplier;

        let waste_factor = binding
            .waste_factor_override
            .or_else(|| catalog_item.map(|item| item.waste_factor))
            .unwrap_or(0.0);

        base * (1.0 + waste_factor / 100.0)
    }

    /// 计算明细费用
    ///
    /// - 未包含 / 价目项缺失 → {0, 0, 0}
    /// - material = 数量 × (material_override ?? material_price)
    /// - labor = 数量 × (labor_override ?? labor_price)
    /// - total = 数量 × (price_override ?? unit_price)
    ///
    /// total 与 material/labor 的覆写相互独立（部分覆写时 total ≠ material + labor）
    pub fn compute_binding_cost(
        &self,
        binding: &MacroItemBinding,
        catalog_item: Option<&CatalogItem>,
        values: &MeasurementValues,
    ) -> CostBreakdown {
        let item = match catalog_item {
            Some(item) if binding.is_included => item,
            _ => return CostBreakdown::ZERO,
        };

        let quantity = self.compute_binding_quantity(binding, Some(item), values);

        let material_price = binding.material_override.unwrap_or(item.material_price);
        let labor_price = binding.labor_override.unwrap_or(item.labor_price);
        let unit_price = binding.price_override.unwrap_or(item.unit_price);

        CostBreakdown {
            material: quantity * material_price,
            labor: quantity * labor_price,
            total: quantity * unit_price,
        }
    }

    /// 计算宏汇总（逐明细费用之和）
    ///
    /// 单条明细的价目项缺失不影响其余明细
    pub fn compute_macro_totals<C>(
        &self,
        _macro_def: &MacroDefinition,
        bindings: &[MacroItemBinding],
        catalog: &C,
        values: &MeasurementValues,
    ) -> CostBreakdown
    where
        C: CatalogLookup + ?Sized,
    {
        bindings
            .iter()
            .map(|binding| {
                self.compute_binding_cost(binding, catalog.lookup(&binding.catalog_item_id), values)
            })
            .sum()
    }

    /// 完整计算: 逐明细结果（按 sort_order）+ 汇总 + 诊断
    #[instrument(skip_all, fields(macro_code = %macro_def.code, bindings = bindings.len()))]
    pub fn evaluate<C>(
        &self,
        macro_def: &MacroDefinition,
        bindings: &[MacroItemBinding],
        catalog: &C,
        values: &MeasurementValues,
    ) -> MacroEvaluation
    where
        C: CatalogLookup + ?Sized,
    {
        let mut ordered: Vec<&MacroItemBinding> = bindings.iter().collect();
        ordered.sort_by_key(|b| b.sort_order);

        let mut items = Vec::with_capacity(ordered.len());
        let mut diagnostics = Vec::new();
        let mut totals = CostBreakdown::ZERO;

        for binding in ordered {
            let catalog_item = catalog.lookup(&binding.catalog_item_id);
            self.collect_diagnostics(macro_def, binding, catalog_item.is_some(), values, &mut diagnostics);

            let quantity = self.compute_binding_quantity(binding, catalog_item, values);
            let cost = self.compute_binding_cost(binding, catalog_item, values);
            totals += cost;

            items.push(BindingEvaluation {
                binding_id: binding.id.clone(),
                catalog_item_id: binding.catalog_item_id.clone(),
                item_code: binding.item_code.clone(),
                description: binding.description.clone(),
                group_name: binding.group_name.clone(),
                is_included: binding.is_included,
                is_optional: binding.is_optional,
                quantity,
                material: cost.material,
                labor: cost.labor,
                total: cost.total,
            });
        }

        if !diagnostics.is_empty() {
            warn!(
                macro_id = %macro_def.id,
                diagnostics = diagnostics.len(),
                "宏计算存在数据质量问题"
            );
        }

        debug!(
            material = totals.material,
            labor = totals.labor,
            total = totals.total,
            "宏计算完成"
        );

        MacroEvaluation {
            macro_id: macro_def.id.clone(),
            macro_code: macro_def.code.clone(),
            items,
            totals,
            diagnostics,
        }
    }

    // ==========================================
    // 内部方法
    // ==========================================

    /// 未乘倍数、未含损耗的基础数量
    fn base_quantity(&self, binding: &MacroItemBinding, values: &MeasurementValues) -> f64 {
        match binding.quantity_type {
            QuantityType::Fixed => binding.fixed_quantity,
            QuantityType::Calculated => binding
                .input_field_name
                .as_deref()
                .and_then(|name| values.get(name))
                .copied()
                .unwrap_or(0.0),
            QuantityType::PerSquare => values.get(TOTAL_SQUARES_FIELD).copied().unwrap_or(0.0),
        }
    }

    fn collect_diagnostics(
        &self,
        macro_def: &MacroDefinition,
        binding: &MacroItemBinding,
        catalog_found: bool,
        values: &MeasurementValues,
        out: &mut Vec<EvaluationDiagnostic>,
    ) {
        if !catalog_found {
            debug!(binding_id = %binding.id, catalog_item_id = %binding.catalog_item_id, "价目项不存在");
            out.push(EvaluationDiagnostic::ReferenceMissing {
                binding_id: binding.id.clone(),
                catalog_item_id: binding.catalog_item_id.clone(),
            });
        }

        match binding.quantity_type {
            QuantityType::Fixed => {}
            QuantityType::Calculated => {
                let field = binding.input_field_name.clone().unwrap_or_default();
                if !macro_def.declares_input(&field) {
                    out.push(EvaluationDiagnostic::UndeclaredInput {
                        binding_id: binding.id.clone(),
                        input_field_name: field.clone(),
                    });
                }
                if !values.contains_key(&field) {
                    out.push(EvaluationDiagnostic::UnresolvedInput {
                        binding_id: binding.id.clone(),
                        input_field_name: field,
                    });
                }
            }
            QuantityType::PerSquare => {
                if !values.contains_key(TOTAL_SQUARES_FIELD) {
                    out.push(EvaluationDiagnostic::UnresolvedInput {
                        binding_id: binding.id.clone(),
                        input_field_name: TOTAL_SQUARES_FIELD.to_string(),
                    });
                }
            }
        }
    }
}
