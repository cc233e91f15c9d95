// ==========================================
// 保险修复估价系统 - 定价宏 API
// ==========================================
// 职责: 宏与宏明细维护、宏估价计算、展示缓存回写
// 红线: 计算只读价目项实时价格；缓存仅在重算成功后回写
// ==========================================

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::catalog::{normalize_code, CatalogItem};
use crate::domain::estimate::{EvaluationDiagnostic, MacroEvaluation, MeasurementValues};
use crate::domain::pricing_macro::{BindingDraft, MacroDefinition, MacroDraft, MacroItemBinding};
use crate::engine::binding_rules::{audit_bindings, validate_binding, validate_required_inputs};
use crate::engine::macro_evaluation::{index_catalog, MacroEvaluationEngine};
use crate::repository::{CatalogItemRepository, MacroRepository};

// ==========================================
// MacroApi - 定价宏 API
// ==========================================
pub struct MacroApi {
    macro_repo: Arc<MacroRepository>,
    item_repo: Arc<CatalogItemRepository>,
    engine: MacroEvaluationEngine,
}

impl MacroApi {
    pub fn new(macro_repo: Arc<MacroRepository>, item_repo: Arc<CatalogItemRepository>) -> Self {
        Self {
            macro_repo,
            item_repo,
            engine: MacroEvaluationEngine::new(),
        }
    }

    // ==========================================
    // 宏定义
    // ==========================================

    /// 新建或更新宏
    ///
    /// # 返回
    /// - Err(ApiError::InvalidInput): 代码/名称为空，或测量输入名为空、重复
    /// - Err(ApiError::NotFound): 指定 id 不存在
    pub fn save_macro(&self, mut draft: MacroDraft) -> ApiResult<MacroDefinition> {
        let code = normalize_code(&draft.code);
        let name = draft.name.trim().to_string();
        if code.is_empty() {
            return Err(ApiError::InvalidInput("宏代码不能为空".to_string()));
        }
        if name.is_empty() {
            return Err(ApiError::InvalidInput("宏名称不能为空".to_string()));
        }
        // 计算期按名称精确匹配，保存前去除首尾空白
        for input in draft.required_inputs.iter_mut() {
            input.name = input.name.trim().to_string();
        }
        validate_required_inputs(&draft.required_inputs)?;

        let now = Utc::now();
        let macro_def = match draft.id {
            Some(ref id) => {
                let current = self.get_macro(id)?;
                MacroDefinition {
                    code,
                    name,
                    description: draft.description,
                    category: draft.category,
                    required_inputs: draft.required_inputs,
                    is_active: draft.is_active,
                    updated_at: now,
                    ..current
                }
            }
            None => MacroDefinition {
                id: Uuid::new_v4().to_string(),
                code,
                name,
                description: draft.description,
                category: draft.category,
                required_inputs: draft.required_inputs,
                calculated_material_total: 0.0,
                calculated_labor_total: 0.0,
                calculated_total: 0.0,
                totals_refreshed_at: None,
                is_active: draft.is_active,
                created_at: now,
                updated_at: now,
            },
        };

        self.macro_repo.save_macro(&macro_def)?;
        info!(id = %macro_def.id, code = %macro_def.code, "定价宏已保存");
        Ok(macro_def)
    }

    pub fn get_macro(&self, id: &str) -> ApiResult<MacroDefinition> {
        self.macro_repo
            .find_macro_by_id(id)?
            .ok_or_else(|| ApiError::NotFound(format!("定价宏(id={})不存在", id)))
    }

    pub fn get_macro_by_code(&self, code: &str) -> ApiResult<MacroDefinition> {
        let code = normalize_code(code);
        self.macro_repo
            .find_macro_by_code(&code)?
            .ok_or_else(|| ApiError::NotFound(format!("定价宏(code={})不存在", code)))
    }

    pub fn list_macros(&self, active_only: bool) -> ApiResult<Vec<MacroDefinition>> {
        Ok(self.macro_repo.list_macros(active_only)?)
    }

    /// 删除宏（明细级联删除）
    pub fn delete_macro(&self, id: &str) -> ApiResult<()> {
        if self.macro_repo.delete_macro(id)? == 0 {
            return Err(ApiError::NotFound(format!("定价宏(id={})不存在", id)));
        }
        info!(id = %id, "定价宏已删除");
        Ok(())
    }

    // ==========================================
    // 宏明细
    // ==========================================

    /// 新建或更新宏明细
    ///
    /// 展示快照（item_code/description/unit）在此处从价目项复制
    ///
    /// # 返回
    /// - Err(ApiError::InvalidInput): 绑定校验失败
    /// - Err(ApiError::NotFound): 宏或价目项不存在
    pub fn save_binding(&self, mut draft: BindingDraft) -> ApiResult<MacroItemBinding> {
        draft.input_field_name = draft
            .input_field_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let macro_def = self.get_macro(&draft.macro_id)?;
        validate_binding(&macro_def, &draft)?;

        let item = self.item_repo.find_by_id(&draft.catalog_item_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("价目项(id={})不存在", draft.catalog_item_id))
        })?;

        let (id, created_at) = match draft.id {
            Some(ref id) => {
                let current = self.macro_repo.find_binding_by_id(id)?.ok_or_else(|| {
                    ApiError::NotFound(format!("宏明细(id={})不存在", id))
                })?;
                if current.macro_id != macro_def.id {
                    return Err(ApiError::BusinessRuleViolation(format!(
                        "宏明细(id={})不属于宏 {}",
                        id, macro_def.code
                    )));
                }
                (current.id, current.created_at)
            }
            None => (Uuid::new_v4().to_string(), Utc::now()),
        };

        let binding = MacroItemBinding {
            id,
            macro_id: macro_def.id.clone(),
            catalog_item_id: item.id.clone(),
            item_code: item.item_code.clone(),
            description: item.description.clone(),
            unit: item.unit,
            quantity_type: draft.quantity_type,
            fixed_quantity: draft.fixed_quantity,
            input_field_name: draft.input_field_name,
            quantity_multiplier: draft.quantity_multiplier,
            price_override: draft.price_override,
            material_override: draft.material_override,
            labor_override: draft.labor_override,
            waste_factor_override: draft.waste_factor_override,
            is_included: draft.is_included,
            is_optional: draft.is_optional,
            sort_order: draft.sort_order,
            group_name: draft.group_name,
            created_at,
        };

        self.macro_repo.save_binding(&binding)?;
        debug!(
            macro_code = %macro_def.code,
            binding_id = %binding.id,
            item_code = %binding.item_code,
            "宏明细已保存"
        );
        Ok(binding)
    }

    pub fn remove_binding(&self, id: &str) -> ApiResult<()> {
        if self.macro_repo.delete_binding(id)? == 0 {
            return Err(ApiError::NotFound(format!("宏明细(id={})不存在", id)));
        }
        Ok(())
    }

    pub fn list_bindings(&self, macro_id: &str) -> ApiResult<Vec<MacroItemBinding>> {
        Ok(self.macro_repo.list_bindings(macro_id)?)
    }

    // ==========================================
    // 计算
    // ==========================================

    /// 宏估价计算（只读）
    pub fn evaluate(&self, macro_id: &str, values: &MeasurementValues) -> ApiResult<MacroEvaluation> {
        let (macro_def, bindings, catalog) = self.load_evaluation_context(macro_id)?;
        Ok(self.engine.evaluate(&macro_def, &bindings, &catalog, values))
    }

    /// 宏估价计算并回写展示缓存
    pub fn evaluate_and_refresh(
        &self,
        macro_id: &str,
        values: &MeasurementValues,
    ) -> ApiResult<MacroEvaluation> {
        let evaluation = self.evaluate(macro_id, values)?;

        let updated = self
            .macro_repo
            .update_cached_totals(macro_id, &evaluation.totals, Utc::now())?;
        if updated == 0 {
            return Err(ApiError::NotFound(format!("定价宏(id={})不存在", macro_id)));
        }

        if evaluation.has_warnings() {
            warn!(
                macro_code = %evaluation.macro_code,
                diagnostics = evaluation.diagnostics.len(),
                "宏缓存已回写，计算存在诊断提示"
            );
        }
        info!(
            macro_code = %evaluation.macro_code,
            material = evaluation.totals.material,
            labor = evaluation.totals.labor,
            total = evaluation.totals.total,
            "宏缓存已回写"
        );
        Ok(evaluation)
    }

    /// 明细数据质量审计（悬空引用 / 未声明输入）
    pub fn audit(&self, macro_id: &str) -> ApiResult<Vec<EvaluationDiagnostic>> {
        let (macro_def, bindings, catalog) = self.load_evaluation_context(macro_id)?;
        Ok(audit_bindings(&macro_def, &bindings, &catalog))
    }

    fn load_evaluation_context(
        &self,
        macro_id: &str,
    ) -> ApiResult<(MacroDefinition, Vec<MacroItemBinding>, HashMap<String, CatalogItem>)> {
        let macro_def = self.get_macro(macro_id)?;
        let bindings = self.macro_repo.list_bindings(macro_id)?;

        let item_ids: Vec<String> = {
            let mut seen = HashSet::new();
            bindings
                .iter()
                .filter(|b| seen.insert(b.catalog_item_id.clone()))
                .map(|b| b.catalog_item_id.clone())
                .collect()
        };
        let catalog = index_catalog(self.item_repo.find_by_ids(&item_ids)?);

        Ok((macro_def, bindings, catalog))
    }
}
