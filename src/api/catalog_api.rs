// ==========================================
// 保险修复估价系统 - 价目项 API
// ==========================================
// 职责: 价目项查询、维护、删除；价目分类维护
// 红线: unit_price = material + labor + equipment，偏离即拒绝
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::catalog::{
    normalize_code, CatalogFilter, CatalogItem, CatalogItemDraft, Category, RemoveOutcome,
};
use crate::engine::price_rollup::PriceRollup;
use crate::repository::{CatalogItemRepository, CategoryRepository, MacroRepository};

// ==========================================
// CatalogApi - 价目项 API
// ==========================================

/// 价目项API
///
/// 职责：
/// 1. 价目项查询（单条 / 条件列表 / 按代码）
/// 2. 价目项保存（unit_price 重算与一致性校验）
/// 3. 价目项删除（返回受影响的宏明细）
/// 4. 价目分类维护
pub struct CatalogApi {
    item_repo: Arc<CatalogItemRepository>,
    category_repo: Arc<CategoryRepository>,
    macro_repo: Arc<MacroRepository>,
    config: Arc<ConfigManager>,
}

impl CatalogApi {
    pub fn new(
        item_repo: Arc<CatalogItemRepository>,
        category_repo: Arc<CategoryRepository>,
        macro_repo: Arc<MacroRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            item_repo,
            category_repo,
            macro_repo,
            config,
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 按 ID 查询价目项
    ///
    /// # 返回
    /// - Err(ApiError::NotFound): 价目项不存在
    pub fn get(&self, id: &str) -> ApiResult<CatalogItem> {
        self.item_repo
            .find_by_id(id)?
            .ok_or_else(|| ApiError::NotFound(format!("价目项(id={})不存在", id)))
    }

    /// 按价目代码查询
    pub fn find_by_code(&self, item_code: &str) -> ApiResult<Option<CatalogItem>> {
        let code = normalize_code(item_code);
        if code.is_empty() {
            return Err(ApiError::InvalidInput("价目代码不能为空".to_string()));
        }
        Ok(self.item_repo.find_by_code(&code)?)
    }

    /// 条件查询价目项（不传条件返回全部）
    pub fn list(&self, filter: Option<CatalogFilter>) -> ApiResult<Vec<CatalogItem>> {
        let filter = filter.unwrap_or_default();
        let items = self.item_repo.list(&filter)?;
        debug!(count = items.len(), "价目项查询完成");
        Ok(items)
    }

    // ==========================================
    // 写入接口
    // ==========================================

    /// 新建或更新价目项
    ///
    /// 定位规则: 优先按 id；未提供 id 时按 item_code 匹配已有价目项
    ///
    /// # 返回
    /// - Ok(CatalogItem): 保存后的价目项（unit_price 为三段之和）
    /// - Err(ApiError::InvariantViolation): 提供的 unit_price 偏离三段之和
    /// - Err(ApiError::NotFound): 指定 id 或分类不存在
    pub fn upsert(&self, draft: CatalogItemDraft) -> ApiResult<CatalogItem> {
        let mut draft = draft;
        draft.item_code = normalize_code(&draft.item_code);
        draft.description = draft.description.trim().to_string();

        if draft.item_code.is_empty() {
            return Err(ApiError::InvalidInput("价目代码不能为空".to_string()));
        }
        if draft.description.is_empty() {
            return Err(ApiError::InvalidInput("价目描述不能为空".to_string()));
        }

        if let Some(ref category_id) = draft.category_id {
            if self.category_repo.find_by_id(category_id)?.is_none() {
                return Err(ApiError::NotFound(format!("价目分类(id={})不存在", category_id)));
            }
        }

        let tolerance = self
            .config
            .get_unit_price_tolerance()
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        let unit_price = PriceRollup::new(tolerance).resolve_unit_price(&draft)?;

        let existing = match draft.id {
            Some(ref id) => Some(
                self.item_repo
                    .find_by_id(id)?
                    .ok_or_else(|| ApiError::NotFound(format!("价目项(id={})不存在", id)))?,
            ),
            None => self.item_repo.find_by_code(&draft.item_code)?,
        };

        let now = Utc::now();
        let (id, created_at) = match existing {
            Some(ref current) => (current.id.clone(), current.created_at),
            None => (Uuid::new_v4().to_string(), now),
        };

        let item = draft.into_item(id, unit_price, created_at, now);
        self.item_repo.save(&item)?;

        info!(
            id = %item.id,
            item_code = %item.item_code,
            unit_price = item.unit_price,
            created = existing.is_none(),
            "价目项已保存"
        );
        Ok(item)
    }

    /// 删除价目项
    ///
    /// 引用它的宏明细保留（展示快照仍可用），计算时按引用缺失计 0
    ///
    /// # 返回
    /// - Ok(RemoveOutcome): 受影响的宏明细 ID
    /// - Err(ApiError::NotFound): 价目项不存在
    pub fn remove(&self, id: &str) -> ApiResult<RemoveOutcome> {
        let item = self.get(id)?;
        let affected_binding_ids = self.macro_repo.find_binding_ids_by_catalog_item(id)?;

        self.item_repo.delete(id)?;

        if !affected_binding_ids.is_empty() {
            warn!(
                id = %id,
                item_code = %item.item_code,
                affected = affected_binding_ids.len(),
                "价目项已删除，仍有宏明细引用该价目项"
            );
        } else {
            info!(id = %id, item_code = %item.item_code, "价目项已删除");
        }

        Ok(RemoveOutcome {
            removed_id: id.to_string(),
            affected_binding_ids,
        })
    }

    // ==========================================
    // 价目分类
    // ==========================================

    /// 新建或更新分类（按 code 匹配）
    pub fn upsert_category(&self, code: &str, name: &str, sort_order: i32) -> ApiResult<Category> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(ApiError::InvalidInput("分类代码不能为空".to_string()));
        }

        let id = match self.category_repo.find_by_code(&code)? {
            Some(existing) => existing.id,
            None => Uuid::new_v4().to_string(),
        };

        let category = Category {
            id,
            code,
            name: name.trim().to_string(),
            sort_order,
        };
        self.category_repo.save(&category)?;
        debug!(code = %category.code, "价目分类已保存");
        Ok(category)
    }

    pub fn list_categories(&self) -> ApiResult<Vec<Category>> {
        Ok(self.category_repo.list_all()?)
    }

    pub fn find_category_by_code(&self, code: &str) -> ApiResult<Option<Category>> {
        Ok(self.category_repo.find_by_code(&normalize_code(code))?)
    }
}
