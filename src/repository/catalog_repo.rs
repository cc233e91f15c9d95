// ==========================================
// 保险修复估价系统 - 价目项/分类仓储
// ==========================================
// 职责: 管理 catalog_category / catalog_item 表的 CRUD 操作
// 红线: Repository 不含业务逻辑（单价重算在 API 层完成）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::catalog::{CatalogFilter, CatalogItem, Category};
use crate::domain::types::Unit;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{conversion_error, parse_timestamp};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const ITEM_COLUMNS: &str = r#"
    id, item_code, description, category_id, selector_code, unit,
    material_price, labor_price, equipment_price, unit_price,
    waste_factor, labor_minimum, is_taxable, useful_life, depreciation_percent,
    is_active, created_at, updated_at
"#;

/// 建表（两个仓储共用）
fn ensure_catalog_tables(conn: &Connection) -> RepositoryResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_category (
          id TEXT PRIMARY KEY,
          code TEXT NOT NULL UNIQUE,
          name TEXT NOT NULL,
          sort_order INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS catalog_item (
          id TEXT PRIMARY KEY,
          item_code TEXT NOT NULL UNIQUE,
          description TEXT NOT NULL,
          category_id TEXT,
          selector_code TEXT,
          unit TEXT NOT NULL,
          material_price REAL NOT NULL DEFAULT 0,
          labor_price REAL NOT NULL DEFAULT 0,
          equipment_price REAL NOT NULL DEFAULT 0,
          unit_price REAL NOT NULL DEFAULT 0,
          waste_factor REAL NOT NULL DEFAULT 0,
          labor_minimum REAL NOT NULL DEFAULT 0,
          is_taxable INTEGER NOT NULL DEFAULT 1,
          useful_life INTEGER,
          depreciation_percent REAL,
          is_active INTEGER NOT NULL DEFAULT 1,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL,
          FOREIGN KEY (category_id) REFERENCES catalog_category(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_catalog_item_category
          ON catalog_item(category_id);
        CREATE INDEX IF NOT EXISTS idx_catalog_item_active
          ON catalog_item(is_active);
        "#,
    )?;
    Ok(())
}

fn map_item_row(row: &Row<'_>) -> SqliteResult<CatalogItem> {
    let unit_raw: String = row.get(5)?;
    let unit = Unit::from_str(&unit_raw)
        .ok_or_else(|| conversion_error(5, format!("未知计量单位: {}", unit_raw)))?;

    Ok(CatalogItem {
        id: row.get(0)?,
        item_code: row.get(1)?,
        description: row.get(2)?,
        category_id: row.get(3)?,
        selector_code: row.get(4)?,
        unit,
        material_price: row.get(6)?,
        labor_price: row.get(7)?,
        equipment_price: row.get(8)?,
        unit_price: row.get(9)?,
        waste_factor: row.get(10)?,
        labor_minimum: row.get(11)?,
        is_taxable: row.get(12)?,
        useful_life: row.get(13)?,
        depreciation_percent: row.get(14)?,
        is_active: row.get(15)?,
        created_at: parse_timestamp(&row.get::<_, String>(16)?),
        updated_at: parse_timestamp(&row.get::<_, String>(17)?),
    })
}

fn save_item(conn: &Connection, item: &CatalogItem) -> RepositoryResult<usize> {
    let affected = conn.execute(
        r#"
        INSERT INTO catalog_item (
            id, item_code, description, category_id, selector_code, unit,
            material_price, labor_price, equipment_price, unit_price,
            waste_factor, labor_minimum, is_taxable, useful_life, depreciation_percent,
            is_active, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        ON CONFLICT(id) DO UPDATE SET
            item_code = excluded.item_code,
            description = excluded.description,
            category_id = excluded.category_id,
            selector_code = excluded.selector_code,
            unit = excluded.unit,
            material_price = excluded.material_price,
            labor_price = excluded.labor_price,
            equipment_price = excluded.equipment_price,
            unit_price = excluded.unit_price,
            waste_factor = excluded.waste_factor,
            labor_minimum = excluded.labor_minimum,
            is_taxable = excluded.is_taxable,
            useful_life = excluded.useful_life,
            depreciation_percent = excluded.depreciation_percent,
            is_active = excluded.is_active,
            updated_at = excluded.updated_at
        "#,
        params![
            item.id,
            item.item_code,
            item.description,
            item.category_id,
            item.selector_code,
            item.unit.to_db_str(),
            item.material_price,
            item.labor_price,
            item.equipment_price,
            item.unit_price,
            item.waste_factor,
            item.labor_minimum,
            item.is_taxable,
            item.useful_life,
            item.depreciation_percent,
            item.is_active,
            item.created_at.to_rfc3339(),
            item.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(affected)
}

// ==========================================
// CategoryRepository - 价目分类仓储
// ==========================================
pub struct CategoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CategoryRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        ensure_catalog_tables(&*repo.get_conn()?)?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建或更新分类（按 id）
    pub fn save(&self, category: &Category) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO catalog_category (id, code, name, sort_order)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                code = excluded.code,
                name = excluded.name,
                sort_order = excluded.sort_order
            "#,
            params![category.id, category.code, category.name, category.sort_order],
        )?;
        Ok(())
    }

    /// 按 code 精确查询
    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<Category>> {
        self.find_one("SELECT id, code, name, sort_order FROM catalog_category WHERE code = ?1", code)
    }

    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Category>> {
        self.find_one("SELECT id, code, name, sort_order FROM catalog_category WHERE id = ?1", id)
    }

    /// 全部分类（按 sort_order, code 排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<Category>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, code, name, sort_order FROM catalog_category ORDER BY sort_order, code",
        )?;
        let categories = stmt
            .query_map([], map_category_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(categories)
    }

    /// 分类 code → id 映射（导入时整批解析用）
    pub fn code_index(&self) -> RepositoryResult<HashMap<String, String>> {
        Ok(self
            .list_all()?
            .into_iter()
            .map(|c| (c.code, c.id))
            .collect())
    }

    pub fn delete(&self, id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM catalog_category WHERE id = ?1", params![id])?;
        Ok(affected)
    }

    fn find_one(&self, sql: &str, key: &str) -> RepositoryResult<Option<Category>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(sql, params![key], map_category_row);
        match result {
            Ok(category) => Ok(Some(category)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn map_category_row(row: &Row<'_>) -> SqliteResult<Category> {
    Ok(Category {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        sort_order: row.get(3)?,
    })
}

// ==========================================
// CatalogItemRepository - 价目项仓储
// ==========================================
/// 价目项仓储
/// 职责: 管理 catalog_item 表的 CRUD 操作
/// 红线: 不含业务逻辑，只负责数据访问
pub struct CatalogItemRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogItemRepository {
    /// 创建新的 CatalogItemRepository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        ensure_catalog_tables(&*repo.get_conn()?)?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建或更新价目项（按 id）
    ///
    /// # 返回
    /// - Err(UniqueConstraintViolation): item_code 已被其它价目项占用
    pub fn save(&self, item: &CatalogItem) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        save_item(&conn, item)?;
        Ok(())
    }

    /// 批量保存（单事务）
    ///
    /// # 返回
    /// - Ok(usize): 写入条数
    pub fn batch_save(&self, items: &[CatalogItem]) -> RepositoryResult<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        for item in items {
            save_item(&tx, item)?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }

    /// 按 id 查询
    ///
    /// # 返回
    /// - Ok(Some(CatalogItem)): 找到记录
    /// - Ok(None): 未找到记录
    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<CatalogItem>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM catalog_item WHERE id = ?1", ITEM_COLUMNS);
        match conn.query_row(&sql, params![id], map_item_row) {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按价目代码查询
    pub fn find_by_code(&self, item_code: &str) -> RepositoryResult<Option<CatalogItem>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM catalog_item WHERE item_code = ?1", ITEM_COLUMNS);
        match conn.query_row(&sql, params![item_code], map_item_row) {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 批量按 id 查询（缺失的 id 直接忽略）
    pub fn find_by_ids(&self, ids: &[String]) -> RepositoryResult<Vec<CatalogItem>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let conn = self.get_conn()?;
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT {} FROM catalog_item WHERE id IN ({})",
            ITEM_COLUMNS, placeholders
        );

        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();

        let items = stmt
            .query_map(params.as_slice(), map_item_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items)
    }

    /// 批量按代码查询（导入冲突检测用）
    ///
    /// # 返回
    /// - Ok(HashMap<item_code, CatalogItem>): 已存在的价目项
    pub fn find_by_codes(&self, codes: &[String]) -> RepositoryResult<HashMap<String, CatalogItem>> {
        if codes.is_empty() {
            return Ok(HashMap::new());
        }

        let conn = self.get_conn()?;
        let placeholders = codes.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT {} FROM catalog_item WHERE item_code IN ({})",
            ITEM_COLUMNS, placeholders
        );

        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            codes.iter().map(|c| c as &dyn rusqlite::ToSql).collect();

        let items = stmt
            .query_map(params.as_slice(), map_item_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items
            .into_iter()
            .map(|item| (item.item_code.clone(), item))
            .collect())
    }

    /// 条件查询（按 item_code 排序）
    ///
    /// 启用状态与分类在 SQL 中过滤，文本搜索在内存中按 CatalogFilter 规则匹配
    pub fn list(&self, filter: &CatalogFilter) -> RepositoryResult<Vec<CatalogItem>> {
        let conn = self.get_conn()?;

        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(active) = filter.is_active {
            clauses.push("is_active = ?");
            values.push(Box::new(active));
        }
        if let Some(ref category_id) = filter.category_id {
            clauses.push("category_id = ?");
            values.push(Box::new(category_id.clone()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {} FROM catalog_item {} ORDER BY item_code",
            ITEM_COLUMNS, where_sql
        );

        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let items = stmt
            .query_map(params.as_slice(), map_item_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(items.into_iter().filter(|item| filter.matches(item)).collect())
    }

    /// 物理删除
    ///
    /// # 返回
    /// - Ok(usize): 删除行数（0 表示不存在）
    pub fn delete(&self, id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM catalog_item WHERE id = ?1", params![id])?;
        Ok(affected)
    }

    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM catalog_item", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn memory_conn() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn item(id: &str, code: &str, description: &str) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            item_code: code.to_string(),
            description: description.to_string(),
            category_id: None,
            selector_code: None,
            unit: Unit::Sq,
            material_price: 12.5,
            labor_price: 7.37,
            equipment_price: 0.0,
            unit_price: 19.87,
            waste_factor: 5.0,
            labor_minimum: 0.0,
            is_taxable: true,
            useful_life: Some(20),
            depreciation_percent: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_and_find() {
        let repo = CatalogItemRepository::from_connection(memory_conn()).unwrap();
        repo.save(&item("a", "RFG FELT15", "Roofing felt")).unwrap();

        let found = repo.find_by_id("a").unwrap().unwrap();
        assert_eq!(found.unit, Unit::Sq);
        assert_eq!(found.useful_life, Some(20));
        assert!(repo.find_by_code("RFG FELT15").unwrap().is_some());
        assert!(repo.find_by_id("zzz").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_code_is_unique_violation() {
        let repo = CatalogItemRepository::from_connection(memory_conn()).unwrap();
        repo.save(&item("a", "RFG FELT15", "Felt")).unwrap();
        let err = repo.save(&item("b", "RFG FELT15", "Felt copy")).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_list_with_filter_and_delete() {
        let conn = memory_conn();
        let categories = CategoryRepository::from_connection(conn.clone()).unwrap();
        let repo = CatalogItemRepository::from_connection(conn).unwrap();

        categories
            .save(&Category {
                id: "cat-rfg".to_string(),
                code: "RFG".to_string(),
                name: "Roofing".to_string(),
                sort_order: 1,
            })
            .unwrap();

        let mut a = item("a", "RFG FELT15", "Roofing felt");
        a.category_id = Some("cat-rfg".to_string());
        let mut b = item("b", "DRY 1/2", "Drywall");
        b.is_active = false;
        repo.batch_save(&[a, b]).unwrap();

        let active = repo
            .list(&CatalogFilter {
                is_active: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(active.len(), 1);

        let roofing = repo
            .list(&CatalogFilter {
                category_id: Some("cat-rfg".to_string()),
                search: Some("FELT".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(roofing[0].id, "a");

        assert_eq!(categories.code_index().unwrap().get("RFG").map(String::as_str), Some("cat-rfg"));
        assert_eq!(repo.find_by_codes(&["DRY 1/2".to_string()]).unwrap().len(), 1);

        assert_eq!(repo.delete("b").unwrap(), 1);
        assert_eq!(repo.delete("b").unwrap(), 0);
        assert_eq!(repo.count().unwrap(), 1);
    }
}
