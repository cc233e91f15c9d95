// ==========================================
// 保险修复估价系统 - 定价宏仓储
// ==========================================
// 职责: 管理 macro_definition / macro_item 表
// 红线: Repository 不含业务逻辑
// 说明: macro_item.catalog_item_id 不设外键，价目项删除后明细保留
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::estimate::CostBreakdown;
use crate::domain::pricing_macro::{MacroDefinition, MacroItemBinding, RequiredInput};
use crate::domain::types::{QuantityType, Unit};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{conversion_error, parse_timestamp};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const MACRO_COLUMNS: &str = r#"
    id, code, name, description, category, required_inputs,
    calculated_material_total, calculated_labor_total, calculated_total, totals_refreshed_at,
    is_active, created_at, updated_at
"#;

const BINDING_COLUMNS: &str = r#"
    id, macro_id, catalog_item_id, item_code, description, unit,
    quantity_type, fixed_quantity, input_field_name, quantity_multiplier,
    price_override, material_override, labor_override, waste_factor_override,
    is_included, is_optional, sort_order, group_name, created_at
"#;

// ==========================================
// MacroRepository - 定价宏仓储
// ==========================================
pub struct MacroRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MacroRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_tables()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_tables(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS macro_definition (
              id TEXT PRIMARY KEY,
              code TEXT NOT NULL UNIQUE,
              name TEXT NOT NULL,
              description TEXT,
              category TEXT,
              required_inputs TEXT NOT NULL DEFAULT '[]',
              calculated_material_total REAL NOT NULL DEFAULT 0,
              calculated_labor_total REAL NOT NULL DEFAULT 0,
              calculated_total REAL NOT NULL DEFAULT 0,
              totals_refreshed_at TEXT,
              is_active INTEGER NOT NULL DEFAULT 1,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS macro_item (
              id TEXT PRIMARY KEY,
              macro_id TEXT NOT NULL,
              catalog_item_id TEXT NOT NULL,
              item_code TEXT NOT NULL,
              description TEXT NOT NULL,
              unit TEXT NOT NULL,
              quantity_type TEXT NOT NULL,
              fixed_quantity REAL NOT NULL DEFAULT 0,
              input_field_name TEXT,
              quantity_multiplier REAL NOT NULL DEFAULT 1,
              price_override REAL,
              material_override REAL,
              labor_override REAL,
              waste_factor_override REAL,
              is_included INTEGER NOT NULL DEFAULT 1,
              is_optional INTEGER NOT NULL DEFAULT 0,
              sort_order INTEGER NOT NULL DEFAULT 0,
              group_name TEXT,
              created_at TEXT NOT NULL,
              FOREIGN KEY (macro_id) REFERENCES macro_definition(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_macro_item_macro
              ON macro_item(macro_id, sort_order);
            CREATE INDEX IF NOT EXISTS idx_macro_item_catalog
              ON macro_item(catalog_item_id);
            "#,
        )?;
        Ok(())
    }

    // ==========================================
    // 宏定义
    // ==========================================

    /// 新建或更新宏（按 id）
    ///
    /// 说明: 不覆盖 calculated_* 缓存，缓存只能通过 update_cached_totals 回写
    pub fn save_macro(&self, macro_def: &MacroDefinition) -> RepositoryResult<()> {
        let required_inputs = serde_json::to_string(&macro_def.required_inputs)?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO macro_definition (
                id, code, name, description, category, required_inputs,
                calculated_material_total, calculated_labor_total, calculated_total, totals_refreshed_at,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO UPDATE SET
                code = excluded.code,
                name = excluded.name,
                description = excluded.description,
                category = excluded.category,
                required_inputs = excluded.required_inputs,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at
            "#,
            params![
                macro_def.id,
                macro_def.code,
                macro_def.name,
                macro_def.description,
                macro_def.category,
                required_inputs,
                macro_def.calculated_material_total,
                macro_def.calculated_labor_total,
                macro_def.calculated_total,
                macro_def.totals_refreshed_at.map(|dt| dt.to_rfc3339()),
                macro_def.is_active,
                macro_def.created_at.to_rfc3339(),
                macro_def.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn find_macro_by_id(&self, id: &str) -> RepositoryResult<Option<MacroDefinition>> {
        self.find_macro("id", id)
    }

    pub fn find_macro_by_code(&self, code: &str) -> RepositoryResult<Option<MacroDefinition>> {
        self.find_macro("code", code)
    }

    /// 宏列表（按 code 排序）
    pub fn list_macros(&self, active_only: bool) -> RepositoryResult<Vec<MacroDefinition>> {
        let conn = self.get_conn()?;
        let sql = if active_only {
            format!("SELECT {} FROM macro_definition WHERE is_active = 1 ORDER BY code", MACRO_COLUMNS)
        } else {
            format!("SELECT {} FROM macro_definition ORDER BY code", MACRO_COLUMNS)
        };
        let mut stmt = conn.prepare(&sql)?;
        let macros = stmt
            .query_map([], map_macro_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(macros)
    }

    /// 删除宏（明细级联删除）
    pub fn delete_macro(&self, id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM macro_definition WHERE id = ?1", params![id])?;
        Ok(affected)
    }

    /// 回写展示缓存
    ///
    /// # 返回
    /// - Ok(usize): 更新行数（0 表示宏不存在）
    pub fn update_cached_totals(
        &self,
        macro_id: &str,
        totals: &CostBreakdown,
        refreshed_at: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE macro_definition SET
                calculated_material_total = ?2,
                calculated_labor_total = ?3,
                calculated_total = ?4,
                totals_refreshed_at = ?5
            WHERE id = ?1
            "#,
            params![
                macro_id,
                totals.material,
                totals.labor,
                totals.total,
                refreshed_at.to_rfc3339(),
            ],
        )?;
        Ok(affected)
    }

    fn find_macro(&self, key_column: &str, key: &str) -> RepositoryResult<Option<MacroDefinition>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM macro_definition WHERE {} = ?1",
            MACRO_COLUMNS, key_column
        );
        match conn.query_row(&sql, params![key], map_macro_row) {
            Ok(m) => Ok(Some(m)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ==========================================
    // 宏明细
    // ==========================================

    /// 新建或更新明细（按 id）
    ///
    /// # 返回
    /// - Err(ForeignKeyViolation): macro_id 不存在
    pub fn save_binding(&self, binding: &MacroItemBinding) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO macro_item (
                id, macro_id, catalog_item_id, item_code, description, unit,
                quantity_type, fixed_quantity, input_field_name, quantity_multiplier,
                price_override, material_override, labor_override, waste_factor_override,
                is_included, is_optional, sort_order, group_name, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            ON CONFLICT(id) DO UPDATE SET
                catalog_item_id = excluded.catalog_item_id,
                item_code = excluded.item_code,
                description = excluded.description,
                unit = excluded.unit,
                quantity_type = excluded.quantity_type,
                fixed_quantity = excluded.fixed_quantity,
                input_field_name = excluded.input_field_name,
                quantity_multiplier = excluded.quantity_multiplier,
                price_override = excluded.price_override,
                material_override = excluded.material_override,
                labor_override = excluded.labor_override,
                waste_factor_override = excluded.waste_factor_override,
                is_included = excluded.is_included,
                is_optional = excluded.is_optional,
                sort_order = excluded.sort_order,
                group_name = excluded.group_name
            "#,
            params![
                binding.id,
                binding.macro_id,
                binding.catalog_item_id,
                binding.item_code,
                binding.description,
                binding.unit.to_db_str(),
                binding.quantity_type.to_db_str(),
                binding.fixed_quantity,
                binding.input_field_name,
                binding.quantity_multiplier,
                binding.price_override,
                binding.material_override,
                binding.labor_override,
                binding.waste_factor_override,
                binding.is_included,
                binding.is_optional,
                binding.sort_order,
                binding.group_name,
                binding.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn find_binding_by_id(&self, id: &str) -> RepositoryResult<Option<MacroItemBinding>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM macro_item WHERE id = ?1", BINDING_COLUMNS);
        match conn.query_row(&sql, params![id], map_binding_row) {
            Ok(b) => Ok(Some(b)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 宏下全部明细（按 sort_order, created_at 排序）
    pub fn list_bindings(&self, macro_id: &str) -> RepositoryResult<Vec<MacroItemBinding>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM macro_item WHERE macro_id = ?1 ORDER BY sort_order, created_at",
            BINDING_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let bindings = stmt
            .query_map(params![macro_id], map_binding_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(bindings)
    }

    /// 引用指定价目项的全部明细 ID（跨宏）
    pub fn find_binding_ids_by_catalog_item(
        &self,
        catalog_item_id: &str,
    ) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM macro_item WHERE catalog_item_id = ?1 ORDER BY macro_id, sort_order",
        )?;
        let ids = stmt
            .query_map(params![catalog_item_id], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(ids)
    }

    pub fn delete_binding(&self, id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM macro_item WHERE id = ?1", params![id])?;
        Ok(affected)
    }
}

fn map_macro_row(row: &Row<'_>) -> SqliteResult<MacroDefinition> {
    let inputs_raw: String = row.get(5)?;
    let required_inputs: Vec<RequiredInput> = serde_json::from_str(&inputs_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(MacroDefinition {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        required_inputs,
        calculated_material_total: row.get(6)?,
        calculated_labor_total: row.get(7)?,
        calculated_total: row.get(8)?,
        totals_refreshed_at: row
            .get::<_, Option<String>>(9)?
            .map(|s| parse_timestamp(&s)),
        is_active: row.get(10)?,
        created_at: parse_timestamp(&row.get::<_, String>(11)?),
        updated_at: parse_timestamp(&row.get::<_, String>(12)?),
    })
}

fn map_binding_row(row: &Row<'_>) -> SqliteResult<MacroItemBinding> {
    let unit_raw: String = row.get(5)?;
    let unit = Unit::from_str(&unit_raw)
        .ok_or_else(|| conversion_error(5, format!("未知计量单位: {}", unit_raw)))?;
    let qty_raw: String = row.get(6)?;
    let quantity_type = QuantityType::from_str(&qty_raw)
        .ok_or_else(|| conversion_error(6, format!("未知数量类型: {}", qty_raw)))?;

    Ok(MacroItemBinding {
        id: row.get(0)?,
        macro_id: row.get(1)?,
        catalog_item_id: row.get(2)?,
        item_code: row.get(3)?,
        description: row.get(4)?,
        unit,
        quantity_type,
        fixed_quantity: row.get(7)?,
        input_field_name: row.get(8)?,
        quantity_multiplier: row.get(9)?,
        price_override: row.get(10)?,
        material_override: row.get(11)?,
        labor_override: row.get(12)?,
        waste_factor_override: row.get(13)?,
        is_included: row.get(14)?,
        is_optional: row.get(15)?,
        sort_order: row.get(16)?,
        group_name: row.get(17)?,
        created_at: parse_timestamp(&row.get::<_, String>(18)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::InputNumericType;

    fn repo() -> MacroRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        MacroRepository::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    fn macro_def() -> MacroDefinition {
        MacroDefinition {
            id: "m1".to_string(),
            code: "ROOF-COMP-25".to_string(),
            name: "Comp roof".to_string(),
            description: Some("25 year comp".to_string()),
            category: Some("Roofing".to_string()),
            required_inputs: vec![RequiredInput::new(
                "total_squares",
                "Total squares",
                Unit::Sq,
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

    fn binding(id: &str, catalog_item_id: &str, sort_order: i32) -> MacroItemBinding {
        MacroItemBinding {
            id: id.to_string(),
            macro_id: "m1".to_string(),
            catalog_item_id: catalog_item_id.to_string(),
            item_code: "RFG LAMI<".to_string(),
            description: "Laminated".to_string(),
            unit: Unit::Sq,
            quantity_type: QuantityType::PerSquare,
            fixed_quantity: 0.0,
            input_field_name: None,
            quantity_multiplier: 1.0,
            price_override: Some(250.0),
            material_override: None,
            labor_override: None,
            waste_factor_override: None,
            is_included: true,
            is_optional: false,
            sort_order,
            group_name: Some("Roof".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_macro_round_trip_keeps_required_inputs() {
        let repo = repo();
        repo.save_macro(&macro_def()).unwrap();

        let found = repo.find_macro_by_code("ROOF-COMP-25").unwrap().unwrap();
        assert_eq!(found.required_inputs.len(), 1);
        assert_eq!(found.required_inputs[0].name, "total_squares");
        assert!(found.totals_refreshed_at.is_none());
    }

    #[test]
    fn test_save_macro_does_not_clobber_cache() {
        let repo = repo();
        repo.save_macro(&macro_def()).unwrap();
        repo.update_cached_totals("m1", &CostBreakdown::new(1.0, 2.0, 3.0), Utc::now())
            .unwrap();

        let mut renamed = macro_def();
        renamed.name = "Renamed".to_string();
        repo.save_macro(&renamed).unwrap();

        let found = repo.find_macro_by_id("m1").unwrap().unwrap();
        assert_eq!(found.name, "Renamed");
        assert_eq!(found.calculated_total, 3.0);
        assert!(found.totals_refreshed_at.is_some());
    }

    #[test]
    fn test_bindings_ordered_and_found_by_catalog_item() {
        let repo = repo();
        repo.save_macro(&macro_def()).unwrap();
        repo.save_binding(&binding("b2", "ci-1", 2)).unwrap();
        repo.save_binding(&binding("b1", "ci-1", 1)).unwrap();
        repo.save_binding(&binding("b3", "ci-2", 3)).unwrap();

        let listed = repo.list_bindings("m1").unwrap();
        let ids: Vec<_> = listed.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b2", "b3"]);
        assert_eq!(listed[0].price_override, Some(250.0));

        assert_eq!(
            repo.find_binding_ids_by_catalog_item("ci-1").unwrap(),
            vec!["b1".to_string(), "b2".to_string()]
        );
    }

    #[test]
    fn test_binding_requires_existing_macro_and_cascades() {
        let repo = repo();
        let err = repo.save_binding(&binding("b1", "ci-1", 0)).unwrap_err();
        assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)));

        repo.save_macro(&macro_def()).unwrap();
        repo.save_binding(&binding("b1", "ci-1", 0)).unwrap();
        assert_eq!(repo.delete_macro("m1").unwrap(), 1);
        assert!(repo.find_binding_by_id("b1").unwrap().is_none());
    }
}
