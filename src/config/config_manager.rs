// ==========================================
// 保险修复估价系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::engine::price_rollup::DEFAULT_UNIT_PRICE_TOLERANCE;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等），并确保配置表存在
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
            conn_guard.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS config_scope (
                  scope_id TEXT PRIMARY KEY,
                  scope_type TEXT NOT NULL,
                  scope_key TEXT NOT NULL,
                  created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
                VALUES ('global', 'GLOBAL', 'global');

                CREATE TABLE IF NOT EXISTS config_kv (
                  scope_id TEXT NOT NULL,
                  key TEXT NOT NULL,
                  value TEXT NOT NULL,
                  updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                  PRIMARY KEY (scope_id, key),
                  FOREIGN KEY (scope_id) REFERENCES config_scope(scope_id)
                );
                "#,
            )?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 读取数值配置；非法值回退默认值并告警
    fn get_f64_or_default(&self, key: &str, default: f64) -> Result<f64, Box<dyn Error>> {
        let raw = self.get_config_or_default(key, &default.to_string())?;
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => {
                tracing::warn!(key, value = %raw, default, "配置值无法解析为数值，使用默认值");
                Ok(default)
            }
        }
    }

    /// 价目项保存时 unit_price 与三段之和允许的偏差
    pub fn get_unit_price_tolerance(&self) -> Result<f64, Box<dyn Error>> {
        self.get_f64_or_default(config_keys::UNIT_PRICE_TOLERANCE, DEFAULT_UNIT_PRICE_TOLERANCE)
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 导入批次/问题排查时记录当时的配置
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key"
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 此方法会覆盖现有的 global 配置
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> Result<usize, Box<dyn Error>> {
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            let affected = tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
                params![key, value],
            )?;
            count += affected;
        }

        tx.commit()?;
        Ok(count)
    }
}

// ==========================================
// 实现 ImportConfigReader Trait
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_update_existing(&self) -> Result<bool, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::IMPORT_UPDATE_EXISTING, "true")?;
        match value.trim().to_lowercase().as_str() {
            "false" | "0" | "no" | "n" => Ok(false),
            _ => Ok(true), // 默认更新
        }
    }

    async fn get_default_waste_factor(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_f64_or_default(config_keys::IMPORT_DEFAULT_WASTE_FACTOR, 0.0)?;
        if (0.0..=100.0).contains(&value) {
            Ok(value)
        } else {
            tracing::warn!(value, "导入默认损耗率超出 [0, 100]，使用 0");
            Ok(0.0)
        }
    }

    async fn get_unit_cost_tolerance(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_f64_or_default(
            config_keys::IMPORT_UNIT_COST_TOLERANCE,
            DEFAULT_UNIT_PRICE_TOLERANCE,
        )?;
        Ok(value.abs())
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 价目项
    pub const UNIT_PRICE_TOLERANCE: &str = "unit_price_tolerance";

    // 导入
    pub const IMPORT_UPDATE_EXISTING: &str = "import_update_existing";
    pub const IMPORT_DEFAULT_WASTE_FACTOR: &str = "import_default_waste_factor";
    pub const IMPORT_UNIT_COST_TOLERANCE: &str = "import_unit_cost_tolerance";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_import_defaults() {
        let config = manager();
        assert!(config.get_update_existing().await.unwrap());
        assert_eq!(config.get_default_waste_factor().await.unwrap(), 0.0);
        assert_eq!(
            config.get_unit_cost_tolerance().await.unwrap(),
            DEFAULT_UNIT_PRICE_TOLERANCE
        );
    }

    #[tokio::test]
    async fn test_overrides_and_invalid_values() {
        let config = manager();
        config
            .set_global_config_value(config_keys::IMPORT_UPDATE_EXISTING, "false")
            .unwrap();
        config
            .set_global_config_value(config_keys::IMPORT_DEFAULT_WASTE_FACTOR, "250")
            .unwrap();
        config
            .set_global_config_value(config_keys::UNIT_PRICE_TOLERANCE, "abc")
            .unwrap();

        assert!(!config.get_update_existing().await.unwrap());
        assert_eq!(config.get_default_waste_factor().await.unwrap(), 0.0);
        assert_eq!(config.get_unit_price_tolerance().unwrap(), DEFAULT_UNIT_PRICE_TOLERANCE);
    }

    #[test]
    fn test_snapshot_restore() {
        let config = manager();
        config
            .set_global_config_value(config_keys::UNIT_PRICE_TOLERANCE, "0.01")
            .unwrap();
        let snapshot = config.get_config_snapshot().unwrap();

        config
            .set_global_config_value(config_keys::UNIT_PRICE_TOLERANCE, "0.5")
            .unwrap();
        assert_eq!(config.restore_config_from_snapshot(&snapshot).unwrap(), 1);
        assert_eq!(config.get_unit_price_tolerance().unwrap(), 0.01);
    }
}
