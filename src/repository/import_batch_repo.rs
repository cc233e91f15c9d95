// ==========================================
// 保险修复估价系统 - 导入批次仓储
// ==========================================
// 职责: 管理 catalog_import_batch 表（每次导入一条，含 JSON 报告）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::import::ImportBatch;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::parse_timestamp;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct ImportBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportBatchRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS catalog_import_batch (
              batch_id TEXT PRIMARY KEY,
              file_name TEXT,
              total_rows INTEGER NOT NULL DEFAULT 0,
              created_rows INTEGER NOT NULL DEFAULT 0,
              updated_rows INTEGER NOT NULL DEFAULT 0,
              skipped_rows INTEGER NOT NULL DEFAULT 0,
              error_rows INTEGER NOT NULL DEFAULT 0,
              imported_at TEXT NOT NULL,
              imported_by TEXT,
              elapsed_ms INTEGER NOT NULL DEFAULT 0,
              report_json TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_catalog_import_batch_time
              ON catalog_import_batch(imported_at DESC);
            "#,
        )?;
        Ok(())
    }

    /// 写入批次记录
    pub fn insert(&self, batch: &ImportBatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO catalog_import_batch (
                batch_id, file_name, total_rows, created_rows, updated_rows,
                skipped_rows, error_rows, imported_at, imported_by, elapsed_ms, report_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                batch.batch_id,
                batch.file_name,
                batch.total_rows,
                batch.created_rows,
                batch.updated_rows,
                batch.skipped_rows,
                batch.error_rows,
                batch.imported_at.to_rfc3339(),
                batch.imported_by,
                batch.elapsed_ms,
                batch.report_json,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, batch_id: &str) -> RepositoryResult<Option<ImportBatch>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            r#"
            SELECT batch_id, file_name, total_rows, created_rows, updated_rows,
                   skipped_rows, error_rows, imported_at, imported_by, elapsed_ms, report_json
            FROM catalog_import_batch
            WHERE batch_id = ?1
            "#,
            params![batch_id],
            map_batch_row,
        );
        match result {
            Ok(batch) => Ok(Some(batch)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 最近的导入批次（按导入时间倒序）
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT batch_id, file_name, total_rows, created_rows, updated_rows,
                   skipped_rows, error_rows, imported_at, imported_by, elapsed_ms, report_json
            FROM catalog_import_batch
            ORDER BY imported_at DESC
            LIMIT ?1
            "#,
        )?;
        let batches = stmt
            .query_map(params![limit as i64], map_batch_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(batches)
    }
}

fn map_batch_row(row: &Row<'_>) -> SqliteResult<ImportBatch> {
    Ok(ImportBatch {
        batch_id: row.get(0)?,
        file_name: row.get(1)?,
        total_rows: row.get(2)?,
        created_rows: row.get(3)?,
        updated_rows: row.get(4)?,
        skipped_rows: row.get(5)?,
        error_rows: row.get(6)?,
        imported_at: parse_timestamp(&row.get::<_, String>(7)?),
        imported_by: row.get(8)?,
        elapsed_ms: row.get(9)?,
        report_json: row.get(10)?,
    })
}
