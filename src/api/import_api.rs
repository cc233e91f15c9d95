// ==========================================
// 价目导入API
// ==========================================
// 职责: 封装价目表导入、导入批次查询
// ==========================================

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::import::{ImportBatch, ImportReport, ParsedImportRow};
use crate::importer::{CatalogImporter, CatalogImporterImpl};
use crate::repository::{CatalogItemRepository, CategoryRepository, ImportBatchRepository};

/// 批量导入中单个文件的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileImportOutcome {
    /// 文件路径
    pub file: String,
    /// 导入报告（文件级失败时为空）
    pub report: Option<ImportReport>,
    /// 文件级失败原因
    pub error: Option<String>,
}

/// 导入API
pub struct ImportApi {
    importer: CatalogImporterImpl<ConfigManager>,
    batch_repo: Arc<ImportBatchRepository>,
}

impl ImportApi {
    /// 创建新的ImportApi实例（默认 CSV/Excel 管道）
    pub fn new(
        item_repo: Arc<CatalogItemRepository>,
        category_repo: Arc<CategoryRepository>,
        batch_repo: Arc<ImportBatchRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        let importer = CatalogImporterImpl::with_default_pipeline(
            item_repo,
            category_repo,
            batch_repo.clone(),
            config,
        );
        Self {
            importer,
            batch_repo,
        }
    }

    /// 导入价目表文件（.csv / .xlsx / .xls）
    ///
    /// # 返回
    /// - Ok(ImportReport): 导入报告，行级错误在 report.errors 中
    /// - Err(ApiError): 文件不存在、格式不支持、落库失败等批次级错误
    pub async fn import_file(&self, file_path: &str) -> ApiResult<ImportReport> {
        if file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput("文件路径不能为空".to_string()));
        }
        let report = self.importer.import_file(Path::new(file_path)).await?;
        info!(
            file = %file_path,
            batch_id = %report.batch_id,
            written = report.written(),
            errors = report.errors.len(),
            "价目表导入完成"
        );
        Ok(report)
    }

    /// 导入已解析的行
    pub async fn import_rows(
        &self,
        rows: Vec<ParsedImportRow>,
        source_name: Option<String>,
    ) -> ApiResult<ImportReport> {
        Ok(self.importer.import_rows(rows, source_name).await?)
    }

    /// 并发导入多个文件；单个文件失败不影响其它文件
    pub async fn batch_import(&self, file_paths: Vec<String>) -> Vec<FileImportOutcome> {
        let results = self.importer.batch_import(file_paths.clone()).await;
        file_paths
            .into_iter()
            .zip(results)
            .map(|(file, result)| match result {
                Ok(report) => FileImportOutcome {
                    file,
                    report: Some(report),
                    error: None,
                },
                Err(error) => FileImportOutcome {
                    file,
                    report: None,
                    error: Some(error),
                },
            })
            .collect()
    }

    /// 最近的导入批次（按导入时间倒序）
    pub fn recent_batches(&self, limit: usize) -> ApiResult<Vec<ImportBatch>> {
        Ok(self.batch_repo.list_recent(limit)?)
    }

    pub fn get_batch(&self, batch_id: &str) -> ApiResult<ImportBatch> {
        self.batch_repo
            .find_by_id(batch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("导入批次(id={})不存在", batch_id)))
    }
}
