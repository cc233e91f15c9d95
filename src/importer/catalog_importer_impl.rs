// ==========================================
// 保险修复估价系统 - 价目导入器实现
// ==========================================
// 职责: 整合导入流程，从文件到数据库
// 流程: 解析 → 映射 → 清洗 → 校验 → 批内去重 → 冲突检测 → 落库 → 批次记录
// 红线: 单行失败只进报告，不中断批次
// ==========================================

use crate::config::{config_keys, ImportConfigReader};
use crate::domain::catalog::CatalogItem;
use crate::domain::import::{ImportBatch, ImportReport, ImportRowError, ParsedImportRow};
use crate::engine::price_rollup::PriceRollup;
use crate::importer::catalog_importer_trait::{
    CatalogImporter, DataCleaner, FieldMapper, FileParser, RowValidator,
};
use crate::importer::data_cleaner::DataCleaner as DefaultDataCleaner;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper as DefaultFieldMapper;
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::import_mapper::{ImportMapper, MappedRow, MappingContext};
use crate::importer::row_validator::RowValidator as DefaultRowValidator;
use crate::repository::{CatalogItemRepository, CategoryRepository, ImportBatchRepository};
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 冲突检测时单次 IN 查询的代码数上限
const CODE_LOOKUP_CHUNK: usize = 500;

// ==========================================
// CatalogImporterImpl - 价目导入器实现
// ==========================================
pub struct CatalogImporterImpl<C>
where
    C: ImportConfigReader,
{
    // 数据访问层
    item_repo: Arc<CatalogItemRepository>,
    category_repo: Arc<CategoryRepository>,
    batch_repo: Arc<ImportBatchRepository>,

    // 配置读取器
    config: Arc<C>,

    // 导入组件
    file_parser: Box<dyn FileParser>,
    field_mapper: Box<dyn FieldMapper>,
    data_cleaner: Box<dyn DataCleaner>,
    row_validator: Box<dyn RowValidator>,
    mapper: ImportMapper,
}

impl<C> CatalogImporterImpl<C>
where
    C: ImportConfigReader,
{
    /// 创建新的 CatalogImporter 实例（可替换各阶段组件）
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        item_repo: Arc<CatalogItemRepository>,
        category_repo: Arc<CategoryRepository>,
        batch_repo: Arc<ImportBatchRepository>,
        config: Arc<C>,
        file_parser: Box<dyn FileParser>,
        field_mapper: Box<dyn FieldMapper>,
        data_cleaner: Box<dyn DataCleaner>,
        row_validator: Box<dyn RowValidator>,
    ) -> Self {
        Self {
            item_repo,
            category_repo,
            batch_repo,
            config,
            file_parser,
            field_mapper,
            data_cleaner,
            row_validator,
            mapper: ImportMapper,
        }
    }

    /// 使用默认组件创建（CSV/Excel 通用解析器）
    pub fn with_default_pipeline(
        item_repo: Arc<CatalogItemRepository>,
        category_repo: Arc<CategoryRepository>,
        batch_repo: Arc<ImportBatchRepository>,
        config: Arc<C>,
    ) -> Self {
        Self::new(
            item_repo,
            category_repo,
            batch_repo,
            config,
            Box::new(UniversalFileParser),
            Box::new(DefaultFieldMapper),
            Box::new(DefaultDataCleaner),
            Box::new(DefaultRowValidator),
        )
    }

    /// 读取整批共用的映射参数
    async fn load_context(&self) -> ImportResult<(bool, MappingContext)> {
        let update_existing = self.config.get_update_existing().await.map_err(|e| {
            ImportError::ConfigReadError {
                key: config_keys::IMPORT_UPDATE_EXISTING.to_string(),
                message: e.to_string(),
            }
        })?;
        let default_waste_factor = self.config.get_default_waste_factor().await.map_err(|e| {
            ImportError::ConfigReadError {
                key: config_keys::IMPORT_DEFAULT_WASTE_FACTOR.to_string(),
                message: e.to_string(),
            }
        })?;
        let unit_cost_tolerance = self.config.get_unit_cost_tolerance().await.map_err(|e| {
            ImportError::ConfigReadError {
                key: config_keys::IMPORT_UNIT_COST_TOLERANCE.to_string(),
                message: e.to_string(),
            }
        })?;

        let ctx = MappingContext {
            category_index: self.category_repo.code_index()?,
            default_waste_factor,
            unit_cost_tolerance,
        };
        Ok((update_existing, ctx))
    }

    /// 导入主流程（行已完成字段映射）
    async fn run_pipeline(
        &self,
        rows: Vec<ParsedImportRow>,
        pre_errors: Vec<ImportRowError>,
        total_rows: usize,
        source_name: Option<String>,
        start_time: Instant,
    ) -> ImportResult<ImportReport> {
        let batch_id = Uuid::new_v4().to_string();
        let mut report = ImportReport::new(batch_id.clone(), total_rows);
        report.errors.extend(pre_errors);

        // === 步骤 3: 读取配置 ===
        debug!("步骤 3: 读取导入配置");
        let (update_existing, ctx) = self.load_context().await?;

        // === 步骤 4: 清洗 + 校验 + 映射 + 批内去重 ===
        debug!("步骤 4: 清洗与校验");
        let mut first_seen: HashMap<String, usize> = HashMap::new();
        let mut mapped_rows: Vec<(usize, MappedRow)> = Vec::new();

        for row in rows {
            let row = self.data_cleaner.clean_row(row);
            let row_number = row.row_number;

            if let Err(e) = self.row_validator.validate_row(&row) {
                if !e.is_row_level() {
                    return Err(e);
                }
                warn!(row = row_number, error = %e, "行校验失败");
                report.push_error(row_number, row.item_code.clone(), e.to_string());
                continue;
            }

            let code = row.item_code.clone().unwrap_or_default();
            if let Some(&first_row) = first_seen.get(&code) {
                let e = ImportError::DuplicateInBatch {
                    row: row_number,
                    item_code: code.clone(),
                    first_row,
                };
                report.push_error(row_number, Some(code), e.to_string());
                continue;
            }

            match self.mapper.map_row(&row, &ctx) {
                Ok(mapped) => {
                    first_seen.insert(code, row_number);
                    mapped_rows.push((row_number, mapped));
                }
                Err(e) => report.push_error(row_number, Some(code), e.to_string()),
            }
        }

        // === 步骤 5: 冲突检测（已存在的 item_code）===
        debug!(candidates = mapped_rows.len(), "步骤 5: 冲突检测");
        let codes: Vec<String> = mapped_rows
            .iter()
            .map(|(_, m)| m.draft.item_code.clone())
            .collect();
        let mut existing: HashMap<String, CatalogItem> = HashMap::new();
        for chunk in codes.chunks(CODE_LOOKUP_CHUNK) {
            existing.extend(self.item_repo.find_by_codes(chunk)?);
        }

        let rollup = PriceRollup::default();
        let now = Utc::now();
        let mut to_save = Vec::with_capacity(mapped_rows.len());

        for (row_number, mapped) in mapped_rows {
            let MappedRow { mut draft, warnings } = mapped;
            report.warnings.extend(warnings);

            let unit_price = match rollup.resolve_unit_price(&draft) {
                Ok(p) => p,
                Err(e) => {
                    report.push_error(row_number, Some(draft.item_code.clone()), e.to_string());
                    continue;
                }
            };

            match existing.get(&draft.item_code) {
                Some(current) if !update_existing => {
                    debug!(item_code = %current.item_code, "价目项已存在，按配置跳过");
                    report.skipped += 1;
                }
                Some(current) => {
                    draft.is_active = current.is_active;
                    to_save.push(draft.into_item(current.id.clone(), unit_price, current.created_at, now));
                    report.updated += 1;
                }
                None => {
                    to_save.push(draft.into_item(Uuid::new_v4().to_string(), unit_price, now, now));
                    report.created += 1;
                }
            }
        }

        // === 步骤 6: 落库（事务化）===
        debug!(count = to_save.len(), "步骤 6: 写入价目项");
        self.item_repo.batch_save(&to_save).map_err(|e| {
            error!(error = %e, "价目项写入失败");
            ImportError::from(e)
        })?;

        report.errors.sort_by_key(|e| e.row);
        report.elapsed_ms = start_time.elapsed().as_millis();

        // === 步骤 7: 批次记录 ===
        self.batch_repo
            .insert(&ImportBatch::from_report(&report, source_name))?;

        info!(
            batch_id = %batch_id,
            total = report.total_rows,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            elapsed_ms = report.elapsed_ms as u64,
            "价目导入完成"
        );

        Ok(report)
    }
}

#[async_trait::async_trait]
impl<C> CatalogImporter for CatalogImporterImpl<C>
where
    C: ImportConfigReader + Send + Sync,
{
    #[instrument(skip(self, file_path))]
    async fn import_file<P: AsRef<Path> + Send>(&self, file_path: P) -> ImportResult<ImportReport> {
        let start_time = Instant::now();
        let path = file_path.as_ref();
        let source_name = path.file_name().map(|n| n.to_string_lossy().to_string());
        info!(file = %path.display(), "开始导入价目表");

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let raw_rows = self.file_parser.parse_to_raw_rows(path).map_err(|e| {
            error!(error = %e, "文件解析失败");
            e
        })?;
        let total_rows = raw_rows.len();
        info!(total_rows, "文件解析完成");

        // === 步骤 2: 字段映射 ===
        debug!("步骤 2: 字段映射");
        let mut parsed = Vec::with_capacity(total_rows);
        let mut mapping_errors = Vec::new();
        for raw in &raw_rows {
            match self.field_mapper.map_to_parsed_row(raw) {
                Ok(row) => parsed.push(row),
                Err(e) if !e.is_row_level() => return Err(e),
                Err(e) => {
                    warn!(row = raw.row_number, error = %e, "字段映射失败");
                    mapping_errors.push(ImportRowError {
                        row: raw.row_number,
                        item_code: None,
                        message: e.to_string(),
                    });
                }
            }
        }

        self.run_pipeline(parsed, mapping_errors, total_rows, source_name, start_time)
            .await
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn import_rows(
        &self,
        rows: Vec<ParsedImportRow>,
        source_name: Option<String>,
    ) -> ImportResult<ImportReport> {
        let start_time = Instant::now();
        let total_rows = rows.len();
        self.run_pipeline(rows, Vec::new(), total_rows, source_name, start_time)
            .await
    }

    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
    ) -> Vec<Result<ImportReport, String>> {
        use futures::future::join_all;

        info!(count = file_paths.len(), "开始批量导入文件");

        let import_tasks = file_paths.into_iter().map(|path| {
            let path_str = path.as_ref().display().to_string();
            async move {
                match self.import_file(path).await {
                    Ok(report) => {
                        info!(file = %path_str, written = report.written(), "文件导入成功");
                        Ok(report)
                    }
                    Err(e) => {
                        error!(file = %path_str, error = %e, "文件导入失败");
                        Err(format!("文件 {} 导入失败: {}", path_str, e))
                    }
                }
            }
        });

        let results = join_all(import_tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量导入完成"
        );

        results
    }
}
