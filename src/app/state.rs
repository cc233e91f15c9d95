// ==========================================
// 保险修复估价系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{CatalogApi, ImportApi, MacroApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{ensure_schema_version, open_sqlite_connection};
use crate::repository::{
    CatalogItemRepository, CategoryRepository, ImportBatchRepository, MacroRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源，所有仓储共享同一个数据库连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 价目项API
    pub catalog_api: Arc<CatalogApi>,

    /// 定价宏API
    pub macro_api: Arc<MacroApi>,

    /// 价目导入API
    pub import_api: Arc<ImportApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（":memory:" 可用于临时库）
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        let schema_version = ensure_schema_version(&conn)
            .map_err(|e| format!("schema_version 初始化失败: {}", e))?;
        tracing::debug!(schema_version, "数据库版本检查完成");
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let category_repo = Arc::new(
            CategoryRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建CategoryRepository: {}", e))?,
        );
        let item_repo = Arc::new(
            CatalogItemRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建CatalogItemRepository: {}", e))?,
        );
        let macro_repo = Arc::new(
            MacroRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建MacroRepository: {}", e))?,
        );
        let batch_repo = Arc::new(
            ImportBatchRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ImportBatchRepository: {}", e))?,
        );
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 创建API实例
        // ==========================================
        let catalog_api = Arc::new(CatalogApi::new(
            item_repo.clone(),
            category_repo.clone(),
            macro_repo.clone(),
            config_manager.clone(),
        ));
        let macro_api = Arc::new(MacroApi::new(macro_repo, item_repo.clone()));
        let import_api = Arc::new(ImportApi::new(
            item_repo,
            category_repo,
            batch_repo,
            config_manager.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            catalog_api,
            macro_api,
            import_api,
            config_manager,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: PRICING_DB_PATH 环境变量 > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("PRICING_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./restoration_pricing.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("restoration-pricing");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("restoration_pricing.db");
        }
    }

    path.to_string_lossy().to_string()
}
