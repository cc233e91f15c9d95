// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的临时数据库、应用状态、示例价目数据
// ==========================================
#![allow(dead_code)]

use restoration_pricing::app::AppState;
use restoration_pricing::logging;
use restoration_pricing::domain::{CatalogItem, CatalogItemDraft, Category};
use restoration_pricing::Unit;
use std::error::Error;
use std::io::Write;
use tempfile::{Builder, NamedTempFile};

/// 创建临时测试数据库文件
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = Builder::new().suffix(".db").tempfile()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是合法 UTF-8")?
        .to_string();
    Ok((temp_file, db_path))
}

/// 创建基于临时数据库的应用状态（schema 由各仓储自动创建）
pub fn create_test_state() -> Result<(NamedTempFile, AppState), Box<dyn Error>> {
    logging::init_test();
    let (temp_file, db_path) = create_test_db()?;
    let state = AppState::new(db_path)?;
    Ok((temp_file, state))
}

/// 写入临时 CSV 文件
pub fn write_csv(lines: &[&str]) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = Builder::new().suffix(".csv").tempfile()?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    file.flush()?;
    Ok(file)
}

/// 屋面示例数据: RFG 分类 + 复合瓦 + 油毡
pub struct RoofCatalog {
    pub category: Category,
    pub shingle: CatalogItem,
    pub felt: CatalogItem,
}

pub fn seed_roof_catalog(state: &AppState) -> Result<RoofCatalog, Box<dyn Error>> {
    let category = state.catalog_api.upsert_category("RFG", "Roofing", 10)?;

    let mut shingle = CatalogItemDraft::new("RFG LAMI<", "Laminated comp shingle", Unit::Sq)
        .with_prices(145.00, 122.52, 0.0)
        .with_waste_factor(10.0);
    shingle.category_id = Some(category.id.clone());
    let shingle = state.catalog_api.upsert(shingle)?;

    let mut felt = CatalogItemDraft::new("RFG FELT15", "Roofing felt - 15 lb.", Unit::Sq)
        .with_prices(12.50, 7.37, 0.0)
        .with_waste_factor(5.0);
    felt.category_id = Some(category.id.clone());
    let felt = state.catalog_api.upsert(felt)?;

    Ok(RoofCatalog {
        category,
        shingle,
        felt,
    })
}
