// ==========================================
// 价目导入 API 集成测试
// ==========================================
// 覆盖: CSV 部分失败 / 新增-更新-跳过计数 / labor 合并 / 分类解析 / 批次记录
// ==========================================

mod test_helpers;

use restoration_pricing::config::config_keys;
use restoration_pricing::domain::{CatalogItemDraft, ParsedImportRow};
use restoration_pricing::Unit;
use test_helpers::{create_test_state, write_csv};

const HEADER: &str = "Item Code,Cat,Desc,Unit,Unit Cost,Material,Labor,Labor Overhead,Equipment";

#[tokio::test]
async fn test_csv_import_partial_failure() {
    let (_tmp, state) = create_test_state().unwrap();
    state.catalog_api.upsert_category("RFG", "Roofing", 10).unwrap();

    let csv = write_csv(&[
        HEADER,
        "RFG LAMI<,RFG,Laminated comp shingle,SQ,267.52,145.00,100.00,22.52,0",
        "RFG FELT15,rfg,Roofing felt - 15 lb.,square,19.87,12.50,6.00,1.37,0",
        "DRY 1/2,DRY,Drywall,SF,2.03,0.62,1.41,0,0",
        "BAD ROW,RFG,Missing unit,,1,1,0,0,0",
        "RFG LAMI<,RFG,Duplicate of row 2,SQ,0,1,1,0,0",
        "NUM ERR,RFG,Bad number,EA,abc,1,1,0,0",
    ])
    .unwrap();

    let report = state
        .import_api
        .import_file(csv.path().to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(report.total_rows, 6);
    assert_eq!(report.created, 3);
    assert_eq!(report.updated, 0);
    assert_eq!(report.skipped, 0);

    let error_rows: Vec<usize> = report.errors.iter().map(|e| e.row).collect();
    assert_eq!(error_rows, vec![5, 6, 7]);

    // 未匹配的分类只记警告
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].field, "category_code");
    assert_eq!(report.warnings[0].row, 4);

    let shingle = state.catalog_api.find_by_code("RFG LAMI<").unwrap().unwrap();
    assert!((shingle.labor_price - 122.52).abs() < 1e-9);
    assert!((shingle.unit_price - 267.52).abs() < 1e-9);
    assert_eq!(shingle.waste_factor, 0.0);
    assert_eq!(shingle.description, "Laminated comp shingle");

    let rfg = state.catalog_api.find_category_by_code("RFG").unwrap().unwrap();
    let felt = state.catalog_api.find_by_code("RFG FELT15").unwrap().unwrap();
    assert_eq!(felt.category_id.as_deref(), Some(rfg.id.as_str()));
    assert_eq!(felt.unit.to_db_str(), "SQ");

    let drywall = state.catalog_api.find_by_code("DRY 1/2").unwrap().unwrap();
    assert_eq!(drywall.category_id, None);

    // 批次记录
    let batches = state.import_api.recent_batches(10).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].batch_id, report.batch_id);
    assert_eq!(batches[0].created_rows, 3);
    assert_eq!(batches[0].error_rows, 3);
    assert!(batches[0]
        .file_name
        .as_deref()
        .is_some_and(|name| name.ends_with(".csv")));
    assert!(batches[0].report_json.is_some());
}

#[tokio::test]
async fn test_reimport_updates_then_skips_when_configured() {
    let (_tmp, state) = create_test_state().unwrap();

    let first = write_csv(&[HEADER, "RFG FELT15,,Roofing felt,SQ,,12.50,6.00,1.37,0"]).unwrap();
    let report = state
        .import_api
        .import_file(first.path().to_str().unwrap())
        .await
        .unwrap();
    assert_eq!(report.created, 1);
    let original = state.catalog_api.find_by_code("RFG FELT15").unwrap().unwrap();

    let second = write_csv(&[HEADER, "RFG FELT15,,Roofing felt (2026),SQ,,13.00,6.00,1.37,0"]).unwrap();
    let report = state
        .import_api
        .import_file(second.path().to_str().unwrap())
        .await
        .unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);

    let updated = state.catalog_api.find_by_code("RFG FELT15").unwrap().unwrap();
    assert_eq!(updated.id, original.id);
    assert_eq!(updated.created_at, original.created_at);
    assert!((updated.unit_price - 20.37).abs() < 1e-9);

    state
        .config_manager
        .set_global_config_value(config_keys::IMPORT_UPDATE_EXISTING, "false")
        .unwrap();

    let third = write_csv(&[HEADER, "RFG FELT15,,Roofing felt (ignored),SQ,,99.00,6.00,1.37,0"]).unwrap();
    let report = state
        .import_api
        .import_file(third.path().to_str().unwrap())
        .await
        .unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.written(), 0);

    let unchanged = state.catalog_api.find_by_code("RFG FELT15").unwrap().unwrap();
    assert_eq!(unchanged.description, "Roofing felt (2026)");
    assert_eq!(state.import_api.recent_batches(10).unwrap().len(), 3);
}

#[tokio::test]
async fn test_unit_cost_mismatch_is_warning() {
    let (_tmp, state) = create_test_state().unwrap();

    let csv = write_csv(&[HEADER, "RFG LAMI<,,Laminated,SQ,300.00,145.00,100.00,22.52,0"]).unwrap();
    let report = state
        .import_api
        .import_file(csv.path().to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert!(report.errors.is_empty());
    assert!(report.warnings.iter().any(|w| w.field == "unit_cost"));

    let item = state.catalog_api.find_by_code("RFG LAMI<").unwrap().unwrap();
    assert!((item.unit_price - 267.52).abs() < 1e-9);
}

#[tokio::test]
async fn test_default_waste_factor_from_config() {
    let (_tmp, state) = create_test_state().unwrap();
    state
        .config_manager
        .set_global_config_value(config_keys::IMPORT_DEFAULT_WASTE_FACTOR, "10")
        .unwrap();

    let mut row = ParsedImportRow::empty(1);
    row.item_code = Some("RFG LAMI<".to_string());
    row.description = Some("Laminated".to_string());
    row.unit = Some("SQ".to_string());
    row.material_cost = 145.0;
    row.labor_cost = 100.0;
    row.labor_overhead = 22.52;

    let report = state
        .import_api
        .import_rows(vec![row], Some("unit-test".to_string()))
        .await
        .unwrap();
    assert_eq!(report.created, 1);

    let item = state.catalog_api.find_by_code("RFG LAMI<").unwrap().unwrap();
    assert_eq!(item.waste_factor, 10.0);

    let batch = state.import_api.get_batch(&report.batch_id).unwrap();
    assert_eq!(batch.file_name.as_deref(), Some("unit-test"));
}

#[tokio::test]
async fn test_batch_import_isolates_file_failures() {
    let (_tmp, state) = create_test_state().unwrap();

    let roofing = write_csv(&[HEADER, "RFG FELT15,,Roofing felt,SQ,,12.50,6.00,1.37,0"]).unwrap();
    let drywall = write_csv(&[HEADER, "DRY 1/2,,Drywall,SF,,0.62,1.41,0,0"]).unwrap();

    let outcomes = state
        .import_api
        .batch_import(vec![
            roofing.path().to_str().unwrap().to_string(),
            "does/not/exist.csv".to_string(),
            drywall.path().to_str().unwrap().to_string(),
        ])
        .await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].report.is_some());
    assert!(outcomes[1].report.is_none());
    assert!(outcomes[1].error.is_some());
    assert!(outcomes[2].report.is_some());
    assert_eq!(state.catalog_api.list(None).unwrap().len(), 2);
}

#[tokio::test]
async fn test_xlsx_import() {
    let (_tmp, state) = create_test_state().unwrap();
    state.catalog_api.upsert_category("RFG", "Roofing", 10).unwrap();
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/catalog_sample.xlsx");

    let report = state.import_api.import_file(path).await.unwrap();

    assert_eq!(report.total_rows, 3);
    assert_eq!(report.created, 2);
    let error_rows: Vec<usize> = report.errors.iter().map(|e| e.row).collect();
    assert_eq!(error_rows, vec![4]);

    let shingle = state.catalog_api.find_by_code("RFG LAMI<").unwrap().unwrap();
    assert!((shingle.labor_price - 122.52).abs() < 1e-9);
    assert!((shingle.unit_price - 267.52).abs() < 1e-9);

    // 代码与分类在导入时规范化
    let rfg = state.catalog_api.find_category_by_code("RFG").unwrap().unwrap();
    let felt = state.catalog_api.find_by_code("RFG FELT15").unwrap().unwrap();
    assert_eq!(felt.category_id.as_deref(), Some(rfg.id.as_str()));
    assert!((felt.unit_price - 19.87).abs() < 1e-9);
}

#[tokio::test]
async fn test_manual_and_imported_codes_share_one_item() {
    let (_tmp, state) = create_test_state().unwrap();

    let manual = state
        .catalog_api
        .upsert(CatalogItemDraft::new(" rfg  x ", "Manual entry", Unit::Ea).with_prices(1.0, 1.0, 0.0))
        .unwrap();
    assert_eq!(manual.item_code, "RFG X");
    assert!(state.catalog_api.find_by_code("rfg x").unwrap().is_some());

    let csv = write_csv(&[HEADER, "rfg x,,Imported entry,EA,,2.00,1.00,0,0"]).unwrap();
    let report = state
        .import_api
        .import_file(csv.path().to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);
    let items = state.catalog_api.list(None).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, manual.id);
    assert_eq!(items[0].description, "Imported entry");
}

#[tokio::test]
async fn test_unsupported_extension_is_batch_error() {
    let (_tmp, state) = create_test_state().unwrap();
    let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();

    let result = state
        .import_api
        .import_file(file.path().to_str().unwrap())
        .await;

    assert!(matches!(
        result,
        Err(restoration_pricing::api::ApiError::ImportError(_))
    ));
}
