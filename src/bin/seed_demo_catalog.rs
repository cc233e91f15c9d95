// Dev utility: seed a demo catalog and the ROOF-COMP-25 pricing macro, then evaluate it.
//
// Usage:
//   cargo run --bin seed_demo_catalog -- [db_path]
//
// Re-running is safe: catalog items are upserted by item code and the demo macro is recreated.

use std::error::Error;

use restoration_pricing::api::ApiError;
use restoration_pricing::app::{get_default_db_path, AppState};
use restoration_pricing::domain::{
    BindingDraft, CatalogItemDraft, MacroDraft, MeasurementValues, RequiredInput,
};
use restoration_pricing::{InputNumericType, Unit};

const DEMO_MACRO_CODE: &str = "ROOF-COMP-25";

fn main() -> Result<(), Box<dyn Error>> {
    restoration_pricing::logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    let state = AppState::new(db_path.clone())?;

    // Category + catalog items
    let roofing = state.catalog_api.upsert_category("RFG", "Roofing", 10)?;

    let mut shingle = CatalogItemDraft::new("RFG LAMI<", "Laminated comp shingle rfg - w/out felt", Unit::Sq)
        .with_prices(145.00, 122.52, 0.0)
        .with_waste_factor(10.0);
    shingle.category_id = Some(roofing.id.clone());
    let shingle = state.catalog_api.upsert(shingle)?;

    let mut felt = CatalogItemDraft::new("RFG FELT15", "Roofing felt - 15 lb.", Unit::Sq)
        .with_prices(12.50, 7.37, 0.0)
        .with_waste_factor(5.0);
    felt.category_id = Some(roofing.id.clone());
    let felt = state.catalog_api.upsert(felt)?;

    let mut ridge = CatalogItemDraft::new("RFG RIDGC", "Ridge cap - composition shingles", Unit::Lf)
        .with_prices(3.12, 2.44, 0.0);
    ridge.category_id = Some(roofing.id.clone());
    let ridge = state.catalog_api.upsert(ridge)?;

    // Demo macro (recreated on every run)
    match state.macro_api.get_macro_by_code(DEMO_MACRO_CODE) {
        Ok(existing) => state.macro_api.delete_macro(&existing.id)?,
        Err(ApiError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let macro_def = state.macro_api.save_macro(
        MacroDraft::new(DEMO_MACRO_CODE, "Comp shingle roof - 25 SQ")
            .with_input(RequiredInput::new(
                "total_squares",
                "Total squares",
                Unit::Sq,
                InputNumericType::Decimal,
            ))
            .with_input(RequiredInput::new(
                "ridge_length",
                "Ridge length",
                Unit::Lf,
                InputNumericType::Decimal,
            )),
    )?;

    let mut shingle_binding = BindingDraft::per_square(&macro_def.id, &shingle.id);
    shingle_binding.sort_order = 1;
    shingle_binding.group_name = Some("Shingles".to_string());
    state.macro_api.save_binding(shingle_binding)?;

    let mut felt_binding = BindingDraft::per_square(&macro_def.id, &felt.id);
    felt_binding.sort_order = 2;
    felt_binding.group_name = Some("Underlayment".to_string());
    state.macro_api.save_binding(felt_binding)?;

    let mut ridge_binding = BindingDraft::calculated(&macro_def.id, &ridge.id, "ridge_length");
    ridge_binding.sort_order = 3;
    ridge_binding.is_optional = true;
    state.macro_api.save_binding(ridge_binding)?;

    let mut values = MeasurementValues::new();
    values.insert("total_squares".to_string(), 25.0);
    values.insert("ridge_length".to_string(), 60.0);
    let evaluation = state.macro_api.evaluate_and_refresh(&macro_def.id, &values)?;

    println!("db_path={}", db_path);
    for item in &evaluation.items {
        println!(
            "{:<12} qty={:>8.4} material={:>9.2} labor={:>9.2} total={:>9.2}",
            item.item_code, item.quantity, item.material, item.labor, item.total
        );
    }
    println!(
        "{} total={:.2} (material={:.2}, labor={:.2})",
        evaluation.macro_code,
        evaluation.totals.total,
        evaluation.totals.material,
        evaluation.totals.labor
    );
    Ok(())
}
