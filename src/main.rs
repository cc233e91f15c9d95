// ==========================================
// 保险修复估价系统 - 命令行入口
// ==========================================
// 用法:
//   restoration-pricing init
//   restoration-pricing import <file> [file...]
//   restoration-pricing evaluate <macro_code> name=value...
//   restoration-pricing refresh <macro_code> name=value...
//   restoration-pricing macros
//   restoration-pricing catalog [search]
//   restoration-pricing batches [limit]
//
// 数据库路径: PRICING_DB_PATH 环境变量，未设置时使用用户数据目录
// 日志格式: PRICING_LOG_FORMAT=json 输出 JSON 日志
// ==========================================

use std::error::Error;

use restoration_pricing::app::{get_default_db_path, AppState};
use restoration_pricing::domain::{CatalogFilter, MacroEvaluation, MeasurementValues};
use restoration_pricing::logging;

const USAGE: &str = "用法: restoration-pricing <init|import|evaluate|refresh|macros|catalog|batches> [参数...]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    match std::env::var("PRICING_LOG_FORMAT").as_deref() {
        Ok("json") => logging::init_json(),
        _ => logging::init(),
    }

    let mut args = std::env::args().skip(1);
    let command = args.next().ok_or(USAGE)?;
    let rest: Vec<String> = args.collect();

    let db_path = get_default_db_path();
    tracing::info!("{} v{}，数据库: {}", restoration_pricing::APP_NAME, restoration_pricing::VERSION, db_path);
    let state = AppState::new(db_path.clone())?;

    match command.as_str() {
        "init" => {
            println!("数据库已就绪: {}", db_path);
        }
        "import" => {
            if rest.is_empty() {
                return Err("import 需要至少一个文件路径".into());
            }
            if rest.len() == 1 {
                let report = state.import_api.import_file(&rest[0]).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let outcomes = state.import_api.batch_import(rest).await;
                println!("{}", serde_json::to_string_pretty(&outcomes)?);
            }
        }
        "evaluate" | "refresh" => {
            let (code, pairs) = rest
                .split_first()
                .ok_or("evaluate/refresh 需要宏代码")?;
            let values = parse_measurements(pairs)?;
            let macro_def = state.macro_api.get_macro_by_code(code)?;
            let evaluation = if command == "refresh" {
                state.macro_api.evaluate_and_refresh(&macro_def.id, &values)?
            } else {
                state.macro_api.evaluate(&macro_def.id, &values)?
            };
            print_evaluation(&evaluation);
        }
        "macros" => {
            for m in state.macro_api.list_macros(false)? {
                println!(
                    "{:<20} {:<40} 缓存合计={:.2}",
                    m.code, m.name, m.calculated_total
                );
            }
        }
        "catalog" => {
            let filter = CatalogFilter {
                search: rest.first().cloned(),
                ..Default::default()
            };
            for item in state.catalog_api.list(Some(filter))? {
                println!(
                    "{:<16} {:<6} {:>10.2}  {}",
                    item.item_code,
                    item.unit.to_db_str(),
                    item.unit_price,
                    item.description
                );
            }
        }
        "batches" => {
            let limit = rest
                .first()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(10);
            for batch in state.import_api.recent_batches(limit)? {
                println!(
                    "{} {} 总行数={} 新增={} 更新={} 跳过={} 错误={}",
                    batch.imported_at.to_rfc3339(),
                    batch.file_name.unwrap_or_default(),
                    batch.total_rows,
                    batch.created_rows,
                    batch.updated_rows,
                    batch.skipped_rows,
                    batch.error_rows
                );
            }
        }
        _ => return Err(USAGE.into()),
    }

    Ok(())
}

/// 解析 name=value 形式的测量输入
fn parse_measurements(pairs: &[String]) -> Result<MeasurementValues, Box<dyn Error>> {
    let mut values = MeasurementValues::new();
    for pair in pairs {
        let (name, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("测量输入格式应为 name=value: {}", pair))?;
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| format!("测量输入 {} 不是数值: {}", name, raw))?;
        values.insert(name.trim().to_string(), value);
    }
    Ok(values)
}

fn print_evaluation(evaluation: &MacroEvaluation) {
    println!("宏 {}", evaluation.macro_code);
    for item in &evaluation.items {
        let flag = if item.is_included { " " } else { "-" };
        println!(
            "{} {:<16} 数量={:>10.4} 材料={:>10.2} 人工={:>10.2} 合计={:>10.2}",
            flag, item.item_code, item.quantity, item.material, item.labor, item.total
        );
    }
    println!(
        "合计: 材料={:.2} 人工={:.2} 合计={:.2}",
        evaluation.totals.material, evaluation.totals.labor, evaluation.totals.total
    );
    for diagnostic in &evaluation.diagnostics {
        println!("提示: {:?}", diagnostic);
    }
}
