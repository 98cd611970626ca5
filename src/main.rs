use cep_geocoder::utils::error::ErrorSeverity;
use cep_geocoder::utils::logger;
use cep_geocoder::{CliConfig, GeocodeEngine, LocalStorage, RunReport};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting cep-geocoder");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證配置
    let config = match cli.to_run_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let engine = GeocodeEngine::new_with_monitoring(LocalStorage::new("."), config, cli.monitor);

    // Ctrl-C：停止送出新查詢，已取得的結果照常寫出
    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("⏹️ Interrupted, finishing in-flight lookups");
            cancel.cancel();
        }
    });

    match engine.run().await {
        Ok(report) => {
            print_report(&report);
            if !report.is_complete() {
                std::process::exit(130);
            }
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Geocoding run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!("✅ Geocoding completed");
    println!(
        "🔑 {} distinct keys, {} queried, {} resolved",
        report.distinct_keys, report.keys_queried, report.resolved_keys
    );
    println!("💾 Snapshot: {}", report.snapshot_path);
    println!("📁 Output: {} ({} rows filled)", report.output_path, report.rows_filled);

    for invalid in &report.invalid_keys {
        println!("⚠️ Invalid key '{}': {}", invalid.raw, invalid.reason);
    }
    for invalid in &report.invalid_snapshot_keys {
        println!("⚠️ Skipped snapshot key '{}': {}", invalid.raw, invalid.reason);
    }
    for unresolved in &report.unresolved {
        // 來自 snapshot 的項目沒有失敗原因，只列出試過的供應商
        let attempts: Vec<String> = if unresolved.failures.is_empty() {
            unresolved
                .attempted_providers
                .iter()
                .map(|p| p.to_string())
                .collect()
        } else {
            unresolved
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.provider, f.cause))
                .collect()
        };
        println!("❓ {} not found ({})", unresolved.key, attempts.join("; "));
    }
    if !report.unresolved_rows.is_empty() {
        println!("📍 {} rows left without coordinates", report.unresolved_rows.len());
    }
    if !report.pending.is_empty() {
        println!("⏹️ {} keys were not queried before the interruption", report.pending.len());
    }
}
