use clap::Parser;
use delivery_zones::utils::error::ErrorSeverity;
use delivery_zones::utils::{logger, validation::Validate};
use delivery_zones::{CartAdmissionGate, CheckoutAdmission, CliConfig, DeliveryConfig};
use serde::Serialize;

/// 有任何供應商無法配送時的結束碼
const EXIT_NOT_DELIVERABLE: i32 = 4;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    checked_at: chrono::DateTime<chrono::Utc>,
    admitted: bool,
    #[serde(flatten)]
    admission: &'a CheckoutAdmission,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = cli.validate() {
        tracing::error!("❌ Invalid arguments: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }
    let destination = cli.destination()?;

    // 載入並驗證配置
    let config = match DeliveryConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let gate = CartAdmissionGate::new(
        config.build_service_area_store()?,
        config.build_directory()?,
    );

    match gate.check_checkout(cli.vendors.as_slice(), &destination).await {
        Ok(admission) => {
            if cli.json {
                let report = Report {
                    checked_at: chrono::Utc::now(),
                    admitted: admission.is_admitted(),
                    admission: &admission,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for entry in &admission.decisions {
                    let icon = if entry.decision.deliverable { "✅" } else { "🚫" };
                    println!(
                        "{} {} [{}] {}",
                        icon, entry.vendor_id, entry.decision.reason_code, entry.decision.message
                    );
                }
            }

            if !admission.is_admitted() {
                std::process::exit(EXIT_NOT_DELIVERABLE);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Delivery check failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low | ErrorSeverity::High => 1,
                ErrorSeverity::Medium => 2, // 可重試
                ErrorSeverity::Critical => 3,
            };
            std::process::exit(exit_code);
        }
    }

    Ok(())
}
