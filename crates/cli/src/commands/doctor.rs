use basketbot_core::config::{AppConfig, LoadOptions};
use basketbot_db::{connect_with_settings, DbPool};
use serde::Serialize;

use crate::commands::{block_on, escape_json, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Exit code 0 when every check passes, 1 otherwise.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                format!(
                    "configuration loaded; {} admin(s) will receive orders",
                    config.admins.user_ids.len()
                ),
            ));
            checks.push(check_catalog(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["catalog_load", "database_connectivity", "cart_schema"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_catalog(config: &AppConfig) -> DoctorCheck {
    match config.catalog.load() {
        Ok(catalog) => DoctorCheck::pass(
            "catalog_load",
            format!("{} products priced in {}", catalog.len(), catalog.currency()),
        ),
        Err(error) => DoctorCheck::fail("catalog_load", error.to_string()),
    }
}

fn check_database(config: &AppConfig) -> [DoctorCheck; 2] {
    let result = block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return [
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("cart_schema", "the database is unreachable"),
                ];
            }
        };

        let schema = check_cart_schema(&pool).await;
        pool.close().await;
        [
            DoctorCheck::pass(
                "database_connectivity",
                format!("connected using `{}`", config.database.url),
            ),
            schema,
        ]
    });

    result.unwrap_or_else(|message| {
        [
            DoctorCheck::fail("database_connectivity", message),
            DoctorCheck::skipped("cart_schema", "the async runtime did not start"),
        ]
    })
}

async fn check_cart_schema(pool: &DbPool) -> DoctorCheck {
    let query = "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'cart_line'";
    match sqlx::query_scalar::<_, i64>(query).fetch_one(pool).await {
        Ok(1) => DoctorCheck::pass("cart_schema", "cart_line table present"),
        Ok(_) => {
            DoctorCheck::fail("cart_schema", "cart_line table missing; run `basketbot migrate`")
        }
        Err(error) => DoctorCheck::fail("cart_schema", format!("schema query failed: {error}")),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
