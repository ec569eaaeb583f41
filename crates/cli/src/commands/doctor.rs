use easyshop_core::config::{AppConfig, LoadOptions};
use easyshop_db::{connect_with_settings, DbPool};
use serde::Serialize;

use crate::commands::{escape_json, runtime, CommandResult};

const STOREFRONT_TABLES: [&str; 3] = ["categories", "products", "shopping_cart"];

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

/// Exit code 0 when every required check passes, 1 otherwise.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
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
                "configuration loaded and validated",
            ));
            checks.extend(check_database(&config));
            checks.push(check_admin_token(&config));
        }
        Err(error) => {
            let reason = "configuration did not load";
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.push(DoctorCheck::skipped("database_connectivity", reason));
            checks.push(DoctorCheck::skipped("storefront_schema", reason));
            checks.push(DoctorCheck::skipped("admin_token", reason));
        }
    }

    // An unset admin token only disables catalog administration.
    let all_pass = checks
        .iter()
        .all(|check| check.status == CheckStatus::Pass || check.name == "admin_token");
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_admin_token(config: &AppConfig) -> DoctorCheck {
    if config.auth.admin_token.is_some() {
        DoctorCheck::pass("admin_token", "admin token configured; catalog writes enabled")
    } else {
        DoctorCheck::skipped(
            "admin_token",
            "no admin token is configured; catalog writes will be refused",
        )
    }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("storefront_schema", "the async runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("storefront_schema", "the database is unreachable"),
                ];
            }
        };

        let schema = check_schema(&pool).await;
        pool.close().await;

        vec![
            DoctorCheck::pass(
                "database_connectivity",
                format!("connected using `{}`", config.database.url),
            ),
            schema,
        ]
    })
}

async fn check_schema(pool: &DbPool) -> DoctorCheck {
    let present: Result<Vec<String>, sqlx::Error> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name IN ('categories', 'products', 'shopping_cart')",
    )
    .fetch_all(pool)
    .await;

    match present {
        Ok(present) => {
            let missing = STOREFRONT_TABLES
                .iter()
                .filter(|table| !present.iter().any(|name| name == *table))
                .copied()
                .collect::<Vec<_>>();
            if missing.is_empty() {
                DoctorCheck::pass("storefront_schema", "all storefront tables present")
            } else {
                DoctorCheck::fail(
                    "storefront_schema",
                    format!("missing tables: {}; run `easyshop migrate`", missing.join(", ")),
                )
            }
        }
        Err(error) => {
            DoctorCheck::fail("storefront_schema", format!("schema check failed: {error}"))
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

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

#[cfg(test)]
mod tests {
    use super::{render_human, CheckStatus, DoctorCheck, DoctorReport};

    #[test]
    fn human_output_marks_each_check() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: "doctor: one or more readiness checks failed".to_string(),
            checks: vec![
                DoctorCheck::pass("config_validation", "configuration loaded and validated"),
                DoctorCheck::fail("storefront_schema", "missing tables: products"),
                DoctorCheck::skipped("admin_token", "no admin token is configured"),
            ],
        };

        let rendered = render_human(&report);

        assert!(rendered.starts_with("doctor: one or more readiness checks failed"));
        assert!(rendered.contains("- [ok] config_validation"));
        assert!(rendered.contains("- [fail] storefront_schema: missing tables: products"));
        assert!(rendered.contains("- [skip] admin_token: skipped because no admin token"));
    }
}
