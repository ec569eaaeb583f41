use crate::commands::{runtime, CommandResult};
use easyshop_core::config::{AppConfig, LoadOptions};
use easyshop_db::{connect_with_settings, migrations, DemoCatalog, SeedResult};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let outcome = async {
            migrations::run_pending(&pool)
                .await
                .map_err(|error| ("migration", error.to_string(), 5u8))?;

            let seeded = DemoCatalog::load(&pool)
                .await
                .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

            let verification = DemoCatalog::verify(&pool)
                .await
                .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

            if !verification.all_present {
                let message = verification_message(&verification.checks);
                return Err(("seed_verification", message, 6u8));
            }
            Ok::<SeedResult, (&'static str, String, u8)>(seeded)
        }
        .await;

        pool.close().await;
        outcome
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", success_message(seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn success_message(seeded: SeedResult) -> String {
    format!(
        "demo catalog present: {} categories, {} products",
        seeded.categories_seeded, seeded.products_seeded
    )
}

fn verification_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();

    if failed_checks.is_empty() {
        "some demo catalog rows failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::{success_message, verification_message};
    use easyshop_db::SeedResult;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = [
            ("categories-present", true),
            ("products-present", false),
            ("fashion-products", false),
        ];

        assert_eq!(
            verification_message(&checks),
            "seed verification failed for checks: products-present, fashion-products"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let checks = [("categories-present", true)];

        assert_eq!(verification_message(&checks), "some demo catalog rows failed to load");
    }

    #[test]
    fn success_message_reports_counts() {
        let message = success_message(SeedResult { categories_seeded: 3, products_seeded: 10 });

        assert_eq!(message, "demo catalog present: 3 categories, 10 products");
    }
}
