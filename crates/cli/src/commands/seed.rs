use crate::commands::{load_config, runtime, CommandResult};
use quarry_db::{connect_with_settings, migrations, DemoSeed, SeedReport};

pub fn run(customers: Option<usize>, orders: Option<usize>) -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let defaults = DemoSeed::default();
    let seed = DemoSeed::new(
        customers.unwrap_or(defaults.customers),
        orders.unwrap_or(defaults.orders),
    );

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let report = seed
            .run(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8));

        pool.close().await;
        report
    });

    match result {
        Ok(report) => CommandResult::success("seed", summarize(&report)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn summarize(report: &SeedReport) -> String {
    if report.skipped {
        format!(
            "demo data already present ({} customers); nothing loaded",
            report.existing_customers
        )
    } else {
        format!(
            "loaded demo data: {} products, {} customers, {} orders",
            report.products, report.customers, report.orders
        )
    }
}

#[cfg(test)]
mod tests {
    use quarry_db::SeedReport;

    use super::summarize;

    #[test]
    fn summary_reports_counts_or_skip() {
        let loaded = SeedReport {
            skipped: false,
            existing_customers: 0,
            products: 20,
            customers: 100,
            orders: 500,
        };
        assert_eq!(summarize(&loaded), "loaded demo data: 20 products, 100 customers, 500 orders");

        let skipped = SeedReport { skipped: true, existing_customers: 100, ..loaded };
        assert_eq!(summarize(&skipped), "demo data already present (100 customers); nothing loaded");
    }
}
