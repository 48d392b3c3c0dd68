//! Runs against a live PostgreSQL instance; point `QUARRY_TEST_DATABASE_URL` at a scratch database.

use quarry_core::datastore::{QueryExecutor, SqlParam};
use quarry_db::migrations::{run_pending, MIGRATOR};
use quarry_db::{connect_with_settings, DbPool, DemoSeed, PgQueryExecutor};

fn test_db_url() -> String {
    std::env::var("QUARRY_TEST_DATABASE_URL")
        .expect("QUARRY_TEST_DATABASE_URL must point at a disposable postgres database")
}

async fn fresh_pool() -> DbPool {
    let pool = connect_with_settings(&test_db_url(), 2, 1, 10).await.expect("connect");
    MIGRATOR.undo(&pool, 0).await.expect("reset schema");
    run_pending(&pool).await.expect("run migrations");
    pool
}

#[tokio::test]
#[ignore]
async fn migrations_create_bi_tables() {
    let pool = fresh_pool().await;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT table_name::text FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_name IN ('customers', 'orders', 'products') \
         ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .expect("list tables");

    assert_eq!(tables, vec!["customers", "orders", "products"]);
}

#[tokio::test]
#[ignore]
async fn seed_loads_once_and_executor_decodes_rows() {
    let pool = fresh_pool().await;

    let first = DemoSeed::new(12, 60).run(&pool).await.expect("seed");
    assert!(!first.skipped);
    assert_eq!(first.products, 20);

    let second = DemoSeed::new(12, 60).run(&pool).await.expect("seed again");
    assert!(second.skipped);
    assert_eq!(second.existing_customers, 12);

    let executor = PgQueryExecutor::new(pool.clone());
    let rows = executor
        .execute(
            "SELECT category, COUNT(*) AS product_count, SUM(unit_price) AS list_total \
             FROM products WHERE unit_price > $1 GROUP BY category ORDER BY category",
            &[SqlParam::infer(&serde_json::json!("10"))],
        )
        .await
        .expect("execute");

    assert!(!rows.is_empty());
    let first_row = &rows[0];
    assert_eq!(first_row.keys().map(String::as_str).collect::<Vec<_>>(), vec![
        "category",
        "product_count",
        "list_total"
    ]);
    assert!(first_row["product_count"].is_i64());
    assert!(first_row["list_total"].is_f64());
}

#[tokio::test]
#[ignore]
async fn executor_binds_date_parameters_and_reports_driver_errors() {
    let pool = fresh_pool().await;
    DemoSeed::new(5, 20).run(&pool).await.expect("seed");
    let executor = PgQueryExecutor::new(pool);

    let rows = executor
        .execute(
            "SELECT COUNT(*) AS recent FROM orders WHERE order_date >= $1",
            &[SqlParam::infer(&serde_json::json!("2000-01-01"))],
        )
        .await
        .expect("date parameter binds");
    assert_eq!(rows[0]["recent"], serde_json::json!(20));

    let error = executor
        .execute("SELECT missing_column FROM orders", &[])
        .await
        .expect_err("unknown column fails");
    assert!(error.to_string().starts_with("Query failed: "));
}

#[tokio::test]
#[ignore]
async fn executor_decodes_intervals_arrays_and_untyped_columns() {
    let pool = fresh_pool().await;
    let executor = PgQueryExecutor::new(pool);

    let rows = executor
        .execute(
            "SELECT interval '1 day 2 hours' AS gap, ARRAY[1, 2, 3] AS ids, \
             ARRAY['a', 'b']::text[] AS tags, ARRAY[1, NULL]::int4[] AS sparse, \
             'x'::\"char\" AS flag, '10.0.0.1'::inet AS host, NULL::interval AS missing",
            &[],
        )
        .await
        .expect("every column decodes");

    let row = &rows[0];
    assert_eq!(row["gap"], serde_json::json!("P1DT2H"));
    assert_eq!(row["ids"], serde_json::json!([1, 2, 3]));
    assert_eq!(row["tags"], serde_json::json!(["a", "b"]));
    assert!(row["sparse"].is_string());
    assert_eq!(row["flag"], serde_json::json!("x"));
    assert!(row["host"].is_string());
    assert!(row["missing"].is_null());
}
