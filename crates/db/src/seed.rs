//! Deterministic demo dataset for the `customers`, `products` and `orders` tables.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;
use uuid::{Builder, Uuid};

use crate::DbPool;

const REGIONS: &[&str] = &["North America", "Europe", "Asia Pacific", "Latin America"];
const SEGMENTS: &[&str] = &["Consumer", "Corporate", "Small Business"];
const FIRST_NAMES: &[&str] = &[
    "John", "Jane", "Michael", "Sarah", "David", "Emily", "Robert", "Lisa", "William", "Jennifer",
];
const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Martinez",
    "Wilson",
];

// (category, subcategory, name, price cents, cost cents)
const PRODUCTS: &[(&str, &str, &str, i64, i64)] = &[
    ("Electronics", "Smartphones", "Smartphone Pro X", 99_999, 65_000),
    ("Electronics", "Smartphones", "Smartphone Lite", 49_999, 30_000),
    ("Electronics", "Laptops", "UltraBook 15", 129_999, 85_000),
    ("Electronics", "Laptops", "Gaming Laptop", 179_999, 120_000),
    ("Electronics", "Accessories", "Wireless Earbuds", 14_999, 6_000),
    ("Clothing", "Men", "Premium T-Shirt", 4_999, 1_500),
    ("Clothing", "Men", "Casual Jeans", 7_999, 2_500),
    ("Clothing", "Women", "Summer Dress", 8_999, 3_000),
    ("Clothing", "Women", "Designer Handbag", 29_999, 10_000),
    ("Clothing", "Kids", "Kids Sneakers", 5_999, 2_000),
    ("Home & Garden", "Furniture", "Office Chair", 24_999, 12_000),
    ("Home & Garden", "Furniture", "Standing Desk", 44_999, 20_000),
    ("Home & Garden", "Kitchen", "Coffee Maker", 12_999, 5_000),
    ("Home & Garden", "Garden", "Garden Tool Set", 8_999, 3_500),
    ("Sports", "Fitness", "Yoga Mat Premium", 4_999, 1_500),
    ("Sports", "Fitness", "Dumbbell Set", 19_999, 8_000),
    ("Sports", "Outdoor", "Camping Tent", 29_999, 12_000),
    ("Sports", "Team Sports", "Basketball", 2_999, 1_000),
    ("Books", "Fiction", "Bestseller Novel", 2_499, 800),
    ("Books", "Non-Fiction", "Business Guide", 3_499, 1_200),
];

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedReport {
    pub skipped: bool,
    pub existing_customers: i64,
    pub products: usize,
    pub customers: usize,
    pub orders: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProductSeed {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
    pub stock_quantity: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CustomerSeed {
    pub customer_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub region: String,
    pub segment: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub lifetime_value: Decimal,
    pub order_count: i32,
    pub last_order_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderSeed {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub order_date: DateTime<Utc>,
    pub status: &'static str,
    pub ship_date: Option<DateTime<Utc>>,
    pub ship_region: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SeedDataset {
    pub products: Vec<ProductSeed>,
    pub customers: Vec<CustomerSeed>,
    pub orders: Vec<OrderSeed>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DemoSeed {
    pub customers: usize,
    pub orders: usize,
    pub rng_seed: u64,
}

impl Default for DemoSeed {
    fn default() -> Self {
        Self { customers: 100, orders: 500, rng_seed: 42 }
    }
}

impl DemoSeed {
    pub fn new(customers: usize, orders: usize) -> Self {
        Self { customers, orders, ..Self::default() }
    }

    /// Builds the full dataset in memory; customer aggregates already reflect the orders.
    pub fn generate(&self, now: DateTime<Utc>) -> SeedDataset {
        let mut rng = StdRng::seed_from_u64(self.rng_seed);

        let products: Vec<ProductSeed> = PRODUCTS
            .iter()
            .enumerate()
            .map(|(index, (category, subcategory, name, price, cost))| ProductSeed {
                product_id: next_uuid(&mut rng),
                sku: format!("SKU-{}-{:04}", sku_prefix(category), index + 1),
                name: (*name).to_string(),
                category: (*category).to_string(),
                subcategory: (*subcategory).to_string(),
                unit_price: Decimal::new(*price, 2),
                unit_cost: Decimal::new(*cost, 2),
                stock_quantity: rng.gen_range(10..=500),
            })
            .collect();

        let customer_base = now - Duration::days(730);
        let mut customers: Vec<CustomerSeed> = (0..self.customers)
            .map(|index| {
                let first = pick(&mut rng, FIRST_NAMES);
                let last = pick(&mut rng, LAST_NAMES);
                CustomerSeed {
                    customer_id: next_uuid(&mut rng),
                    email: format!(
                        "{}.{}.{index}@example.com",
                        first.to_lowercase(),
                        last.to_lowercase()
                    ),
                    full_name: format!("{first} {last}"),
                    region: pick(&mut rng, REGIONS).to_string(),
                    segment: pick(&mut rng, SEGMENTS).to_string(),
                    created_at: customer_base + Duration::days(rng.gen_range(0..=730)),
                    is_active: rng.gen::<f64>() > 0.1,
                    lifetime_value: Decimal::ZERO,
                    order_count: 0,
                    last_order_date: None,
                }
            })
            .collect();

        let mut orders = Vec::new();
        if !customers.is_empty() && !products.is_empty() {
            let order_base = now - Duration::days(365);
            let mut stats: HashMap<usize, (Decimal, i32, Option<DateTime<Utc>>)> = HashMap::new();
            for _ in 0..self.orders {
                let customer_index = rng.gen_range(0..customers.len());
                let product = &products[rng.gen_range(0..products.len())];
                let quantity: i32 = rng.gen_range(1..=5);
                let unit_price = Decimal::new(rng.gen_range(2_000..=50_000), 2);
                let total_amount = unit_price * Decimal::from(quantity);
                let order_date = order_base + Duration::days(rng.gen_range(0..=365));
                let status = order_status(rng.gen_range(0..100));
                let ship_date = matches!(status, "shipped" | "delivered")
                    .then(|| order_date + Duration::days(rng.gen_range(1..=7)));
                let customer = &customers[customer_index];

                if status != "cancelled" {
                    let entry = stats.entry(customer_index).or_insert((Decimal::ZERO, 0, None));
                    entry.0 += total_amount;
                    entry.1 += 1;
                    if entry.2.map_or(true, |last| order_date > last) {
                        entry.2 = Some(order_date);
                    }
                }

                orders.push(OrderSeed {
                    order_id: next_uuid(&mut rng),
                    customer_id: customer.customer_id,
                    product_id: product.product_id,
                    quantity,
                    unit_price,
                    total_amount,
                    order_date,
                    status,
                    ship_date,
                    ship_region: ship_date.map(|_| customer.region.clone()),
                });
            }

            for (index, (lifetime_value, order_count, last_order_date)) in stats {
                let customer = &mut customers[index];
                customer.lifetime_value = lifetime_value;
                customer.order_count = order_count;
                customer.last_order_date = last_order_date;
            }
        }

        SeedDataset { products, customers, orders }
    }

    /// Loads the dataset unless customers already exist.
    pub async fn run(&self, pool: &DbPool) -> Result<SeedReport, SeedError> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(pool)
            .await?;
        if existing > 0 {
            info!(
                event_name = "system.seed.skipped",
                existing_customers = existing,
                "database already seeded"
            );
            return Ok(SeedReport {
                skipped: true,
                existing_customers: existing,
                products: 0,
                customers: 0,
                orders: 0,
            });
        }

        let dataset = self.generate(Utc::now());
        let mut tx = pool.begin().await?;

        for product in &dataset.products {
            sqlx::query(
                "INSERT INTO products (product_id, sku, name, category, subcategory, unit_price, \
                 unit_cost, stock_quantity, is_active) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE) \
                 ON CONFLICT (sku) DO NOTHING",
            )
            .bind(product.product_id)
            .bind(&product.sku)
            .bind(&product.name)
            .bind(&product.category)
            .bind(&product.subcategory)
            .bind(product.unit_price)
            .bind(product.unit_cost)
            .bind(product.stock_quantity)
            .execute(&mut *tx)
            .await?;
        }

        for customer in &dataset.customers {
            sqlx::query(
                "INSERT INTO customers (customer_id, email, full_name, region, segment, created_at, \
                 lifetime_value, order_count, last_order_date, is_active) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                 ON CONFLICT (email) DO NOTHING",
            )
            .bind(customer.customer_id)
            .bind(&customer.email)
            .bind(&customer.full_name)
            .bind(&customer.region)
            .bind(&customer.segment)
            .bind(customer.created_at)
            .bind(customer.lifetime_value)
            .bind(customer.order_count)
            .bind(customer.last_order_date)
            .bind(customer.is_active)
            .execute(&mut *tx)
            .await?;
        }

        for order in &dataset.orders {
            sqlx::query(
                "INSERT INTO orders (order_id, customer_id, product_id, quantity, unit_price, \
                 total_amount, order_date, status, ship_date, ship_region) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(order.order_id)
            .bind(order.customer_id)
            .bind(order.product_id)
            .bind(order.quantity)
            .bind(order.unit_price)
            .bind(order.total_amount)
            .bind(order.order_date)
            .bind(order.status)
            .bind(order.ship_date)
            .bind(&order.ship_region)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let report = SeedReport {
            skipped: false,
            existing_customers: 0,
            products: dataset.products.len(),
            customers: dataset.customers.len(),
            orders: dataset.orders.len(),
        };
        info!(
            event_name = "system.seed.completed",
            products = report.products,
            customers = report.customers,
            orders = report.orders,
            "demo data loaded"
        );
        Ok(report)
    }
}

fn next_uuid(rng: &mut StdRng) -> Uuid {
    Builder::from_random_bytes(rng.gen()).into_uuid()
}

fn pick<'a>(rng: &mut StdRng, values: &[&'a str]) -> &'a str {
    values.choose(rng).copied().unwrap_or_default()
}

fn sku_prefix(category: &str) -> String {
    category.chars().take(3).collect::<String>().to_uppercase()
}

// Weights 10/20/65/5: most orders end up delivered.
fn order_status(roll: u32) -> &'static str {
    match roll {
        0..=9 => "pending",
        10..=29 => "shipped",
        30..=94 => "delivered",
        _ => "cancelled",
    }
}
