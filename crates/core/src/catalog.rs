//! Data-driven description of each table-backed agent.
//!
//! A data agent is one generic component configured by a [`DataAgentConfig`];
//! the three builtin entries cover the demo `customers`, `orders` and
//! `products` schema created by the bundled migrations.

use serde::{Deserialize, Serialize};

use crate::domain::{SkillDescriptor, DEFAULT_MODES};

fn default_version() -> String {
    "1.0.0".to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub allowed_values: Vec<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub foreign_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    /// Column listing substituted into prompt templates.
    pub fn column_info(&self) -> String {
        self.columns
            .iter()
            .map(|column| {
                let mut parts = vec![format!("- {} ({})", column.name, column.sql_type)];
                if column.primary_key {
                    parts.push("[PRIMARY KEY]".to_string());
                }
                if column.unique {
                    parts.push("[UNIQUE]".to_string());
                }
                if let Some(target) = &column.foreign_key {
                    parts.push(format!("[FK -> {target}]"));
                }
                if let Some(description) = &column.description {
                    parts.push(format!(": {description}"));
                }
                if !column.allowed_values.is_empty() {
                    parts.push(format!("[Values: {}]", column.allowed_values.join(", ")));
                }
                parts.join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAgentConfig {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub port: u16,
    pub table: TableSchema,
    #[serde(default)]
    pub skills: Vec<SkillDescriptor>,
    #[serde(default)]
    pub allowed_tables: Option<Vec<String>>,
    #[serde(default)]
    pub prompt_template: Option<String>,
}

impl DataAgentConfig {
    /// Defaults to the agent's own table.
    pub fn allowed_tables(&self) -> Vec<String> {
        self.allowed_tables.clone().unwrap_or_else(|| vec![self.table.name.clone()])
    }

    pub fn allowed_columns(&self) -> Vec<String> {
        self.table.column_names()
    }
}

pub fn builtin() -> Vec<DataAgentConfig> {
    vec![customers(), orders(), products()]
}

fn customers() -> DataAgentConfig {
    DataAgentConfig {
        key: "customers".to_string(),
        name: "Customers Data Agent".to_string(),
        description: "Specialized agent for customer data analytics. Handles queries about \
                      customer counts, segmentation, lifetime value, regional distribution, \
                      and customer trends over time."
            .to_string(),
        version: default_version(),
        port: 8001,
        table: TableSchema {
            name: "customers".to_string(),
            columns: vec![
                column("customer_id", "UUID", "Unique customer identifier").primary(),
                column("email", "VARCHAR(255)", "Customer email address").unique(),
                column("full_name", "VARCHAR(255)", "Customer full name"),
                column("region", "VARCHAR(100)", "Geographic region").values(&[
                    "North America",
                    "Europe",
                    "Asia Pacific",
                    "Latin America",
                ]),
                column("segment", "VARCHAR(50)", "Customer segment").values(&[
                    "Consumer",
                    "Corporate",
                    "Small Business",
                ]),
                column("created_at", "TIMESTAMP WITH TIME ZONE", "When the customer signed up"),
                column("lifetime_value", "DECIMAL(12, 2)", "Total revenue from non-cancelled orders"),
                column("order_count", "INTEGER", "Number of non-cancelled orders"),
                column("last_order_date", "TIMESTAMP WITH TIME ZONE", "Most recent order date"),
                column("is_active", "BOOLEAN", "Whether the customer is active"),
            ],
        },
        skills: vec![
            skill(
                "customer_count",
                "Customer Count",
                "Count customers with optional filtering by region, segment, or date range",
                &["count", "customers", "aggregation"],
                &[
                    "How many customers do we have?",
                    "Count customers in Europe",
                    "How many Corporate segment customers joined this year?",
                ],
            ),
            skill(
                "customer_lifetime_value",
                "Customer Lifetime Value Analysis",
                "Analyze customer lifetime value (LTV) by segment, region, or cohort",
                &["ltv", "revenue", "customers", "aggregation"],
                &[
                    "What is the average customer lifetime value?",
                    "Show LTV by customer segment",
                    "Top 10 customers by lifetime value",
                ],
            ),
            skill(
                "customer_trends",
                "Customer Trends",
                "Time-series analysis of customer acquisition, churn, and activity",
                &["trends", "time-series", "customers"],
                &[
                    "Show new customer sign-ups by month",
                    "Customer growth trend over the last year",
                    "When do we get the most new customers?",
                ],
            ),
            skill(
                "customer_list",
                "Customer List",
                "Retrieve filtered list of customers with their details",
                &["list", "customers", "details"],
                &[
                    "List all customers from Asia Pacific",
                    "Show inactive customers",
                    "Get customer IDs for Corporate segment",
                ],
            ),
        ],
        allowed_tables: None,
        prompt_template: None,
    }
}

fn orders() -> DataAgentConfig {
    DataAgentConfig {
        key: "orders".to_string(),
        name: "Orders Data Agent".to_string(),
        description: "Specialized agent for order and revenue analytics. Handles queries about \
                      revenue totals, order counts, trends, and fulfillment status."
            .to_string(),
        version: default_version(),
        port: 8002,
        table: TableSchema {
            name: "orders".to_string(),
            columns: vec![
                column("order_id", "UUID", "Unique order identifier").primary(),
                column("customer_id", "UUID", "Ordering customer").references("customers.customer_id"),
                column("product_id", "UUID", "Ordered product").references("products.product_id"),
                column("quantity", "INTEGER", "Units ordered"),
                column("unit_price", "DECIMAL(10, 2)", "Price per unit at order time"),
                column("total_amount", "DECIMAL(12, 2)", "Order total"),
                column("discount", "DECIMAL(5, 2)", "Discount applied to the order"),
                column("order_date", "TIMESTAMP WITH TIME ZONE", "When the order was placed"),
                column("status", "VARCHAR(50)", "Fulfillment status").values(&[
                    "pending",
                    "shipped",
                    "delivered",
                    "cancelled",
                ]),
                column("ship_date", "TIMESTAMP WITH TIME ZONE", "When the order shipped"),
                column("ship_region", "VARCHAR(100)", "Destination region"),
            ],
        },
        skills: vec![
            skill(
                "revenue_total",
                "Revenue Analysis",
                "Calculate total revenue with optional filters by period, status, or region",
                &["revenue", "orders", "aggregation"],
                &[
                    "What is our total revenue?",
                    "Revenue for Q4 2024",
                    "Total revenue from delivered orders",
                ],
            ),
            skill(
                "order_trends",
                "Order Trends",
                "Time-series analysis of order volumes and revenue",
                &["trends", "time-series", "orders"],
                &[
                    "Show monthly order counts",
                    "Revenue trend over the last 6 months",
                    "Daily order volume this week",
                ],
            ),
            skill(
                "avg_order_value",
                "Average Order Value",
                "Calculate average order value with optional grouping",
                &["aov", "orders", "aggregation"],
                &[
                    "What is our average order value?",
                    "AOV by customer segment",
                    "Average order size by product category",
                ],
            ),
            skill(
                "order_status",
                "Order Status Analysis",
                "Analyze orders by fulfillment status",
                &["status", "orders", "fulfillment"],
                &[
                    "How many orders are pending?",
                    "Orders by status",
                    "Unfulfilled orders older than 7 days",
                ],
            ),
        ],
        allowed_tables: None,
        prompt_template: None,
    }
}

fn products() -> DataAgentConfig {
    DataAgentConfig {
        key: "products".to_string(),
        name: "Products Data Agent".to_string(),
        description: "Specialized agent for product catalog analytics. Handles queries about \
                      product counts, pricing, margins, inventory levels, and category analysis."
            .to_string(),
        version: default_version(),
        port: 8003,
        table: TableSchema {
            name: "products".to_string(),
            columns: vec![
                column("product_id", "UUID", "Unique product identifier").primary(),
                column("sku", "VARCHAR(50)", "Stock keeping unit").unique(),
                column("name", "VARCHAR(255)", "Product name"),
                column("category", "VARCHAR(100)", "Product category").values(&[
                    "Electronics",
                    "Clothing",
                    "Home & Garden",
                    "Sports",
                    "Books",
                ]),
                column("subcategory", "VARCHAR(100)", "Product subcategory"),
                column("unit_price", "DECIMAL(10, 2)", "List price"),
                column("unit_cost", "DECIMAL(10, 2)", "Cost of goods"),
                column("stock_quantity", "INTEGER", "Units in stock"),
                column("is_active", "BOOLEAN", "Whether the product is sellable"),
                column("created_at", "TIMESTAMP WITH TIME ZONE", "When the product was added"),
                column("updated_at", "TIMESTAMP WITH TIME ZONE", "Last modification time"),
            ],
        },
        skills: vec![
            skill(
                "product_count",
                "Product Catalog Stats",
                "Count products by category, status, or other attributes",
                &["count", "products", "catalog"],
                &[
                    "How many products do we have?",
                    "Products by category",
                    "How many active products in Electronics?",
                ],
            ),
            skill(
                "category_stats",
                "Category Analysis",
                "Analyze products by category with pricing and margin metrics",
                &["category", "pricing", "margin"],
                &[
                    "Average price by category",
                    "Which category has the highest margin?",
                    "Category breakdown with product counts",
                ],
            ),
            skill(
                "inventory_status",
                "Inventory Analysis",
                "Analyze stock levels and identify low inventory",
                &["inventory", "stock", "products"],
                &["Products with low stock", "Total inventory value", "Out of stock products"],
            ),
            skill(
                "product_search",
                "Product Search",
                "Search and list products by various criteria",
                &["search", "list", "products"],
                &[
                    "List all Electronics products",
                    "Find products priced over $100",
                    "Show newest products",
                ],
            ),
        ],
        allowed_tables: None,
        prompt_template: None,
    }
}

fn column(name: &str, sql_type: &str, description: &str) -> ColumnSpec {
    ColumnSpec {
        name: name.to_string(),
        sql_type: sql_type.to_string(),
        description: Some(description.to_string()),
        allowed_values: Vec::new(),
        primary_key: false,
        unique: false,
        foreign_key: None,
    }
}

impl ColumnSpec {
    fn primary(mut self) -> Self {
        self.primary_key = true;
        self
    }

    fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    fn references(mut self, target: &str) -> Self {
        self.foreign_key = Some(target.to_string());
        self
    }

    fn values(mut self, values: &[&str]) -> Self {
        self.allowed_values = values.iter().map(|value| (*value).to_string()).collect();
        self
    }
}

fn skill(
    id: &str,
    name: &str,
    description: &str,
    tags: &[&str],
    examples: &[&str],
) -> SkillDescriptor {
    let owned = |items: &[&str]| items.iter().map(|item| (*item).to_string()).collect::<Vec<_>>();
    SkillDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        tags: owned(tags),
        examples: owned(examples),
        input_modes: vec!["text/plain".to_string()],
        output_modes: owned(DEFAULT_MODES),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::builtin;

    #[test]
    fn builtin_agents_have_distinct_ports_and_skills() {
        let agents = builtin();
        let ports: HashSet<u16> = agents.iter().map(|agent| agent.port).collect();
        let skills: HashSet<&str> =
            agents.iter().flat_map(|agent| agent.skills.iter().map(|s| s.id.as_str())).collect();

        assert_eq!(ports, HashSet::from([8001, 8002, 8003]));
        assert_eq!(skills.len(), 12);
    }

    #[test]
    fn allowed_tables_default_to_own_table() {
        let agents = builtin();
        let orders = agents.iter().find(|agent| agent.key == "orders").expect("orders agent");

        assert_eq!(orders.allowed_tables(), vec!["orders".to_string()]);
        assert!(orders.allowed_columns().contains(&"total_amount".to_string()));
    }

    #[test]
    fn column_info_lists_keys_and_values() {
        let agents = builtin();
        let info = agents[0].table.column_info();

        assert!(info.starts_with("- customer_id (UUID) [PRIMARY KEY] : Unique customer identifier"));
        assert!(info.contains(
            "- segment (VARCHAR(50)) : Customer segment [Values: Consumer, Corporate, Small Business]"
        ));
    }
}
