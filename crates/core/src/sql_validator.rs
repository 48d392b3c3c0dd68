//! Whitelist and pattern gate for model-generated SQL.
//!
//! This is a filter, not a parser. It has no awareness of string literals, so a
//! `--` or `/*` inside a quoted value is rejected like any other comment marker.
//! Callers must keep passing user values as bound parameters and never splice
//! them into SQL text.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::SqlInjectionError;

const DANGEROUS_PATTERNS: &[(&str, &str)] = &[
    (r"(?i)\bDROP\b", "DROP statements not allowed"),
    (r"(?i)\bDELETE\b", "DELETE statements not allowed"),
    (r"(?i)\bTRUNCATE\b", "TRUNCATE statements not allowed"),
    (r"(?i)\bINSERT\b", "INSERT statements not allowed"),
    (r"(?i)\bUPDATE\b", "UPDATE statements not allowed"),
    (r"(?i)\bALTER\b", "ALTER statements not allowed"),
    (r"(?i)\bCREATE\b", "CREATE statements not allowed"),
    (r"(?i)\bGRANT\b", "GRANT statements not allowed"),
    (r"(?i)\bREVOKE\b", "REVOKE statements not allowed"),
    (r";\s*\S", "multiple statements not allowed"),
    (r"--", "SQL comment injection not allowed"),
    (r"/\*", "SQL block comment not allowed"),
    (r"(?i)\bEXEC\b", "EXEC not allowed"),
    (r"(?i)\bEXECUTE\b", "EXECUTE not allowed"),
    (r"(?i)\bxp_", "Extended stored procedures not allowed"),
    (r"(?i)\bsp_", "System stored procedures not allowed"),
];

struct CompiledRules {
    dangerous: Vec<(Regex, &'static str)>,
    table_reference: Regex,
}

static RULES: Lazy<Result<CompiledRules, regex::Error>> = Lazy::new(|| {
    let dangerous = DANGEROUS_PATTERNS
        .iter()
        .map(|(pattern, message)| Regex::new(pattern).map(|regex| (regex, *message)))
        .collect::<Result<Vec<_>, _>>()?;
    let table_reference = Regex::new(r"(?i)\b(?:FROM|JOIN)\s+(\w+)")?;
    Ok(CompiledRules { dangerous, table_reference })
});

#[derive(Clone, Debug, Default)]
pub struct SqlValidator {
    allowed_tables: Option<HashSet<String>>,
    allowed_columns: Option<HashSet<String>>,
}

impl SqlValidator {
    pub fn new<T, C>(allowed_tables: Option<T>, allowed_columns: Option<C>) -> Self
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self {
            allowed_tables: allowed_tables.map(|tables| {
                tables.into_iter().map(|table| table.as_ref().to_ascii_lowercase()).collect()
            }),
            allowed_columns: allowed_columns.map(|columns| {
                columns.into_iter().map(|column| column.as_ref().to_ascii_lowercase()).collect()
            }),
        }
    }

    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn allowed_columns(&self) -> Option<&HashSet<String>> {
        self.allowed_columns.as_ref()
    }

    /// Checks run in a fixed order and the first violation wins.
    pub fn validate(&self, sql: &str) -> Result<(), SqlInjectionError> {
        let rules = RULES
            .as_ref()
            .map_err(|_| SqlInjectionError::new("SQL validator rules failed to compile"))?;

        let normalized = normalize_whitespace(sql);

        if !normalized.to_ascii_uppercase().starts_with("SELECT") {
            return Err(SqlInjectionError::new("Only SELECT queries are allowed"));
        }

        for (pattern, message) in &rules.dangerous {
            if pattern.is_match(&normalized) {
                return Err(SqlInjectionError::new(*message));
            }
        }

        if let Some(allowed) = &self.allowed_tables {
            for table in referenced_tables(&rules.table_reference, &normalized) {
                if !allowed.contains(&table.to_ascii_lowercase()) {
                    return Err(SqlInjectionError::new(format!("Table '{table}' not allowed")));
                }
            }
        }

        if self.allowed_columns.is_some() {
            self.validate_columns(&normalized)?;
        }

        Ok(())
    }

    /// Column whitelisting is not enforced. Table whitelisting plus bound
    /// parameters are the actual defense; this hook only exists so a stricter
    /// implementation has a place to live.
    fn validate_columns(&self, _sql: &str) -> Result<(), SqlInjectionError> {
        Ok(())
    }
}

/// Identifiers following `FROM` or `JOIN`, in order of first appearance.
pub fn extract_tables(sql: &str) -> Vec<String> {
    match RULES.as_ref() {
        Ok(rules) => referenced_tables(&rules.table_reference, &normalize_whitespace(sql)),
        Err(_) => Vec::new(),
    }
}

fn referenced_tables(pattern: &Regex, sql: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    pattern
        .captures_iter(sql)
        .filter_map(|captures| captures.get(1).map(|name| name.as_str().to_string()))
        .filter(|name| seen.insert(name.to_ascii_lowercase()))
        .collect()
}

fn normalize_whitespace(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::{extract_tables, SqlValidator};

    fn customers_only() -> SqlValidator {
        SqlValidator::new(Some(["customers"]), Some(["customer_id", "region"]))
    }

    fn rejection(validator: &SqlValidator, sql: &str) -> String {
        match validator.validate(sql) {
            Ok(()) => panic!("expected `{sql}` to be rejected"),
            Err(error) => error.to_string(),
        }
    }

    #[test]
    fn accepts_simple_select() {
        let validator = customers_only();

        assert!(validator.validate("SELECT COUNT(*) FROM customers").is_ok());
        assert!(validator
            .validate("select region, count(*) from customers where region = $1 group by region")
            .is_ok());
        assert!(validator.validate("SELECT 1 FROM customers;").is_ok());
    }

    #[test]
    fn rejects_non_select_statements() {
        let validator = SqlValidator::unrestricted();

        for sql in ["WITH x AS (SELECT 1) SELECT * FROM x", "SHOW tables", "", "   "] {
            assert_eq!(rejection(&validator, sql), "Only SELECT queries are allowed");
        }
    }

    #[test]
    fn whitespace_obfuscation_does_not_bypass_select_check() {
        let validator = customers_only();

        assert!(validator.validate("\n\t  SELECT\n*\n\tFROM\n   customers").is_ok());
        assert_eq!(
            rejection(&validator, "\n\n  DELETE\tFROM customers"),
            "Only SELECT queries are allowed"
        );
    }

    #[test]
    fn rejects_dangerous_keywords_after_select_prefix() {
        let validator = SqlValidator::unrestricted();
        let cases = [
            ("SELECT * FROM t WHERE 1=1 OR DROP TABLE x", "DROP statements not allowed"),
            ("SELECT delete FROM t", "DELETE statements not allowed"),
            ("SELECT * FROM t TRUNCATE", "TRUNCATE statements not allowed"),
            ("SELECT * FROM t Insert", "INSERT statements not allowed"),
            ("SELECT update FROM t", "UPDATE statements not allowed"),
            ("SELECT * FROM t alter", "ALTER statements not allowed"),
            ("SELECT * FROM t create", "CREATE statements not allowed"),
            ("SELECT * FROM t grant", "GRANT statements not allowed"),
            ("SELECT * FROM t revoke", "REVOKE statements not allowed"),
            ("SELECT * FROM t exec", "EXEC not allowed"),
            ("SELECT * FROM t EXECUTE", "EXECUTE not allowed"),
            ("SELECT xp_cmdshell('dir')", "Extended stored procedures not allowed"),
            ("SELECT sp_who()", "System stored procedures not allowed"),
        ];

        for (sql, expected) in cases {
            assert_eq!(rejection(&validator, sql), expected, "sql: {sql}");
        }
    }

    #[test]
    fn keywords_inside_identifiers_are_allowed() {
        let validator = SqlValidator::unrestricted();

        assert!(validator.validate("SELECT created_at, updated_at FROM products").is_ok());
        assert!(validator.validate("SELECT dropped_count FROM stats").is_ok());
    }

    #[test]
    fn rejects_stacked_statements() {
        let validator = SqlValidator::unrestricted();

        assert_eq!(
            rejection(&validator, "SELECT * FROM customers; SELECT * FROM orders"),
            "multiple statements not allowed"
        );
    }

    #[test]
    fn rejects_comments_even_inside_literals() {
        let validator = SqlValidator::unrestricted();

        assert_eq!(
            rejection(&validator, "SELECT * FROM products WHERE name = 'A--B'"),
            "SQL comment injection not allowed"
        );
        assert_eq!(
            rejection(&validator, "SELECT * FROM products /* hidden */"),
            "SQL block comment not allowed"
        );
    }

    #[test]
    fn table_whitelist_names_offending_table() {
        let validator = customers_only();

        assert_eq!(rejection(&validator, "SELECT * FROM orders"), "Table 'orders' not allowed");
        assert_eq!(
            rejection(&validator, "SELECT * FROM customers c JOIN Orders o ON o.id = c.id"),
            "Table 'Orders' not allowed"
        );
        assert!(validator.validate("SELECT * FROM CUSTOMERS").is_ok());
    }

    #[test]
    fn first_violation_wins() {
        let validator = customers_only();

        assert_eq!(
            rejection(&validator, "SELECT * FROM orders; DROP TABLE customers"),
            "DROP statements not allowed"
        );
    }

    #[test]
    fn column_whitelist_is_declared_but_not_enforced() {
        let validator = customers_only();

        assert!(validator.allowed_columns().is_some());
        assert!(validator.validate("SELECT secret_column FROM customers").is_ok());
    }

    #[test]
    fn extract_tables_preserves_first_appearance_order() {
        assert_eq!(
            extract_tables("SELECT * FROM orders o JOIN customers c ON 1 = 1 JOIN ORDERS x"),
            vec!["orders".to_string(), "customers".to_string()]
        );
    }
}
