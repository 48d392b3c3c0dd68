use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Versions embedded in the binary, in apply order.
pub fn embedded_versions() -> Vec<(i64, String)> {
    MIGRATOR
        .iter()
        .filter(|migration| migration.migration_type.is_up_migration())
        .map(|migration| (migration.version, migration.description.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::embedded_versions;

    #[test]
    fn bi_schema_migration_is_embedded() {
        let versions = embedded_versions();

        assert_eq!(versions.first().map(|(version, _)| *version), Some(1));
        assert!(versions.iter().any(|(_, description)| description == "bi schema"));
    }
}
