//! PostgreSQL entry repository.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument};

use pagemeta_core::{
    EntryRepository, Error, MetadataEntry, MetadataProperty, PropertyValue, Result, ValueType,
};

/// PostgreSQL implementation of [`EntryRepository`].
///
/// Each save runs in its own transaction guarded by a transaction-scoped
/// advisory lock on the `pagepath`, so concurrent saves of one path are
/// serialized across connections and processes.
#[derive(Clone)]
pub struct PgEntryRepository {
    pool: Pool<Postgres>,
}

impl PgEntryRepository {
    /// Create a new PgEntryRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn load_properties(
        &self,
        pagepaths: Option<&[String]>,
    ) -> Result<HashMap<String, Vec<MetadataProperty>>> {
        let rows = match pagepaths {
            Some(paths) => sqlx::query(
                r#"
                SELECT pagepath, name, valuetype, string_value, number_value, date_value, text_value
                FROM metadata_property
                WHERE pagepath = ANY($1)
                ORDER BY pagepath, position
                "#,
            )
            .bind(paths)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?,
            None => sqlx::query(
                r#"
                SELECT pagepath, name, valuetype, string_value, number_value, date_value, text_value
                FROM metadata_property
                ORDER BY pagepath, position
                "#,
            )
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?,
        };

        let mut by_path: HashMap<String, Vec<MetadataProperty>> = HashMap::new();
        for row in rows {
            let pagepath: String = row.get("pagepath");
            by_path
                .entry(pagepath)
                .or_default()
                .push(property_from_row(&row)?);
        }
        Ok(by_path)
    }
}

fn entry_from_row(row: &PgRow) -> MetadataEntry {
    MetadataEntry {
        pagepath: row.get("pagepath"),
        name: row.get("name"),
        folder: row.get("folder"),
        entry_type: row.get("entry_type"),
        site: row.get("site"),
        linktext: row.get("linktext"),
        properties: Vec::new(),
    }
}

fn property_from_row(row: &PgRow) -> Result<MetadataProperty> {
    let name: String = row.get("name");
    let valuetype: String = row.get("valuetype");
    let value_type: ValueType = valuetype.parse().map_err(Error::Internal)?;

    let missing = || {
        Error::Internal(format!(
            "Property {} has no {} value",
            name,
            value_type.as_str()
        ))
    };
    let value = match value_type {
        ValueType::String => PropertyValue::String(
            row.get::<Option<String>, _>("string_value")
                .ok_or_else(missing)?,
        ),
        ValueType::Number => PropertyValue::Number(
            row.get::<Option<f64>, _>("number_value")
                .ok_or_else(missing)?,
        ),
        ValueType::Date => PropertyValue::Date(
            row.get::<Option<DateTime<Utc>>, _>("date_value")
                .ok_or_else(missing)?,
        ),
        ValueType::Text => PropertyValue::Text(
            row.get::<Option<String>, _>("text_value")
                .ok_or_else(missing)?,
        ),
    };
    Ok(MetadataProperty::new(name, value))
}

#[async_trait]
impl EntryRepository for PgEntryRepository {
    #[instrument(skip(self, entry), fields(subsystem = "db", component = "entries", op = "save", pagepath = %entry.pagepath))]
    async fn save_entry(&self, entry: MetadataEntry) -> Result<()> {
        entry.validate()?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&entry.pagepath)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query(
            r#"
            INSERT INTO metadata_entry (pagepath, name, folder, entry_type, site, linktext, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            ON CONFLICT (pagepath) DO UPDATE SET
                name = EXCLUDED.name,
                folder = EXCLUDED.folder,
                entry_type = EXCLUDED.entry_type,
                site = EXCLUDED.site,
                linktext = EXCLUDED.linktext,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&entry.pagepath)
        .bind(&entry.name)
        .bind(&entry.folder)
        .bind(&entry.entry_type)
        .bind(&entry.site)
        .bind(&entry.linktext)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // Replace the property set wholesale
        sqlx::query("DELETE FROM metadata_property WHERE pagepath = $1")
            .bind(&entry.pagepath)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        for (position, property) in entry.properties.iter().enumerate() {
            let (string_value, number_value, date_value, text_value) = match &property.value {
                PropertyValue::String(s) => (Some(s.as_str()), None, None, None),
                PropertyValue::Number(n) => (None, Some(*n), None, None),
                PropertyValue::Date(d) => (None, None, Some(*d), None),
                PropertyValue::Text(t) => (None, None, None, Some(t.as_str())),
            };
            sqlx::query(
                r#"
                INSERT INTO metadata_property
                    (pagepath, position, name, valuetype, string_value, number_value, date_value, text_value)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(&entry.pagepath)
            .bind(position as i32)
            .bind(&property.name)
            .bind(property.value_type().as_str())
            .bind(string_value)
            .bind(number_value)
            .bind(date_value)
            .bind(text_value)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;

        debug!(property_count = entry.properties.len(), "Saved entry");
        Ok(())
    }

    async fn delete(&self, pagepaths: &[String]) -> Result<u64> {
        if pagepaths.is_empty() {
            return Ok(0);
        }

        let mut sorted: Vec<&String> = pagepaths.iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for pagepath in &sorted {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(pagepath.as_str())
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        // Properties go with their entry via ON DELETE CASCADE
        let removed = sqlx::query("DELETE FROM metadata_entry WHERE pagepath = ANY($1)")
            .bind(pagepaths)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "entries",
            op = "delete",
            requested = pagepaths.len(),
            removed,
            "Deleted entries"
        );
        Ok(removed)
    }

    async fn find_entry(&self, pagepath: &str) -> Result<Option<MetadataEntry>> {
        let row = sqlx::query(
            "SELECT pagepath, name, folder, entry_type, site, linktext FROM metadata_entry WHERE pagepath = $1",
        )
        .bind(pagepath)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut entry = entry_from_row(&row);
        let mut properties = self
            .load_properties(Some(std::slice::from_ref(&entry.pagepath)))
            .await?;
        entry.properties = properties.remove(&entry.pagepath).unwrap_or_default();
        Ok(Some(entry))
    }

    async fn all_entries(&self) -> Result<Vec<MetadataEntry>> {
        let rows = sqlx::query(
            "SELECT pagepath, name, folder, entry_type, site, linktext FROM metadata_entry ORDER BY pagepath",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut properties = self.load_properties(None).await?;
        let entries = rows
            .iter()
            .map(|row| {
                let mut entry = entry_from_row(row);
                entry.properties = properties.remove(&entry.pagepath).unwrap_or_default();
                entry
            })
            .collect();
        Ok(entries)
    }

    async fn delete_all(&self) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM metadata_entry")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        debug!(
            subsystem = "db",
            component = "entries",
            op = "delete_all",
            removed,
            "Cleared entry store"
        );
        Ok(removed)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM metadata_entry")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count.max(0) as u64)
    }

    async fn indexed_directories(&self) -> Result<BTreeSet<String>> {
        let paths: Vec<String> = sqlx::query_scalar("SELECT pagepath FROM metadata_entry")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(paths
            .into_iter()
            .map(|p| MetadataEntry::new(p).directory())
            .collect())
    }
}
