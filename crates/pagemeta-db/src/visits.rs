//! PostgreSQL visit repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use pagemeta_core::{
    hour_bucket, Error, Result, SortOrder, TopVisitedFilter, VisitRecord, VisitRepository,
    VisitTotal,
};

use crate::escape_like;

/// PostgreSQL implementation of [`VisitRepository`].
///
/// Hits are stored one row per page path per UTC hour.
#[derive(Clone)]
pub struct PgVisitRepository {
    pool: Pool<Postgres>,
}

impl PgVisitRepository {
    /// Create a new PgVisitRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VisitRepository for PgVisitRepository {
    async fn merge(&self, records: Vec<VisitRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for record in &records {
            let hit_count = i64::try_from(record.hit_count).map_err(|_| {
                Error::InvalidArgument(format!(
                    "Hit count out of range for {}: {}",
                    record.pagepath, record.hit_count
                ))
            })?;
            sqlx::query(
                r#"
                INSERT INTO page_visit (pagepath, hit_bucket, hit_count, last_hit)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (pagepath, hit_bucket) DO UPDATE SET
                    hit_count = page_visit.hit_count + EXCLUDED.hit_count,
                    last_hit = GREATEST(page_visit.last_hit, EXCLUDED.last_hit)
                "#,
            )
            .bind(&record.pagepath)
            .bind(hour_bucket(record.hit_date))
            .bind(hit_count)
            .bind(record.hit_date)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "visits",
            op = "merge",
            record_count = records.len(),
            "Merged visit records"
        );
        Ok(())
    }

    async fn top_visited(&self, filter: &TopVisitedFilter) -> Result<Vec<VisitTotal>> {
        // Direction comes from a closed enum, never from caller text
        let direction = match filter.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let sql = format!(
            r#"
            SELECT pagepath, SUM(hit_count)::BIGINT AS total, MAX(last_hit) AS last_hit
            FROM page_visit
            WHERE ($1::timestamptz IS NULL OR last_hit >= $1)
              AND ($2::text IS NULL OR pagepath LIKE $2 || '%' ESCAPE '\')
            GROUP BY pagepath
            ORDER BY total {direction}, last_hit DESC, pagepath ASC
            LIMIT $3
            "#
        );

        let prefix = filter.section_path.as_deref().map(escape_like);
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);

        let rows = sqlx::query(&sql)
            .bind(filter.since)
            .bind(prefix)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let totals = rows
            .into_iter()
            .map(|row| {
                let total: i64 = row.get("total");
                let last_hit: DateTime<Utc> = row.get("last_hit");
                VisitTotal {
                    pagepath: row.get("pagepath"),
                    hit_count: total.max(0) as u64,
                    last_hit,
                }
            })
            .collect();
        Ok(totals)
    }
}
