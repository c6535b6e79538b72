use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS analytics_reports (
    id                     UUID PRIMARY KEY,
    channel_id             TEXT NOT NULL,
    channel_name           TEXT NOT NULL,
    competitor_query       TEXT,
    title                  TEXT NOT NULL,
    executive_summary      TEXT NOT NULL,
    sections               JSONB NOT NULL DEFAULT '[]'::jsonb,
    recommendations        TEXT[] NOT NULL DEFAULT '{}',
    snapshot               JSONB NOT NULL,
    videos_analyzed        INTEGER NOT NULL DEFAULT 0,
    competitors_found      INTEGER NOT NULL DEFAULT 0,
    total_tokens           INTEGER,
    total_cost_usd         NUMERIC(12, 6),
    providers_used         TEXT[] NOT NULL DEFAULT '{}',
    generation_duration_ms INTEGER,
    trace_id               TEXT,
    status                 TEXT NOT NULL DEFAULT 'completed',
    created_at             TIMESTAMPTZ DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_analytics_reports_channel_created
    ON analytics_reports (channel_id, created_at DESC);
"#;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(25)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    tracing::info!("Database connection pool created");

    Ok(pool)
}

/// Creates the report table if it is missing. Safe to run on every start.
#[tracing::instrument(name = "db.schema.ensure", skip_all)]
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    tracing::info!("Database schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let statements: Vec<&str> = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        assert_eq!(statements.len(), 2);
        for stmt in statements {
            assert!(stmt.contains("IF NOT EXISTS"), "{stmt}");
        }
    }
}
