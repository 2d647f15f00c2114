//! [`DirectiveStore`] over the LEO Postgres schema.
//!
//! Queries are built at runtime (no compile-time checking) because the
//! schema is owned by the database, not this crate. Enum-valued text columns
//! are parsed leniently; unknown priorities fall back to the default, while
//! unknown statuses and phases are reported as errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use super::{DirectiveFilter, DirectiveStore};
use crate::directive::{Handoff, HandoffDraft, StrategicDirective, SubAgentResult};
use crate::error::{LeoError, Result};
use crate::types::{Phase, Priority};

const SELECT_DIRECTIVE: &str = "SELECT id::text AS id, COALESCE(sd_key, id::text) AS sd_key, \
     title, COALESCE(description, '') AS description, status, current_phase, priority, sd_type, \
     COALESCE(progress, 0) AS progress, COALESCE(metadata, '{}'::jsonb) AS metadata, \
     created_at, updated_at FROM strategic_directives_v2";

const SELECT_HANDOFF: &str = "SELECT id, sd_id, handoff_type, from_phase, to_phase, status, \
     COALESCE(executive_summary, '') AS executive_summary, \
     COALESCE(completeness_report, '') AS completeness_report, deliverables_manifest, \
     key_decisions, known_issues, COALESCE(resource_utilization, '') AS resource_utilization, \
     action_items, created_by, created_at FROM sd_phase_handoffs";

const SELECT_RESULT: &str = "SELECT id, sd_id, sub_agent_code, verdict, \
     COALESCE(confidence, 0) AS confidence, COALESCE(summary, '') AS summary, critical_issues, \
     warnings, recommendations, created_at FROM sub_agent_execution_results";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        tracing::debug!("connected to postgres");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DirectiveStore for PgStore {
    async fn get_directive(&self, key: &str) -> Result<Option<StrategicDirective>> {
        let sql = format!("{SELECT_DIRECTIVE} WHERE id::text = $1 OR sd_key = $1 LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(directive_from_row).transpose()
    }

    async fn list_directives(&self, filter: &DirectiveFilter) -> Result<Vec<StrategicDirective>> {
        let sql = format!(
            "{SELECT_DIRECTIVE} WHERE ($1::text IS NULL OR status = $1) \
             AND ($2::text IS NULL OR current_phase = $2) \
             ORDER BY updated_at DESC LIMIT $3"
        );
        let rows = sqlx::query(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.phase.map(|p| p.as_str()))
            .bind(filter.limit.map(|l| l as i64))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(directive_from_row).collect()
    }

    async fn create_directive(&self, sd: &StrategicDirective) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO strategic_directives_v2 \
             (id, sd_key, title, description, status, current_phase, priority, sd_type, \
              progress, metadata, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(&sd.id)
        .bind(&sd.sd_key)
        .bind(&sd.title)
        .bind(&sd.description)
        .bind(sd.status.as_str())
        .bind(sd.current_phase.as_str())
        .bind(sd.priority.as_str())
        .bind(sd.sd_type.as_deref())
        .bind(i32::from(sd.progress))
        .bind(&sd.metadata)
        .bind(sd.created_at)
        .bind(sd.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(LeoError::DirectiveExists(sd.sd_key.clone())),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_directive(&self, sd: &StrategicDirective) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        update_directive_row(&mut conn, sd).await
    }

    async fn apply_handoff(&self, sd: &StrategicDirective, handoff: &Handoff) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        update_directive_row(&mut *tx, sd).await?;
        insert_handoff_row(&mut *tx, handoff).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_handoffs(&self, sd_id: &str) -> Result<Vec<Handoff>> {
        let sql = format!("{SELECT_HANDOFF} WHERE sd_id = $1 ORDER BY created_at ASC");
        let rows = sqlx::query(&sql)
            .bind(sd_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(handoff_from_row).collect()
    }

    async fn record_sub_agent_result(&self, result: &SubAgentResult) -> Result<()> {
        sqlx::query(
            "INSERT INTO sub_agent_execution_results \
             (id, sd_id, sub_agent_code, verdict, confidence, summary, critical_issues, \
              warnings, recommendations, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(result.id)
        .bind(&result.sd_id)
        .bind(&result.sub_agent_code)
        .bind(result.verdict.as_str())
        .bind(i32::from(result.confidence))
        .bind(&result.summary)
        .bind(serde_json::to_value(&result.critical_issues)?)
        .bind(serde_json::to_value(&result.warnings)?)
        .bind(serde_json::to_value(&result.recommendations)?)
        .bind(result.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_sub_agent_results(&self, sd_id: &str) -> Result<Vec<SubAgentResult>> {
        let sql = format!("{SELECT_RESULT} WHERE sd_id = $1 ORDER BY created_at DESC");
        let rows = sqlx::query(&sql)
            .bind(sd_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(result_from_row).collect()
    }
}

// ---------------------------------------------------------------------------
// Writes shared with transactions
// ---------------------------------------------------------------------------

async fn update_directive_row(conn: &mut PgConnection, sd: &StrategicDirective) -> Result<()> {
    let done = sqlx::query(
        "UPDATE strategic_directives_v2 SET status = $2, current_phase = $3, priority = $4, \
         progress = $5, metadata = $6, updated_at = $7 WHERE id::text = $1",
    )
    .bind(&sd.id)
    .bind(sd.status.as_str())
    .bind(sd.current_phase.as_str())
    .bind(sd.priority.as_str())
    .bind(i32::from(sd.progress))
    .bind(&sd.metadata)
    .bind(sd.updated_at)
    .execute(&mut *conn)
    .await?;

    if done.rows_affected() == 0 {
        return Err(LeoError::DirectiveNotFound(sd.id.clone()));
    }
    Ok(())
}

async fn insert_handoff_row(conn: &mut PgConnection, handoff: &Handoff) -> Result<()> {
    let c = &handoff.content;
    sqlx::query(
        "INSERT INTO sd_phase_handoffs \
         (id, sd_id, handoff_type, from_phase, to_phase, status, executive_summary, \
          completeness_report, deliverables_manifest, key_decisions, known_issues, \
          resource_utilization, action_items, created_by, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(handoff.id)
    .bind(&handoff.sd_id)
    .bind(handoff.handoff_type.as_str())
    .bind(handoff.from_phase.as_str())
    .bind(handoff.to_phase.as_str())
    .bind(handoff.status.as_str())
    .bind(&c.executive_summary)
    .bind(&c.completeness_report)
    .bind(serde_json::to_value(&c.deliverables_manifest)?)
    .bind(serde_json::to_value(&c.key_decisions)?)
    .bind(serde_json::to_value(&c.known_issues)?)
    .bind(&c.resource_utilization)
    .bind(serde_json::to_value(&c.action_items)?)
    .bind(c.created_by.as_deref())
    .bind(handoff.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn directive_from_row(row: &PgRow) -> Result<StrategicDirective> {
    let status: String = row.try_get("status")?;
    let phase: Option<String> = row.try_get("current_phase")?;
    let priority: Option<String> = row.try_get("priority")?;
    let progress: i32 = row.try_get("progress")?;

    Ok(StrategicDirective {
        id: row.try_get("id")?,
        sd_key: row.try_get("sd_key")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: status.parse()?,
        current_phase: match phase {
            Some(p) => p.parse()?,
            None => Phase::Lead,
        },
        priority: priority
            .and_then(|p| p.parse::<Priority>().ok())
            .unwrap_or_default(),
        sd_type: row.try_get("sd_type")?,
        progress: progress.clamp(0, 100) as u8,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn handoff_from_row(row: &PgRow) -> Result<Handoff> {
    let handoff_type: String = row.try_get("handoff_type")?;
    let from_phase: String = row.try_get("from_phase")?;
    let to_phase: String = row.try_get("to_phase")?;
    let status: String = row.try_get("status")?;

    Ok(Handoff {
        id: row.try_get::<Uuid, _>("id")?,
        sd_id: row.try_get("sd_id")?,
        handoff_type: handoff_type.parse()?,
        from_phase: from_phase.parse()?,
        to_phase: to_phase.parse()?,
        status: status.parse()?,
        content: HandoffDraft {
            executive_summary: row.try_get("executive_summary")?,
            completeness_report: row.try_get("completeness_report")?,
            deliverables_manifest: string_list(row.try_get("deliverables_manifest")?),
            key_decisions: string_list(row.try_get("key_decisions")?),
            known_issues: string_list(row.try_get("known_issues")?),
            resource_utilization: row.try_get("resource_utilization")?,
            action_items: string_list(row.try_get("action_items")?),
            created_by: row.try_get("created_by")?,
        },
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn result_from_row(row: &PgRow) -> Result<SubAgentResult> {
    let verdict: String = row.try_get("verdict")?;
    let confidence: i32 = row.try_get("confidence")?;

    Ok(SubAgentResult {
        id: row.try_get::<Uuid, _>("id")?,
        sd_id: row.try_get("sd_id")?,
        sub_agent_code: row.try_get("sub_agent_code")?,
        verdict: verdict.parse()?,
        confidence: confidence.clamp(0, 100) as u8,
        summary: row.try_get("summary")?,
        critical_issues: string_list(row.try_get("critical_issues")?),
        warnings: string_list(row.try_get("warnings")?),
        recommendations: string_list(row.try_get("recommendations")?),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

/// Decode a JSON list column. Objects inside the list are kept as their JSON
/// text; anything that is not a list decodes to an empty list.
fn string_list(value: Option<serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|d| d.code())
        .is_some_and(|code| code == "23505")
}
