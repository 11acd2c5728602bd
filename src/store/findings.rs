use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

use crate::errors::TriageError;
use crate::models::{EvaluatedSeverity, Finding, Severity, Status};
use super::{Database, FindingStore};

const FINDING_COLUMNS: &str = "id, task_id, finding_id, agent_id, submission_id, title, \
     description, recommendation, code_references, reported_severity, status, category, \
     category_id, evaluated_severity, evaluation_comment, similar_to, created_at, updated_at";

#[async_trait]
impl FindingStore for Database {
    async fn insert(&self, finding: &Finding) -> Result<(), TriageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO findings (id, task_id, finding_id, agent_id, submission_id, title, \
             description, recommendation, code_references, reported_severity, status, category, \
             category_id, evaluated_severity, evaluation_comment, similar_to, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            rusqlite::params![
                finding.id,
                finding.task_id,
                finding.finding_id,
                finding.agent_id,
                finding.submission_id,
                finding.title,
                finding.description,
                finding.recommendation,
                serde_json::to_string(&finding.code_references)?,
                finding.reported_severity.as_str(),
                finding.status.as_str(),
                finding.category,
                finding.category_id,
                finding.evaluated_severity.map(|s| s.as_str()),
                finding.evaluation_comment,
                finding.similar_to,
                finding.created_at.to_rfc3339(),
                finding.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| TriageError::Database(format!("Failed to insert finding: {}", e)))?;
        Ok(())
    }

    async fn update(&self, finding: &Finding) -> Result<(), TriageError> {
        let conn = self.conn.lock().unwrap();
        update_triage_fields(&conn, finding)?;
        Ok(())
    }

    async fn update_pair(&self, first: &Finding, second: &Finding) -> Result<(), TriageError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| TriageError::Database(format!("Failed to open transaction: {}", e)))?;
        update_triage_fields(&tx, first)?;
        update_triage_fields(&tx, second)?;
        tx.commit()
            .map_err(|e| TriageError::Database(format!("Failed to commit pair update: {}", e)))?;
        Ok(())
    }

    async fn list_by_task(&self, task_id: &str) -> Result<Vec<Finding>, TriageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM findings WHERE task_id = ?1 ORDER BY created_at ASC, submission_id ASC",
                FINDING_COLUMNS
            ))
            .map_err(|e| TriageError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt
            .query_map(rusqlite::params![task_id], finding_from_row)
            .map_err(|e| TriageError::Database(format!("Query error: {}", e)))?;

        collect_rows(rows)
    }

    async fn list_by_agent_and_task(
        &self,
        task_id: &str,
        agent_id: &str,
    ) -> Result<Vec<Finding>, TriageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM findings WHERE task_id = ?1 AND agent_id = ?2 \
                 ORDER BY submission_id ASC, created_at ASC",
                FINDING_COLUMNS
            ))
            .map_err(|e| TriageError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt
            .query_map(rusqlite::params![task_id, agent_id], finding_from_row)
            .map_err(|e| TriageError::Database(format!("Query error: {}", e)))?;

        collect_rows(rows)
    }
}

/// Write the mutable triage fields. Content columns are immutable once
/// inserted and never touched here.
fn update_triage_fields(conn: &rusqlite::Connection, finding: &Finding) -> Result<(), TriageError> {
    let changed = conn
        .execute(
            "UPDATE findings SET status = ?1, category = ?2, category_id = ?3, \
             evaluated_severity = ?4, evaluation_comment = ?5, similar_to = ?6, updated_at = ?7 \
             WHERE id = ?8",
            rusqlite::params![
                finding.status.as_str(),
                finding.category,
                finding.category_id,
                finding.evaluated_severity.map(|s| s.as_str()),
                finding.evaluation_comment,
                finding.similar_to,
                finding.updated_at.to_rfc3339(),
                finding.id,
            ],
        )
        .map_err(|e| TriageError::Database(format!("Failed to update finding: {}", e)))?;

    if changed == 0 {
        return Err(TriageError::Database(format!(
            "No stored finding with id {}",
            finding.id
        )));
    }
    Ok(())
}

fn finding_from_row(row: &Row<'_>) -> rusqlite::Result<Finding> {
    let code_references: String = row.get(8)?;
    let reported_severity: String = row.get(9)?;
    let status: String = row.get(10)?;
    let evaluated_severity: Option<String> = row.get(13)?;
    let created_at: String = row.get(16)?;
    let updated_at: String = row.get(17)?;

    Ok(Finding {
        id: row.get(0)?,
        task_id: row.get(1)?,
        finding_id: row.get(2)?,
        agent_id: row.get(3)?,
        submission_id: row.get(4)?,
        title: row.get(5)?,
        description: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        recommendation: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        code_references: serde_json::from_str(&code_references)
            .map_err(|e| conversion_error(8, e))?,
        reported_severity: parse_enum::<Severity>(&reported_severity, 9)?,
        status: parse_enum::<Status>(&status, 10)?,
        category: row.get(11)?,
        category_id: row.get(12)?,
        evaluated_severity: evaluated_severity
            .map(|s| parse_enum::<EvaluatedSeverity>(&s, 13))
            .transpose()?,
        evaluation_comment: row.get(14)?,
        similar_to: row.get(15)?,
        created_at: parse_timestamp(&created_at, 16)?,
        updated_at: parse_timestamp(&updated_at, 17)?,
    })
}

fn parse_enum<T: serde::de::DeserializeOwned>(raw: &str, idx: usize) -> rusqlite::Result<T> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_timestamp(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn collect_rows(
    rows: impl Iterator<Item = rusqlite::Result<Finding>>,
) -> Result<Vec<Finding>, TriageError> {
    let mut findings = Vec::new();
    for row in rows {
        findings.push(row.map_err(|e| TriageError::Database(format!("Row error: {}", e)))?);
    }
    Ok(findings)
}
