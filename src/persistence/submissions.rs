use crate::persistence::PersistenceError;
use crate::routes::domain::{NewSubmission, SubmissionStatus};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize)]
pub struct Submission {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub company: String,
    pub phone: String,
    pub message: String,
    pub agreement: bool,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: Uuid,
    name: String,
    email: String,
    company: String,
    phone: String,
    message: String,
    agreement: bool,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = PersistenceError;
    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        let status = SubmissionStatus::from_str(&row.status).map_err(|_| {
            PersistenceError::CorruptRecord(format!(
                "submission {} has unknown status {:?}",
                row.id, row.status
            ))
        })?;
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            company: row.company,
            phone: row.phone,
            message: row.message,
            agreement: row.agreement,
            status,
            created_at: row.created_at,
        })
    }
}

// Duplicate submissions are allowed, there is no natural key to conflict on
#[tracing::instrument(name = "Insert a new submission into database", skip_all)]
pub async fn insert_submission(
    pg_pool: &PgPool,
    submission: &NewSubmission,
) -> Result<Uuid, PersistenceError> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO submissions (id, name, email, company, phone, message, agreement, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
        "#,
    )
    .bind(id)
    .bind(&submission.name)
    .bind(&submission.email)
    .bind(&submission.company)
    .bind(&submission.phone)
    .bind(&submission.message)
    .bind(submission.agreement)
    .bind(SubmissionStatus::New.as_ref())
    .execute(pg_pool)
    .await?;

    Ok(id)
}

#[tracing::instrument(name = "List submissions from database", skip(pg_pool))]
pub async fn list_submissions(pg_pool: &PgPool) -> Result<Vec<Submission>, PersistenceError> {
    sqlx::query_as::<_, SubmissionRow>(
        r#"
        SELECT id, name, email, company, phone, message, agreement, status, created_at
        FROM submissions
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pg_pool)
    .await?
    .into_iter()
    .map(Submission::try_from)
    .collect()
}

#[tracing::instrument(
    name = "Update submission status in database",
    skip(pg_pool, status),
    fields(status = %status.as_ref())
)]
pub async fn update_submission_status(
    pg_pool: &PgPool,
    id: Uuid,
    status: SubmissionStatus,
) -> Result<u64, PersistenceError> {
    let affected = sqlx::query(
        r#"
        UPDATE submissions
        SET status = $1
        WHERE id = $2
        "#,
    )
    .bind(status.as_ref())
    .bind(id)
    .execute(pg_pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(PersistenceError::NotFound("Submission"));
    }
    Ok(affected)
}

#[tracing::instrument(name = "Delete submission from database", skip(pg_pool))]
pub async fn delete_submission(pg_pool: &PgPool, id: Uuid) -> Result<(), PersistenceError> {
    let affected = sqlx::query("DELETE FROM submissions WHERE id = $1")
        .bind(id)
        .execute(pg_pool)
        .await?
        .rows_affected();

    if affected == 0 {
        return Err(PersistenceError::NotFound("Submission"));
    }
    Ok(())
}
