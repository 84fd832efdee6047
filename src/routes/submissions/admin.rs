use crate::persistence::{delete_submission, list_submissions, update_submission_status};
use crate::routes::domain::SubmissionStatus;
use crate::routes::ApiError;
use crate::utils::{success, success_without_message};
use actix_web::{web, HttpResponse};
use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(serde::Deserialize)]
pub struct StatusUpdate {
    status: SubmissionStatus,
}

#[tracing::instrument(name = "List contact form submissions", skip_all)]
pub async fn get_submissions(pg_pool: web::Data<PgPool>) -> Result<HttpResponse, ApiError> {
    let submissions = list_submissions(&pg_pool)
        .await
        .context("Failed to fetch submissions")?;
    Ok(HttpResponse::Ok().json(submissions))
}

#[tracing::instrument(
    name = "Update contact form submission status",
    skip(update, pg_pool),
    fields(status = ?update.status)
)]
pub async fn update_submission(
    id: web::Path<Uuid>,
    web::Json(update): web::Json<StatusUpdate>,
    pg_pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    update_submission_status(&pg_pool, id.into_inner(), update.status).await?;
    Ok(success("Status updated successfully"))
}

#[tracing::instrument(name = "Delete contact form submission", skip(pg_pool))]
pub async fn remove_submission(
    id: web::Path<Uuid>,
    pg_pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    delete_submission(&pg_pool, id.into_inner()).await?;
    Ok(success_without_message())
}
