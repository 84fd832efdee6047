use crate::persistence::{delete_subscriber, list_subscribers_with_subscription};
use crate::routes::ApiError;
use crate::utils::success_without_message;
use actix_web::{web, HttpResponse};
use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

#[tracing::instrument(name = "List newsletter subscribers", skip_all)]
pub async fn get_subscribers(pg_pool: web::Data<PgPool>) -> Result<HttpResponse, ApiError> {
    let subscribers = list_subscribers_with_subscription(&pg_pool)
        .await
        .context("Failed to fetch subscribers")?;
    Ok(HttpResponse::Ok().json(subscribers))
}

#[tracing::instrument(name = "Delete newsletter subscriber", skip(pg_pool))]
pub async fn remove_subscriber(
    id: web::Path<Uuid>,
    pg_pool: web::Data<PgPool>,
) -> Result<HttpResponse, ApiError> {
    delete_subscriber(&pg_pool, id.into_inner()).await?;
    Ok(success_without_message())
}
