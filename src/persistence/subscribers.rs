use crate::persistence::{is_unique_violation, PersistenceError};
use crate::routes::domain::{SubscriberEmail, SubscriptionStatus};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// A subscriber joined with one of its subscription rows, if it has any.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct SubscriberWithSubscription {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub subscription_id: Option<Uuid>,
    pub subscription_status: Option<String>,
    pub subscribed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct NewSubscription {
    pub subscriber_id: Uuid,
    pub subscription_id: Uuid,
}

/// Register `email` for the newsletter.
///
/// Upserting the subscriber, checking for an active subscription and inserting the new
/// one happen in a single transaction. Two concurrent signups for the same address can
/// both pass the check; the loser then trips the partial unique index on active
/// subscriptions, which is reported as `AlreadySubscribed` as well.
#[tracing::instrument(name = "Subscribe email to the newsletter", skip(pg_pool))]
pub async fn subscribe(
    pg_pool: &PgPool,
    email: &SubscriberEmail,
) -> Result<NewSubscription, PersistenceError> {
    let mut transaction = pg_pool.begin().await?;

    match subscribe_in_transaction(&mut transaction, email).await {
        Ok(subscription) => {
            transaction.commit().await.map_err(|e| {
                if is_unique_violation(&e) {
                    PersistenceError::AlreadySubscribed
                } else {
                    e.into()
                }
            })?;
            Ok(subscription)
        }
        Err(e) => {
            if let Err(rollback_error) = transaction.rollback().await {
                tracing::error!(
                    error.cause_chain = ?rollback_error,
                    "Failed to roll back newsletter subscription"
                );
            }
            Err(e)
        }
    }
}

async fn subscribe_in_transaction(
    transaction: &mut Transaction<'_, Postgres>,
    email: &SubscriberEmail,
) -> Result<NewSubscription, PersistenceError> {
    let subscriber_id = upsert_subscriber(transaction, email).await?;
    if has_active_subscription(transaction, subscriber_id).await? {
        return Err(PersistenceError::AlreadySubscribed);
    }
    let subscription_id = create_active_subscription(transaction, subscriber_id).await?;
    Ok(NewSubscription {
        subscriber_id,
        subscription_id,
    })
}

// The no-op update makes RETURNING yield the existing row on conflict
#[tracing::instrument(name = "Upsert subscriber into database", skip(transaction))]
pub async fn upsert_subscriber(
    transaction: &mut Transaction<'_, Postgres>,
    email: &SubscriberEmail,
) -> Result<Uuid, sqlx::Error> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO subscribers (id, email, created_at)
        VALUES ($1, $2, now())
        ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email.as_ref())
    .fetch_one(&mut *transaction)
    .await?;

    Ok(id)
}

#[tracing::instrument(name = "Check for an active subscription", skip(transaction))]
pub async fn has_active_subscription(
    transaction: &mut Transaction<'_, Postgres>,
    subscriber_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let (exists,): (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM subscriptions
            WHERE subscriber_id = $1 AND status = $2
        )
        "#,
    )
    .bind(subscriber_id)
    .bind(SubscriptionStatus::Active.as_ref())
    .fetch_one(&mut *transaction)
    .await?;

    Ok(exists)
}

/// Fails with `AlreadySubscribed` when the partial unique index on active
/// subscriptions already holds a row for `subscriber_id`.
#[tracing::instrument(name = "Insert active subscription into database", skip(transaction))]
pub async fn create_active_subscription(
    transaction: &mut Transaction<'_, Postgres>,
    subscriber_id: Uuid,
) -> Result<Uuid, PersistenceError> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO subscriptions (id, subscriber_id, status, created_at)
        VALUES ($1, $2, $3, now())
        "#,
    )
    .bind(id)
    .bind(subscriber_id)
    .bind(SubscriptionStatus::Active.as_ref())
    .execute(&mut *transaction)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            PersistenceError::AlreadySubscribed
        } else {
            e.into()
        }
    })?;

    Ok(id)
}

// Subscribers without any subscription row sort last
#[tracing::instrument(name = "List subscribers with their subscriptions", skip(pg_pool))]
pub async fn list_subscribers_with_subscription(
    pg_pool: &PgPool,
) -> Result<Vec<SubscriberWithSubscription>, PersistenceError> {
    let subscribers = sqlx::query_as::<_, SubscriberWithSubscription>(
        r#"
        SELECT
            s.id,
            s.email,
            s.created_at,
            sub.id AS subscription_id,
            sub.status AS subscription_status,
            sub.created_at AS subscribed_at
        FROM subscribers s
        LEFT JOIN subscriptions sub ON sub.subscriber_id = s.id
        ORDER BY COALESCE(sub.created_at, '-infinity'::timestamptz) DESC
        "#,
    )
    .fetch_all(pg_pool)
    .await?;

    Ok(subscribers)
}

// Subscriptions go with their subscriber (ON DELETE CASCADE)
#[tracing::instrument(name = "Delete subscriber from database", skip(pg_pool))]
pub async fn delete_subscriber(pg_pool: &PgPool, id: Uuid) -> Result<(), PersistenceError> {
    let affected = sqlx::query("DELETE FROM subscribers WHERE id = $1")
        .bind(id)
        .execute(pg_pool)
        .await?
        .rows_affected();

    if affected == 0 {
        return Err(PersistenceError::NotFound("Subscriber"));
    }
    Ok(())
}
