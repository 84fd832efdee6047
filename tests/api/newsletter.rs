use crate::helpers::spawn_app;
use claims::{assert_err, assert_ok};
use contact_intake::persistence::{
    create_active_subscription, subscribe, upsert_subscriber, PersistenceError,
};
use contact_intake::routes::domain::{SubscriberEmail, SubscriptionStatus};
use uuid::Uuid;

#[tokio::test]
async fn valid_signup_creates_subscriber_with_active_subscription() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .post_newsletter(serde_json::json!({ "email": "ursula@example.com" }))
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Subscribed successfully");

    let (email, status): (String, String) = sqlx::query_as(
        "SELECT s.email, sub.status FROM subscribers s \
        JOIN subscriptions sub ON sub.subscriber_id = s.id",
    )
    .fetch_one(&app.pg_pool)
    .await
    .expect("Failed to fetch saved subscription");
    assert_eq!(email, "ursula@example.com");
    assert_eq!(status, "active");
}

#[tokio::test]
async fn invalid_email_returns_400() {
    // Arrange
    let app = spawn_app().await;
    let test_cases = vec![
        (serde_json::json!({ "email": "" }), "empty email"),
        (serde_json::json!({ "email": "not-an-email" }), "no at sign"),
        (serde_json::json!({ "email": "ursula@localhost" }), "dotless domain"),
        (serde_json::json!({ "email": "@example.com" }), "empty local part"),
    ];

    for (body, description) in test_cases {
        // Act
        let response = app.post_newsletter(body).await;

        // Assert
        assert_eq!(
            response.status().as_u16(),
            400,
            "The API did not fail with 400 when the payload had an {}",
            description
        );
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Invalid email address");
    }

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscribers")
        .fetch_one(&app.pg_pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn malformed_body_returns_400() {
    // Arrange
    let app = spawn_app().await;
    let test_cases = vec![
        (serde_json::json!({}), "missing email"),
        (serde_json::json!({ "email": 42 }), "numeric email"),
    ];

    for (body, description) in test_cases {
        // Act
        let response = app.post_newsletter(body).await;

        // Assert
        assert_eq!(
            response.status().as_u16(),
            400,
            "The API did not fail with 400 when the payload had a {}",
            description
        );
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "error");
    }
}

#[tokio::test]
async fn second_signup_for_the_same_email_returns_400() {
    // Arrange
    let app = spawn_app().await;
    let signup = serde_json::json!({ "email": "ursula@example.com" });
    assert_eq!(app.post_newsletter(signup.clone()).await.status().as_u16(), 200);

    // Act
    let response = app.post_newsletter(signup).await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Email is already subscribed");

    let (subscribers, subscriptions): (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM subscribers), (SELECT COUNT(*) FROM subscriptions)",
    )
    .fetch_one(&app.pg_pool)
    .await
    .unwrap();
    assert_eq!(subscribers, 1);
    assert_eq!(subscriptions, 1);
}

#[tokio::test]
async fn unsubscribed_subscriber_can_sign_up_again() {
    // Arrange
    let app = spawn_app().await;
    let signup = serde_json::json!({ "email": "ursula@example.com" });
    assert_eq!(app.post_newsletter(signup.clone()).await.status().as_u16(), 200);
    sqlx::query("UPDATE subscriptions SET status = $1")
        .bind(SubscriptionStatus::Unsubscribed.as_ref())
        .execute(&app.pg_pool)
        .await
        .unwrap();

    // Act
    let response = app.post_newsletter(signup).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let rows: Vec<(Uuid, String)> =
        sqlx::query_as("SELECT subscriber_id, status FROM subscriptions ORDER BY created_at")
            .fetch_all(&app.pg_pool)
            .await
            .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, rows[1].0, "The subscriber row must be reused");
    assert_eq!(rows[0].1, SubscriptionStatus::Unsubscribed.as_ref());
    assert_eq!(rows[1].1, SubscriptionStatus::Active.as_ref());
}

#[tokio::test]
async fn concurrent_signups_for_the_same_email_create_one_active_subscription() {
    // Arrange
    let app = spawn_app().await;
    let signup = serde_json::json!({ "email": "ursula@example.com" });

    // Act
    let (first, second) = tokio::join!(
        app.post_newsletter(signup.clone()),
        app.post_newsletter(signup.clone())
    );

    // Assert
    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, vec![200, 400]);

    let (active,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE status = 'active'")
            .fetch_one(&app.pg_pool)
            .await
            .unwrap();
    assert_eq!(active, 1);
}

#[tokio::test]
async fn store_refuses_a_second_active_subscription_for_one_subscriber() {
    // Arrange
    let app = spawn_app().await;
    let (subscriber_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO subscribers (id, email, created_at) VALUES ($1, $2, now()) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind("ursula@example.com")
    .fetch_one(&app.pg_pool)
    .await
    .unwrap();
    let insert_active = "INSERT INTO subscriptions (id, subscriber_id, status, created_at) \
        VALUES ($1, $2, 'active', now())";
    sqlx::query(insert_active)
        .bind(Uuid::new_v4())
        .bind(subscriber_id)
        .execute(&app.pg_pool)
        .await
        .unwrap();

    // Act
    let error = assert_err!(
        sqlx::query(insert_active)
            .bind(Uuid::new_v4())
            .bind(subscriber_id)
            .execute(&app.pg_pool)
            .await
    );

    // Assert
    let code = error.as_database_error().and_then(|e| e.code());
    assert_eq!(code.as_deref(), Some("23505"));
}

#[tokio::test]
async fn unique_violation_on_insert_is_reported_as_already_subscribed() {
    // Arrange
    let app = spawn_app().await;
    let email = SubscriberEmail::parse("ursula@example.com".into()).unwrap();
    let mut transaction = app.pg_pool.begin().await.unwrap();
    let subscriber_id = upsert_subscriber(&mut transaction, &email).await.unwrap();
    assert_ok!(create_active_subscription(&mut transaction, subscriber_id).await);

    // Act
    // No active-subscription check in between, only the index stands in the way
    let error = assert_err!(create_active_subscription(&mut transaction, subscriber_id).await);

    // Assert
    assert!(
        matches!(error, PersistenceError::AlreadySubscribed),
        "unexpected error: {:?}",
        error
    );
}

#[tokio::test]
async fn subscribe_reports_an_existing_active_subscription() {
    // Arrange
    let app = spawn_app().await;
    let email = SubscriberEmail::parse("ursula@example.com".into()).unwrap();
    assert_ok!(subscribe(&app.pg_pool, &email).await);

    // Act
    let error = assert_err!(subscribe(&app.pg_pool, &email).await);

    // Assert
    assert!(
        matches!(error, PersistenceError::AlreadySubscribed),
        "unexpected error: {:?}",
        error
    );
    let (active,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE status = 'active'")
            .fetch_one(&app.pg_pool)
            .await
            .unwrap();
    assert_eq!(active, 1);
}
