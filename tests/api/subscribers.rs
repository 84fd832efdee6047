use crate::helpers::spawn_app;
use uuid::Uuid;

async fn subscriber_id(app: &crate::helpers::TestApp, email: &str) -> Uuid {
    let (id,): (Uuid,) = sqlx::query_as("SELECT id FROM subscribers WHERE email = $1")
        .bind(email)
        .fetch_one(&app.pg_pool)
        .await
        .expect("Failed to fetch subscriber");
    id
}

#[tokio::test]
async fn subscribers_are_listed_with_their_subscription() {
    // Arrange
    let app = spawn_app().await;
    for email in ["ged@example.com", "tenar@example.com"] {
        let response = app
            .post_newsletter(serde_json::json!({ "email": email }))
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }

    // Act
    let response = app.get_subscribers().await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(body.len(), 2);
    assert_eq!(body[0]["email"], "tenar@example.com");
    assert_eq!(body[1]["email"], "ged@example.com");
    for subscriber in &body {
        assert_eq!(subscriber["subscription_status"], "active");
        assert!(subscriber["subscription_id"].is_string());
        assert!(subscriber["subscribed_at"].is_string());
    }
}

#[tokio::test]
async fn subscriber_without_subscription_is_listed_last() {
    // Arrange
    let app = spawn_app().await;
    sqlx::query("INSERT INTO subscribers (id, email, created_at) VALUES ($1, $2, now())")
        .bind(Uuid::new_v4())
        .bind("orphan@example.com")
        .execute(&app.pg_pool)
        .await
        .unwrap();
    let response = app
        .post_newsletter(serde_json::json!({ "email": "ged@example.com" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    // Act
    let response = app.get_subscribers().await;

    // Assert
    let body: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(body.len(), 2);
    assert_eq!(body[0]["email"], "ged@example.com");
    assert_eq!(body[1]["email"], "orphan@example.com");
    assert!(body[1]["subscription_id"].is_null());
    assert!(body[1]["subscription_status"].is_null());
}

#[tokio::test]
async fn deleting_a_subscriber_removes_its_subscriptions() {
    // Arrange
    let app = spawn_app().await;
    let response = app
        .post_newsletter(serde_json::json!({ "email": "ged@example.com" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let id = subscriber_id(&app, "ged@example.com").await;

    // Act
    let first = app.delete_subscriber(&id.to_string()).await;
    let second = app.delete_subscriber(&id.to_string()).await;

    // Assert
    assert_eq!(first.status().as_u16(), 200);
    assert_eq!(second.status().as_u16(), 404);
    let body: serde_json::Value = second.json().await.unwrap();
    assert_eq!(body["message"], "Subscriber not found");

    let (subscribers, subscriptions): (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM subscribers), (SELECT COUNT(*) FROM subscriptions)",
    )
    .fetch_one(&app.pg_pool)
    .await
    .unwrap();
    assert_eq!(subscribers, 0);
    assert_eq!(subscriptions, 0);
}

#[tokio::test]
async fn deleted_subscriber_can_sign_up_again() {
    // Arrange
    let app = spawn_app().await;
    let signup = serde_json::json!({ "email": "ged@example.com" });
    assert_eq!(app.post_newsletter(signup.clone()).await.status().as_u16(), 200);
    let id = subscriber_id(&app, "ged@example.com").await;
    assert_eq!(app.delete_subscriber(&id.to_string()).await.status().as_u16(), 200);

    // Act
    let response = app.post_newsletter(signup).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
}
