use crate::helpers::{spawn_app, ALLOWED_ORIGIN};
use claims::assert_err;
use contact_intake::configuration::Settings;
use contact_intake::startup::{get_pg_pool, Application};
use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};

#[tokio::test]
async fn listed_origin_is_allowed() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = reqwest::Client::new()
        .get(&format!("{}/api/submissions", app.addr))
        .header(ORIGIN, ALLOWED_ORIGIN)
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some(ALLOWED_ORIGIN)
    );
}

#[tokio::test]
async fn unlisted_origin_is_rejected_before_the_handler_runs() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = reqwest::Client::new()
        .post(&format!("{}/api/newsletter", app.addr))
        .header(ORIGIN, "http://evil.example")
        .json(&serde_json::json!({ "email": "ursula@example.com" }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert!(response.status().is_client_error());
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscribers")
        .fetch_one(&app.pg_pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn wildcard_origin_fails_application_build() {
    // Arrange
    let mut settings = Settings::get_configuration().expect("Failed to read configuration");
    settings.application.port = 0;
    settings.application.allowed_origins = vec![ALLOWED_ORIGIN.into(), "*".into()];
    let pg_pool = get_pg_pool(&settings.database);

    // Act
    let result = Application::build(pg_pool, settings).await;

    // Assert
    let error = assert_err!(result.map(|app| app.port()));
    assert!(error.to_string().contains("allowed_origins"), "{}", error);
}
