use crate::captcha_client::CaptchaClient;
use crate::configuration::{DatabaseSettings, EmailClientSettings, Settings};
use crate::email_client::{build_smtp_relay, EmailClient};
use crate::retry::{retry, RetryPolicy};
use crate::routes::{
    check_health, get_submissions, get_subscribers, json_error_handler, path_error_handler,
    remove_submission, remove_subscriber, submit, subscribe_to_newsletter, update_submission,
    FormRules,
};
use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::http::header;
use actix_web::web::Data;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use lettre::message::Mailbox;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tracing_actix_web::TracingLogger;

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(pg_pool: PgPool, settings: Settings) -> Result<Self, anyhow::Error> {
        settings.application.check_allowed_origins()?;
        verify_database(&pg_pool).await?;

        let captcha_client = CaptchaClient::new(
            &settings.captcha.verify_url,
            settings.captcha.secret.clone(),
            settings.captcha.policy(),
            settings.captcha.timeout(),
        )?;

        let email_client = get_email_client(&settings.email_client)?;
        // An unreachable relay only costs emails, submissions keep being accepted
        match email_client.verify_relay().await {
            Ok(true) => tracing::info!("SMTP relay is reachable"),
            Ok(false) => tracing::warn!("SMTP relay refused the connection check"),
            Err(e) => tracing::warn!(
                error.cause_chain = ?e,
                error.message = %e,
                "SMTP relay is unreachable, emails will fail until it recovers"
            ),
        }

        let listener = TcpListener::bind(settings.application.get_url())
            .with_context(|| format!("Failed to bind {}", settings.application.get_url()))?;
        let port = listener.local_addr()?.port();
        tracing::info!(port, "Listening for requests");

        let server = run(
            listener,
            pg_pool,
            captcha_client,
            email_client,
            FormRules {
                require_agreement: settings.application.require_agreement,
            },
            settings.application.allowed_origins,
        )?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    // actix-web stops accepting on SIGINT/SIGTERM and drains in-flight requests before returning
    pub async fn run_until_terminated(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn get_pg_pool(settings: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout())
        .connect_lazy_with(settings.get_pg_options())
}

pub fn get_email_client(settings: &EmailClientSettings) -> Result<EmailClient, anyhow::Error> {
    let sender: Mailbox = settings
        .sender_email
        .parse()
        .context("Invalid sender email address")?;
    let relay = build_smtp_relay(settings)?;
    Ok(EmailClient::new(
        Arc::new(relay),
        sender,
        settings.min_send_interval(),
        settings.retry_policy(),
    ))
}

// The pool connects lazily, make sure the database answers before accepting traffic
async fn verify_database(pg_pool: &PgPool) -> Result<(), anyhow::Error> {
    let policy = RetryPolicy::linear(3, Duration::from_secs(1));
    retry(&policy, move |_| async move {
        sqlx::query("SELECT 1").execute(pg_pool).await
    })
    .await
    .context("Database is unreachable")?;
    Ok(())
}

fn cors(allowed_origins: &[String]) -> Cors {
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_header(header::CONTENT_TYPE)
        .max_age(3600)
}

pub fn run(
    listener: TcpListener,
    pg_pool: PgPool,
    captcha_client: CaptchaClient,
    email_client: EmailClient,
    form_rules: FormRules,
    allowed_origins: Vec<String>,
) -> Result<Server, std::io::Error> {
    // web::Data is an Arc, every worker shares the same pool, clients and throttle
    let pg_pool = Data::new(pg_pool);
    let captcha_client = Data::new(captcha_client);
    let email_client = Data::new(email_client);
    let form_rules = Data::new(form_rules);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(cors(&allowed_origins))
            .wrap(TracingLogger::default())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::PathConfig::default().error_handler(path_error_handler))
            .route("/health", web::get().to(check_health))
            .service(
                web::scope("/api")
                    .route("/submit", web::post().to(submit))
                    .route("/newsletter", web::post().to(subscribe_to_newsletter))
                    .route("/submissions", web::get().to(get_submissions))
                    .route("/submissions/{id}", web::put().to(update_submission))
                    .route("/submissions/{id}", web::delete().to(remove_submission))
                    .route("/subscribers", web::get().to(get_subscribers))
                    .route("/subscribers/{id}", web::delete().to(remove_subscriber)),
            )
            .app_data(pg_pool.clone())
            .app_data(captcha_client.clone())
            .app_data(email_client.clone())
            .app_data(form_rules.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
