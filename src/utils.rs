use actix_web::HttpResponse;
use std::fmt::Formatter;
use std::future::Future;
use tracing::Instrument;

pub fn error_chain_fmt(e: &impl std::error::Error, f: &mut Formatter<'_>) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    // Retrieve all underlying layers errors
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

// Run a future after the response has been handed back to actix-web.
// The spawned task lives outside the request span, so carry the current span over
// to keep log lines correlated with the request that caused them
pub fn spawn_with_tracing<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let current_span = tracing::Span::current();
    tokio::spawn(future.instrument(current_span))
}

#[derive(serde::Serialize)]
struct SuccessBody<'a> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

pub fn success(message: &str) -> HttpResponse {
    HttpResponse::Ok().json(SuccessBody {
        status: "success",
        message: Some(message),
    })
}

pub fn success_without_message() -> HttpResponse {
    HttpResponse::Ok().json(SuccessBody {
        status: "success",
        message: None,
    })
}

// Tokens are bearer credentials for one verification, only log a prefix
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(10).collect();
    format!("{}...", prefix)
}
