use crate::captcha_client::CaptchaError;
use crate::persistence::PersistenceError;
use crate::routes::domain::ValidationError;
use crate::utils::error_chain_fmt;
use actix_web::error::{JsonPayloadError, PathError};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};

#[derive(thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("reCAPTCHA verification failed")]
    VerificationRejected { error_codes: Vec<String> },
    #[error("reCAPTCHA token has expired or was already used. Please try again.")]
    TokenExpiredOrReused,
    #[error("Email is already subscribed")]
    AlreadySubscribed,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Form parsing failed")]
    FormParse(#[source] anyhow::Error),
    #[error("reCAPTCHA verification failed")]
    VerificationUnavailable(#[source] anyhow::Error),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl std::fmt::Debug for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<CaptchaError> for ApiError {
    fn from(e: CaptchaError) -> Self {
        if e.is_expired_or_reused() {
            return ApiError::TokenExpiredOrReused;
        }
        match e {
            CaptchaError::Rejected { error_codes } => ApiError::VerificationRejected { error_codes },
            CaptchaError::Unavailable(source) => ApiError::VerificationUnavailable(source),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(e: PersistenceError) -> Self {
        match e {
            PersistenceError::AlreadySubscribed => ApiError::AlreadySubscribed,
            PersistenceError::NotFound(entity) => ApiError::NotFound(entity),
            other => ApiError::Unexpected(anyhow::Error::new(other)),
        }
    }
}

#[derive(serde::Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a [String]>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::VerificationRejected { .. }
            | ApiError::TokenExpiredOrReused
            | ApiError::AlreadySubscribed => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::FormParse(_)
            | ApiError::VerificationUnavailable(_)
            | ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // The cause chain is recorded by TracingLogger, clients only get a summary
        let message = match self {
            ApiError::Unexpected(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        };
        let errors = match self {
            ApiError::VerificationRejected { error_codes } => Some(error_codes.as_slice()),
            _ => None,
        };
        HttpResponse::build(self.status_code()).json(ErrorBody {
            status: "error",
            message,
            errors,
        })
    }
}

/// Malformed JSON bodies and unknown enum values are client errors.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::from(ValidationError::MalformedPayload(err.to_string())).into()
}

/// An id that does not parse cannot name a stored record.
pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(error = %err, "Rejected malformed path parameter");
    ApiError::NotFound("Record").into()
}
