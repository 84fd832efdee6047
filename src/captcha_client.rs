use crate::utils::error_chain_fmt;
use anyhow::Context;
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;

/// Returned by the provider when a token was already verified or is too old.
pub const TIMEOUT_OR_DUPLICATE: &str = "timeout-or-duplicate";

/// How a successful `siteverify` answer is turned into an accept/reject decision.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptchaPolicy {
    /// reCAPTCHA v2 checkbox, `success` is all there is
    Checkbox,
    /// reCAPTCHA v3, the token must also score high enough and come from the expected action
    Score {
        min_score: f64,
        expected_action: String,
    },
}

#[derive(Debug, serde::Deserialize)]
pub struct VerificationResponse {
    pub success: bool,
    pub score: Option<f64>,
    pub action: Option<String>,
    #[serde(rename = "error-codes", default)]
    pub error_codes: Vec<String>,
}

impl CaptchaPolicy {
    /// Error codes explaining the rejection, provider codes first.
    pub fn evaluate(&self, response: &VerificationResponse) -> Result<(), Vec<String>> {
        if !response.success {
            if response.error_codes.is_empty() {
                return Err(vec!["Unknown error".into()]);
            }
            return Err(response.error_codes.clone());
        }

        match self {
            CaptchaPolicy::Checkbox => Ok(()),
            CaptchaPolicy::Score {
                min_score,
                expected_action,
            } => {
                let mut reasons = vec![];
                if response.score.unwrap_or(0.0) < *min_score {
                    reasons.push("score-below-threshold".to_string());
                }
                if response.action.as_deref() != Some(expected_action.as_str()) {
                    reasons.push("action-mismatch".to_string());
                }
                if reasons.is_empty() {
                    Ok(())
                } else {
                    Err(reasons)
                }
            }
        }
    }
}

#[derive(thiserror::Error)]
pub enum CaptchaError {
    #[error("reCAPTCHA verification rejected the token")]
    Rejected { error_codes: Vec<String> },
    #[error("reCAPTCHA verification failed")]
    Unavailable(#[source] anyhow::Error),
}

impl CaptchaError {
    pub fn is_expired_or_reused(&self) -> bool {
        match self {
            CaptchaError::Rejected { error_codes } => {
                error_codes.iter().any(|code| code == TIMEOUT_OR_DUPLICATE)
            }
            CaptchaError::Unavailable(_) => false,
        }
    }
}

impl std::fmt::Debug for CaptchaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

pub struct CaptchaClient {
    http_client: reqwest::Client,
    verify_url: reqwest::Url,
    secret: Secret<String>,
    policy: CaptchaPolicy,
}

impl CaptchaClient {
    pub fn new(
        verify_url: &str,
        secret: Secret<String>,
        policy: CaptchaPolicy,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build reCAPTCHA http client")?;
        let verify_url =
            reqwest::Url::parse(verify_url).context("Invalid reCAPTCHA verification url")?;
        Ok(Self {
            http_client,
            verify_url,
            secret,
            policy,
        })
    }

    /// One round trip to the provider, never retried: a token is single use.
    #[tracing::instrument(name = "Verify reCAPTCHA token", skip_all)]
    pub async fn verify(&self, token: &str) -> Result<(), CaptchaError> {
        let response = self.request_verification(token).await.map_err(|e| {
            tracing::error!(error.cause_chain = ?e, "reCAPTCHA verification request failed");
            CaptchaError::Unavailable(e)
        })?;
        tracing::debug!(
            success = response.success,
            score = ?response.score,
            action = ?response.action,
            error_codes = ?response.error_codes,
            "reCAPTCHA response"
        );

        self.policy.evaluate(&response).map_err(|error_codes| {
            tracing::info!(?error_codes, "reCAPTCHA verification rejected");
            CaptchaError::Rejected { error_codes }
        })
    }

    async fn request_verification(&self, token: &str) -> Result<VerificationResponse, anyhow::Error> {
        let response = self
            .http_client
            .post(self.verify_url.clone())
            .form(&[
                ("secret", self.secret.expose_secret().as_str()),
                ("response", token),
            ])
            .send()
            .await
            .context("Failed to reach the reCAPTCHA service")?
            .error_for_status()
            .context("reCAPTCHA service answered with an error status")?
            .json::<VerificationResponse>()
            .await
            .context("Failed to decode the reCAPTCHA response")?;
        Ok(response)
    }
}
