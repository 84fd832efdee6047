use crate::captcha_client::CaptchaClient;
use crate::email_client::{EmailClient, OutgoingEmail};
use crate::persistence::insert_submission;
use crate::routes::domain::{ContactForm, NewSubmission, RawFormFields};
use crate::routes::ApiError;
use crate::utils::{redact_token, spawn_with_tracing, success};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Per-deployment rules for the contact form.
#[derive(Debug, Clone, Copy)]
pub struct FormRules {
    pub require_agreement: bool,
}

const MAX_FIELDS: usize = 32;
const MAX_FIELD_BYTES: usize = 64 * 1024;
const MAX_TOTAL_BYTES: usize = 256 * 1024;

#[tracing::instrument(
    name = "Handle a contact form submission",
    skip_all,
    fields(submission_id = tracing::field::Empty)
)]
pub async fn submit(
    payload: Multipart,
    pg_pool: web::Data<PgPool>,
    captcha_client: web::Data<CaptchaClient>,
    email_client: web::Data<EmailClient>,
    form_rules: web::Data<FormRules>,
) -> Result<HttpResponse, ApiError> {
    let fields = read_multipart_fields(payload)
        .await
        .map_err(ApiError::FormParse)?;
    let form = ContactForm::from(fields);
    tracing::info!(
        name = %form.name,
        email = %form.email,
        company = %form.company,
        recaptcha_response = %redact_token(&form.recaptcha_response),
        agreement = %form.agreement,
        "Extracted contact form fields"
    );

    let submission = form.validate(form_rules.require_agreement)?;

    captcha_client.verify(&submission.captcha_token).await?;

    let submission_id = insert_submission(&pg_pool, &submission).await?;
    tracing::Span::current().record("submission_id", &tracing::field::display(submission_id));
    tracing::info!("Contact form submission saved");

    // The submission is committed, the client gets its answer whatever the relay does
    spawn_with_tracing(send_confirmation_email(
        email_client.into_inner(),
        submission,
        submission_id,
    ));

    Ok(success("Form submitted successfully"))
}

async fn read_multipart_fields(mut payload: Multipart) -> Result<RawFormFields, anyhow::Error> {
    let mut fields = RawFormFields::default();
    let mut field_count = 0;
    let mut total_bytes = 0;

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| anyhow::anyhow!("Failed to read multipart field: {}", e))?;
        field_count += 1;
        if field_count > MAX_FIELDS {
            anyhow::bail!("Multipart body has more than {} fields", MAX_FIELDS);
        }

        // Unnamed parts and repeated names are drained without being kept,
        // the stream cannot skip ahead otherwise
        let name = field
            .content_disposition()
            .get_name()
            .filter(|name| !fields.contains(name))
            .map(str::to_owned);

        let mut value = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| anyhow::anyhow!("Failed to read multipart field data: {}", e))?;
            total_bytes += chunk.len();
            if total_bytes > MAX_TOTAL_BYTES {
                anyhow::bail!("Multipart body exceeds {} bytes", MAX_TOTAL_BYTES);
            }
            if name.is_some() {
                if value.len() + chunk.len() > MAX_FIELD_BYTES {
                    anyhow::bail!("Multipart field exceeds {} bytes", MAX_FIELD_BYTES);
                }
                value.extend_from_slice(&chunk);
            }
        }

        if let Some(name) = name {
            fields.insert_first(name, String::from_utf8_lossy(&value).into_owned());
        }
    }
    Ok(fields)
}

#[tracing::instrument(
    name = "Send a confirmation email to a contact",
    skip(email_client, submission)
)]
async fn send_confirmation_email(
    email_client: Arc<EmailClient>,
    submission: NewSubmission,
    submission_id: Uuid,
) {
    let name = htmlescape::encode_minimal(&submission.name);
    let company = htmlescape::encode_minimal(&submission.company);
    let message = htmlescape::encode_minimal(&submission.message);
    let subject = "Thank you for contacting us";
    let html_body = format!(
        "<p>Hi {},</p>\
        <p>Thank you for reaching out on behalf of {}. \
        We received your message and will get back to you shortly.</p>\
        <blockquote>{}</blockquote>\
        <p>Reference: {}</p>",
        name, company, message, submission_id
    );
    let text_body = format!(
        "Hi {},\n\n\
        Thank you for reaching out on behalf of {}. \
        We received your message and will get back to you shortly.\n\n\
        > {}\n\n\
        Reference: {}",
        submission.name, submission.company, submission.message, submission_id
    );

    if let Err(e) = email_client
        .send_multipart_email(OutgoingEmail {
            recipient: &submission.email,
            subject,
            html_body: &html_body,
            text_body: &text_body,
            entity_ref_id: submission_id,
        })
        .await
    {
        tracing::error!(
            error.cause_chain = ?e,
            error.message = %e,
            "Failed to send contact confirmation email"
        );
    }
}
