use crate::email_client::{EmailClient, OutgoingEmail};
use crate::persistence::{subscribe, NewSubscription};
use crate::routes::domain::SubscriberEmail;
use crate::routes::ApiError;
use crate::utils::{spawn_with_tracing, success};
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(serde::Deserialize)]
pub struct NewsletterSignup {
    email: String,
}

#[tracing::instrument(
    name = "Subscribe to the newsletter",
    skip(signup, pg_pool, email_client),
    fields(email = %signup.email)
)]
pub async fn subscribe_to_newsletter(
    web::Json(signup): web::Json<NewsletterSignup>,
    pg_pool: web::Data<PgPool>,
    email_client: web::Data<EmailClient>,
) -> Result<HttpResponse, ApiError> {
    let email = SubscriberEmail::parse(signup.email)?;
    let subscription = subscribe(&pg_pool, &email).await?;

    spawn_with_tracing(send_welcome_email(
        email_client.into_inner(),
        email,
        subscription,
    ));

    Ok(success("Subscribed successfully"))
}

#[tracing::instrument(name = "Send a welcome email to a new subscriber", skip(email_client))]
async fn send_welcome_email(
    email_client: Arc<EmailClient>,
    email: SubscriberEmail,
    subscription: NewSubscription,
) {
    // TODO: point List-Unsubscribe at an unsubscribe endpoint once one exists, it is a mailto for now
    let subject = "Welcome to our newsletter!";
    let html_body = "<p>Thanks for subscribing!<br />\
        You will hear from us whenever we have news worth sharing.<br />\
        To stop receiving these emails, use the unsubscribe link of your mail client.</p>";
    let text_body = "Thanks for subscribing!\n\
        You will hear from us whenever we have news worth sharing.\n\
        To stop receiving these emails, use the unsubscribe link of your mail client.";

    if let Err(e) = email_client
        .send_multipart_email(OutgoingEmail {
            recipient: email.as_ref(),
            subject,
            html_body,
            text_body,
            entity_ref_id: subscription.subscription_id,
        })
        .await
    {
        tracing::error!(
            error.cause_chain = ?e,
            error.message = %e,
            "Failed to send newsletter welcome email"
        );
    }
}
