use crate::configuration::{EmailClientSettings, SmtpTls};
use crate::retry::{retry, RetryPolicy};
use anyhow::Context;
use lettre::message::header::{Header, HeaderName, HeaderValue};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

/// Anything able to hand a finished message to a mail server.
#[async_trait::async_trait]
pub trait MailRelay: Send + Sync {
    async fn deliver(&self, message: Message) -> Result<(), anyhow::Error>;

    /// Whether the relay accepts connections and credentials right now.
    async fn verify(&self) -> Result<bool, anyhow::Error>;
}

#[async_trait::async_trait]
impl MailRelay for AsyncSmtpTransport<Tokio1Executor> {
    async fn deliver(&self, message: Message) -> Result<(), anyhow::Error> {
        self.send(message)
            .await
            .context("SMTP relay did not accept the message")?;
        Ok(())
    }

    async fn verify(&self) -> Result<bool, anyhow::Error> {
        self.test_connection()
            .await
            .context("Failed to connect to the SMTP relay")
    }
}

pub fn build_smtp_relay(
    settings: &EmailClientSettings,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, anyhow::Error> {
    let builder = match settings.tls {
        SmtpTls::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)
            .context("Failed to configure implicit TLS for the SMTP relay")?,
        SmtpTls::StartTls => {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
                .context("Failed to configure STARTTLS for the SMTP relay")?
        }
        SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.smtp_host),
    };

    let builder = builder
        .port(settings.smtp_port)
        .credentials(Credentials::new(
            settings.username.clone(),
            settings.password.expose_secret().clone(),
        ))
        .timeout(Some(settings.timeout()));

    // A single pooled connection: providers block accounts that open many sessions at once
    #[cfg(feature = "pool")]
    let builder = builder.pool_config(lettre::transport::smtp::PoolConfig::new().max_size(1));

    Ok(builder.build())
}

#[derive(Debug, Clone)]
struct ListUnsubscribe(String);

impl Header for ListUnsubscribe {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("List-Unsubscribe")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_owned()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

// Ties a delivered email back to the database row it was sent for
#[derive(Debug, Clone)]
struct EntityRefId(String);

impl Header for EntityRefId {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Entity-Ref-ID")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_owned()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

pub struct OutgoingEmail<'a> {
    pub recipient: &'a str,
    pub subject: &'a str,
    pub html_body: &'a str,
    pub text_body: &'a str,
    pub entity_ref_id: Uuid,
}

// Spaces consecutive sends process-wide. Holding the lock for the whole send
// also serializes deliveries over the single relay connection.
struct SendThrottle {
    min_interval: Duration,
    last_sent: Mutex<Option<Instant>>,
}

impl SendThrottle {
    async fn run<T, F>(&self, send: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let mut last_sent = self.last_sent.lock().await;
        if let Some(last) = *last_sent {
            tokio::time::sleep_until(last + self.min_interval).await;
        }
        let output = send.await;
        *last_sent = Some(Instant::now());
        output
    }
}

pub struct EmailClient {
    relay: Arc<dyn MailRelay>,
    sender: Mailbox,
    throttle: SendThrottle,
    retry_policy: RetryPolicy,
}

impl EmailClient {
    pub fn new(
        relay: Arc<dyn MailRelay>,
        sender: Mailbox,
        min_send_interval: Duration,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            relay,
            sender,
            throttle: SendThrottle {
                min_interval: min_send_interval,
                last_sent: Mutex::new(None),
            },
            retry_policy,
        }
    }

    pub async fn verify_relay(&self) -> Result<bool, anyhow::Error> {
        self.relay.verify().await
    }

    fn build_message(&self, email: &OutgoingEmail<'_>) -> Result<Message, anyhow::Error> {
        let recipient: Mailbox = email
            .recipient
            .parse()
            .with_context(|| format!("Invalid recipient address {:?}", email.recipient))?;
        let unsubscribe = format!(
            "<mailto:{}?subject=unsubscribe>",
            self.sender.email
        );

        Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(email.subject)
            .header(ListUnsubscribe(unsubscribe))
            .header(EntityRefId(email.entity_ref_id.to_string()))
            .multipart(MultiPart::alternative_plain_html(
                email.text_body.to_owned(),
                email.html_body.to_owned(),
            ))
            .context("Failed to build email message")
    }

    /// Deliver with the configured retry policy. Returns the last error once every
    /// attempt failed; callers treat delivery as best effort.
    #[tracing::instrument(
        name = "Send email",
        skip_all,
        fields(entity_ref_id = %email.entity_ref_id)
    )]
    pub async fn send_multipart_email(&self, email: OutgoingEmail<'_>) -> Result<(), anyhow::Error> {
        let message = self.build_message(&email)?;

        retry(&self.retry_policy, move |attempt| {
            let message = message.clone();
            async move {
                tracing::debug!(attempt, "Delivering email to relay");
                self.throttle.run(self.relay.deliver(message)).await
            }
        })
        .await
        .with_context(|| {
            format!(
                "Giving up on email delivery after {} attempts",
                self.retry_policy.max_attempts()
            )
        })
    }
}
