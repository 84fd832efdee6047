use crate::routes::domain::ValidationError;
use validator::validate_email;

#[derive(Debug, Clone)]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    /// Accepts `local@domain.tld` shaped addresses.
    ///
    /// `validate_email` alone lets dotless domains such as `user@localhost` through,
    /// which a newsletter can never deliver to.
    pub fn parse(email: String) -> Result<Self, ValidationError> {
        let email = email.trim().to_owned();
        if !validate_email(email.as_str()) || !has_dotted_domain(&email) {
            return Err(ValidationError::InvalidEmail);
        }
        Ok(Self(email))
    }
}

fn has_dotted_domain(email: &str) -> bool {
    match email.rsplit_once('@') {
        Some((_, domain)) => match domain.rsplit_once('.') {
            Some((name, tld)) => !name.is_empty() && !tld.is_empty(),
            None => false,
        },
        None => false,
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
