#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("All fields are required")]
    MissingField,
    #[error("You must agree to the terms")]
    AgreementRequired,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Invalid request body: {0}")]
    MalformedPayload(String),
}
