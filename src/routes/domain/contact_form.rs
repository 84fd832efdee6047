use crate::routes::domain::ValidationError;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Multipart fields as they arrived, the first value of each field name only.
#[derive(Debug, Default)]
pub struct RawFormFields(HashMap<String, String>);

impl RawFormFields {
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Keep `value` unless `name` already has one. Returns whether it was kept.
    pub fn insert_first(&mut self, name: impl Into<String>, value: String) -> bool {
        match self.0.entry(name.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    fn take(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }
}

impl<N: Into<String>> FromIterator<(N, String)> for RawFormFields {
    fn from_iter<T: IntoIterator<Item = (N, String)>>(iter: T) -> Self {
        let mut fields = Self::default();
        for (name, value) in iter {
            fields.insert_first(name, value);
        }
        fields
    }
}

/// The contact form flattened to one string per field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub company: String,
    pub phone: String,
    pub message: String,
    pub recaptcha_response: String,
    pub agreement: String,
}

impl From<RawFormFields> for ContactForm {
    fn from(mut fields: RawFormFields) -> Self {
        Self {
            name: fields.take("name").unwrap_or_default(),
            email: fields.take("email").unwrap_or_default(),
            company: fields.take("company").unwrap_or_default(),
            phone: fields.take("phone").unwrap_or_default(),
            message: fields.take("message").unwrap_or_default(),
            recaptcha_response: fields.take("recaptcha_response").unwrap_or_default(),
            agreement: fields
                .take("agreement")
                .unwrap_or_else(|| "false".into()),
        }
    }
}

/// A contact form that passed validation, ready for CAPTCHA verification and storage.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub name: String,
    pub email: String,
    pub company: String,
    pub phone: String,
    pub message: String,
    pub agreement: bool,
    pub captcha_token: String,
}

impl ContactForm {
    pub fn validate(self, require_agreement: bool) -> Result<NewSubmission, ValidationError> {
        let required = [
            &self.name,
            &self.email,
            &self.company,
            &self.phone,
            &self.message,
            &self.recaptcha_response,
        ];
        if required.iter().any(|value| value.trim().is_empty()) {
            return Err(ValidationError::MissingField);
        }

        // Only the literal string counts, "on", "1" or "TRUE" do not
        let agreement = self.agreement == "true";
        if require_agreement && !agreement {
            return Err(ValidationError::AgreementRequired);
        }

        Ok(NewSubmission {
            name: self.name,
            email: self.email,
            company: self.company,
            phone: self.phone,
            message: self.message,
            agreement,
            captcha_token: self.recaptcha_response,
        })
    }
}
