mod contact_form;
mod status;
mod subscriber_email;
mod validation_error;

pub use contact_form::*;
pub use status::*;
pub use subscriber_email::*;
pub use validation_error::*;
