mod admin;
mod submit;

pub use admin::*;
pub use submit::*;
