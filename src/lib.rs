pub mod captcha_client;
pub mod configuration;
pub mod email_client;
pub mod persistence;
pub mod retry;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod utils;

pub use utils::error_chain_fmt;
