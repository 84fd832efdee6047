pub mod domain;
mod error;
mod health_check;
mod newsletter;
mod submissions;
mod subscribers;

pub use error::*;
pub use health_check::*;
pub use newsletter::*;
pub use submissions::*;
pub use subscribers::*;
