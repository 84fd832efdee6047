/// Follow-up state of a contact form submission, tracked by the sales team.
///
/// Unknown values are rejected while deserializing the request body, before any
/// database access happens.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    strum::AsRefStr,
    strum::EnumString,
)]
pub enum SubmissionStatus {
    New,
    Contacted,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
pub enum SubscriptionStatus {
    #[strum(serialize = "active")]
    Active,
    #[strum(serialize = "unsubscribed")]
    Unsubscribed,
}
