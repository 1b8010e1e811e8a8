use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Lifecycle of a study-pack purchase order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    Default,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Canceled,
    Refunded,
}

impl OrderStatus {
    /// Only pending orders may be sent to the gateway.
    pub fn is_payable(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }
}
