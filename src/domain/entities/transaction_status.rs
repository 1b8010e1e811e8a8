use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Status of a gateway transaction attached to an order.
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
pub enum TransactionStatus {
    #[default]
    Init,
    Succeeded,
    Failed,
    Refunded,
}

impl TransactionStatus {
    /// A succeeded transaction must not be overwritten by a replayed callback.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TransactionStatus::Succeeded)
    }
}
