use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Account role carried in the `role` claim of session tokens.
/// Parsing also accepts the `ROLE_`-prefixed authority form.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(ascii_case_insensitive)]
pub enum Role {
    #[strum(to_string = "USER", serialize = "ROLE_USER")]
    User,
    #[strum(to_string = "TEACHER", serialize = "ROLE_TEACHER")]
    Teacher,
    #[strum(to_string = "ADMIN", serialize = "ROLE_ADMIN")]
    Admin,
}
