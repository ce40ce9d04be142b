use serde::{Deserialize, Serialize};

/// Who a bearer token speaks for.
///
/// Parent tokens carry the parent's account username as subject; kid tokens
/// carry the kid's generated username and can only reach that kid's routes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Parent,
    Kid,
}
