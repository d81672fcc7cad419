use serde::{Deserialize, Serialize};

/// A named grouping of items. Items may belong to several collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub key: String,
    pub name: String,
}
