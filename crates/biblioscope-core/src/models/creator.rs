use serde::{Deserialize, Serialize};

/// A person credited on a bibliographic record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Creator {
    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    #[serde(default = "default_creator_type")]
    pub creator_type: String,
}

fn default_creator_type() -> String {
    "author".to_string()
}

impl Creator {
    pub fn author(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            creator_type: default_creator_type(),
        }
    }

    /// Parse a display name: `"Last, First"` or `"First Middle Last"`.
    pub fn from_display_name(name: &str) -> Self {
        let name = name.trim();
        if let Some((last, first)) = name.split_once(',') {
            return Self::author(first.trim(), last.trim());
        }
        match name.rsplit_once(' ') {
            Some((first, last)) => Self::author(first.trim(), last.trim()),
            None => Self::author("", name),
        }
    }

    /// The last name, or the first name when no last name is known.
    pub fn sort_name(&self) -> &str {
        if self.last_name.is_empty() {
            &self.first_name
        } else {
            &self.last_name
        }
    }

    pub fn display_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (true, _) => self.last_name.clone(),
            (false, true) => self.first_name.clone(),
            (false, false) => format!("{} {}", self.first_name, self.last_name),
        }
    }
}
