use std::fmt;

use serde::{Deserialize, Serialize};
use strata_acl::AUTHENTICATED;

/// An operation a user may perform on a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Edit,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Edit => "edit",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// The identity on whose behalf an access check runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub groups: Vec<String>,
    #[serde(default)]
    pub administrator: bool,
}

impl User {
    pub fn new(name: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            name: name.into(),
            groups,
            administrator: false,
        }
    }

    pub fn admin(name: impl Into<String>) -> Self {
        Self {
            administrator: true,
            ..Self::new(name, Vec::new())
        }
    }

    /// Identifiers matched against ACEs: every group plus `AUTHENTICATED@`.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(AUTHENTICATED))
    }
}
