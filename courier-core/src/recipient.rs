//! Recipient records as returned by the directory collaborator.

use serde::{Deserialize, Serialize};

/// Organization a recipient belongs to; the logo name feeds inline-image
/// references in rendered notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
    pub logo: Option<String>,
}

/// A resolved notification recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub organization: Option<Organization>,
}

impl Recipient {
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: display_name.into(),
            organization: None,
        }
    }

    pub fn with_organization(mut self, name: impl Into<String>, logo: Option<String>) -> Self {
        self.organization = Some(Organization {
            name: name.into(),
            logo,
        });
        self
    }
}
