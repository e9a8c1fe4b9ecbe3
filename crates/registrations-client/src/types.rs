//! Registrations API types.

use serde::{Deserialize, Serialize};

/// A single attendee record returned by the list endpoint.
///
/// Every field is optional; the server omits columns the attendee never
/// filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "Email")]
    pub email: Option<String>,
    #[serde(rename = "WhatsApp")]
    pub whatsapp: Option<String>,
    #[serde(rename = "Qualification")]
    pub qualification: Option<String>,
    #[serde(rename = "Designation")]
    pub designation: Option<String>,
}

impl Registration {
    /// Name for display, with a placeholder when absent.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("—")
    }
}

/// Token exchange request body.
#[derive(Debug, Serialize)]
pub struct TokenRequest {
    pub api_key: String,
}

/// Token exchange response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Registrations list response.
///
/// A response without the `registrations` field is an empty list.
#[derive(Debug, Deserialize)]
pub struct RegistrationsResponse {
    #[serde(default)]
    pub registrations: Vec<Registration>,
}
