//! Merchant registry entries

use serde::{Deserialize, Serialize};

/// Metadata the merchant registry returns for a whitelisted beacon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantEntry {
    /// Store name shown to the user
    #[serde(default)]
    pub name: Option<String>,
    pub location_id: String,
    pub merchant_id: String,
}

impl MerchantEntry {
    pub fn new(
        name: impl Into<String>,
        location_id: impl Into<String>,
        merchant_id: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            location_id: location_id.into(),
            merchant_id: merchant_id.into(),
        }
    }
}
