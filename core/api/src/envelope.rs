//! The service's `{success, message, data}` response wrapper.

use serde::Deserialize;

use passvault_common::{Error, Result};

fn default_success() -> bool {
    true
}

/// Response wrapper used by every JSON endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Fail with `Api` when the server flagged the call as unsuccessful.
    pub fn check(&self, status: u16) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(Error::Api {
                status,
                message: self.message.clone(),
            })
        }
    }

    /// The payload of a successful response.
    ///
    /// # Errors
    /// - `Api` when `success` is false
    /// - `InvalidFormat` when the payload is missing
    pub fn into_data(self, status: u16) -> Result<T> {
        self.check(status)?;
        self.data
            .ok_or_else(|| Error::InvalidFormat("response carries no data".to_string()))
    }
}
