//! Parsing of the `PLUGIN_ACCESS` blob into an [`AccessGrant`].
//!
//! The blob is a JSON document describing credentials for an S3-compatible
//! gateway (for instance the Storj gateway):
//!
//! ```json
//! {
//!   "endpoint": "https://gateway.storjshare.io",
//!   "access_key_id": "jw...",
//!   "secret_access_key": "jy...",
//!   "region": "us-east-1"
//! }
//! ```
//!
//! `region` is optional. Unknown keys are rejected so that typos do not go
//! unnoticed in CI configuration.

use std::fmt;

use bucket_upload_core::Error;
use serde::Deserialize;
use tracing::{debug, error};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Credentials and endpoint of a storage project.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessGrant {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGrant")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// Parse a serialized access blob.
pub fn parse_access(blob: &str) -> Result<AccessGrant, Error> {
    let grant: AccessGrant = serde_json::from_str(blob.trim()).map_err(|e| {
        error!(error = %e, "Access blob is not a valid access grant document");
        Error::Credential(format!("invalid access document: {e}"))
    })?;

    for (field, value) in [
        ("endpoint", &grant.endpoint),
        ("access_key_id", &grant.access_key_id),
        ("secret_access_key", &grant.secret_access_key),
        ("region", &grant.region),
    ] {
        if value.trim().is_empty() {
            error!(field, "Access grant field is blank");
            return Err(Error::Credential(format!("access field {field} is blank")));
        }
    }
    if !grant.endpoint.starts_with("https://") && !grant.endpoint.starts_with("http://") {
        error!(endpoint = %grant.endpoint, "Access grant endpoint has no http(s) scheme");
        return Err(Error::Credential(format!(
            "endpoint {:?} must start with http:// or https://",
            grant.endpoint
        )));
    }

    debug!(?grant, "Parsed access grant");
    Ok(grant)
}
