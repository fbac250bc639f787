//! Collection endpoint configuration.
//!
//! Centralized static configuration for the direct HTTPS fallback path.
//! Update these values to change where batches are sent.

/// Collection endpoint host
pub const COLLECTION_HOST: &str = "vortex.data.beacon.dev";

/// HTTPS port for batch upload
pub const COLLECTION_PORT: u16 = 443;

/// Endpoint path for batch upload
pub const COLLECTION_PATH: &str = "/collect/v1";

/// Get the HTTPS URL batches are posted to
#[inline]
pub fn https_url() -> String {
    format!(
        "https://{}:{}{}",
        COLLECTION_HOST, COLLECTION_PORT, COLLECTION_PATH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_url_is_fixed() {
        assert_eq!(https_url(), "https://vortex.data.beacon.dev:443/collect/v1");
    }
}
