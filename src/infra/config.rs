//! Verifier configuration.
//!
//! The engine itself does no file I/O; host applications load a TOML snippet
//! (or build the struct directly) and hand it in.

use crate::infra::error::{VerifyError, VerifyResult};
use serde::{Deserialize, Serialize};

/// Engine configuration with all verification policy knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Whether to enforce the HPKI nonRepudiation key-usage bit on signer
    /// certificates
    pub hpki_validation_enabled: bool,

    /// Whether certificate-path validation must evaluate revocation evidence
    pub check_revocation: bool,

    /// Whether a Good answer from only one of OCSP/CRL settles the
    /// revocation status; when false both sources must corroborate
    pub accept_single_revocation_source: bool,

    /// Maximum certificate chain length accepted during path building
    pub max_path_length: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            hpki_validation_enabled: true,
            check_revocation: true,
            accept_single_revocation_source: true,
            max_path_length: 16,
        }
    }
}

impl VerifierConfig {
    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> VerifyResult<Self> {
        let config: VerifierConfig = toml::from_str(content).map_err(|e| {
            VerifyError::ConfigurationError(format!("Failed to parse config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> VerifyResult<()> {
        if self.max_path_length == 0 {
            return Err(VerifyError::ConfigurationError(
                "max_path_length must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
