//! Certificate path building and validation.
//!
//! The path is built by issuer/subject name chaining over the evidence bag
//! supplied with the signature; trust anchors are the self-signed
//! certificates in that bag. Building performs no signature or revocation
//! checks. The validation pass then walks the built path and checks validity
//! windows, issuer signatures, CA constraints, critical extensions and,
//! when the policy asks for it, revocation evidence (OCSP first, CRL second).

use chrono::{DateTime, Utc};
use thiserror::Error;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;
use x509_parser::revocation_list::CertificateRevocationList;
use x509_parser::time::ASN1Time;

use crate::domain::status::VerificationStatus;
use crate::domain::validation_data::CertificatePathValidationData;

/// Policy knobs for one path validation run
#[derive(Debug, Clone, Copy)]
pub struct PathPolicy {
    pub check_revocation: bool,
    /// When set, one source answering Good settles the status; when unset,
    /// OCSP and CRL must corroborate each other.
    pub accept_single_revocation_source: bool,
    pub max_path_length: usize,
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self {
            check_revocation: true,
            accept_single_revocation_source: true,
            max_path_length: 16,
        }
    }
}

/// Caller-supplied hook consulted during the validation pass.
///
/// Lets a caller accept critical extensions the generic pass would reject,
/// e.g. the timestamp validator accepts a critical extendedKeyUsage.
pub trait PathCheck {
    /// Whether the given critical extension (dotted OID) is handled by the
    /// caller and must not fail the path
    fn accepts_critical_extension(&self, oid: &str) -> bool;
}

/// Outcome classification for a failed path validation.
///
/// Classification is structural: status mapping switches on the variant,
/// never on rendered text.
#[derive(Error, Debug)]
pub enum CertPathError {
    #[error("certificate structure invalid: {0}")]
    StructureInvalid(String),

    #[error("certificate constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("certificate signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("certificate not within its validity period")]
    NotWithinValidity,

    #[error("certificate is revoked")]
    Revoked,

    #[error("issuer certificate not found")]
    IssuerNotFound,

    #[error("no trust anchor reachable")]
    NoTrustAnchorReachable,

    #[error("revocation status could not be determined")]
    RevocationStatusUnknown,

    #[error("certificate path validation failed: {0}")]
    Other(String),
}

impl CertPathError {
    /// Status contribution of this failure.
    ///
    /// Missing trust material means the answer is unknown, not wrong; every
    /// other class (including the catch-all) is a hard failure.
    #[must_use]
    pub fn status(&self) -> VerificationStatus {
        match self {
            CertPathError::IssuerNotFound
            | CertPathError::NoTrustAnchorReachable
            | CertPathError::RevocationStatusUnknown => VerificationStatus::Indeterminate,
            _ => VerificationStatus::Invalid,
        }
    }
}

// Critical extensions the generic validation pass itself understands.
const HANDLED_CRITICAL_EXTENSIONS: &[&str] = &[
    "2.5.29.15", // keyUsage
    "2.5.29.19", // basicConstraints
    "2.5.29.17", // subjectAltName
];

/// Stateless path validator
pub struct CertificatePathValidator;

impl CertificatePathValidator {
    /// Validate the path from `end_entity` to a trust anchor at instant `at`.
    ///
    /// `Ok(())` means a trusted, unexpired, unrevoked path exists; any `Err`
    /// carries the first failure encountered.
    pub fn validate(
        at: DateTime<Utc>,
        end_entity: &[u8],
        evidence: &CertificatePathValidationData,
        policy: &PathPolicy,
        extra_check: Option<&dyn PathCheck>,
    ) -> Result<(), CertPathError> {
        let (_, leaf) = X509Certificate::from_der(end_entity)
            .map_err(|e| CertPathError::StructureInvalid(format!("end-entity: {e}")))?;

        let mut pool = Vec::with_capacity(evidence.certificates.len());
        for der in &evidence.certificates {
            let (_, cert) = X509Certificate::from_der(der)
                .map_err(|e| CertPathError::StructureInvalid(format!("evidence certificate: {e}")))?;
            pool.push(cert);
        }

        if !pool.iter().any(|c| c.subject() == c.issuer()) {
            return Err(CertPathError::StructureInvalid(
                "no trust anchor present in evidence".to_string(),
            ));
        }

        let chain = Self::build_path(&leaf, &pool, policy.max_path_length)?;
        log::debug!(
            "built certificate path of length {} for {}",
            chain.len(),
            leaf.subject()
        );

        let eval_time = ASN1Time::from_timestamp(at.timestamp())
            .map_err(|e| CertPathError::Other(format!("evaluation instant: {e}")))?;

        for pos in 0..chain.len() {
            let cert = chain[pos];
            Self::check_validity(cert, eval_time)?;
            Self::check_critical_extensions(cert, extra_check)?;
            if pos > 0 {
                Self::check_ca_constraints(cert)?;
            }

            // Issuer of the last element is the element itself (self-signed
            // anchor); build_path guarantees this.
            let issuer = if pos + 1 < chain.len() {
                chain[pos + 1]
            } else {
                cert
            };
            cert.verify_signature(Some(issuer.public_key()))
                .map_err(|e| {
                    CertPathError::SignatureInvalid(format!("{}: {e}", cert.subject()))
                })?;
        }

        if policy.check_revocation {
            // The anchor itself is exempt from revocation checking.
            for pos in 0..chain.len().saturating_sub(1) {
                Self::check_revocation(chain[pos], chain[pos + 1], evidence, policy)?;
            }
        }

        Ok(())
    }

    /// DN-chaining walk from the leaf to a self-signed certificate.
    fn build_path<'a, 'b>(
        leaf: &'b X509Certificate<'a>,
        pool: &'b [X509Certificate<'a>],
        max_len: usize,
    ) -> Result<Vec<&'b X509Certificate<'a>>, CertPathError> {
        let mut chain: Vec<&X509Certificate> = vec![leaf];
        let mut current = leaf;

        loop {
            if current.subject() == current.issuer() {
                return Ok(chain);
            }
            if chain.len() >= max_len {
                return Err(CertPathError::ConstraintViolation(format!(
                    "path length exceeds {max_len}"
                )));
            }

            let issuer = pool.iter().find(|c| c.subject() == current.issuer());
            match issuer {
                Some(issuer) => {
                    // A revisited subject means the pool chains in a circle.
                    if chain
                        .iter()
                        .any(|seen| seen.subject() == issuer.subject())
                    {
                        return Err(CertPathError::NoTrustAnchorReachable);
                    }
                    chain.push(issuer);
                    current = issuer;
                }
                None if chain.len() == 1 => return Err(CertPathError::IssuerNotFound),
                None => return Err(CertPathError::NoTrustAnchorReachable),
            }
        }
    }

    fn check_validity(cert: &X509Certificate, at: ASN1Time) -> Result<(), CertPathError> {
        if cert.validity().is_valid_at(at) {
            Ok(())
        } else {
            Err(CertPathError::NotWithinValidity)
        }
    }

    fn check_critical_extensions(
        cert: &X509Certificate,
        extra_check: Option<&dyn PathCheck>,
    ) -> Result<(), CertPathError> {
        for ext in cert.extensions() {
            if !ext.critical {
                continue;
            }
            let oid = ext.oid.to_id_string();
            let handled = HANDLED_CRITICAL_EXTENSIONS.contains(&oid.as_str())
                || extra_check.is_some_and(|c| c.accepts_critical_extension(&oid));
            if !handled {
                return Err(CertPathError::ConstraintViolation(format!(
                    "unhandled critical extension {oid}"
                )));
            }
        }
        Ok(())
    }

    fn check_ca_constraints(cert: &X509Certificate) -> Result<(), CertPathError> {
        match cert.basic_constraints() {
            Ok(Some(bc)) if bc.value.ca => {}
            Ok(_) => {
                return Err(CertPathError::ConstraintViolation(format!(
                    "{} is not a CA certificate",
                    cert.subject()
                )));
            }
            Err(e) => {
                return Err(CertPathError::StructureInvalid(format!(
                    "basicConstraints: {e}"
                )));
            }
        }
        match cert.key_usage() {
            Ok(Some(ku)) if ku.value.key_cert_sign() => Ok(()),
            Ok(Some(_)) => Err(CertPathError::ConstraintViolation(format!(
                "{} lacks keyCertSign",
                cert.subject()
            ))),
            // Absent keyUsage on a CA is tolerated; basicConstraints already
            // asserted the CA role.
            Ok(None) => Ok(()),
            Err(e) => Err(CertPathError::StructureInvalid(format!("keyUsage: {e}"))),
        }
    }

    /// Revocation status of `cert`, OCSP evidence first, CRLs second.
    fn check_revocation(
        cert: &X509Certificate,
        issuer: &X509Certificate,
        evidence: &CertificatePathValidationData,
        policy: &PathPolicy,
    ) -> Result<(), CertPathError> {
        let ocsp = Self::ocsp_status(cert, evidence)?;
        if matches!(ocsp, Some(OcspStatus::Revoked)) {
            return Err(CertPathError::Revoked);
        }
        if policy.accept_single_revocation_source && matches!(ocsp, Some(OcspStatus::Good)) {
            return Ok(());
        }
        match Self::crl_status(cert, issuer, evidence)? {
            Some(true) => Err(CertPathError::Revoked),
            Some(false)
                if policy.accept_single_revocation_source
                    || matches!(ocsp, Some(OcspStatus::Good)) =>
            {
                Ok(())
            }
            _ => Err(CertPathError::RevocationStatusUnknown),
        }
    }

    fn ocsp_status(
        cert: &X509Certificate,
        evidence: &CertificatePathValidationData,
    ) -> Result<Option<OcspStatus>, CertPathError> {
        use der::Decode;
        use x509_ocsp::{BasicOcspResponse, CertStatus, OcspResponse, OcspResponseStatus};

        let serial = trim_leading_zeros(cert.raw_serial());

        for der_bytes in &evidence.ocsp_responses {
            let response = OcspResponse::from_der(der_bytes)
                .map_err(|e| CertPathError::StructureInvalid(format!("OCSP response: {e}")))?;
            if response.response_status != OcspResponseStatus::Successful {
                continue;
            }
            let Some(bytes) = response.response_bytes else {
                continue;
            };
            let basic = BasicOcspResponse::from_der(bytes.response.as_bytes())
                .map_err(|e| CertPathError::StructureInvalid(format!("OCSP response: {e}")))?;
            for single in &basic.tbs_response_data.responses {
                if trim_leading_zeros(single.cert_id.serial_number.as_bytes()) != serial {
                    continue;
                }
                return Ok(Some(match &single.cert_status {
                    CertStatus::Good(_) => OcspStatus::Good,
                    CertStatus::Revoked(_) => OcspStatus::Revoked,
                    CertStatus::Unknown(_) => OcspStatus::Unknown,
                }));
            }
        }
        Ok(None)
    }

    /// `Some(true)` revoked, `Some(false)` covered and clean, `None` no CRL
    /// from this certificate's issuer was supplied.
    fn crl_status(
        cert: &X509Certificate,
        issuer: &X509Certificate,
        evidence: &CertificatePathValidationData,
    ) -> Result<Option<bool>, CertPathError> {
        let mut covered = false;
        for der_bytes in &evidence.crls {
            let (_, crl) = CertificateRevocationList::from_der(der_bytes)
                .map_err(|e| CertPathError::StructureInvalid(format!("CRL: {e}")))?;
            if crl.issuer() != issuer.subject() {
                continue;
            }
            covered = true;
            for revoked in crl.iter_revoked_certificates() {
                if revoked.raw_serial() == cert.raw_serial() {
                    return Ok(Some(true));
                }
            }
        }
        Ok(if covered { Some(false) } else { None })
    }
}

enum OcspStatus {
    Good,
    Revoked,
    Unknown,
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_end_entity_is_structure_invalid() {
        let evidence = CertificatePathValidationData::default();
        let err = CertificatePathValidator::validate(
            Utc::now(),
            &[0xde, 0xad, 0xbe, 0xef],
            &evidence,
            &PathPolicy::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CertPathError::StructureInvalid(_)));
        assert_eq!(err.status(), VerificationStatus::Invalid);
    }

    #[test]
    fn status_mapping_per_variant() {
        assert_eq!(
            CertPathError::IssuerNotFound.status(),
            VerificationStatus::Indeterminate
        );
        assert_eq!(
            CertPathError::NoTrustAnchorReachable.status(),
            VerificationStatus::Indeterminate
        );
        assert_eq!(
            CertPathError::RevocationStatusUnknown.status(),
            VerificationStatus::Indeterminate
        );
        assert_eq!(CertPathError::Revoked.status(), VerificationStatus::Invalid);
        assert_eq!(
            CertPathError::NotWithinValidity.status(),
            VerificationStatus::Invalid
        );
        assert_eq!(
            CertPathError::Other("anything else".to_string()).status(),
            VerificationStatus::Invalid
        );
    }

    #[test]
    fn indeterminate_messages_stay_distinct() {
        assert_eq!(
            CertPathError::IssuerNotFound.to_string(),
            "issuer certificate not found"
        );
        assert_eq!(
            CertPathError::NoTrustAnchorReachable.to_string(),
            "no trust anchor reachable"
        );
    }

    #[test]
    fn trim_leading_zeros_handles_edges() {
        assert_eq!(trim_leading_zeros(&[0x00, 0x01, 0x02]), &[0x01, 0x02]);
        assert_eq!(trim_leading_zeros(&[0x7f]), &[0x7f]);
        assert!(trim_leading_zeros(&[0x00, 0x00]).is_empty());
    }
}
