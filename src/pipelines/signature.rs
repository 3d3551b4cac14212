//! Per-signature verification pipeline.
//!
//! Check order: structure gate, references, signature value, signing
//! certificate, signature timestamp, archive timestamp chain. The structure
//! gate is the only check that halts processing; every later check runs
//! regardless of its siblings' outcomes, and checks above a signature's ES
//! level are skipped entirely.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256, Sha384, Sha512};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::domain::report::VerificationResultItem;
use crate::domain::status::VerificationStatus;
use crate::domain::types::{CheckKind, EsLevel};
use crate::domain::validation_data::{SignatureData, SigningCertificateValidationData};
use crate::infra::config::VerifierConfig;
use crate::infra::observer::VerificationObserver;
use crate::services::archive_chain::ArchiveTimestampChainValidator;
use crate::services::cert_path::{CertificatePathValidator, PathPolicy};
use crate::services::content_checks;
use crate::services::timestamp_token::{TimestampTokenValidator, TokenItem};

/// Outcome of one signature run
#[derive(Debug)]
pub struct SignatureOutcome {
    pub items: Vec<VerificationResultItem>,
    /// Set when the structure gate failed; the document must stop here.
    pub structure_failed: bool,
}

/// Pipeline over one signature's evidence
pub struct SignatureVerificationPipeline<'a> {
    config: &'a VerifierConfig,
    observer: &'a dyn VerificationObserver,
}

impl<'a> SignatureVerificationPipeline<'a> {
    pub fn new(config: &'a VerifierConfig, observer: &'a dyn VerificationObserver) -> Self {
        Self { config, observer }
    }

    /// Run all applicable checks for `signature`.
    ///
    /// `document_basis_time` is the cross-signature instant the document
    /// pipeline derived for this signature's timestamp check, when one exists.
    pub fn verify(
        &self,
        signature: &SignatureData,
        verification_time: DateTime<Utc>,
        document_basis_time: Option<DateTime<Utc>>,
    ) -> SignatureOutcome {
        let source = signature.source_type;
        let level = signature.es_level;
        let mut items = Vec::new();

        log::debug!(
            "verifying signature {} (level {level}, source {source})",
            signature.name
        );

        if let Some(error) = &signature.structure_error {
            items.push(VerificationResultItem::failed(
                VerificationStatus::Invalid,
                source,
                CheckKind::Structure,
                "Structure",
                error.clone(),
            ));
            self.broadcast(&items);
            return SignatureOutcome {
                items,
                structure_failed: true,
            };
        }

        if level.meets(CheckKind::Reference.minimum_level()) {
            items.extend(content_checks::check_references(&signature.references, source));
        }

        if level.meets(CheckKind::SignatureValue.minimum_level()) {
            items.push(content_checks::check_signature_value(
                signature.signature_value.as_ref(),
                source,
            ));
        }

        if level.meets(CheckKind::SigningCertificate.minimum_level()) {
            items.push(self.check_signing_certificate(signature, verification_time));
        }

        if level.meets(CheckKind::SignatureTimeStamp.minimum_level()) {
            self.check_signature_timestamp(
                signature,
                verification_time,
                document_basis_time,
                &mut items,
            );
        }

        if level.meets(CheckKind::ArchiveTimeStamp.minimum_level()) {
            if signature.archive_timestamps.is_empty() {
                items.push(VerificationResultItem::failed(
                    VerificationStatus::Invalid,
                    source,
                    CheckKind::ArchiveTimeStamp,
                    "Token",
                    "no archive timestamp found",
                ));
            } else {
                items.extend(ArchiveTimestampChainValidator::validate(
                    verification_time,
                    &signature.archive_timestamps,
                    source,
                    &self.path_policy(level),
                ));
            }
        }

        self.broadcast(&items);
        SignatureOutcome {
            items,
            structure_failed: false,
        }
    }

    /// Signing-certificate sub-sequence. Short-circuits on the first failure;
    /// exactly one item comes out of it.
    fn check_signing_certificate(
        &self,
        signature: &SignatureData,
        verification_time: DateTime<Utc>,
    ) -> VerificationResultItem {
        let source = signature.source_type;
        let failed = |status: VerificationStatus, message: String| {
            VerificationResultItem::failed(
                status,
                source,
                CheckKind::SigningCertificate,
                "SigningCertificate",
                message,
            )
        };

        let Some(data) = &signature.signing_certificate else {
            return failed(
                VerificationStatus::Invalid,
                "signing certificate not found".to_string(),
            );
        };
        let Some(cert_data) = &data.certificate else {
            return failed(
                VerificationStatus::Invalid,
                "signing certificate not found".to_string(),
            );
        };

        let cert = match X509Certificate::from_der(&cert_data.der) {
            Ok((_, cert)) => cert,
            Err(e) => {
                return failed(
                    VerificationStatus::Invalid,
                    format!("undecodable signing certificate: {e}"),
                );
            }
        };

        if let Some(mismatch) = Self::certificate_mismatch(data, &cert, &cert_data.der) {
            return failed(VerificationStatus::Invalid, mismatch);
        }

        if self.config.hpki_validation_enabled {
            let has_non_repudiation = matches!(
                cert.key_usage(),
                Ok(Some(ku)) if ku.value.non_repudiation()
            );
            if !has_non_repudiation {
                return failed(
                    VerificationStatus::Invalid,
                    "signing certificate lacks the nonRepudiation key usage".to_string(),
                );
            }
        }

        // The signature timestamp proves the signature existed at its
        // genTime, so the certificate is judged at that instant.
        let basis_time = signature
            .signature_timestamp_generation_time
            .unwrap_or(verification_time);
        match CertificatePathValidator::validate(
            basis_time,
            &cert_data.der,
            &data.path_data,
            &self.path_policy(signature.es_level),
            None,
        ) {
            Ok(()) => VerificationResultItem::valid(
                source,
                CheckKind::SigningCertificate,
                "SigningCertificate",
            ),
            Err(e) => failed(e.status(), e.to_string()),
        }
    }

    /// Issuer/serial and certificate-digest references against the actual
    /// certificate; `Some(message)` on the first mismatch.
    fn certificate_mismatch(
        data: &SigningCertificateValidationData,
        cert: &X509Certificate,
        cert_der: &[u8],
    ) -> Option<String> {
        if let Some(reference) = &data.issuer_serial_ref {
            if cert.issuer().to_string() != reference.issuer
                || cert.tbs_certificate.serial.to_string() != reference.serial
            {
                return Some("certificate mismatch: issuer/serial reference".to_string());
            }
        }
        if let Some(digest_ref) = &data.digest_ref {
            match digest_by_name(&digest_ref.algorithm, cert_der) {
                Some(computed) if computed == digest_ref.digest => {}
                Some(_) => {
                    return Some("certificate mismatch: certificate digest".to_string());
                }
                None => {
                    return Some(format!(
                        "unsupported certificate digest algorithm {}",
                        digest_ref.algorithm
                    ));
                }
            }
        }
        None
    }

    fn check_signature_timestamp(
        &self,
        signature: &SignatureData,
        verification_time: DateTime<Utc>,
        document_basis_time: Option<DateTime<Utc>>,
        items: &mut Vec<VerificationResultItem>,
    ) {
        let source = signature.source_type;
        let Some(timestamp) = &signature.signature_timestamp else {
            items.push(VerificationResultItem::failed(
                VerificationStatus::Invalid,
                source,
                CheckKind::SignatureTimeStamp,
                "Token",
                "signature timestamp not found",
            ));
            return;
        };

        if !timestamp.conversion_errors.is_empty() {
            for error in &timestamp.conversion_errors {
                items.push(
                    VerificationResultItem::failed(
                        VerificationStatus::Invalid,
                        source,
                        CheckKind::SignatureTimeStamp,
                        "Token",
                        error.clone(),
                    )
                    .with_mapped_id(timestamp.id.clone()),
                );
            }
            return;
        }

        // The archive chain re-anchors the signature timestamp: judge it at
        // the oldest archive genTime when one exists.
        let basis_time = signature
            .oldest_archive_timestamp_generation_time
            .or_else(|| {
                ArchiveTimestampChainValidator::oldest_generation_time(
                    &signature.archive_timestamps,
                )
            })
            .or(document_basis_time)
            .unwrap_or(verification_time);

        let outcome = TimestampTokenValidator::validate(
            basis_time,
            timestamp,
            &self.path_policy(signature.es_level),
        );
        let mut token_clean = true;
        let mut imprint_clean = true;
        for finding in &outcome.findings {
            match finding.item {
                TokenItem::MessageImprint => imprint_clean = false,
                _ => token_clean = false,
            }
            items.push(
                VerificationResultItem::failed(
                    finding.status,
                    source,
                    CheckKind::SignatureTimeStamp,
                    finding.item.as_str(),
                    finding.message.clone(),
                )
                .with_mapped_id(timestamp.id.clone()),
            );
        }
        if !outcome.completed {
            return;
        }
        if token_clean {
            items.push(
                VerificationResultItem::valid(source, CheckKind::SignatureTimeStamp, "Token")
                    .with_mapped_id(timestamp.id.clone()),
            );
        }
        if imprint_clean {
            items.push(
                VerificationResultItem::valid(
                    source,
                    CheckKind::SignatureTimeStamp,
                    "MessageImprint",
                )
                .with_mapped_id(timestamp.id.clone()),
            );
        }
    }

    fn path_policy(&self, level: EsLevel) -> PathPolicy {
        PathPolicy {
            // Revocation evidence is mandatory only from level XL upward.
            check_revocation: self.config.check_revocation && level >= EsLevel::Xl,
            accept_single_revocation_source: self.config.accept_single_revocation_source,
            max_path_length: self.config.max_path_length,
        }
    }

    fn broadcast(&self, items: &[VerificationResultItem]) {
        for item in items.iter().filter(|i| !i.status.is_valid()) {
            self.observer.on_finding(item);
        }
    }
}

/// Dispatch a digest by XML-DSig URI, bare name or dotted OID.
fn digest_by_name(algorithm: &str, data: &[u8]) -> Option<Vec<u8>> {
    let normalized = algorithm.rsplit('#').next().unwrap_or(algorithm);
    match normalized {
        "sha256" | "2.16.840.1.101.3.4.2.1" => Some(Sha256::digest(data).to_vec()),
        "sha384" | "2.16.840.1.101.3.4.2.2" => Some(Sha384::digest(data).to_vec()),
        "sha512" | "2.16.840.1.101.3.4.2.3" => Some(Sha512::digest(data).to_vec()),
        _ => None,
    }
}
