//! RFC 3161 timestamp token validation.
//!
//! A token is a CMS `ContentInfo` wrapping a `SignedData` whose encapsulated
//! content is a `TSTInfo`. Validation walks that structure, checks the TSA
//! certificate (critical timeStamping EKU plus full path validation), verifies
//! the TSA signature over the signed attributes, and compares the message
//! imprint against the caller-supplied target bytes. Structural failures of
//! the outer walk abort with a single `Token` finding; everything after that
//! accumulates findings per item.

use chrono::{DateTime, Utc};
use cms::cert::x509::attr::Attribute;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerInfo};
use der::asn1::{Any, ObjectIdentifier, OctetString};
use der::{Decode, Encode, Reader, SliceReader, Tag};
use rsa::pkcs1v15::VerifyingKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256, Sha384, Sha512};
use spki::AlgorithmIdentifierOwned;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;
use x509_tsp::TstInfo;

use crate::domain::status::VerificationStatus;
use crate::domain::validation_data::{TimeStampData, TimeStampValidationData};
use crate::infra::error::{VerifyError, VerifyResult};
use crate::services::cert_path::{CertificatePathValidator, PathCheck, PathPolicy};

const OID_SIGNED_DATA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const OID_CT_TST_INFO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");
const OID_MESSAGE_DIGEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
const OID_SIGNING_CERTIFICATE_V2: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.47");
const OID_SIGNING_CERTIFICATE_V1: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.12");

const OID_SHA256: &str = "2.16.840.1.101.3.4.2.1";
const OID_SHA384: &str = "2.16.840.1.101.3.4.2.2";
const OID_SHA512: &str = "2.16.840.1.101.3.4.2.3";
const OID_RSA: &str = "1.2.840.113549.1.1.1";
const OID_SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
const OID_SHA384_WITH_RSA: &str = "1.2.840.113549.1.1.12";
const OID_SHA512_WITH_RSA: &str = "1.2.840.113549.1.1.13";

const OID_EXTENDED_KEY_USAGE: &str = "2.5.29.37";

/// Item a token finding refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenItem {
    Token,
    TsaCert,
    TsaSignature,
    MessageImprint,
}

impl TokenItem {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TokenItem::Token => "Token",
            TokenItem::TsaCert => "TSACert",
            TokenItem::TsaSignature => "TSASignature",
            TokenItem::MessageImprint => "MessageImprint",
        }
    }
}

/// One non-VALID outcome from token validation
#[derive(Debug, Clone)]
pub struct TokenFinding {
    pub item: TokenItem,
    pub status: VerificationStatus,
    pub message: String,
}

/// Outcome of validating one token
#[derive(Debug, Clone)]
pub struct TokenValidation {
    pub findings: Vec<TokenFinding>,
    /// Whether all sub-checks ran. `false` means validation aborted on a
    /// structural failure and absent findings say nothing about the token.
    pub completed: bool,
}

impl TokenFinding {
    fn invalid(item: TokenItem, message: impl Into<String>) -> Self {
        Self {
            item,
            status: VerificationStatus::Invalid,
            message: message.into(),
        }
    }
}

struct PathEkuCheck;

impl PathCheck for PathEkuCheck {
    fn accepts_critical_extension(&self, oid: &str) -> bool {
        oid == OID_EXTENDED_KEY_USAGE
    }
}

/// Stateless timestamp token validator
pub struct TimestampTokenValidator;

impl TimestampTokenValidator {
    /// Validate one token at evaluation instant `at`.
    ///
    /// A completed run with no findings means every item checked out. The
    /// computed-fact snapshot is attached to `data` in every case.
    pub fn validate(
        at: DateTime<Utc>,
        data: &TimeStampValidationData,
        policy: &PathPolicy,
    ) -> TokenValidation {
        let mut findings = Vec::new();
        let mut facts = TimeStampData::default();

        let parts = match Self::decode_token(&data.token) {
            Ok(parts) => parts,
            Err(message) => {
                findings.push(TokenFinding::invalid(TokenItem::Token, message));
                data.attach_computed_facts(facts);
                return TokenValidation {
                    findings,
                    completed: false,
                };
            }
        };

        facts.generation_time = generalized_time_to_utc(&parts.tst_info.gen_time);

        let tsa_cert_der = match Self::locate_tsa_certificate(data, &parts.signed_data) {
            Some(der) => der,
            None => {
                findings.push(TokenFinding::invalid(
                    TokenItem::TsaCert,
                    "TSA certificate not found",
                ));
                data.attach_computed_facts(facts);
                return TokenValidation {
                    findings,
                    completed: false,
                };
            }
        };

        Self::check_tsa_certificate(at, &tsa_cert_der, data, policy, &mut findings);
        Self::check_tsa_signature(
            &parts.signer_info,
            &parts.tst_content,
            &tsa_cert_der,
            &mut facts,
            &mut findings,
        );
        Self::check_message_imprint(&parts.tst_info, &data.target, &mut facts, &mut findings);

        data.attach_computed_facts(facts);
        TokenValidation {
            findings,
            completed: true,
        }
    }

    /// Extract the genTime of a raw token without validating anything else.
    pub fn generation_time(token: &[u8]) -> VerifyResult<DateTime<Utc>> {
        let parts = Self::decode_token(token).map_err(VerifyError::Asn1Error)?;
        generalized_time_to_utc(&parts.tst_info.gen_time)
            .ok_or_else(|| VerifyError::Asn1Error("genTime out of range".to_string()))
    }

    fn decode_token(token: &[u8]) -> Result<TokenParts, String> {
        if token.is_empty() {
            return Err("empty timestamp token".to_string());
        }
        let ci = ContentInfo::from_der(token).map_err(|e| format!("ContentInfo: {e}"))?;
        if ci.content_type != OID_SIGNED_DATA {
            return Err(format!("unexpected content type {}", ci.content_type));
        }
        let signed_der = ci.content.to_der().map_err(|e| format!("SignedData: {e}"))?;
        let signed_data =
            SignedData::from_der(&signed_der).map_err(|e| format!("SignedData: {e}"))?;

        if signed_data.encap_content_info.econtent_type != OID_CT_TST_INFO {
            return Err(format!(
                "unexpected encapsulated content type {}",
                signed_data.encap_content_info.econtent_type
            ));
        }
        let econtent = signed_data
            .encap_content_info
            .econtent
            .as_ref()
            .ok_or_else(|| "missing encapsulated TSTInfo".to_string())?;
        let econtent_der = econtent.to_der().map_err(|e| format!("TSTInfo: {e}"))?;
        let octets =
            OctetString::from_der(&econtent_der).map_err(|e| format!("TSTInfo: {e}"))?;
        let tst_content = octets.as_bytes().to_vec();
        let tst_info = TstInfo::from_der(&tst_content).map_err(|e| format!("TSTInfo: {e}"))?;

        let signer_info = signed_data
            .signer_infos
            .0
            .iter()
            .next()
            .cloned()
            .ok_or_else(|| "no signer info in token".to_string())?;

        Ok(TokenParts {
            signed_data,
            signer_info,
            tst_info,
            tst_content,
        })
    }

    /// The TSA certificate is taken from the evidence record when present,
    /// else the first non-CA certificate embedded in the token.
    fn locate_tsa_certificate(
        data: &TimeStampValidationData,
        signed_data: &SignedData,
    ) -> Option<Vec<u8>> {
        if let Some(cert) = &data.tsa_certificate {
            return Some(cert.der.clone());
        }
        let certificates = signed_data.certificates.as_ref()?;
        for cert in certificates.0.iter() {
            let Ok(der_bytes) = cert.to_der() else {
                continue;
            };
            let Ok((_, parsed)) = X509Certificate::from_der(&der_bytes) else {
                continue;
            };
            let is_ca = matches!(parsed.basic_constraints(), Ok(Some(bc)) if bc.value.ca);
            if !is_ca {
                return Some(der_bytes);
            }
        }
        None
    }

    fn check_tsa_certificate(
        at: DateTime<Utc>,
        tsa_cert_der: &[u8],
        data: &TimeStampValidationData,
        policy: &PathPolicy,
        findings: &mut Vec<TokenFinding>,
    ) {
        let parsed = match X509Certificate::from_der(tsa_cert_der) {
            Ok((_, cert)) => cert,
            Err(e) => {
                findings.push(TokenFinding::invalid(
                    TokenItem::TsaCert,
                    format!("undecodable TSA certificate: {e}"),
                ));
                return;
            }
        };

        // RFC 3161 requires exactly this EKU, marked critical.
        let has_time_stamping = matches!(
            parsed.extended_key_usage(),
            Ok(Some(eku)) if eku.value.time_stamping
        );
        let eku_critical = parsed
            .extensions()
            .iter()
            .find(|e| e.oid.to_id_string() == OID_EXTENDED_KEY_USAGE)
            .is_some_and(|e| e.critical);
        if !has_time_stamping {
            findings.push(TokenFinding::invalid(
                TokenItem::TsaCert,
                "missing timeStamping extended key usage",
            ));
        } else if !eku_critical {
            findings.push(TokenFinding::invalid(
                TokenItem::TsaCert,
                "timeStamping extended key usage is not critical",
            ));
        }

        if let Err(e) =
            CertificatePathValidator::validate(at, tsa_cert_der, &data.path_data, policy, Some(&PathEkuCheck))
        {
            findings.push(TokenFinding {
                item: TokenItem::TsaCert,
                status: e.status(),
                message: e.to_string(),
            });
        }
    }

    fn check_tsa_signature(
        signer_info: &SignerInfo,
        tst_content: &[u8],
        tsa_cert_der: &[u8],
        facts: &mut TimeStampData,
        findings: &mut Vec<TokenFinding>,
    ) {
        let digest_alg = signer_info.digest_alg.oid.to_string();
        if digest_hash(&digest_alg, &[]).is_none() {
            findings.push(TokenFinding::invalid(
                TokenItem::TsaSignature,
                format!("unsupported digest algorithm {digest_alg}"),
            ));
            return;
        }

        let Some(signed_attrs) = &signer_info.signed_attrs else {
            findings.push(TokenFinding::invalid(
                TokenItem::TsaSignature,
                "token has no signed attributes",
            ));
            return;
        };

        // messageDigest attribute against the recomputed content digest.
        let computed_message_digest = digest_hash(&digest_alg, tst_content);
        facts.computed_message_digest = computed_message_digest.clone();
        match attribute_octet_string(signed_attrs.iter(), &OID_MESSAGE_DIGEST) {
            Some(embedded) => {
                facts.message_digest = Some(embedded.clone());
                if Some(&embedded) != computed_message_digest.as_ref() {
                    findings.push(TokenFinding::invalid(
                        TokenItem::TsaSignature,
                        "messageDigest attribute does not match content",
                    ));
                }
            }
            None => {
                findings.push(TokenFinding::invalid(
                    TokenItem::TsaSignature,
                    "missing messageDigest attribute",
                ));
            }
        }

        // Signing-certificate attribute (ESSCertIDv2) against the TSA cert.
        Self::check_signing_certificate_attr(signed_attrs.iter(), tsa_cert_der, facts, findings);

        let sig_alg = signer_info.signature_algorithm.oid.to_string();
        let rsa_supported = matches!(
            sig_alg.as_str(),
            OID_RSA | OID_SHA256_WITH_RSA | OID_SHA384_WITH_RSA | OID_SHA512_WITH_RSA
        );
        if !rsa_supported {
            findings.push(TokenFinding::invalid(
                TokenItem::TsaSignature,
                format!("unsupported signature algorithm {sig_alg}"),
            ));
            return;
        }

        let message = match signed_attrs.to_der() {
            Ok(mut der_bytes) => {
                // The signature covers the attributes with a SET tag, not the
                // IMPLICIT [0] tag they carry inside SignerInfo.
                if der_bytes.first() == Some(&0xA0) {
                    der_bytes[0] = 0x31;
                }
                der_bytes
            }
            Err(e) => {
                findings.push(TokenFinding::invalid(
                    TokenItem::TsaSignature,
                    format!("signed attributes re-encoding failed: {e}"),
                ));
                return;
            }
        };

        let verified = Self::verify_rsa_signature(
            tsa_cert_der,
            &message,
            signer_info.signature.as_bytes(),
            &digest_alg,
        );
        match verified {
            Ok(()) => {
                facts.signature_verified = Some(true);
            }
            Err(message) => {
                facts.signature_verified = Some(false);
                findings.push(TokenFinding::invalid(TokenItem::TsaSignature, message));
            }
        }
    }

    fn check_signing_certificate_attr<'a>(
        attrs: impl Iterator<Item = &'a Attribute>,
        tsa_cert_der: &[u8],
        facts: &mut TimeStampData,
        findings: &mut Vec<TokenFinding>,
    ) {
        let mut v2_value = None;
        let mut saw_v1 = false;
        for attr in attrs {
            if attr.oid == OID_SIGNING_CERTIFICATE_V2 {
                v2_value = attr.values.iter().next();
            } else if attr.oid == OID_SIGNING_CERTIFICATE_V1 {
                saw_v1 = true;
            }
        }

        let Some(value) = v2_value else {
            let message = if saw_v1 {
                "signingCertificate (v1, SHA-1) is not supported"
            } else {
                "missing signingCertificateV2 attribute"
            };
            findings.push(TokenFinding::invalid(TokenItem::TsaSignature, message));
            return;
        };

        match parse_ess_cert_id_v2(value) {
            Ok((hash_alg, embedded_hash)) => {
                facts.certificate_digest = Some(embedded_hash.clone());
                match digest_hash(&hash_alg, tsa_cert_der) {
                    Some(computed) => {
                        facts.computed_certificate_digest = Some(computed.clone());
                        if computed != embedded_hash {
                            findings.push(TokenFinding::invalid(
                                TokenItem::TsaSignature,
                                "signing certificate hash does not match TSA certificate",
                            ));
                        }
                    }
                    None => {
                        findings.push(TokenFinding::invalid(
                            TokenItem::TsaSignature,
                            format!("unsupported certificate hash algorithm {hash_alg}"),
                        ));
                    }
                }
            }
            Err(e) => {
                findings.push(TokenFinding::invalid(
                    TokenItem::TsaSignature,
                    format!("undecodable signingCertificateV2 attribute: {e}"),
                ));
            }
        }
    }

    fn check_message_imprint(
        tst_info: &TstInfo,
        target: &[u8],
        facts: &mut TimeStampData,
        findings: &mut Vec<TokenFinding>,
    ) {
        let alg = tst_info.message_imprint.hash_algorithm.oid.to_string();
        let embedded = tst_info.message_imprint.hashed_message.as_bytes().to_vec();
        facts.imprint_algorithm = Some(alg.clone());
        facts.embedded_imprint = Some(embedded.clone());

        match digest_hash(&alg, target) {
            Some(computed) => {
                facts.computed_imprint = Some(computed.clone());
                if computed != embedded {
                    findings.push(TokenFinding::invalid(
                        TokenItem::MessageImprint,
                        "message imprint does not match timestamped content",
                    ));
                }
            }
            None => {
                findings.push(TokenFinding::invalid(
                    TokenItem::MessageImprint,
                    format!("unsupported imprint hash algorithm {alg}"),
                ));
            }
        }
    }

    fn verify_rsa_signature(
        tsa_cert_der: &[u8],
        message: &[u8],
        signature: &[u8],
        digest_alg: &str,
    ) -> Result<(), String> {
        let (_, cert) = X509Certificate::from_der(tsa_cert_der)
            .map_err(|e| format!("undecodable TSA certificate: {e}"))?;
        let public_key = RsaPublicKey::from_public_key_der(cert.public_key().raw)
            .map_err(|e| format!("TSA public key: {e}"))?;
        let signature = rsa::pkcs1v15::Signature::try_from(signature)
            .map_err(|e| format!("signature encoding: {e}"))?;

        let result = match digest_alg {
            OID_SHA256 => VerifyingKey::<Sha256>::new(public_key).verify(message, &signature),
            OID_SHA384 => VerifyingKey::<Sha384>::new(public_key).verify(message, &signature),
            OID_SHA512 => VerifyingKey::<Sha512>::new(public_key).verify(message, &signature),
            other => return Err(format!("unsupported digest algorithm {other}")),
        };
        result.map_err(|_| "TSA signature verification failed".to_string())
    }
}

struct TokenParts {
    signed_data: SignedData,
    signer_info: SignerInfo,
    tst_info: TstInfo,
    tst_content: Vec<u8>,
}

/// Hash `data` with the algorithm named by `oid`; `None` for unsupported
/// algorithms (notably SHA-1).
fn digest_hash(oid: &str, data: &[u8]) -> Option<Vec<u8>> {
    match oid {
        OID_SHA256 => Some(Sha256::digest(data).to_vec()),
        OID_SHA384 => Some(Sha384::digest(data).to_vec()),
        OID_SHA512 => Some(Sha512::digest(data).to_vec()),
        _ => None,
    }
}

fn generalized_time_to_utc(time: &der::asn1::GeneralizedTime) -> Option<DateTime<Utc>> {
    let duration = time.to_unix_duration();
    DateTime::<Utc>::from_timestamp(duration.as_secs().try_into().ok()?, duration.subsec_nanos())
}

/// First value of the attribute with the given oid, decoded as OCTET STRING.
fn attribute_octet_string<'a>(
    attrs: impl Iterator<Item = &'a Attribute>,
    oid: &ObjectIdentifier,
) -> Option<Vec<u8>> {
    let attr = attrs.into_iter().find(|a| &a.oid == oid)?;
    let value = attr.values.iter().next()?;
    let octets: OctetString = value.decode_as().ok()?;
    Some(octets.as_bytes().to_vec())
}

/// Pull the (hash algorithm, certHash) pair out of a SigningCertificateV2
/// attribute value. Only the first ESSCertIDv2 is inspected.
fn parse_ess_cert_id_v2(value: &Any) -> der::Result<(String, Vec<u8>)> {
    let der_bytes = value.to_der()?;
    let mut reader = SliceReader::new(&der_bytes)?;
    let result = reader.sequence(|outer| {
        let result = outer.sequence(|certs| {
            let result = certs.sequence(|ess| {
                // hashAlgorithm is DEFAULT sha256
                let alg = if ess.peek_tag()? == Tag::Sequence {
                    AlgorithmIdentifierOwned::decode(ess)?.oid.to_string()
                } else {
                    OID_SHA256.to_string()
                };
                let hash = OctetString::decode(ess)?;
                drain(ess)?;
                Ok((alg, hash.as_bytes().to_vec()))
            })?;
            drain(certs)?;
            Ok(result)
        })?;
        drain(outer)?;
        Ok(result)
    })?;
    Ok(result)
}

fn drain<'a, R: Reader<'a>>(reader: &mut R) -> der::Result<()> {
    while !reader.is_finished() {
        let _: Any = Any::decode(reader)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation_data::CertificatePathValidationData;

    fn record_with_token(token: Vec<u8>) -> TimeStampValidationData {
        TimeStampValidationData::new(
            "ts-test",
            token,
            None,
            b"payload".to_vec(),
            None,
            CertificatePathValidationData::default(),
            Vec::new(),
        )
    }

    #[test]
    fn empty_token_is_single_token_finding() {
        let data = record_with_token(Vec::new());
        let outcome =
            TimestampTokenValidator::validate(Utc::now(), &data, &PathPolicy::default());
        assert!(!outcome.completed);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].item, TokenItem::Token);
        assert_eq!(outcome.findings[0].status, VerificationStatus::Invalid);
        // snapshot still attached, just empty
        assert!(data.computed_facts().is_some());
    }

    #[test]
    fn garbage_token_aborts_with_token_finding() {
        let data = record_with_token(vec![0x30, 0x03, 0x02, 0x01, 0x01]);
        let outcome =
            TimestampTokenValidator::validate(Utc::now(), &data, &PathPolicy::default());
        assert!(!outcome.completed);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].item, TokenItem::Token);
    }

    #[test]
    fn generation_time_rejects_garbage() {
        assert!(TimestampTokenValidator::generation_time(&[0xff, 0x00]).is_err());
    }

    #[test]
    fn digest_dispatch_covers_sha2_family_only() {
        assert!(digest_hash(OID_SHA256, b"x").is_some());
        assert!(digest_hash(OID_SHA384, b"x").is_some());
        assert!(digest_hash(OID_SHA512, b"x").is_some());
        // SHA-1
        assert!(digest_hash("1.3.14.3.2.26", b"x").is_none());
    }

    // Minimal TSTInfo: version 1, a dummy policy, a SHA-256 message imprint,
    // serial 7 and a fixed genTime; all optional fields absent.
    fn tst_info_with_imprint(digest: &[u8]) -> TstInfo {
        let mut imprint = vec![
            0x30, 0x31, // MessageImprint
            0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01,
            0x05, 0x00, // AlgorithmIdentifier sha256
            0x04, 0x20, // OCTET STRING (32)
        ];
        imprint.extend_from_slice(digest);

        let mut body = vec![0x02, 0x01, 0x01]; // version
        body.extend_from_slice(&[0x06, 0x03, 0x2a, 0x03, 0x04]); // policy 1.2.3.4
        body.extend_from_slice(&imprint);
        body.extend_from_slice(&[0x02, 0x01, 0x07]); // serialNumber
        body.extend_from_slice(b"\x18\x0f20240101120000Z"); // genTime

        let mut der_bytes = vec![0x30, body.len() as u8];
        der_bytes.extend_from_slice(&body);
        TstInfo::from_der(&der_bytes).unwrap()
    }

    #[test]
    fn matching_imprint_produces_no_findings() {
        let digest = Sha256::digest(b"timestamped payload");
        let tst_info = tst_info_with_imprint(&digest);

        let mut facts = TimeStampData::default();
        let mut findings = Vec::new();
        TimestampTokenValidator::check_message_imprint(
            &tst_info,
            b"timestamped payload",
            &mut facts,
            &mut findings,
        );

        assert!(findings.is_empty());
        assert_eq!(facts.imprint_algorithm.as_deref(), Some(OID_SHA256));
        assert_eq!(facts.embedded_imprint, facts.computed_imprint);
    }

    #[test]
    fn imprint_mismatch_is_reported() {
        let digest = Sha256::digest(b"original payload");
        let tst_info = tst_info_with_imprint(&digest);

        let mut facts = TimeStampData::default();
        let mut findings = Vec::new();
        TimestampTokenValidator::check_message_imprint(
            &tst_info,
            b"tampered payload",
            &mut facts,
            &mut findings,
        );

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].item, TokenItem::MessageImprint);
        assert_eq!(findings[0].status, VerificationStatus::Invalid);
        assert_ne!(facts.embedded_imprint, facts.computed_imprint);
    }

    #[test]
    fn item_names_are_stable() {
        assert_eq!(TokenItem::Token.as_str(), "Token");
        assert_eq!(TokenItem::TsaCert.as_str(), "TSACert");
        assert_eq!(TokenItem::TsaSignature.as_str(), "TSASignature");
        assert_eq!(TokenItem::MessageImprint.as_str(), "MessageImprint");
    }
}
