//! Signing-certificate and path-validation behavior over generated
//! certificates.

use chrono::Utc;
use rcgen::{CertificateParams, DnType, KeyPair, KeyUsagePurpose};
use sha2::{Digest, Sha256};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use medsig_verify::domain::validation_data::{
    CertificateData, CertificateDigestRef, CertificatePathValidationData, IssuerSerialRef,
    SignatureData, SigningCertificateValidationData,
};
use medsig_verify::{
    CertPathError, CertificatePathValidator, CheckKind, EsLevel, NullObserver, PathPolicy,
    SignatureSourceType, SignatureVerificationPipeline, VerificationStatus, VerifierConfig,
};

fn generate_signer(key_usages: Vec<KeyUsagePurpose>, expired: bool) -> Vec<u8> {
    let mut params = CertificateParams::new(vec!["signer.example".to_string()]).unwrap();
    params
        .distinguished_name
        .push(DnType::CommonName, "Test Signer");
    params.key_usages = key_usages;
    if expired {
        params.not_before = rcgen::date_time_ymd(2020, 1, 1);
        params.not_after = rcgen::date_time_ymd(2021, 1, 1);
    }
    let key_pair = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key_pair).unwrap();
    cert.der().as_ref().to_vec()
}

fn signature_with_certificate(
    der: Vec<u8>,
    issuer_serial_ref: Option<IssuerSerialRef>,
    digest_ref: Option<CertificateDigestRef>,
    evidence: Vec<Vec<u8>>,
) -> SignatureData {
    SignatureData {
        name: "sig".to_string(),
        es_level: EsLevel::Bes,
        source_type: SignatureSourceType::Prescription,
        structure_error: None,
        references: Vec::new(),
        signature_value: None,
        signing_certificate: Some(SigningCertificateValidationData {
            certificate: Some(CertificateData::new("KeyInfo", None, der)),
            issuer_serial_ref,
            digest_ref,
            path_data: CertificatePathValidationData {
                certificates: evidence,
                ..CertificatePathValidationData::default()
            },
        }),
        signature_timestamp: None,
        archive_timestamps: Vec::new(),
        signature_timestamp_generation_time: None,
        oldest_archive_timestamp_generation_time: None,
    }
}

fn certificate_item(
    pipeline: &SignatureVerificationPipeline,
    signature: &SignatureData,
) -> medsig_verify::VerificationResultItem {
    pipeline
        .verify(signature, Utc::now(), None)
        .items
        .into_iter()
        .find(|i| i.check == CheckKind::SigningCertificate)
        .expect("signing certificate item")
}

#[test]
fn valid_self_signed_signer_passes_all_certificate_checks() {
    let der = generate_signer(
        vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::ContentCommitment,
        ],
        false,
    );

    // references computed from the generated certificate itself
    let (_, cert) = X509Certificate::from_der(&der).unwrap();
    let issuer_serial = IssuerSerialRef {
        issuer: cert.issuer().to_string(),
        serial: cert.tbs_certificate.serial.to_string(),
    };
    let digest_ref = CertificateDigestRef {
        algorithm: "http://www.w3.org/2001/04/xmlenc#sha256".to_string(),
        digest: Sha256::digest(&der).to_vec(),
    };
    drop(cert);

    let config = VerifierConfig::default();
    let pipeline = SignatureVerificationPipeline::new(&config, &NullObserver);
    let signature = signature_with_certificate(
        der.clone(),
        Some(issuer_serial),
        Some(digest_ref),
        vec![der],
    );

    let item = certificate_item(&pipeline, &signature);
    assert_eq!(item.status, VerificationStatus::Valid);
    assert!(item.message.is_empty());
}

#[test]
fn missing_nonrepudiation_short_circuits_before_path_validation() {
    // only digitalSignature; the HPKI check must fail before the (empty)
    // evidence bag could produce a path error
    let der = generate_signer(vec![KeyUsagePurpose::DigitalSignature], false);

    let config = VerifierConfig::default();
    let pipeline = SignatureVerificationPipeline::new(&config, &NullObserver);
    let signature = signature_with_certificate(der, None, None, Vec::new());

    let item = certificate_item(&pipeline, &signature);
    assert_eq!(item.status, VerificationStatus::Invalid);
    assert_eq!(
        item.message,
        "signing certificate lacks the nonRepudiation key usage"
    );
}

#[test]
fn issuer_serial_mismatch_is_a_certificate_mismatch() {
    let der = generate_signer(
        vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::ContentCommitment,
        ],
        false,
    );
    let (_, cert) = X509Certificate::from_der(&der).unwrap();
    let wrong_serial = IssuerSerialRef {
        issuer: cert.issuer().to_string(),
        serial: "0".to_string(),
    };
    drop(cert);

    let config = VerifierConfig::default();
    let pipeline = SignatureVerificationPipeline::new(&config, &NullObserver);
    let signature = signature_with_certificate(der, Some(wrong_serial), None, Vec::new());

    let item = certificate_item(&pipeline, &signature);
    assert_eq!(item.status, VerificationStatus::Invalid);
    assert_eq!(item.message, "certificate mismatch: issuer/serial reference");
}

#[test]
fn digest_reference_mismatch_is_a_certificate_mismatch() {
    let der = generate_signer(
        vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::ContentCommitment,
        ],
        false,
    );
    let wrong_digest = CertificateDigestRef {
        algorithm: "http://www.w3.org/2001/04/xmlenc#sha256".to_string(),
        digest: vec![0u8; 32],
    };

    let config = VerifierConfig::default();
    let pipeline = SignatureVerificationPipeline::new(&config, &NullObserver);
    let signature = signature_with_certificate(der, None, Some(wrong_digest), Vec::new());

    let item = certificate_item(&pipeline, &signature);
    assert_eq!(item.status, VerificationStatus::Invalid);
    assert_eq!(item.message, "certificate mismatch: certificate digest");
}

#[test]
fn self_signed_anchor_validates_at_current_time() {
    let der = generate_signer(vec![KeyUsagePurpose::DigitalSignature], false);
    let evidence = CertificatePathValidationData {
        certificates: vec![der.clone()],
        ..CertificatePathValidationData::default()
    };
    let result = CertificatePathValidator::validate(
        Utc::now(),
        &der,
        &evidence,
        &PathPolicy::default(),
        None,
    );
    assert!(result.is_ok());
}

#[test]
fn expired_end_entity_is_not_within_validity() {
    let der = generate_signer(vec![KeyUsagePurpose::DigitalSignature], true);
    let evidence = CertificatePathValidationData {
        certificates: vec![der.clone()],
        ..CertificatePathValidationData::default()
    };
    let err = CertificatePathValidator::validate(
        Utc::now(),
        &der,
        &evidence,
        &PathPolicy::default(),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, CertPathError::NotWithinValidity));
    assert_eq!(err.status(), VerificationStatus::Invalid);
}
