//! Certificate fixtures for tests.
//!
//! Mints throwaway CA, leaf, and OCSP responder certificates with rcgen.
//! Available to other crates through the `test-utils` feature.

#![allow(clippy::expect_used)]

use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair,
    KeyUsagePurpose, SerialNumber, SignatureAlgorithm,
};

/// PEM-encoded CA material, kept with its parameters for signing.
pub struct CaBundle {
    pub params: CertificateParams,
    pub key_pair: KeyPair,
    pub cert_pem: String,
    pub key_pem: String,
}

/// PEM-encoded end-entity certificate and key.
pub struct CertBundle {
    pub cert_pem: String,
    pub key_pem: String,
}

/// Generate a self-signed ECDSA P-256 CA.
pub fn generate_ca(common_name: &str) -> CaBundle {
    generate_ca_with(common_name, &rcgen::PKCS_ECDSA_P256_SHA256)
}

/// Generate a self-signed CA with the given key algorithm.
pub fn generate_ca_with(common_name: &str, alg: &'static SignatureAlgorithm) -> CaBundle {
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params.key_usages.push(KeyUsagePurpose::KeyCertSign);
    params.key_usages.push(KeyUsagePurpose::CrlSign);
    params.key_usages.push(KeyUsagePurpose::DigitalSignature);

    let key_pair = KeyPair::generate_for(alg).expect("generate CA key");
    let cert = params.self_signed(&key_pair).expect("self-sign CA");

    CaBundle {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        params,
        key_pair,
    }
}

/// Issue an end-entity certificate with a fixed serial number.
pub fn issue_leaf(ca: &CaBundle, common_name: &str, serial: u64) -> CertBundle {
    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params.serial_number = Some(SerialNumber::from(serial));
    params
        .extended_key_usages
        .push(ExtendedKeyUsagePurpose::ServerAuth);
    sign_with_ca(ca, &params)
}

/// Issue a delegated OCSP responder certificate.
pub fn issue_responder(ca: &CaBundle, common_name: &str) -> CertBundle {
    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params.key_usages.push(KeyUsagePurpose::DigitalSignature);
    params
        .extended_key_usages
        .push(ExtendedKeyUsagePurpose::OcspSigning);
    sign_with_ca(ca, &params)
}

fn sign_with_ca(ca: &CaBundle, params: &CertificateParams) -> CertBundle {
    let issuer = Issuer::from_params(&ca.params, &ca.key_pair);
    let key = KeyPair::generate().expect("generate leaf key");
    let cert = params.signed_by(&key, &issuer).expect("sign leaf");
    CertBundle {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
    }
}
