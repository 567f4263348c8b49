#![cfg(feature = "signing")]

mod common;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{FixedOffset, TimeZone};
use openssl::hash::MessageDigest;
use openssl::sign::Verifier;
use sri_factura::core::SriError;
use sri_factura::signing::*;
use sri_factura::xml::{DS_NS, ETSI_NS, canonicalize, canonicalize_subtree, to_factura_xml};

use common::keyed_invoice;
use common::pki::{PASSWORD, bundle};

fn between<'a>(xml: &'a str, open: &str, close: &str) -> &'a str {
    let start = xml.find(open).unwrap_or_else(|| panic!("missing {open}"));
    let end = xml[start..].find(close).unwrap_or_else(|| panic!("missing {close}")) + start;
    &xml[start..end + close.len()]
}

fn text_of<'a>(xml: &'a str, tag: &str) -> &'a str {
    let open = format!("<{tag}");
    let start = xml.find(&open).unwrap_or_else(|| panic!("missing {tag}"));
    let body = start + xml[start..].find('>').unwrap() + 1;
    let end = body + xml[body..].find(&format!("</{tag}>")).unwrap();
    &xml[body..end]
}

fn signing_time() -> chrono::DateTime<FixedOffset> {
    FixedOffset::west_opt(5 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 1, 15, 10, 30, 0)
        .unwrap()
}

#[test]
fn signed_invoice_verifies_against_embedded_certificate() {
    let (p12, cert, _) = bundle();
    let xml = to_factura_xml(&keyed_invoice()).unwrap();
    let signer = XadesSigner::new(MemoryCertificateProvider::new(p12), PASSWORD);
    let signed = signer.sign_at(&xml, signing_time()).unwrap();

    let signed_info = between(&signed, "<ds:SignedInfo", "</ds:SignedInfo>");
    let canonical_info =
        canonicalize_subtree(signed_info, &[("xmlns:ds", DS_NS), ("xmlns:etsi", ETSI_NS)]).unwrap();
    let signature = STANDARD
        .decode(text_of(&signed, "ds:SignatureValue"))
        .unwrap();

    let embedded = STANDARD
        .decode(text_of(&signed, "ds:X509Certificate"))
        .unwrap();
    assert_eq!(embedded, cert.to_der().unwrap());

    let public_key = cert.public_key().unwrap();
    let mut verifier = Verifier::new(MessageDigest::sha256(), &public_key).unwrap();
    verifier.update(canonical_info.as_bytes()).unwrap();
    assert!(verifier.verify(&signature).unwrap());
}

#[test]
fn document_digest_matches_enveloped_transform() {
    let (p12, _, _) = bundle();
    let xml = to_factura_xml(&keyed_invoice()).unwrap();
    let signer = XadesSigner::new(MemoryCertificateProvider::new(p12), PASSWORD);
    let signed = signer.sign_at(&xml, signing_time()).unwrap();

    let signature = between(&signed, "<ds:Signature ", "</ds:Signature>");
    let without_signature = signed.replace(signature, "");
    let recomputed = sha256_base64(canonicalize(&without_signature).unwrap().as_bytes());
    let expected = sha256_base64(canonicalize(&xml).unwrap().as_bytes());
    assert_eq!(recomputed, expected);

    let document_reference = between(&signed, "URI=\"\"", "</ds:Reference>");
    assert_eq!(text_of(document_reference, "ds:DigestValue"), expected);
}

#[test]
fn signed_properties_digest_is_consistent() {
    let (p12, _, _) = bundle();
    let xml = to_factura_xml(&keyed_invoice()).unwrap();
    let signer = XadesSigner::new(MemoryCertificateProvider::new(p12), PASSWORD);
    let signed = signer.sign_at(&xml, signing_time()).unwrap();

    let properties = between(&signed, "<etsi:SignedProperties", "</etsi:SignedProperties>");
    let digest = sha256_base64(
        canonicalize_subtree(properties, &[("xmlns:ds", DS_NS), ("xmlns:etsi", ETSI_NS)])
            .unwrap()
            .as_bytes(),
    );
    let reference = between(&signed, SIGNED_PROPERTIES_TYPE, "</ds:Reference>");
    assert_eq!(text_of(reference, "ds:DigestValue"), digest);
    assert!(properties.contains("<etsi:SigningTime>2024-01-15T10:30:00-05:00</etsi:SigningTime>"));
    assert!(properties.contains("<ds:X509SerialNumber>987654321</ds:X509SerialNumber>"));
}

#[test]
fn signature_is_last_child_of_factura() {
    let (p12, _, _) = bundle();
    let xml = to_factura_xml(&keyed_invoice()).unwrap();
    let signed = XadesSigner::new(MemoryCertificateProvider::new(p12), PASSWORD)
        .sign(&xml)
        .unwrap();
    assert!(signed.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><factura"));
    assert!(signed.ends_with("</ds:Signature></factura>"));
    assert_eq!(signed.matches("<ds:Signature ").count(), 1);
}

#[test]
fn key_info_carries_rsa_key_value() {
    let (p12, _, key) = bundle();
    let xml = to_factura_xml(&keyed_invoice()).unwrap();
    let signed = XadesSigner::new(MemoryCertificateProvider::new(p12), PASSWORD)
        .sign(&xml)
        .unwrap();
    let modulus = STANDARD.decode(text_of(&signed, "ds:Modulus")).unwrap();
    assert_eq!(modulus, key.rsa().unwrap().n().to_vec());
    assert_eq!(text_of(&signed, "ds:Exponent"), "AQAB");
}

#[test]
fn wrong_password_is_certificate_error() {
    let (p12, _, _) = bundle();
    let xml = to_factura_xml(&keyed_invoice()).unwrap();
    let result = XadesSigner::new(MemoryCertificateProvider::new(p12), "incorrecta").sign(&xml);
    assert!(matches!(result, Err(SriError::CertificateLoad(_))));
}

#[test]
fn certificate_is_read_on_every_signature() {
    let dir = std::env::temp_dir().join(format!("sri-factura-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("firma.p12");

    let signer = XadesSigner::new(FileCertificateProvider::new(&path), PASSWORD);
    let xml = to_factura_xml(&keyed_invoice()).unwrap();
    assert!(matches!(signer.sign(&xml), Err(SriError::CertificateLoad(_))));

    std::fs::write(&path, bundle().0).unwrap();
    assert!(signer.sign(&xml).is_ok());

    std::fs::remove_dir_all(&dir).unwrap();
}
