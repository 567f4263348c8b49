use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, FixedOffset, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::certificate::{CertificateProvider, LoadedCertificate};
use super::{
    C14N_ALGORITHM, ENVELOPED_TRANSFORM, RSA_SHA256_ALGORITHM, SHA256_ALGORITHM,
    SIGNED_PROPERTIES_TYPE,
};
use crate::core::SriError;
use crate::xml::writer::XmlWriter;
use crate::xml::{DS_NS, ETSI_NS, canonicalize, canonicalize_subtree};

/// Ecuador mainland offset (UTC-05:00, no daylight saving).
const ECUADOR_OFFSET_SECS: i32 = 5 * 3600;

/// Namespaces in scope for `SignedInfo` and `SignedProperties` inside the
/// signature element.
const SIGNATURE_NAMESPACES: [(&str, &str); 2] = [("xmlns:ds", DS_NS), ("xmlns:etsi", ETSI_NS)];

/// Base64 SHA-256.
pub fn sha256_base64(data: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(data))
}

/// Current time at the UTC-05:00 offset.
pub fn ecuador_now() -> Result<DateTime<FixedOffset>, SriError> {
    let offset = FixedOffset::west_opt(ECUADOR_OFFSET_SECS)
        .ok_or_else(|| SriError::Signing("invalid UTC offset".into()))?;
    Ok(Utc::now().with_timezone(&offset))
}

/// Element IDs of one signature. Fresh for every document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureIds {
    pub signature: String,
    pub signed_info: String,
    pub signed_properties: String,
    pub signed_properties_ref: String,
    pub document_ref: String,
    pub signature_value: String,
    pub key_info: String,
    pub object: String,
}

impl SignatureIds {
    pub fn generate() -> Self {
        Self::from_token(&Uuid::new_v4().simple().to_string())
    }

    fn from_token(token: &str) -> Self {
        let signature = format!("Signature-{token}");
        Self {
            signed_info: format!("{signature}-SignedInfo"),
            signed_properties: format!("{signature}-SignedProperties"),
            signed_properties_ref: format!("SignedPropertiesID-{token}"),
            document_ref: format!("Reference-ID-{token}"),
            signature_value: format!("SignatureValue-{token}"),
            key_info: format!("Certificate-{token}"),
            object: format!("{signature}-Object"),
            signature,
        }
    }
}

/// State of a single sign operation: certificate, IDs, timestamp and digests.
/// Never reused across documents.
#[derive(Debug)]
pub struct SignatureContext {
    pub certificate: LoadedCertificate,
    pub ids: SignatureIds,
    pub signing_time: DateTime<FixedOffset>,
    /// Digest of the canonical document (`Reference URI=""`).
    pub document_digest: String,
    /// Digest of the DER certificate (`CertDigest`).
    pub certificate_digest: String,
    /// Digest of the canonical `SignedProperties`.
    pub signed_properties_digest: String,
}

/// XAdES-BES enveloped signer for SRI documents.
///
/// ```no_run
/// use sri_factura::signing::{FileCertificateProvider, XadesSigner};
///
/// let signer = XadesSigner::new(FileCertificateProvider::new("firma.p12"), "clave");
/// let signed = signer.sign("<factura id=\"comprobante\" version=\"1.1.0\">...</factura>").unwrap();
/// ```
pub struct XadesSigner<P> {
    provider: P,
    password: String,
}

impl<P> std::fmt::Debug for XadesSigner<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XadesSigner").finish_non_exhaustive()
    }
}

impl<P: CertificateProvider> XadesSigner<P> {
    pub fn new(provider: P, password: impl Into<String>) -> Self {
        Self {
            provider,
            password: password.into(),
        }
    }

    /// Sign with the current time.
    pub fn sign(&self, xml: &str) -> Result<String, SriError> {
        self.sign_at(xml, ecuador_now()?)
    }

    /// Sign with an explicit signing time.
    ///
    /// The certificate is loaded from the provider on every call. The result
    /// is the canonical document with `ds:Signature` as the last child of the
    /// root, preceded by the XML declaration.
    pub fn sign_at(
        &self,
        xml: &str,
        signing_time: DateTime<FixedOffset>,
    ) -> Result<String, SriError> {
        let bundle = self.provider.pkcs12()?;
        let certificate = LoadedCertificate::from_pkcs12(&bundle, &self.password)?;
        let issuer_name = certificate.issuer_name()?;
        tracing::debug!(
            subject = %certificate.subject().unwrap_or_default(),
            issuer = %issuer_name,
            "loaded signing certificate"
        );

        let canonical = canonicalize(xml)?;
        let insert_at = canonical
            .rfind("</")
            .ok_or_else(|| SriError::Xml("document has no root element".into()))?;

        let mut ctx = SignatureContext {
            document_digest: sha256_base64(canonical.as_bytes()),
            certificate_digest: sha256_base64(&certificate.der()?),
            signed_properties_digest: String::new(),
            certificate,
            ids: SignatureIds::generate(),
            signing_time,
        };

        let signed_properties = signed_properties_xml(&ctx)?;
        let canonical_properties =
            canonicalize_subtree(&signed_properties, &SIGNATURE_NAMESPACES)?;
        ctx.signed_properties_digest = sha256_base64(canonical_properties.as_bytes());

        let signed_info = signed_info_xml(&ctx)?;
        let canonical_info = canonicalize_subtree(&signed_info, &SIGNATURE_NAMESPACES)?;
        let signature_value =
            STANDARD.encode(ctx.certificate.sign_sha256(canonical_info.as_bytes())?);

        let signature = signature_xml(&ctx, &signed_info, &signature_value, &signed_properties)?;

        let mut out = String::with_capacity(canonical.len() + signature.len() + 40);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        out.push_str(&canonical[..insert_at]);
        out.push_str(&signature);
        out.push_str(&canonical[insert_at..]);

        tracing::info!(signature_id = %ctx.ids.signature, "document signed");
        Ok(out)
    }
}

fn digest_method(w: &mut XmlWriter) -> Result<(), SriError> {
    w.start_element_with_attrs("ds:DigestMethod", &[("Algorithm", SHA256_ALGORITHM)])?;
    w.end_element("ds:DigestMethod")?;
    Ok(())
}

fn signed_properties_xml(ctx: &SignatureContext) -> Result<String, SriError> {
    let mut w = XmlWriter::fragment();
    w.start_element_with_attrs(
        "etsi:SignedProperties",
        &[("Id", ctx.ids.signed_properties.as_str())],
    )?;
    w.start_element("etsi:SignedSignatureProperties")?;
    w.text_element(
        "etsi:SigningTime",
        &ctx.signing_time.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
    )?;
    w.start_element("etsi:SigningCertificate")?;
    w.start_element("etsi:Cert")?;
    w.start_element("etsi:CertDigest")?;
    digest_method(&mut w)?;
    w.text_element("ds:DigestValue", &ctx.certificate_digest)?;
    w.end_element("etsi:CertDigest")?;
    w.start_element("etsi:IssuerSerial")?;
    w.text_element("ds:X509IssuerName", &ctx.certificate.issuer_name()?)?;
    w.text_element("ds:X509SerialNumber", &ctx.certificate.serial_number()?)?;
    w.end_element("etsi:IssuerSerial")?;
    w.end_element("etsi:Cert")?;
    w.end_element("etsi:SigningCertificate")?;
    w.end_element("etsi:SignedSignatureProperties")?;

    w.start_element("etsi:SignedDataObjectProperties")?;
    let object_ref = format!("#{}", ctx.ids.document_ref);
    w.start_element_with_attrs(
        "etsi:DataObjectFormat",
        &[("ObjectReference", object_ref.as_str())],
    )?;
    w.text_element("etsi:Description", "contenido comprobante")?;
    w.text_element("etsi:MimeType", "text/xml")?;
    w.end_element("etsi:DataObjectFormat")?;
    w.end_element("etsi:SignedDataObjectProperties")?;
    w.end_element("etsi:SignedProperties")?;
    w.into_string()
}

fn signed_info_xml(ctx: &SignatureContext) -> Result<String, SriError> {
    let mut w = XmlWriter::fragment();
    w.start_element_with_attrs("ds:SignedInfo", &[("Id", ctx.ids.signed_info.as_str())])?;
    w.start_element_with_attrs("ds:CanonicalizationMethod", &[("Algorithm", C14N_ALGORITHM)])?;
    w.end_element("ds:CanonicalizationMethod")?;
    w.start_element_with_attrs("ds:SignatureMethod", &[("Algorithm", RSA_SHA256_ALGORITHM)])?;
    w.end_element("ds:SignatureMethod")?;

    w.start_element_with_attrs(
        "ds:Reference",
        &[("Id", ctx.ids.document_ref.as_str()), ("URI", "")],
    )?;
    w.start_element("ds:Transforms")?;
    w.start_element_with_attrs("ds:Transform", &[("Algorithm", ENVELOPED_TRANSFORM)])?;
    w.end_element("ds:Transform")?;
    w.end_element("ds:Transforms")?;
    digest_method(&mut w)?;
    w.text_element("ds:DigestValue", &ctx.document_digest)?;
    w.end_element("ds:Reference")?;

    let properties_uri = format!("#{}", ctx.ids.signed_properties);
    w.start_element_with_attrs(
        "ds:Reference",
        &[
            ("Id", ctx.ids.signed_properties_ref.as_str()),
            ("Type", SIGNED_PROPERTIES_TYPE),
            ("URI", properties_uri.as_str()),
        ],
    )?;
    digest_method(&mut w)?;
    w.text_element("ds:DigestValue", &ctx.signed_properties_digest)?;
    w.end_element("ds:Reference")?;

    w.end_element("ds:SignedInfo")?;
    w.into_string()
}

fn signature_xml(
    ctx: &SignatureContext,
    signed_info: &str,
    signature_value: &str,
    signed_properties: &str,
) -> Result<String, SriError> {
    let (modulus, exponent) = ctx.certificate.rsa_key_value()?;
    let target = format!("#{}", ctx.ids.signature);

    let mut w = XmlWriter::fragment();
    w.start_element_with_attrs(
        "ds:Signature",
        &[
            ("xmlns:ds", DS_NS),
            ("xmlns:etsi", ETSI_NS),
            ("Id", ctx.ids.signature.as_str()),
        ],
    )?;
    w.raw(signed_info)?;
    w.text_element_with_attrs(
        "ds:SignatureValue",
        signature_value,
        &[("Id", ctx.ids.signature_value.as_str())],
    )?;

    w.start_element_with_attrs("ds:KeyInfo", &[("Id", ctx.ids.key_info.as_str())])?;
    w.start_element("ds:X509Data")?;
    w.text_element("ds:X509Certificate", &ctx.certificate.der_base64()?)?;
    w.end_element("ds:X509Data")?;
    w.start_element("ds:KeyValue")?;
    w.start_element("ds:RSAKeyValue")?;
    w.text_element("ds:Modulus", &modulus)?;
    w.text_element("ds:Exponent", &exponent)?;
    w.end_element("ds:RSAKeyValue")?;
    w.end_element("ds:KeyValue")?;
    w.end_element("ds:KeyInfo")?;

    w.start_element_with_attrs("ds:Object", &[("Id", ctx.ids.object.as_str())])?;
    w.start_element_with_attrs("etsi:QualifyingProperties", &[("Target", target.as_str())])?;
    w.raw(signed_properties)?;
    w.end_element("etsi:QualifyingProperties")?;
    w.end_element("ds:Object")?;

    w.end_element("ds:Signature")?;
    w.into_string()
}

#[cfg(test)]
mod tests {
    use super::super::certificate::MemoryCertificateProvider;
    use super::super::certificate::test_support::{PASSWORD, pkcs12};
    use super::*;

    const DOC: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<factura xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\" id=\"comprobante\" version=\"1.1.0\">\n  <infoTributaria><ruc>1234567890001</ruc></infoTributaria>\n</factura>";

    fn between<'a>(xml: &'a str, open: &str, close: &str) -> &'a str {
        let start = xml.find(open).unwrap() + open.len();
        let end = start + xml[start..].find(close).unwrap();
        &xml[start..end]
    }

    fn signing_time() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-01-15T10:30:00-05:00").unwrap()
    }

    #[test]
    fn ids_share_one_token() {
        let ids = SignatureIds::from_token("abc");
        assert_eq!(ids.signature, "Signature-abc");
        assert_eq!(ids.signed_properties, "Signature-abc-SignedProperties");
        assert_eq!(ids.document_ref, "Reference-ID-abc");
        assert_ne!(SignatureIds::generate(), SignatureIds::generate());
    }

    #[test]
    fn signature_is_last_child_of_root() {
        let signer = XadesSigner::new(MemoryCertificateProvider::new(pkcs12()), PASSWORD);
        let signed = signer.sign_at(DOC, signing_time()).unwrap();
        assert!(signed.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><factura "));
        assert!(signed.ends_with("</ds:Object></ds:Signature></factura>"));
        assert_eq!(signed.matches("<ds:Signature ").count(), 1);
        assert!(signed.contains("<etsi:SigningTime>2024-01-15T10:30:00-05:00</etsi:SigningTime>"));
    }

    #[test]
    fn document_digest_matches_canonical_input() {
        let signer = XadesSigner::new(MemoryCertificateProvider::new(pkcs12()), PASSWORD);
        let signed = signer.sign_at(DOC, signing_time()).unwrap();
        let reference = between(&signed, "URI=\"\">", "</ds:Reference>");
        let digest = between(reference, "<ds:DigestValue>", "</ds:DigestValue>");
        let expected = sha256_base64(canonicalize(DOC).unwrap().as_bytes());
        assert_eq!(digest, expected);
    }

    #[test]
    fn wrong_password_fails_before_signing() {
        let signer = XadesSigner::new(MemoryCertificateProvider::new(pkcs12()), "x");
        assert!(matches!(
            signer.sign(DOC),
            Err(SriError::CertificateLoad(_))
        ));
    }

    #[test]
    fn malformed_document_is_xml_error() {
        let signer = XadesSigner::new(MemoryCertificateProvider::new(pkcs12()), PASSWORD);
        assert!(matches!(signer.sign("<factura>"), Err(SriError::Xml(_))));
    }
}
