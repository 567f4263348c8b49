//! XAdES-BES signing with PKCS#12 certificates.
//!
//! The signer canonicalizes the document, digests it, builds
//! `SignedProperties` and `SignedInfo`, signs with RSA-SHA256 and appends
//! the `ds:Signature` element as the last child of the root.
//!
//! Certificates come from a [`CertificateProvider`]; the signer does not
//! care whether the bundle lives on disk or in object storage.

mod certificate;
mod xades;

pub use certificate::{
    CertificateProvider, FileCertificateProvider, LoadedCertificate, MemoryCertificateProvider,
};
pub use xades::{SignatureContext, SignatureIds, XadesSigner, ecuador_now, sha256_base64};

/// Canonical XML 1.0 (inclusive, without comments).
pub const C14N_ALGORITHM: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";

/// RSA with SHA-256, PKCS#1 v1.5 padding.
pub const RSA_SHA256_ALGORITHM: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

/// SHA-256 digest.
pub const SHA256_ALGORITHM: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

pub const ENVELOPED_TRANSFORM: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// `Type` of the reference pointing at `SignedProperties`.
pub const SIGNED_PROPERTIES_TYPE: &str = "http://uri.etsi.org/01903#SignedProperties";
