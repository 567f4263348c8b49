use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use openssl::asn1::Asn1Time;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use openssl::x509::{X509, X509NameRef};

use crate::core::SriError;

/// Source of the raw PKCS#12 (`.p12` / `.pfx`) bundle.
///
/// The signer asks for the bytes on every signature, so a rotated
/// certificate is picked up without restarting.
pub trait CertificateProvider {
    fn pkcs12(&self) -> Result<Vec<u8>, SriError>;
}

/// Reads the bundle from a file on each call.
#[derive(Debug, Clone)]
pub struct FileCertificateProvider {
    path: PathBuf,
}

impl FileCertificateProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CertificateProvider for FileCertificateProvider {
    fn pkcs12(&self) -> Result<Vec<u8>, SriError> {
        std::fs::read(&self.path).map_err(|e| {
            SriError::CertificateLoad(format!(
                "failed to read certificate '{}': {e}",
                self.path.display()
            ))
        })
    }
}

/// Holds the bundle in memory, e.g. after fetching it from object storage.
#[derive(Clone)]
pub struct MemoryCertificateProvider {
    bytes: Vec<u8>,
}

impl MemoryCertificateProvider {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl std::fmt::Debug for MemoryCertificateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCertificateProvider")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl CertificateProvider for MemoryCertificateProvider {
    fn pkcs12(&self) -> Result<Vec<u8>, SriError> {
        Ok(self.bytes.clone())
    }
}

impl<P: CertificateProvider + ?Sized> CertificateProvider for std::sync::Arc<P> {
    fn pkcs12(&self) -> Result<Vec<u8>, SriError> {
        (**self).pkcs12()
    }
}

fn load_err(context: &str) -> impl Fn(openssl::error::ErrorStack) -> SriError + '_ {
    move |e| SriError::CertificateLoad(format!("{context}: {e}"))
}

fn sign_err(context: &str) -> impl Fn(openssl::error::ErrorStack) -> SriError + '_ {
    move |e| SriError::Signing(format!("{context}: {e}"))
}

/// Signing certificate and its private key, unpacked from a PKCS#12 bundle.
pub struct LoadedCertificate {
    certificate: X509,
    private_key: PKey<Private>,
}

impl std::fmt::Debug for LoadedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedCertificate")
            .field("subject", &self.subject().unwrap_or_default())
            .finish_non_exhaustive()
    }
}

impl LoadedCertificate {
    /// Unpack a PKCS#12 bundle.
    ///
    /// Bundles from Ecuadorian CAs often carry the CA chain next to the
    /// signing certificate; the one whose public key matches the private key
    /// is selected. Expired or not-yet-valid certificates are refused.
    pub fn from_pkcs12(der: &[u8], password: &str) -> Result<Self, SriError> {
        let bundle = Pkcs12::from_der(der).map_err(load_err("invalid PKCS#12 bundle"))?;
        let parsed = bundle
            .parse2(password)
            .map_err(load_err("cannot open PKCS#12 bundle (wrong password?)"))?;

        let private_key = parsed.pkey.ok_or_else(|| {
            SriError::CertificateLoad("PKCS#12 bundle holds no private key".into())
        })?;

        let mut candidates: Vec<X509> = parsed.cert.into_iter().collect();
        if let Some(ca) = parsed.ca {
            candidates.extend(ca);
        }
        let mut certificate = None;
        for cert in candidates {
            let public = cert
                .public_key()
                .map_err(load_err("unreadable certificate public key"))?;
            if public.public_eq(&private_key) {
                certificate = Some(cert);
                break;
            }
        }
        let certificate = certificate.ok_or_else(|| {
            SriError::CertificateLoad(
                "no certificate in the bundle matches the private key".into(),
            )
        })?;

        let now = Asn1Time::days_from_now(0).map_err(load_err("clock error"))?;
        if certificate
            .not_after()
            .compare(&now)
            .map_err(load_err("invalid validity period"))?
            .is_lt()
        {
            return Err(SriError::CertificateLoad(format!(
                "certificate expired on {}",
                certificate.not_after()
            )));
        }
        if certificate
            .not_before()
            .compare(&now)
            .map_err(load_err("invalid validity period"))?
            .is_gt()
        {
            return Err(SriError::CertificateLoad(format!(
                "certificate not valid before {}",
                certificate.not_before()
            )));
        }

        if private_key.rsa().is_err() {
            return Err(SriError::CertificateLoad(
                "signing key is not an RSA key".into(),
            ));
        }

        Ok(Self {
            certificate,
            private_key,
        })
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    /// DER encoding of the signing certificate.
    pub fn der(&self) -> Result<Vec<u8>, SriError> {
        self.certificate
            .to_der()
            .map_err(sign_err("cannot encode certificate"))
    }

    /// Base64 DER, as embedded in `X509Certificate`.
    pub fn der_base64(&self) -> Result<String, SriError> {
        Ok(STANDARD.encode(self.der()?))
    }

    /// Subject common name, for logging.
    pub fn subject(&self) -> Result<String, SriError> {
        name_entries(self.certificate.subject_name(), &[(Nid::COMMONNAME, "CN")])
    }

    /// Issuer DN as `CN=..,OU=..,O=..,L=..,ST=..,C=..,emailAddress=..`.
    ///
    /// Fields are always in this order and absent fields are omitted. An
    /// entry that cannot be decoded to UTF-8 is a [`SriError::Signing`].
    pub fn issuer_name(&self) -> Result<String, SriError> {
        name_entries(
            self.certificate.issuer_name(),
            &[
                (Nid::COMMONNAME, "CN"),
                (Nid::ORGANIZATIONALUNITNAME, "OU"),
                (Nid::ORGANIZATIONNAME, "O"),
                (Nid::LOCALITYNAME, "L"),
                (Nid::STATEORPROVINCENAME, "ST"),
                (Nid::COUNTRYNAME, "C"),
                (Nid::PKCS9_EMAILADDRESS, "emailAddress"),
            ],
        )
    }

    /// Serial number in decimal.
    pub fn serial_number(&self) -> Result<String, SriError> {
        let bn = self
            .certificate
            .serial_number()
            .to_bn()
            .map_err(sign_err("unreadable serial number"))?;
        let dec = bn.to_dec_str().map_err(sign_err("unreadable serial number"))?;
        Ok(dec.to_string())
    }

    /// Base64 RSA modulus and public exponent for `RSAKeyValue`.
    pub fn rsa_key_value(&self) -> Result<(String, String), SriError> {
        let rsa = self
            .private_key
            .rsa()
            .map_err(sign_err("signing key is not RSA"))?;
        Ok((
            STANDARD.encode(rsa.n().to_vec()),
            STANDARD.encode(rsa.e().to_vec()),
        ))
    }

    /// RSA-SHA256 (PKCS#1 v1.5) signature over `data`.
    pub fn sign_sha256(&self, data: &[u8]) -> Result<Vec<u8>, SriError> {
        let mut signer = Signer::new(MessageDigest::sha256(), &self.private_key)
            .map_err(sign_err("cannot initialise signer"))?;
        signer.update(data).map_err(sign_err("signing failed"))?;
        signer.sign_to_vec().map_err(sign_err("signing failed"))
    }
}

fn name_entries(name: &X509NameRef, fields: &[(Nid, &str)]) -> Result<String, SriError> {
    let mut parts = Vec::new();
    for (nid, label) in fields {
        for entry in name.entries_by_nid(*nid) {
            let value = entry.data().to_string().map_err(|e| {
                SriError::Signing(format!("undecodable {label} entry in certificate name: {e}"))
            })?;
            parts.push(format!("{label}={value}"));
        }
    }
    Ok(parts.join(","))
}


#[cfg(test)]
mod tests {
    use openssl::asn1::Asn1Type;
    use openssl::x509::X509NameBuilder;

    use super::test_support::*;
    use super::*;

    #[test]
    fn loads_valid_bundle() {
        let cert = LoadedCertificate::from_pkcs12(&pkcs12(), PASSWORD).unwrap();
        assert_eq!(cert.subject().unwrap(), "CN=FIRMA DE PRUEBA");
        assert_eq!(
            cert.issuer_name().unwrap(),
            "CN=FIRMA DE PRUEBA,O=ENTIDAD DE PRUEBA,C=EC"
        );
        assert_eq!(cert.serial_number().unwrap(), "123456789");
        let (modulus, exponent) = cert.rsa_key_value().unwrap();
        assert_eq!(exponent, "AQAB");
        assert_eq!(STANDARD.decode(modulus).unwrap().len(), 256);
    }

    #[test]
    fn wrong_password_is_certificate_error() {
        let err = LoadedCertificate::from_pkcs12(&pkcs12(), "otra").unwrap_err();
        assert!(matches!(err, SriError::CertificateLoad(_)));
    }

    #[test]
    fn garbage_is_certificate_error() {
        let err = LoadedCertificate::from_pkcs12(b"not a bundle", PASSWORD).unwrap_err();
        assert!(matches!(err, SriError::CertificateLoad(_)));
    }

    #[test]
    fn expired_certificate_is_refused() {
        let der = pkcs12_with_validity(1_500_000_000, 1_600_000_000);
        let err = LoadedCertificate::from_pkcs12(&der, PASSWORD).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn file_provider_reports_missing_file() {
        let provider = FileCertificateProvider::new("/nonexistent/firma.p12");
        assert!(matches!(
            provider.pkcs12(),
            Err(SriError::CertificateLoad(_))
        ));
    }

    const ISSUER_FIELDS: &[(Nid, &str)] = &[(Nid::COMMONNAME, "CN"), (Nid::COUNTRYNAME, "C")];

    #[test]
    fn bmp_string_entries_are_decoded() {
        let bmp: String = "AUTORIDAD BMP".chars().flat_map(|c| ['\0', c]).collect();
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_nid_with_type(Nid::COMMONNAME, &bmp, Asn1Type::BMPSTRING)
            .unwrap();
        name.append_entry_by_nid(Nid::COUNTRYNAME, "EC").unwrap();
        let name = name.build();

        assert_eq!(
            name_entries(&name, ISSUER_FIELDS).unwrap(),
            "CN=AUTORIDAD BMP,C=EC"
        );
    }

    #[test]
    fn undecodable_entry_is_signing_error() {
        // Three bytes cannot be a BMPString.
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_nid_with_type(Nid::COMMONNAME, "\0A\0", Asn1Type::BMPSTRING)
            .unwrap();
        name.append_entry_by_nid(Nid::COUNTRYNAME, "EC").unwrap();
        let name = name.build();

        let Err(SriError::Signing(msg)) = name_entries(&name, ISSUER_FIELDS) else {
            panic!("expected a signing error");
        };
        assert!(msg.contains("CN entry"));
    }
}
