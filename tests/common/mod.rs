#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use sri_factura::core::*;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn issuer() -> IssuerRecord {
    IssuerRecord {
        ruc: "1234567890001".into(),
        legal_name: "DISTRIBUIDORA DEL PACIFICO S.A.".into(),
        trade_name: Some("DIPAC".into()),
        establishment: "001".into(),
        emission_point: "001".into(),
        matrix_address: "Av. 9 de Octubre 100, Guayaquil".into(),
        establishment_address: None,
        environment: Environment::Test,
        accounting_obligated: true,
        special_taxpayer: None,
        withholding_agent: None,
        rimpe: None,
        default_iva: None,
    }
}

pub fn buyer() -> BuyerRecord {
    BuyerRecord {
        identification: "0912345678".into(),
        name: "María José Andrade".into(),
        address: Some("Cdla. Kennedy Norte".into()),
        email: Some("mjandrade@example.com".into()),
        ..Default::default()
    }
}

/// Two lines at 15%: 10.00 + 20.00.
pub fn invoice() -> InvoiceDocument {
    InvoiceBuilder::new(date(2024, 1, 15))
        .issuer(issuer())
        .buyer(buyer())
        .sequential("000000001")
        .add_line(LineItemInput::new("P001", "Cuaderno universitario", dec!(2), dec!(5.00)))
        .add_line(LineItemInput::new("P002", "Mochila escolar", dec!(1), dec!(20.00)))
        .add_payment(PaymentInput::full(PaymentMethod::FinancialSystem))
        .build()
        .unwrap()
}

/// Invoice with an access key built from a fixed numeric code.
pub fn keyed_invoice() -> InvoiceDocument {
    let mut doc = invoice();
    let key = AccessKeyGenerator::new()
        .generate_with_code(access_key_request(&doc), "12345678")
        .unwrap();
    doc.tax_info.access_key = Some(key);
    doc
}

#[cfg(feature = "signing")]
pub mod pki {
    use openssl::asn1::Asn1Time;
    use openssl::bn::BigNum;
    use openssl::hash::MessageDigest;
    use openssl::pkcs12::Pkcs12;
    use openssl::pkey::{PKey, Private};
    use openssl::rsa::Rsa;
    use openssl::x509::{X509, X509NameBuilder};

    pub const PASSWORD: &str = "firma-integracion";

    /// Self-signed RSA certificate and its PKCS#12 bundle.
    pub fn bundle() -> (Vec<u8>, X509, PKey<Private>) {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("C", "EC").unwrap();
        name.append_entry_by_text("O", "SECURITY DATA S.A. 2").unwrap();
        name.append_entry_by_text("CN", "PRUEBAS INTEGRACION").unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(987654321).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        let now = chrono::Utc::now().timestamp();
        builder
            .set_not_before(&Asn1Time::from_unix(now - 86_400).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::from_unix(now + 365 * 86_400).unwrap())
            .unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        let cert = builder.build();

        let der = Pkcs12::builder()
            .name("firma")
            .pkey(&key)
            .cert(&cert)
            .build2(PASSWORD)
            .unwrap()
            .to_der()
            .unwrap();
        (der, cert, key)
    }
}
