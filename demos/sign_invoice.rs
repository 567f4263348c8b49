//! Sign a `factura` with a PKCS#12 certificate.
//!
//! ```sh
//! SRI_CERT_PATH=firma.p12 SRI_CERT_PASSWORD=... cargo run --example sign_invoice
//! ```

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use sri_factura::core::*;
use sri_factura::signing::{FileCertificateProvider, XadesSigner};
use sri_factura::xml::to_factura_xml;
use tracing_subscriber::EnvFilter;

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::var("SRI_CERT_PATH").expect("SRI_CERT_PATH must point at a .p12 file");
    let password = std::env::var("SRI_CERT_PASSWORD").expect("SRI_CERT_PASSWORD is required");

    let mut invoice = InvoiceBuilder::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        .issuer(IssuerRecord {
            ruc: "0992345678001".into(),
            legal_name: "IMPORTADORA COSTA AZUL S.A.".into(),
            trade_name: None,
            establishment: "001".into(),
            emission_point: "001".into(),
            matrix_address: "Av. Francisco de Orellana, Guayaquil".into(),
            establishment_address: None,
            environment: Environment::Test,
            accounting_obligated: true,
            special_taxpayer: Some("12345".into()),
            withholding_agent: Some("1".into()),
            rimpe: None,
            default_iva: None,
        })
        .buyer(BuyerRecord::final_consumer())
        .sequential("1")
        .add_line(LineItemInput::new("001", "Servicio de envío", dec!(1), dec!(12.50)))
        .add_payment(PaymentInput::full(PaymentMethod::Cash))
        .build()
        .expect("valid invoice");
    attach_access_key(&mut invoice, &AccessKeyGenerator::new()).expect("access key");

    let xml = to_factura_xml(&invoice).expect("serializable");
    let signer = XadesSigner::new(FileCertificateProvider::new(path), password);

    match signer.sign(&xml) {
        Ok(signed) => println!("{signed}"),
        Err(e) => {
            eprintln!("signing failed: {e}");
            std::process::exit(1);
        }
    }
}
