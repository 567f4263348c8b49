mod common;

use common::*;
use rust_decimal_macros::dec;
use sri_factura::core::*;

// --- Access key ---

#[test]
fn access_key_end_to_end_scenario() {
    let doc = invoice();
    let key = AccessKeyGenerator::new()
        .generate(access_key_request(&doc))
        .unwrap();
    let k = key.as_str();

    assert_eq!(k.len(), 49);
    assert!(k.bytes().all(|b| b.is_ascii_digit()));
    assert_eq!(&k[0..8], "15012024");
    assert_eq!(&k[8..10], "01");
    assert_eq!(&k[10..23], "1234567890001");
    assert_eq!(&k[23..24], "1");
    assert_eq!(&k[24..30], "001001");
    assert_eq!(&k[30..39], "000000001");
    assert_eq!(&k[47..48], "1");

    let expected = modulo11_check_digit(&k[..48]).unwrap();
    assert_eq!(key.check_digit(), expected);
}

#[test]
fn access_key_known_check_digit() {
    let key = AccessKeyGenerator::new()
        .generate_with_code(access_key_request(&invoice()), "12345678")
        .unwrap();
    assert_eq!(
        key.as_str(),
        "1501202401123456789000110010010000000011234567818"
    );
}

#[test]
fn access_key_parse_exposes_components() {
    let key = AccessKey::parse("1501202401123456789000110010010000000011234567818").unwrap();
    let c = key.components().unwrap();
    assert_eq!(c.emission_date, date(2024, 1, 15));
    assert_eq!(c.document_type, DocumentType::Invoice);
    assert_eq!(c.environment, Environment::Test);
    assert_eq!(c.series.establishment(), "001");
    assert_eq!(c.series.emission_point(), "001");
    assert_eq!(c.numeric_code, "12345678");
    assert_eq!(c.emission_type, EmissionType::Normal);
}

#[test]
fn access_key_rejects_malformed() {
    assert!(matches!(
        AccessKey::parse(&"1".repeat(40)),
        Err(SriError::InvalidAccessKey(_))
    ));
    assert!(matches!(
        validate_access_key_format("15012024011234567890001100100100000000112345678A"),
        Err(SriError::InvalidAccessKey(_))
    ));
}

#[test]
fn access_key_other_document_types() {
    let mut req = access_key_request(&invoice());
    req.document_type = DocumentType::CreditNote;
    let key = AccessKeyGenerator::new()
        .generate_with_code(req, "00000001")
        .unwrap();
    assert_eq!(&key.as_str()[8..10], "04");
}

#[test]
fn ruc_is_never_padded_or_truncated() {
    for bad in ["123456789001", "12345678900011", "12345678900A1"] {
        let mut issuer = issuer();
        issuer.ruc = bad.into();
        let result = InvoiceBuilder::new(date(2024, 1, 15))
            .issuer(issuer)
            .buyer(buyer())
            .sequential("1")
            .add_line(LineItemInput::new("A", "Item", dec!(1), dec!(1)))
            .add_payment(PaymentInput::full(PaymentMethod::Cash))
            .build();
        assert!(matches!(result, Err(SriError::Validation(_))), "{bad}");
    }
}

// --- Builder ---

#[test]
fn two_lines_at_fifteen_percent() {
    let doc = invoice();
    let info = &doc.invoice_info;
    assert_eq!(info.total_without_taxes, dec!(30.00));
    assert_eq!(info.total_discount, dec!(0.00));
    assert_eq!(info.tax_totals.len(), 1);
    assert_eq!(info.tax_totals[0].tax_code, TaxCode::Iva);
    assert_eq!(info.tax_totals[0].percentage_code, "4");
    assert_eq!(info.tax_totals[0].taxable_base, dec!(30.00));
    assert_eq!(info.tax_totals[0].amount, dec!(4.50));
    assert_eq!(info.grand_total, dec!(34.50));
    assert_eq!(info.payments.len(), 1);
    assert_eq!(info.payments[0].amount, dec!(34.50));
}

#[test]
fn line_sum_matches_total_without_taxes() {
    let doc = invoice();
    let sum: rust_decimal::Decimal = doc.lines.iter().map(|l| l.total_without_tax).sum();
    assert!((sum - doc.invoice_info.total_without_taxes).abs() <= AMOUNT_TOLERANCE);
}

#[test]
fn buyer_identification_inference() {
    let doc = invoice();
    assert_eq!(doc.invoice_info.buyer_id_type, BuyerIdType::NationalId);

    let mut b = buyer();
    b.identification = "1790012345001".into();
    let doc = InvoiceBuilder::new(date(2024, 1, 15))
        .issuer(issuer())
        .buyer(b)
        .sequential("2")
        .add_line(LineItemInput::new("A", "Item", dec!(1), dec!(10)))
        .add_payment(PaymentInput::full(PaymentMethod::Cash))
        .build()
        .unwrap();
    assert_eq!(doc.invoice_info.buyer_id_type, BuyerIdType::Ruc);
}

#[test]
fn final_consumer_defaults() {
    let doc = InvoiceBuilder::new(date(2024, 1, 15))
        .issuer(issuer())
        .buyer(BuyerRecord::default())
        .sequential("3")
        .add_line(LineItemInput::new("A", "Café pasado", dec!(2), dec!(1.50)))
        .add_payment(PaymentInput::full(PaymentMethod::Cash))
        .build()
        .unwrap();
    assert_eq!(doc.invoice_info.buyer_id_type, BuyerIdType::FinalConsumer);
    assert_eq!(doc.invoice_info.buyer_id, FINAL_CONSUMER_ID);
    assert_eq!(doc.invoice_info.buyer_name, FINAL_CONSUMER_NAME);
}

#[test]
fn final_consumer_above_limit_rejected() {
    let result = InvoiceBuilder::new(date(2024, 1, 15))
        .issuer(issuer())
        .buyer(BuyerRecord::final_consumer())
        .sequential("4")
        .add_line(LineItemInput::new("A", "Televisor", dec!(1), dec!(450)))
        .add_payment(PaymentInput::full(PaymentMethod::Cash))
        .build();
    assert!(matches!(result, Err(SriError::Validation(_))));
}

#[test]
fn mixed_rates_aggregate_separately() {
    let doc = InvoiceBuilder::new(date(2024, 1, 15))
        .issuer(issuer())
        .buyer(buyer())
        .sequential("5")
        .add_line(LineItemInput::new("A", "Arroz", dec!(1), dec!(10)).iva(IvaRate::Zero))
        .add_line(LineItemInput::new("B", "Detergente", dec!(1), dec!(10)))
        .add_payment(PaymentInput::full(PaymentMethod::Cash))
        .build()
        .unwrap();
    assert_eq!(doc.invoice_info.tax_totals.len(), 2);
    assert_eq!(doc.invoice_info.grand_total, dec!(21.50));
}

#[test]
fn discount_reduces_base() {
    let doc = InvoiceBuilder::new(date(2024, 1, 15))
        .issuer(issuer())
        .buyer(buyer())
        .sequential("6")
        .add_line(LineItemInput::new("A", "Servicio", dec!(1), dec!(100)).discount(dec!(10)))
        .add_payment(PaymentInput::full(PaymentMethod::Cash))
        .build()
        .unwrap();
    assert_eq!(doc.invoice_info.total_discount, dec!(10.00));
    assert_eq!(doc.invoice_info.total_without_taxes, dec!(90.00));
    assert_eq!(doc.invoice_info.grand_total, dec!(103.50));
}

#[test]
fn payments_must_cover_total() {
    let result = InvoiceBuilder::new(date(2024, 1, 15))
        .issuer(issuer())
        .buyer(buyer())
        .sequential("7")
        .add_line(LineItemInput::new("A", "Item", dec!(1), dec!(10)))
        .add_payment(PaymentInput::new(PaymentMethod::Cash, dec!(5)))
        .build();
    assert!(matches!(result, Err(SriError::Validation(_))));
}

#[test]
fn split_payments_accepted() {
    let doc = InvoiceBuilder::new(date(2024, 1, 15))
        .issuer(issuer())
        .buyer(buyer())
        .sequential("8")
        .add_line(LineItemInput::new("A", "Item", dec!(1), dec!(10)))
        .add_payment(PaymentInput::new(PaymentMethod::Cash, dec!(5.00)))
        .add_payment(PaymentInput::new(PaymentMethod::CreditCard, dec!(6.50)).term(30, "dias"))
        .build()
        .unwrap();
    assert_eq!(doc.invoice_info.payments.len(), 2);
    assert_eq!(doc.invoice_info.payments[1].term, Some(30));
}

#[test]
fn missing_buyer_is_not_found() {
    let result = InvoiceBuilder::new(date(2024, 1, 15))
        .issuer(issuer())
        .sequential("9")
        .add_line(LineItemInput::new("A", "Item", dec!(1), dec!(10)))
        .add_payment(PaymentInput::full(PaymentMethod::Cash))
        .build();
    assert!(matches!(result, Err(SriError::NotFound(_))));
}

#[test]
fn empty_lines_rejected() {
    let result = InvoiceBuilder::new(date(2024, 1, 15))
        .issuer(issuer())
        .buyer(buyer())
        .sequential("10")
        .add_payment(PaymentInput::full(PaymentMethod::Cash))
        .build();
    assert!(matches!(result, Err(SriError::Validation(_))));
}

// --- Validation ---

#[test]
fn validate_detects_tampered_totals() {
    let mut doc = invoice();
    assert!(validate_invoice(&doc).is_empty());
    doc.invoice_info.total_without_taxes = dec!(31.00);
    let errors = validate_arithmetic(&doc);
    assert!(!errors.is_empty());
}

#[test]
fn rounding_is_half_up() {
    assert_eq!(round_half_up(dec!(0.125), 2), dec!(0.13));
    assert_eq!(round_half_up(dec!(2.675), 2), dec!(2.68));
    assert_eq!(round_half_up(dec!(-0.125), 2), dec!(-0.13));
}

#[test]
fn iva_catalog_codes() {
    assert_eq!(IvaRate::default(), IvaRate::Fifteen);
    assert_eq!(IvaRate::Fifteen.code(), "4");
    assert_eq!(IvaRate::Twelve.code(), "2");
    assert_eq!(IvaRate::Fifteen.rate(), dec!(15));
    assert_eq!(IvaRate::from_code("10"), Some(IvaRate::Thirteen));
    assert_eq!(PaymentMethod::FinancialSystem.code(), "20");
    assert_eq!(infer_buyer_id_type("1790012345001"), BuyerIdType::Ruc);
    assert_eq!(infer_buyer_id_type("0912345678"), BuyerIdType::NationalId);
    assert_eq!(infer_buyer_id_type(""), BuyerIdType::FinalConsumer);
}
