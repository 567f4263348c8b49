use chrono::NaiveDate;
use rust_decimal_macros::dec;
use sri_factura::core::*;
use sri_factura::xml::to_factura_xml;

fn main() {
    let issuer = IssuerRecord {
        ruc: "1791234567001".into(),
        legal_name: "PANADERIA LA UNION CIA. LTDA.".into(),
        trade_name: Some("LA UNION".into()),
        establishment: "001".into(),
        emission_point: "002".into(),
        matrix_address: "Av. 10 de Agosto N21-55, Quito".into(),
        establishment_address: Some("Calle Guayaquil y Olmedo, Quito".into()),
        environment: Environment::Test,
        accounting_obligated: true,
        special_taxpayer: None,
        withholding_agent: None,
        rimpe: Some("CONTRIBUYENTE RÉGIMEN RIMPE".into()),
        default_iva: None,
    };

    let buyer = BuyerRecord {
        identification: "1712345678".into(),
        name: "Juan Carlos Pérez".into(),
        address: Some("La Floresta, Quito".into()),
        email: Some("jcperez@example.com".into()),
        phone: Some("0991234567".into()),
        ..Default::default()
    };

    let mut invoice = InvoiceBuilder::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        .issuer(issuer)
        .buyer(buyer)
        .sequential("152")
        .add_line(
            LineItemInput::new("PAN-01", "Pan integral", dec!(12), dec!(0.25))
                .iva(IvaRate::Zero),
        )
        .add_line(LineItemInput::new("TOR-05", "Torta de chocolate", dec!(1), dec!(18.00)))
        .add_line(
            LineItemInput::new("CAF-02", "Café americano", dec!(2), dec!(1.50))
                .discount(dec!(0.30)),
        )
        .add_payment(PaymentInput::full(PaymentMethod::DebitCard))
        .build()
        .expect("valid invoice");

    let key = attach_access_key(&mut invoice, &AccessKeyGenerator::new()).expect("access key");

    println!("Invoice {}", invoice.document_number());
    println!("Access key: {key}");
    println!("Subtotal:   {}", invoice.invoice_info.total_without_taxes);
    for tax in &invoice.invoice_info.tax_totals {
        println!(
            "IVA code {}: base {} -> {}",
            tax.percentage_code, tax.taxable_base, tax.amount
        );
    }
    println!("Total:      {}", invoice.invoice_info.grand_total);

    let xml = to_factura_xml(&invoice).expect("serializable");
    println!("\n{xml}");
}
