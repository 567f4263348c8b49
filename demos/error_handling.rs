use chrono::NaiveDate;
use rust_decimal_macros::dec;
use sri_factura::core::*;
use sri_factura::gateway::{GatewayConfig, SoapTransport, SriGateway, TransportFailurePolicy};

/// Transport that is always down.
struct Offline;

impl SoapTransport for Offline {
    async fn post(&self, url: &str, _body: String) -> Result<String, SriError> {
        Err(SriError::Transport(format!("connection refused: {url}")))
    }
}

fn issuer(ruc: &str) -> IssuerRecord {
    IssuerRecord {
        ruc: ruc.into(),
        legal_name: "COMERCIAL LOJA S.A.".into(),
        trade_name: None,
        establishment: "001".into(),
        emission_point: "001".into(),
        matrix_address: "Loja".into(),
        establishment_address: None,
        environment: Environment::Test,
        accounting_obligated: false,
        special_taxpayer: None,
        withholding_agent: None,
        rimpe: None,
        default_iva: None,
    }
}

#[tokio::main]
async fn main() {
    let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();

    // ── 1. Malformed RUC is rejected, never padded ────────────────────
    println!("=== Malformed RUC ===");
    let result = InvoiceBuilder::new(date)
        .issuer(issuer("123456789001"))
        .buyer(BuyerRecord::final_consumer())
        .sequential("1")
        .add_line(LineItemInput::new("A", "Item", dec!(1), dec!(5)))
        .add_payment(PaymentInput::full(PaymentMethod::Cash))
        .build();
    if let Err(e) = result {
        println!("  {e}");
    }

    // ── 2. Document rules: all violations reported together ──────────
    println!("\n=== Document Validation ===");
    let result = InvoiceBuilder::new(date)
        .issuer(issuer("1101234567001"))
        .buyer(BuyerRecord::final_consumer())
        .sequential("2")
        .add_line(LineItemInput::new("A", "Refrigeradora", dec!(1), dec!(600)))
        .add_payment(PaymentInput::new(PaymentMethod::Cash, dec!(100)))
        .build();
    if let Err(e) = result {
        println!("  {e}");
    }

    // ── 3. Access key checks happen before any network call ──────────
    println!("\n=== Invalid Access Key ===");
    let gateway = SriGateway::new(GatewayConfig::new(Environment::Test), Offline);
    match gateway.authorize("12345").await {
        Err(e @ SriError::InvalidAccessKey(_)) => println!("  {e}"),
        other => println!("  unexpected: {other:?}"),
    }

    // ── 4. Transport failures and the fallback policy ────────────────
    println!("\n=== Transport Failure ===");
    let strict = SriGateway::new(GatewayConfig::new(Environment::Test), Offline);
    match strict.send_receipt("<factura/>").await {
        Err(e) => println!("  propagated: {e}"),
        Ok(r) => println!("  unexpected: {r:?}"),
    }

    let lenient = SriGateway::new(
        GatewayConfig::new(Environment::Test)
            .with_transport_failure_policy(TransportFailurePolicy::SynthesizeSuccess),
        Offline,
    );
    if let Ok(r) = lenient.send_receipt("<factura/>").await {
        println!("  test environment: {:?} (simulated = {})", r.status, r.simulated);
    }

    let production = SriGateway::new(
        GatewayConfig::new(Environment::Production)
            .with_transport_failure_policy(TransportFailurePolicy::SynthesizeSuccess),
        Offline,
    );
    if let Err(e) = production.send_receipt("<factura/>").await {
        println!("  production ignores the fallback: {e}");
    }
}
