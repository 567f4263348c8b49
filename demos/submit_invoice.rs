//! Build, sign, submit and poll one invoice against the SRI test environment.
//!
//! Configuration comes from the environment (or a `.env` file), see
//! `sri_factura::config`. With `SRI_FALLBACK=synthesize` the demo completes
//! even when the SRI test service is unreachable; the outcome is then
//! flagged as simulated.

use chrono::Local;
use rust_decimal_macros::dec;
use sri_factura::config::SriConfig;
use sri_factura::core::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match SriConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    println!("{config:?}");

    let invoice = InvoiceBuilder::new(Local::now().date_naive())
        .issuer(IssuerRecord {
            ruc: std::env::var("SRI_ISSUER_RUC").unwrap_or_else(|_| "1234567890001".into()),
            legal_name: "EMPRESA DEMO S.A.".into(),
            trade_name: None,
            establishment: "001".into(),
            emission_point: "001".into(),
            matrix_address: "Cuenca".into(),
            establishment_address: None,
            environment: config.gateway.environment,
            accounting_obligated: false,
            special_taxpayer: None,
            withholding_agent: None,
            rimpe: None,
            default_iva: None,
        })
        .buyer(BuyerRecord {
            identification: "0102030405".into(),
            name: "Cliente Demo".into(),
            email: Some("cliente@example.com".into()),
            ..Default::default()
        })
        .sequential(std::env::var("SRI_SEQUENTIAL").unwrap_or_else(|_| "1".into()))
        .add_line(LineItemInput::new("D-1", "Asesoría contable", dec!(1), dec!(10.00)))
        .add_line(LineItemInput::new("D-2", "Declaración mensual", dec!(1), dec!(20.00)))
        .add_payment(PaymentInput::full(PaymentMethod::FinancialSystem))
        .build()
        .expect("valid invoice");

    let pipeline = match config.pipeline() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    match pipeline.process(invoice).await {
        Ok(outcome) => {
            println!("access key: {}", outcome.access_key);
            println!("state:      {}", outcome.state);
            println!("simulated:  {}", outcome.simulated);
        }
        Err(SriError::Rejected { stage, messages }) => {
            println!("rejected at {stage}:");
            for m in messages {
                println!("  {m}");
            }
        }
        Err(e) => {
            eprintln!("submission failed: {e}");
            std::process::exit(1);
        }
    }
}
