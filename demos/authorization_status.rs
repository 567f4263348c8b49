//! Query the authorization status of an access key.
//!
//! ```sh
//! cargo run --example authorization_status -- 1501202401123456789000110010010000000011234567818
//! ```

use sri_factura::core::{AccessKey, Environment};
use sri_factura::gateway::{GatewayConfig, HttpTransport, SriGateway};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let Some(raw) = std::env::args().nth(1) else {
        eprintln!("usage: authorization_status <access-key>");
        std::process::exit(2);
    };

    let key = match AccessKey::parse(&raw) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    let components = key.components().expect("parsed key decomposes");
    println!(
        "{} {} issued {} by {}",
        components.document_type.code(),
        components.series.document_number(&components.sequential),
        components.emission_date,
        components.ruc.as_str()
    );

    let environment = components.environment;
    let config = GatewayConfig::new(environment);
    let transport = HttpTransport::new(config.timeout).expect("http client");
    let gateway = SriGateway::new(config, transport);

    match gateway.authorize(key.as_str()).await {
        Ok(result) => {
            println!("status: {:?}", result.status);
            if let Some(date) = &result.authorized_at {
                println!("authorized at {date}");
            }
            for m in &result.messages {
                println!("  {m}");
            }
        }
        Err(e) => eprintln!("query failed: {e}"),
    }

    if environment == Environment::Production {
        println!("(production environment)");
    }
}
