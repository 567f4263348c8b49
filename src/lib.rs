//! # sri-factura
//!
//! Electronic invoicing for Ecuador's SRI (Servicio de Rentas Internas),
//! offline scheme: access key generation, `factura` v1.1.0 XML, XAdES-BES
//! signatures and the reception/authorization SOAP exchange.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//! use sri_factura::core::*;
//!
//! let issuer = IssuerRecord {
//!     ruc: "1234567890001".into(),
//!     legal_name: "EMPRESA DE PRUEBA S.A.".into(),
//!     trade_name: None,
//!     establishment: "001".into(),
//!     emission_point: "001".into(),
//!     matrix_address: "Av. Amazonas N34-451, Quito".into(),
//!     establishment_address: None,
//!     environment: Environment::Test,
//!     accounting_obligated: false,
//!     special_taxpayer: None,
//!     withholding_agent: None,
//!     rimpe: None,
//!     default_iva: None,
//! };
//!
//! let mut invoice = InvoiceBuilder::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
//!     .issuer(issuer)
//!     .buyer(BuyerRecord::final_consumer())
//!     .sequential("1")
//!     .add_line(LineItemInput::new("P001", "Producto A", dec!(1), dec!(10)))
//!     .add_line(LineItemInput::new("P002", "Producto B", dec!(2), dec!(10)))
//!     .add_payment(PaymentInput::full(PaymentMethod::Cash))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(invoice.invoice_info.total_without_taxes, dec!(30.00));
//! assert_eq!(invoice.invoice_info.grand_total, dec!(34.50));
//!
//! let key = attach_access_key(&mut invoice, &AccessKeyGenerator::new()).unwrap();
//! assert_eq!(key.as_str().len(), 49);
//! assert_eq!(&key.as_str()[..8], "15012024");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` | Document types, builder, validation, access keys, SRI catalogs |
//! | `xml` | `factura` serializer and XML canonicalizer |
//! | `signing` | PKCS#12 loading and XAdES-BES signatures |
//! | `gateway` | SOAP reception and authorization client |
//! | `pipeline` | Lifecycle state machine, polling, environment config |
//! | `all` (default) | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "xml")]
pub mod xml;

#[cfg(feature = "signing")]
pub mod signing;

#[cfg(feature = "gateway")]
pub mod gateway;

#[cfg(feature = "pipeline")]
pub mod pipeline;

#[cfg(feature = "pipeline")]
pub mod config;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
