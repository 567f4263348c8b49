//! SRI offline web services: reception (`validarComprobante`) and
//! authorization (`autorizacionComprobante`).
//!
//! Both calls are SOAP 1.1 over HTTPS. The endpoint table is immutable and
//! injected through [`GatewayConfig`]. When a call fails below the business
//! level, [`TransportFailurePolicy`] decides whether the error propagates or a
//! flagged, synthetic success is returned. Production always propagates.
//!
//! The gateway never retries; polling belongs to the caller.

mod client;
mod config;
pub mod soap;
mod transport;

pub use client::{AuthorizationResult, AuthorizationState, ReceptionResult, SriGateway};
pub use config::{
    DEFAULT_TIMEOUT, EndpointPair, GatewayConfig, PRODUCTION_AUTHORIZATION_URL,
    PRODUCTION_RECEPTION_URL, SriEndpoints, TEST_AUTHORIZATION_URL, TEST_RECEPTION_URL,
    TransportFailurePolicy,
};
pub use soap::{ReceptionStatus, AuthorizationStatus};
pub use transport::{HttpTransport, SoapTransport};
