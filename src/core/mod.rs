//! Core invoice types, access keys, validation, and numbering.
//!
//! This module provides the document model for SRI electronic invoices
//! (`factura` 1.1.0), the modulo-11 access key, and the arithmetic checks
//! the SRI applies on reception.

mod access_key;
mod builder;
mod catalog;
mod error;
mod numbering;
mod types;
mod validation;

pub use access_key::*;
pub use builder::*;
pub use catalog::*;
pub use error::*;
pub use numbering::*;
pub use types::*;
pub use validation::*;
