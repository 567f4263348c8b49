//! SRI XML generation and canonicalization.
//!
//! - [`to_factura_xml`] renders an [`InvoiceDocument`](crate::core::InvoiceDocument)
//!   as `factura` 1.1.0 XML in the exact XSD element order.
//! - [`canonicalize`] / [`canonicalize_subtree`] produce the C14N form used
//!   for signature digests.
//!
//! # Example
//!
//! ```no_run
//! use sri_factura::core::*;
//! use sri_factura::xml;
//!
//! let doc: InvoiceDocument = todo!(); // build via InvoiceBuilder, then attach_access_key
//! let xml = xml::to_factura_xml(&doc).unwrap();
//! let canonical = xml::canonicalize(&xml).unwrap();
//! ```

mod c14n;
mod factura;
pub(crate) mod writer;

pub use c14n::{canonicalize, canonicalize_subtree};
pub use factura::to_factura_xml;
pub use writer::{format_amount, format_quantity, normalize_text};

/// Version attribute of the `factura` root element.
pub const FACTURA_VERSION: &str = "1.1.0";

/// XML-DSig namespace, declared on the root before signing.
pub const DS_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XAdES 1.3.2 namespace.
pub const ETSI_NS: &str = "http://uri.etsi.org/01903/v1.3.2#";
