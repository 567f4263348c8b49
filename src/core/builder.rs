use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::access_key::{AccessKey, AccessKeyGenerator, AccessKeyRequest};
use super::catalog::*;
use super::error::SriError;
use super::numbering::{Ruc, Series, normalize_sequential};
use super::types::*;
use super::validation;

/// Builder for SRI invoices.
///
/// ```
/// use sri_factura::core::*;
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let issuer = IssuerRecord {
///     ruc: "1234567890001".into(),
///     legal_name: "COMERCIAL ANDINA S.A.".into(),
///     trade_name: None,
///     establishment: "001".into(),
///     emission_point: "001".into(),
///     matrix_address: "Av. Amazonas N34-12, Quito".into(),
///     establishment_address: None,
///     environment: Environment::Test,
///     accounting_obligated: true,
///     special_taxpayer: None,
///     withholding_agent: None,
///     rimpe: None,
///     default_iva: None,
/// };
///
/// let doc = InvoiceBuilder::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
///     .issuer(issuer)
///     .buyer(BuyerRecord::final_consumer())
///     .sequential("1")
///     .add_line(LineItemInput::new("P001", "Café molido 500g", dec!(2), dec!(5.00)))
///     .add_payment(PaymentInput::full(PaymentMethod::Cash))
///     .build()
///     .unwrap();
///
/// assert_eq!(doc.invoice_info.grand_total, dec!(11.50));
/// ```
pub struct InvoiceBuilder {
    emission_date: NaiveDate,
    issuer: Option<IssuerRecord>,
    buyer: Option<BuyerRecord>,
    sequential: Option<String>,
    lines: Vec<LineItemInput>,
    payments: Vec<PaymentInput>,
    tip: Decimal,
    default_iva: Option<IvaRate>,
    currency: String,
    additional_info: Vec<AdditionalField>,
}

impl InvoiceBuilder {
    pub fn new(emission_date: NaiveDate) -> Self {
        Self {
            emission_date,
            issuer: None,
            buyer: None,
            sequential: None,
            lines: Vec::new(),
            payments: Vec::new(),
            tip: Decimal::ZERO,
            default_iva: None,
            currency: "DOLAR".to_string(),
            additional_info: Vec::new(),
        }
    }

    pub fn issuer(mut self, issuer: IssuerRecord) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn buyer(mut self, buyer: BuyerRecord) -> Self {
        self.buyer = Some(buyer);
        self
    }

    /// Sequential as text, padded to nine digits.
    pub fn sequential(mut self, sequential: impl Into<String>) -> Self {
        self.sequential = Some(sequential.into());
        self
    }

    pub fn add_line(mut self, line: LineItemInput) -> Self {
        self.lines.push(line);
        self
    }

    pub fn add_payment(mut self, payment: PaymentInput) -> Self {
        self.payments.push(payment);
        self
    }

    pub fn tip(mut self, tip: Decimal) -> Self {
        self.tip = tip;
        self
    }

    /// System-wide IVA default; the issuer record's override wins over it.
    pub fn default_iva(mut self, iva: IvaRate) -> Self {
        self.default_iva = Some(iva);
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn additional_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_info.push(AdditionalField::new(name, value));
        self
    }

    /// Build the document, computing totals and running validation.
    /// Returns all validation errors (not just the first).
    pub fn build(self) -> Result<InvoiceDocument, SriError> {
        let issuer = self
            .issuer
            .ok_or_else(|| SriError::NotFound("issuer record is required".into()))?;
        let buyer = self
            .buyer
            .ok_or_else(|| SriError::NotFound("buyer record is required".into()))?;

        if self.lines.is_empty() {
            return Err(SriError::Validation(
                "at least one line item is required".into(),
            ));
        }
        if self.payments.is_empty() {
            return Err(SriError::Validation("at least one payment is required".into()));
        }
        if self.lines.len() > 10_000 {
            return Err(SriError::Validation(
                "invoice cannot have more than 10,000 line items".into(),
            ));
        }
        if self.tip < Decimal::ZERO {
            return Err(SriError::Validation("tip must not be negative".into()));
        }

        let ruc = Ruc::parse(&issuer.ruc)?;
        let series = Series::new(&issuer.establishment, &issuer.emission_point)?;
        let sequential = normalize_sequential(
            self.sequential
                .as_deref()
                .ok_or_else(|| SriError::Validation("sequential is required".into()))?,
        )?;

        let default_iva = issuer
            .default_iva
            .or(self.default_iva)
            .unwrap_or_default();
        let lines = validation::calculate_lines(&self.lines, default_iva);
        let tax_totals = validation::aggregate_taxes(&lines);

        let total_without_taxes: Decimal = lines.iter().map(|l| l.total_without_tax).sum();
        let total_discount: Decimal = lines.iter().map(|l| l.discount).sum();
        let tax_sum: Decimal = tax_totals.iter().map(|t| t.amount).sum();
        let tip = validation::round_half_up(self.tip, 2);
        let grand_total = total_without_taxes + tax_sum + tip;

        let payments = resolve_payments(self.payments, grand_total)?;
        let (buyer_id_type, buyer_id, buyer_name) = resolve_buyer(&buyer);

        let mut additional_info = self.additional_info;
        if let Some(email) = buyer.email.as_deref().filter(|e| !e.trim().is_empty()) {
            additional_info.push(AdditionalField::new("Email", email.trim()));
        }
        if let Some(phone) = buyer.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            additional_info.push(AdditionalField::new("Telefono", phone.trim()));
        }

        let doc = InvoiceDocument {
            tax_info: TaxInfo {
                environment: issuer.environment,
                emission_type: EmissionType::Normal,
                legal_name: issuer.legal_name,
                trade_name: issuer.trade_name.filter(|n| !n.trim().is_empty()),
                ruc: ruc.to_string(),
                access_key: None,
                document_type: DocumentType::Invoice,
                establishment: series.establishment().to_string(),
                emission_point: series.emission_point().to_string(),
                sequential,
                matrix_address: issuer.matrix_address.clone(),
                withholding_agent: issuer.withholding_agent,
                rimpe: issuer.rimpe,
            },
            invoice_info: InvoiceInfo {
                emission_date: self.emission_date,
                establishment_address: issuer
                    .establishment_address
                    .or(Some(issuer.matrix_address)),
                special_taxpayer: issuer.special_taxpayer,
                accounting_obligated: issuer.accounting_obligated,
                buyer_id_type,
                buyer_name,
                buyer_id,
                buyer_address: buyer.address.filter(|a| !a.trim().is_empty()),
                total_without_taxes,
                total_discount,
                tax_totals,
                tip,
                grand_total,
                currency: self.currency,
                payments,
            },
            lines,
            additional_info,
        };

        let errors = validation::validate_invoice(&doc);
        if !errors.is_empty() {
            let msg = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SriError::Validation(msg));
        }

        Ok(doc)
    }
}

fn resolve_payments(
    inputs: Vec<PaymentInput>,
    grand_total: Decimal,
) -> Result<Vec<Payment>, SriError> {
    let open = inputs.iter().filter(|p| p.amount.is_none()).count();
    if open > 0 && inputs.len() > 1 {
        return Err(SriError::Validation(
            "only a single payment may omit its amount".into(),
        ));
    }
    Ok(inputs
        .into_iter()
        .map(|p| Payment {
            method: p.method,
            amount: p
                .amount
                .map(|a| validation::round_half_up(a, 2))
                .unwrap_or(grand_total),
            term: p.term,
            time_unit: p.time_unit,
        })
        .collect())
}

/// Resolve buyer identification type, id and name.
///
/// Without an explicit type the id decides: 13 digits is a RUC, 10 digits a
/// cédula, anything else the anonymous final consumer.
fn resolve_buyer(buyer: &BuyerRecord) -> (BuyerIdType, String, String) {
    let id = buyer.identification.trim();
    let id_type = buyer.id_type.unwrap_or_else(|| infer_buyer_id_type(id));
    if id_type == BuyerIdType::FinalConsumer {
        let name = if buyer.name.trim().is_empty() {
            FINAL_CONSUMER_NAME.to_string()
        } else {
            buyer.name.trim().to_string()
        };
        return (id_type, FINAL_CONSUMER_ID.to_string(), name);
    }
    (id_type, id.to_string(), buyer.name.trim().to_string())
}

/// Derive the access key from the document's tax fields and attach it.
///
/// Returns the key for lookup/display. Attaching replaces any previous key.
pub fn attach_access_key(
    doc: &mut InvoiceDocument,
    generator: &AccessKeyGenerator,
) -> Result<AccessKey, SriError> {
    let key = generator.generate(access_key_request(doc))?;
    doc.tax_info.access_key = Some(key.clone());
    Ok(key)
}

/// The key-generation input for a document.
pub fn access_key_request(doc: &InvoiceDocument) -> AccessKeyRequest {
    AccessKeyRequest {
        emission_date: doc.invoice_info.emission_date,
        document_type: doc.tax_info.document_type,
        ruc: doc.tax_info.ruc.clone(),
        environment: doc.tax_info.environment,
        establishment: doc.tax_info.establishment.clone(),
        emission_point: doc.tax_info.emission_point.clone(),
        sequential: doc.tax_info.sequential.clone(),
        emission_type: doc.tax_info.emission_type,
    }
}

/// Check that the access key a document carries describes that document.
///
/// A document without a key passes. Any field of the key that disagrees
/// with the tax info (or the emission date) is a validation error.
pub fn verify_access_key(doc: &InvoiceDocument) -> Result<(), SriError> {
    let Some(key) = &doc.tax_info.access_key else {
        return Ok(());
    };
    let c = key.components()?;
    let tax = &doc.tax_info;

    let mut mismatched = Vec::new();
    if c.emission_date != doc.invoice_info.emission_date {
        mismatched.push("emission date");
    }
    if c.document_type != tax.document_type {
        mismatched.push("document type");
    }
    if c.ruc.as_str() != tax.ruc {
        mismatched.push("RUC");
    }
    if c.environment != tax.environment {
        mismatched.push("environment");
    }
    if c.series.establishment() != tax.establishment
        || c.series.emission_point() != tax.emission_point
    {
        mismatched.push("series");
    }
    if c.sequential != tax.sequential {
        mismatched.push("sequential");
    }
    if c.emission_type != tax.emission_type {
        mismatched.push("emission type");
    }

    if mismatched.is_empty() {
        Ok(())
    } else {
        Err(SriError::Validation(format!(
            "access key {key} does not match the document: {}",
            mismatched.join(", ")
        )))
    }
}
