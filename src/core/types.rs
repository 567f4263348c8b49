use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::access_key::AccessKey;
use super::catalog::*;

/// A complete SRI invoice (`factura`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDocument {
    /// `infoTributaria`.
    pub tax_info: TaxInfo,
    /// `infoFactura`.
    pub invoice_info: InvoiceInfo,
    /// `detalles`, in order.
    pub lines: Vec<DetailLine>,
    /// `infoAdicional`.
    pub additional_info: Vec<AdditionalField>,
}

impl InvoiceDocument {
    /// Printed number, e.g. `001-001-000000001`.
    pub fn document_number(&self) -> String {
        format!(
            "{}-{}-{}",
            self.tax_info.establishment, self.tax_info.emission_point, self.tax_info.sequential
        )
    }
}

/// `infoTributaria`: issuer and document identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxInfo {
    pub environment: Environment,
    pub emission_type: EmissionType,
    /// `razonSocial`.
    pub legal_name: String,
    /// `nombreComercial`.
    pub trade_name: Option<String>,
    /// 13-digit RUC.
    pub ruc: String,
    /// `claveAcceso`, attached before signing.
    pub access_key: Option<AccessKey>,
    /// `codDoc`.
    pub document_type: DocumentType,
    /// `estab`, 3 digits.
    pub establishment: String,
    /// `ptoEmi`, 3 digits.
    pub emission_point: String,
    /// `secuencial`, 9 digits.
    pub sequential: String,
    /// `dirMatriz`.
    pub matrix_address: String,
    /// `agenteRetencion` resolution number.
    pub withholding_agent: Option<String>,
    /// `contribuyenteRimpe` legend.
    pub rimpe: Option<String>,
}

/// `infoFactura`: buyer, totals and payments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceInfo {
    pub emission_date: NaiveDate,
    /// `dirEstablecimiento`.
    pub establishment_address: Option<String>,
    /// `contribuyenteEspecial` resolution number.
    pub special_taxpayer: Option<String>,
    /// `obligadoContabilidad` (SI/NO).
    pub accounting_obligated: bool,
    pub buyer_id_type: BuyerIdType,
    /// `razonSocialComprador`.
    pub buyer_name: String,
    /// `identificacionComprador`.
    pub buyer_id: String,
    /// `direccionComprador`.
    pub buyer_address: Option<String>,
    /// `totalSinImpuestos`.
    pub total_without_taxes: Decimal,
    /// `totalDescuento`.
    pub total_discount: Decimal,
    /// `totalConImpuestos`, one entry per tax code + percentage code.
    pub tax_totals: Vec<TaxTotal>,
    /// `propina`.
    pub tip: Decimal,
    /// `importeTotal`.
    pub grand_total: Decimal,
    /// `moneda`.
    pub currency: String,
    /// `pagos`.
    pub payments: Vec<Payment>,
}

/// `totalImpuesto`: aggregate per tax code and rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxTotal {
    pub tax_code: TaxCode,
    /// `codigoPorcentaje`.
    pub percentage_code: String,
    /// Tariff used to compute `amount`.
    pub rate: Decimal,
    /// `baseImponible`.
    pub taxable_base: Decimal,
    /// `valor`.
    pub amount: Decimal,
}

/// `pago`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub amount: Decimal,
    /// `plazo`.
    pub term: Option<u32>,
    /// `unidadTiempo` (e.g. "dias").
    pub time_unit: Option<String>,
}

/// `detalle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailLine {
    /// `codigoPrincipal`.
    pub main_code: String,
    /// `codigoAuxiliar`.
    pub auxiliary_code: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
    /// `precioTotalSinImpuesto`.
    pub total_without_tax: Decimal,
    /// `detallesAdicionales`.
    pub additional_details: Vec<AdditionalField>,
    /// `impuestos`.
    pub taxes: Vec<LineTax>,
}

/// `impuesto` on a detail line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineTax {
    pub tax_code: TaxCode,
    pub percentage_code: String,
    /// `tarifa`.
    pub rate: Decimal,
    pub taxable_base: Decimal,
    pub amount: Decimal,
}

/// Name/value pair (`campoAdicional`, `detAdicional`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalField {
    pub name: String,
    pub value: String,
}

impl AdditionalField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs supplied by the surrounding application
// ---------------------------------------------------------------------------

/// Issuer record as held by the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerRecord {
    pub ruc: String,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub establishment: String,
    pub emission_point: String,
    pub matrix_address: String,
    /// Defaults to `matrix_address` when absent.
    pub establishment_address: Option<String>,
    pub environment: Environment,
    pub accounting_obligated: bool,
    pub special_taxpayer: Option<String>,
    pub withholding_agent: Option<String>,
    pub rimpe: Option<String>,
    /// Overrides the default 15% IVA for lines that don't set their own.
    pub default_iva: Option<IvaRate>,
}

/// Buyer record as held by the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuyerRecord {
    /// Raw identification; empty means final consumer.
    pub identification: String,
    /// Explicit type; inferred from `identification` when absent.
    pub id_type: Option<BuyerIdType>,
    pub name: String,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl BuyerRecord {
    /// Anonymous final consumer.
    pub fn final_consumer() -> Self {
        Self {
            identification: FINAL_CONSUMER_ID.into(),
            id_type: Some(BuyerIdType::FinalConsumer),
            name: FINAL_CONSUMER_NAME.into(),
            ..Default::default()
        }
    }
}

/// One line as supplied by the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemInput {
    pub code: String,
    pub auxiliary_code: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
    /// Per-line IVA; falls back to the issuer/builder default.
    pub iva: Option<IvaRate>,
    pub additional_details: Vec<AdditionalField>,
}

impl LineItemInput {
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Self {
        Self {
            code: code.into(),
            auxiliary_code: None,
            description: description.into(),
            quantity,
            unit_price,
            discount: Decimal::ZERO,
            iva: None,
            additional_details: Vec::new(),
        }
    }

    pub fn discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }

    pub fn iva(mut self, iva: IvaRate) -> Self {
        self.iva = Some(iva);
        self
    }

    pub fn auxiliary_code(mut self, code: impl Into<String>) -> Self {
        self.auxiliary_code = Some(code.into());
        self
    }

    pub fn detail(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_details.push(AdditionalField::new(name, value));
        self
    }
}

/// One payment as supplied by the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInput {
    pub method: PaymentMethod,
    /// `None` takes the grand total; only allowed for a single payment.
    pub amount: Option<Decimal>,
    pub term: Option<u32>,
    pub time_unit: Option<String>,
}

impl PaymentInput {
    pub fn new(method: PaymentMethod, amount: Decimal) -> Self {
        Self {
            method,
            amount: Some(amount),
            term: None,
            time_unit: None,
        }
    }

    /// A payment covering the whole invoice.
    pub fn full(method: PaymentMethod) -> Self {
        Self {
            method,
            amount: None,
            term: None,
            time_unit: None,
        }
    }

    pub fn term(mut self, term: u32, unit: impl Into<String>) -> Self {
        self.term = Some(term);
        self.time_unit = Some(unit.into());
        self
    }
}
