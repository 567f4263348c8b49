//! SRI code tables (Ficha Técnica de Comprobantes Electrónicos).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `ambiente`: target SRI environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    /// 1: Pruebas (celcer.sri.gob.ec).
    Test,
    /// 2: Producción (cel.sri.gob.ec).
    Production,
}

impl Environment {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Test => "1",
            Self::Production => "2",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "1" => Some(Self::Test),
            "2" => Some(Self::Production),
            _ => None,
        }
    }

    /// Label used by the authorization service (`<ambiente>`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Test => "PRUEBAS",
            Self::Production => "PRODUCCION",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Test => write!(f, "test"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// `tipoEmision`: only normal emission is in use since offline mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EmissionType {
    /// 1: Emisión normal.
    #[default]
    Normal,
}

impl EmissionType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Normal => "1",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Normal),
            _ => None,
        }
    }
}

/// `codDoc`: voucher type (Tabla 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DocumentType {
    /// 01: Factura.
    #[default]
    Invoice,
    /// 03: Liquidación de compra de bienes y prestación de servicios.
    PurchaseSettlement,
    /// 04: Nota de crédito.
    CreditNote,
    /// 05: Nota de débito.
    DebitNote,
    /// 06: Guía de remisión.
    Waybill,
    /// 07: Comprobante de retención.
    Withholding,
}

impl DocumentType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invoice => "01",
            Self::PurchaseSettlement => "03",
            Self::CreditNote => "04",
            Self::DebitNote => "05",
            Self::Waybill => "06",
            Self::Withholding => "07",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::Invoice),
            "03" => Some(Self::PurchaseSettlement),
            "04" => Some(Self::CreditNote),
            "05" => Some(Self::DebitNote),
            "06" => Some(Self::Waybill),
            "07" => Some(Self::Withholding),
            _ => None,
        }
    }
}

/// `codigo` of a tax entry (Tabla 16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxCode {
    /// 2: IVA.
    Iva,
    /// 3: ICE.
    Ice,
    /// 5: IRBPNR.
    Irbpnr,
}

impl TaxCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Iva => "2",
            Self::Ice => "3",
            Self::Irbpnr => "5",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "2" => Some(Self::Iva),
            "3" => Some(Self::Ice),
            "5" => Some(Self::Irbpnr),
            _ => None,
        }
    }
}

/// `codigoPorcentaje` for IVA (Tabla 17).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum IvaRate {
    /// 0: 0%.
    Zero,
    /// 2: 12%.
    Twelve,
    /// 3: 14%.
    Fourteen,
    /// 4: 15%.
    #[default]
    Fifteen,
    /// 5: 5%.
    Five,
    /// 6: No objeto de impuesto.
    NotSubject,
    /// 7: Exento de IVA.
    Exempt,
    /// 8: IVA diferenciado (8%).
    Eight,
    /// 10: 13%.
    Thirteen,
}

impl IvaRate {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::Twelve => "2",
            Self::Fourteen => "3",
            Self::Fifteen => "4",
            Self::Five => "5",
            Self::NotSubject => "6",
            Self::Exempt => "7",
            Self::Eight => "8",
            Self::Thirteen => "10",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(Self::Zero),
            "2" => Some(Self::Twelve),
            "3" => Some(Self::Fourteen),
            "4" => Some(Self::Fifteen),
            "5" => Some(Self::Five),
            "6" => Some(Self::NotSubject),
            "7" => Some(Self::Exempt),
            "8" => Some(Self::Eight),
            "10" => Some(Self::Thirteen),
            _ => None,
        }
    }

    /// Tariff percentage (`tarifa`).
    pub fn rate(&self) -> Decimal {
        match self {
            Self::Zero | Self::NotSubject | Self::Exempt => Decimal::ZERO,
            Self::Twelve => Decimal::from(12),
            Self::Fourteen => Decimal::from(14),
            Self::Fifteen => Decimal::from(15),
            Self::Five => Decimal::from(5),
            Self::Eight => Decimal::from(8),
            Self::Thirteen => Decimal::from(13),
        }
    }

    /// Map a plain percentage to its taxable code. Zero maps to `Zero`,
    /// never to `NotSubject`/`Exempt`, which must be chosen explicitly.
    pub fn from_rate(rate: Decimal) -> Option<Self> {
        let rate = rate.normalize();
        [
            Self::Zero,
            Self::Five,
            Self::Eight,
            Self::Twelve,
            Self::Thirteen,
            Self::Fourteen,
            Self::Fifteen,
        ]
        .into_iter()
        .find(|r| r.rate() == rate)
    }
}

/// `formaPago` (Tabla 24).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// 01: Sin utilización del sistema financiero (cash).
    Cash,
    /// 15: Compensación de deudas.
    DebtCompensation,
    /// 16: Tarjeta de débito.
    DebitCard,
    /// 17: Dinero electrónico.
    ElectronicMoney,
    /// 18: Tarjeta prepago.
    PrepaidCard,
    /// 19: Tarjeta de crédito.
    CreditCard,
    /// 20: Otros con utilización del sistema financiero (transfers).
    FinancialSystem,
    /// 21: Endoso de títulos.
    Endorsement,
}

impl PaymentMethod {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cash => "01",
            Self::DebtCompensation => "15",
            Self::DebitCard => "16",
            Self::ElectronicMoney => "17",
            Self::PrepaidCard => "18",
            Self::CreditCard => "19",
            Self::FinancialSystem => "20",
            Self::Endorsement => "21",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::Cash),
            "15" => Some(Self::DebtCompensation),
            "16" => Some(Self::DebitCard),
            "17" => Some(Self::ElectronicMoney),
            "18" => Some(Self::PrepaidCard),
            "19" => Some(Self::CreditCard),
            "20" => Some(Self::FinancialSystem),
            "21" => Some(Self::Endorsement),
            _ => None,
        }
    }
}

/// `tipoIdentificacionComprador` (Tabla 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuyerIdType {
    /// 04: RUC.
    Ruc,
    /// 05: Cédula.
    NationalId,
    /// 06: Pasaporte.
    Passport,
    /// 07: Consumidor final.
    FinalConsumer,
    /// 08: Identificación del exterior.
    Foreign,
}

impl BuyerIdType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ruc => "04",
            Self::NationalId => "05",
            Self::Passport => "06",
            Self::FinalConsumer => "07",
            Self::Foreign => "08",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "04" => Some(Self::Ruc),
            "05" => Some(Self::NationalId),
            "06" => Some(Self::Passport),
            "07" => Some(Self::FinalConsumer),
            "08" => Some(Self::Foreign),
            _ => None,
        }
    }
}

/// Identification used for anonymous final-consumer sales.
pub const FINAL_CONSUMER_ID: &str = "9999999999999";

/// Buyer name used for anonymous final-consumer sales.
pub const FINAL_CONSUMER_NAME: &str = "CONSUMIDOR FINAL";

/// Upper bound of `importeTotal` for invoices issued to the final consumer.
pub const FINAL_CONSUMER_LIMIT: Decimal = Decimal::from_parts(5000, 0, 0, false, 2);

/// Infer the buyer identification type from the raw identifier.
///
/// 13 digits map to RUC, 10 digits to cédula; anything else is treated as
/// the final consumer.
pub fn infer_buyer_id_type(identification: &str) -> BuyerIdType {
    let id = identification.trim();
    let numeric = !id.is_empty() && id.chars().all(|c| c.is_ascii_digit());
    match id.len() {
        13 if numeric && id != FINAL_CONSUMER_ID => BuyerIdType::Ruc,
        10 if numeric => BuyerIdType::NationalId,
        _ => BuyerIdType::FinalConsumer,
    }
}
