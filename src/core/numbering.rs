use serde::{Deserialize, Serialize};

use super::error::SriError;

/// Width of a RUC (Registro Único de Contribuyentes).
pub const RUC_LEN: usize = 13;
/// Width of the establishment code (`estab`).
pub const ESTABLISHMENT_LEN: usize = 3;
/// Width of the emission point code (`ptoEmi`).
pub const EMISSION_POINT_LEN: usize = 3;
/// Width of the sequential number (`secuencial`).
pub const SEQUENTIAL_LEN: usize = 9;

/// A validated 13-digit taxpayer identifier.
///
/// Unlike the establishment and sequential fields, a RUC is never padded or
/// truncated: a shortened or zero-padded RUC is a different taxpayer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ruc(String);

impl Ruc {
    pub fn parse(value: &str) -> Result<Self, SriError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(SriError::Validation("RUC is required".into()));
        }
        if value.len() != RUC_LEN || !value.chars().all(|c| c.is_ascii_digit()) {
            return Err(SriError::Validation(format!(
                "RUC '{value}' must be exactly {RUC_LEN} numeric digits"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Ruc {
    type Error = SriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ruc> for String {
    fn from(ruc: Ruc) -> Self {
        ruc.0
    }
}

impl std::fmt::Display for Ruc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Left-pad a numeric code with zeros to `width`.
///
/// Fails if the value is empty, non-numeric or already wider than `width`.
pub fn pad_numeric(field: &str, value: &str, width: usize) -> Result<String, SriError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SriError::Validation(format!("{field} is required")));
    }
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(SriError::Validation(format!(
            "{field} '{value}' must be numeric"
        )));
    }
    if value.len() > width {
        return Err(SriError::Validation(format!(
            "{field} '{value}' exceeds {width} digits"
        )));
    }
    Ok(format!("{value:0>width$}"))
}

/// Establishment + emission point, e.g. `001-002`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Series {
    establishment: String,
    emission_point: String,
}

impl Series {
    pub fn new(establishment: &str, emission_point: &str) -> Result<Self, SriError> {
        Ok(Self {
            establishment: pad_numeric("establishment", establishment, ESTABLISHMENT_LEN)?,
            emission_point: pad_numeric("emission point", emission_point, EMISSION_POINT_LEN)?,
        })
    }

    pub fn establishment(&self) -> &str {
        &self.establishment
    }

    pub fn emission_point(&self) -> &str {
        &self.emission_point
    }

    /// The six-digit form embedded in the access key.
    pub fn compact(&self) -> String {
        format!("{}{}", self.establishment, self.emission_point)
    }

    /// Printed document number, e.g. `001-001-000000042`.
    pub fn document_number(&self, sequential: &str) -> String {
        format!("{}-{}-{}", self.establishment, self.emission_point, sequential)
    }
}

/// Format a sequential number to its nine-digit form. Zero is not a valid sequential.
pub fn format_sequential(sequential: u64) -> Result<String, SriError> {
    if sequential == 0 || sequential > 999_999_999 {
        return Err(SriError::Validation(format!(
            "sequential {sequential} must be between 1 and 999999999"
        )));
    }
    Ok(format!("{sequential:0>SEQUENTIAL_LEN$}"))
}

/// Normalize a sequential supplied as text (e.g. "42" or "000000042").
pub fn normalize_sequential(sequential: &str) -> Result<String, SriError> {
    let padded = pad_numeric("sequential", sequential, SEQUENTIAL_LEN)?;
    if padded.chars().all(|c| c == '0') {
        return Err(SriError::Validation("sequential must not be zero".into()));
    }
    Ok(padded)
}
