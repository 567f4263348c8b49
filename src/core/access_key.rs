//! Access key (clave de acceso) generation and parsing.
//!
//! Layout of the 49 digits:
//!
//! | Field | Width |
//! |-------|-------|
//! | emission date `DDMMYYYY` | 8 |
//! | document type | 2 |
//! | RUC | 13 |
//! | environment | 1 |
//! | series (establishment + emission point) | 6 |
//! | sequential | 9 |
//! | numeric code | 8 |
//! | emission type | 1 |
//! | check digit (modulo 11) | 1 |

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::catalog::{DocumentType, EmissionType, Environment};
use super::error::SriError;
use super::numbering::{Ruc, Series, normalize_sequential};

/// Total length of an access key.
pub const ACCESS_KEY_LEN: usize = 49;
/// Length of the base string the check digit is computed over.
pub const ACCESS_KEY_BASE_LEN: usize = 48;
/// Width of the numeric code.
pub const NUMERIC_CODE_LEN: usize = 8;

const COEFFICIENTS: [u32; 6] = [2, 3, 4, 5, 6, 7];

/// A validated 49-digit access key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessKey(String);

impl AccessKey {
    /// Parse and verify an access key, including its check digit.
    pub fn parse(value: &str) -> Result<Self, SriError> {
        validate_access_key_format(value)?;
        let expected = modulo11_check_digit(&value[..ACCESS_KEY_BASE_LEN])?;
        let actual = value.as_bytes()[ACCESS_KEY_BASE_LEN] - b'0';
        if expected != actual {
            return Err(SriError::InvalidAccessKey(format!(
                "check digit {actual} does not match computed {expected}"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn check_digit(&self) -> u8 {
        self.0.as_bytes()[ACCESS_KEY_BASE_LEN] - b'0'
    }

    /// Split the key back into its components.
    pub fn components(&self) -> Result<AccessKeyComponents, SriError> {
        let s = &self.0;
        let date = NaiveDate::parse_from_str(&s[0..8], "%d%m%Y")
            .map_err(|e| SriError::InvalidAccessKey(format!("bad date segment: {e}")))?;
        let document_type = DocumentType::from_code(&s[8..10]).ok_or_else(|| {
            SriError::InvalidAccessKey(format!("unknown document type '{}'", &s[8..10]))
        })?;
        let environment = Environment::from_code(&s[23..24]).ok_or_else(|| {
            SriError::InvalidAccessKey(format!("unknown environment '{}'", &s[23..24]))
        })?;
        let emission_type = EmissionType::from_code(&s[47..48]).ok_or_else(|| {
            SriError::InvalidAccessKey(format!("unknown emission type '{}'", &s[47..48]))
        })?;
        Ok(AccessKeyComponents {
            emission_date: date,
            document_type,
            ruc: Ruc::parse(&s[10..23])?,
            environment,
            series: Series::new(&s[24..27], &s[27..30])?,
            sequential: s[30..39].to_string(),
            numeric_code: s[39..47].to_string(),
            emission_type,
        })
    }
}

impl TryFrom<String> for AccessKey {
    type Error = SriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccessKey> for String {
    fn from(key: AccessKey) -> Self {
        key.0
    }
}

impl std::fmt::Display for AccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check that a value is exactly 49 ASCII digits. Does not verify the check digit.
pub fn validate_access_key_format(value: &str) -> Result<(), SriError> {
    if value.len() != ACCESS_KEY_LEN {
        return Err(SriError::InvalidAccessKey(format!(
            "expected {ACCESS_KEY_LEN} digits, got {} characters",
            value.len()
        )));
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SriError::InvalidAccessKey(
            "access key must be numeric".into(),
        ));
    }
    Ok(())
}

/// Modulo-11 check digit over a 48-digit base.
///
/// Digits are weighted right to left with the repeating cycle 2..=7.
/// A result of 11 maps to 0 and 10 maps to 1.
pub fn modulo11_check_digit(base: &str) -> Result<u8, SriError> {
    if base.len() != ACCESS_KEY_BASE_LEN {
        return Err(SriError::KeyComponentLength {
            expected: ACCESS_KEY_BASE_LEN,
            actual: base.len(),
        });
    }
    let mut sum = 0u32;
    for (i, b) in base.bytes().rev().enumerate() {
        if !b.is_ascii_digit() {
            return Err(SriError::InvalidAccessKey(format!(
                "non-numeric character '{}' in key base",
                b as char
            )));
        }
        sum += u32::from(b - b'0') * COEFFICIENTS[i % COEFFICIENTS.len()];
    }
    let digit = match 11 - (sum % 11) {
        11 => 0,
        10 => 1,
        d => d,
    };
    Ok(digit as u8)
}

/// The fields an access key is assembled from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeyComponents {
    pub emission_date: NaiveDate,
    pub document_type: DocumentType,
    pub ruc: Ruc,
    pub environment: Environment,
    pub series: Series,
    /// Nine-digit sequential.
    pub sequential: String,
    /// Eight-digit numeric code.
    pub numeric_code: String,
    pub emission_type: EmissionType,
}

impl AccessKeyComponents {
    /// Concatenate the fixed-width fields into the 48-digit base.
    ///
    /// Fails with [`SriError::KeyComponentLength`] rather than correcting
    /// a malformed field: a padded or cut key still looks valid but is wrong.
    pub fn to_base(&self) -> Result<String, SriError> {
        let base = format!(
            "{}{}{}{}{}{}{}{}",
            self.emission_date.format("%d%m%Y"),
            self.document_type.code(),
            self.ruc.as_str(),
            self.environment.code(),
            self.series.compact(),
            self.sequential,
            self.numeric_code,
            self.emission_type.code(),
        );
        if base.len() != ACCESS_KEY_BASE_LEN {
            return Err(SriError::KeyComponentLength {
                expected: ACCESS_KEY_BASE_LEN,
                actual: base.len(),
            });
        }
        Ok(base)
    }

    /// Build the full key: base plus check digit.
    pub fn to_access_key(&self) -> Result<AccessKey, SriError> {
        let base = self.to_base()?;
        let digit = modulo11_check_digit(&base)?;
        Ok(AccessKey(format!("{base}{digit}")))
    }
}

/// Input for key generation: everything except the numeric code.
#[derive(Debug, Clone)]
pub struct AccessKeyRequest {
    pub emission_date: NaiveDate,
    pub document_type: DocumentType,
    pub ruc: String,
    pub environment: Environment,
    pub establishment: String,
    pub emission_point: String,
    pub sequential: String,
    pub emission_type: EmissionType,
}

impl AccessKeyRequest {
    fn into_components(self, numeric_code: String) -> Result<AccessKeyComponents, SriError> {
        if self.ruc.trim().is_empty() {
            return Err(SriError::Validation("RUC is required".into()));
        }
        if self.sequential.trim().is_empty() {
            return Err(SriError::Validation("sequential is required".into()));
        }
        Ok(AccessKeyComponents {
            emission_date: self.emission_date,
            document_type: self.document_type,
            ruc: Ruc::parse(&self.ruc)?,
            environment: self.environment,
            series: Series::new(&self.establishment, &self.emission_point)?,
            sequential: normalize_sequential(&self.sequential)?,
            numeric_code,
            emission_type: self.emission_type,
        })
    }
}

static CODE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Produces access keys with a fresh eight-digit numeric code per call.
///
/// The code mixes the wall clock with a process-wide counter, so two calls in
/// the same nanosecond still differ. It is not meant to be unpredictable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessKeyGenerator;

impl AccessKeyGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, request: AccessKeyRequest) -> Result<AccessKey, SriError> {
        let key = self.generate_with_code(request, &next_numeric_code())?;
        tracing::debug!(access_key = %key, "generated access key");
        Ok(key)
    }

    /// Generate with a caller-supplied numeric code (must be 8 digits).
    pub fn generate_with_code(
        &self,
        request: AccessKeyRequest,
        numeric_code: &str,
    ) -> Result<AccessKey, SriError> {
        if numeric_code.len() != NUMERIC_CODE_LEN
            || !numeric_code.chars().all(|c| c.is_ascii_digit())
        {
            return Err(SriError::Validation(format!(
                "numeric code '{numeric_code}' must be {NUMERIC_CODE_LEN} digits"
            )));
        }
        request
            .into_components(numeric_code.to_string())?
            .to_access_key()
    }
}

fn next_numeric_code() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let count = CODE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mixed = nanos
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(count.wrapping_mul(1_442_695_040_888_963_407));
    format!("{:08}", (mixed >> 16) % 100_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AccessKeyRequest {
        AccessKeyRequest {
            emission_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            document_type: DocumentType::Invoice,
            ruc: "1234567890001".into(),
            environment: Environment::Test,
            establishment: "001".into(),
            emission_point: "001".into(),
            sequential: "000000001".into(),
            emission_type: EmissionType::Normal,
        }
    }

    #[test]
    fn check_digit_known_values() {
        // 11 - (sum mod 11) with remainder 0 maps to 0.
        assert_eq!(modulo11_check_digit(&"0".repeat(48)).unwrap(), 0);
        // Base ending in 1: sum = 2, 11 - 2 = 9.
        let mut base = "0".repeat(47);
        base.push('1');
        assert_eq!(modulo11_check_digit(&base).unwrap(), 9);
        // Base ending in 5: sum = 10, 11 - 10 = 1.
        let mut base = "0".repeat(47);
        base.push('5');
        assert_eq!(modulo11_check_digit(&base).unwrap(), 1);
    }

    #[test]
    fn check_digit_ten_maps_to_one() {
        // 6 * 2 = 12, 12 mod 11 = 1, 11 - 1 = 10 -> 1.
        let mut base = "0".repeat(47);
        base.push('6');
        assert_eq!(modulo11_check_digit(&base).unwrap(), 1);
    }

    #[test]
    fn coefficients_cycle_after_six_positions() {
        // Seventh digit from the right weighs 2 again: 1 * 2 = 2 -> 9.
        let mut base = "0".repeat(41);
        base.push_str("1000000");
        assert_eq!(modulo11_check_digit(&base).unwrap(), 9);
    }

    #[test]
    fn check_digit_rejects_wrong_length() {
        let err = modulo11_check_digit("123").unwrap_err();
        assert!(matches!(
            err,
            SriError::KeyComponentLength {
                expected: 48,
                actual: 3
            }
        ));
    }

    #[test]
    fn generates_forty_nine_digits() {
        let key = AccessKeyGenerator::new().generate(request()).unwrap();
        assert_eq!(key.as_str().len(), 49);
        assert!(key.as_str().bytes().all(|b| b.is_ascii_digit()));
        assert!(key.as_str().starts_with("15012024011234567890001100100100000000"));
        assert_eq!(&key.as_str()[47..48], "1");
    }

    #[test]
    fn fixed_code_is_deterministic() {
        let generator = AccessKeyGenerator::new();
        let a = generator.generate_with_code(request(), "12345678").unwrap();
        let b = generator.generate_with_code(request(), "12345678").unwrap();
        assert_eq!(a, b);
        assert_eq!(
            &a.as_str()[..48],
            "150120240112345678900011001001000000001123456781"
        );
    }

    #[test]
    fn fresh_codes_differ() {
        let generator = AccessKeyGenerator::new();
        let a = generator.generate(request()).unwrap();
        let b = generator.generate(request()).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.as_str()[..39], b.as_str()[..39]);
    }

    #[test]
    fn parse_roundtrips_components() {
        let key = AccessKeyGenerator::new()
            .generate_with_code(request(), "87654321")
            .unwrap();
        let parsed = AccessKey::parse(key.as_str()).unwrap();
        let c = parsed.components().unwrap();
        assert_eq!(c.emission_date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(c.ruc.as_str(), "1234567890001");
        assert_eq!(c.series.compact(), "001001");
        assert_eq!(c.sequential, "000000001");
        assert_eq!(c.numeric_code, "87654321");
        assert_eq!(c.to_access_key().unwrap(), parsed);
    }

    #[test]
    fn parse_rejects_bad_check_digit() {
        let key = AccessKeyGenerator::new()
            .generate_with_code(request(), "87654321")
            .unwrap();
        let mut tampered = key.as_str()[..48].to_string();
        let wrong = (key.check_digit() + 1) % 10;
        tampered.push(char::from(b'0' + wrong));
        assert!(matches!(
            AccessKey::parse(&tampered),
            Err(SriError::InvalidAccessKey(_))
        ));
    }

    #[test]
    fn missing_fields_are_invalid_input() {
        let mut req = request();
        req.ruc = String::new();
        assert!(matches!(
            AccessKeyGenerator::new().generate(req),
            Err(SriError::Validation(_))
        ));
        let mut req = request();
        req.sequential = " ".into();
        assert!(matches!(
            AccessKeyGenerator::new().generate(req),
            Err(SriError::Validation(_))
        ));
    }

    #[test]
    fn bad_numeric_code_rejected() {
        assert!(
            AccessKeyGenerator::new()
                .generate_with_code(request(), "1234")
                .is_err()
        );
    }

    #[test]
    fn to_base_rejects_malformed_components() {
        let mut c = AccessKeyGenerator::new()
            .generate_with_code(request(), "12345678")
            .unwrap()
            .components()
            .unwrap();
        c.numeric_code = "123".into();
        assert!(matches!(
            c.to_base(),
            Err(SriError::KeyComponentLength { actual: 43, .. })
        ));
    }
}
