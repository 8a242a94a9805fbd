use serde::Deserialize;
use serde_json::Number;

use crate::errors::AppError;

pub const MAX_FEATURE_LEN: usize = 64;
pub const DEFAULT_FEATURE: &str = "unspecified";

/// Body of `POST /api/credits/consume`. Unknown fields are rejected.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsumeRequest {
    pub amount: Number,
    #[serde(default)]
    pub feature: Option<String>,
}

/// A consume request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedConsume {
    pub amount: i64,
    pub feature: String,
}

impl ConsumeRequest {
    pub fn validate(self) -> Result<ValidatedConsume, AppError> {
        Ok(ValidatedConsume {
            amount: parse_amount(&self.amount)?,
            feature: normalize_feature(self.feature.as_deref())?,
        })
    }
}

/// Credits are whole units. Integral floats (`5.0`) are accepted since JSON
/// clients rarely distinguish them.
pub fn parse_amount(raw: &Number) -> Result<i64, AppError> {
    let amount = if let Some(i) = raw.as_i64() {
        i
    } else if raw.is_u64() {
        return Err(AppError::Validation("amount is too large".to_string()));
    } else {
        let f = raw
            .as_f64()
            .ok_or_else(|| AppError::Validation("amount must be a number".to_string()))?;
        if !f.is_finite() {
            return Err(AppError::Validation("amount must be finite".to_string()));
        }
        if f.fract() != 0.0 {
            return Err(AppError::Validation(
                "amount must be a whole number of credits".to_string(),
            ));
        }
        if f.abs() >= i64::MAX as f64 {
            return Err(AppError::Validation("amount is too large".to_string()));
        }
        f as i64
    };

    if amount <= 0 {
        return Err(AppError::Validation("amount must be positive".to_string()));
    }
    Ok(amount)
}

pub fn normalize_feature(raw: Option<&str>) -> Result<String, AppError> {
    let feature = raw.map(str::trim).unwrap_or_default();
    if feature.is_empty() {
        return Ok(DEFAULT_FEATURE.to_string());
    }
    if feature.chars().count() > MAX_FEATURE_LEN {
        return Err(AppError::Validation(format!(
            "feature must be at most {MAX_FEATURE_LEN} characters"
        )));
    }
    Ok(feature.to_string())
}
