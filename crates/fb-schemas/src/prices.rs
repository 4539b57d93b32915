//! Integer-micros price representation.
//!
//! Price limits and validated prices are held as `i64` micros
//! (1 unit = 1_000_000 micros) so that limit comparisons are exact. The
//! backend speaks JSON numbers; `f64` conversion happens only at the wire
//! boundary, through [`opt_price`] on serde fields.
//!
//! | Direction            | Function            |
//! |----------------------|---------------------|
//! | internal → backend   | [`micros_to_price`] |
//! | backend → internal   | [`price_to_micros`] |

/// Scale factor: 1 price unit = 1_000_000 micros (6 decimal places).
pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// Errors returned by [`price_to_micros`] when the input is not representable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Input was `NaN` or infinite.
    NotFinite,
    /// Input would overflow `i64` after scaling by [`MICROS_PER_UNIT`].
    OutOfRange,
}

impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PricingError::NotFinite => {
                write!(f, "price_to_micros: non-finite input (NaN or Inf)")
            }
            PricingError::OutOfRange => {
                write!(f, "price_to_micros: price out of i64 range after scaling")
            }
        }
    }
}

impl std::error::Error for PricingError {}

/// Convert an integer-micros price to `f64` for serialization.
pub fn micros_to_price(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_UNIT as f64
}

/// Convert a price received from the backend into integer micros.
///
/// Rounds to the nearest micro.
pub fn price_to_micros(price: f64) -> Result<i64, PricingError> {
    if !price.is_finite() {
        return Err(PricingError::NotFinite);
    }
    let scaled = price * MICROS_PER_UNIT as f64;
    // f64 -> i64 casts saturate; reject instead.
    if scaled > i64::MAX as f64 || scaled < i64::MIN as f64 {
        return Err(PricingError::OutOfRange);
    }
    Ok(scaled.round() as i64)
}

/// Serde adapter for `Option<i64>` micros carried as an optional JSON number.
///
/// Use with `#[serde(default, with = "crate::prices::opt_price")]`.
pub mod opt_price {
    use super::{micros_to_price, price_to_micros};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<i64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(micros) => s.serialize_some(&micros_to_price(*micros)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        let raw: Option<f64> = Option::deserialize(d)?;
        raw.map(|p| price_to_micros(p).map_err(serde::de::Error::custom))
            .transpose()
    }
}
