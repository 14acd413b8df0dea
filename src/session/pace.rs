//! Pace/unit normalization.
//!
//! The companion reports pace as a bare number whose unit depends on
//! its firmware version: seconds per kilometer, meters per second, or
//! seconds per meter. Realistic human paces never collide across the
//! three encodings, so disjoint value ranges identify the unit.

/// Convert an ambiguous raw pace into canonical seconds-per-kilometer.
///
/// First-match policy:
/// - `> 20` — already sec/km, passed through
/// - `0.5..=5.0` — meters/second, converted as `1000/value`
/// - `0 < v < 0.1` — seconds/meter, multiplied by 1000
///
/// Returns `None` when the value falls outside every range; the caller
/// must retain its previous known-good pace rather than accept it.
pub fn normalize_pace(raw: f64) -> Option<f64> {
    if !raw.is_finite() {
        return None;
    }
    if raw > 20.0 {
        Some(raw)
    } else if (0.5..=5.0).contains(&raw) {
        Some(1000.0 / raw)
    } else if raw > 0.0 && raw < 0.1 {
        Some(raw * 1000.0)
    } else {
        None
    }
}
