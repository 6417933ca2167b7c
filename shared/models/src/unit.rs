//! Units of measure for BoQ positions, keyed by UNECE recommendation 20 codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unit of measure of a work item quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Unit {
    /// Metre
    Mtr,
    /// Square metre
    Mtk,
    /// Cubic metre
    Mtq,
    /// Hour
    Hur,
    /// Piece ("Stück")
    #[default]
    C62,
}

impl Unit {
    /// Normalizes a raw unit string from an exchange file.
    ///
    /// GAEB files carry units inconsistently ("m2", "m²", "qm", ...);
    /// anything unrecognized falls back to piece, matching how quantities
    /// without a meaningful unit are billed.
    pub fn from_raw(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| *c != '.' && !c.is_whitespace())
            .collect();
        match key.as_str() {
            "m" | "mtr" | "meter" | "lfdm" => Self::Mtr,
            "m2" | "m^2" | "m²" | "mtk" | "qm" => Self::Mtk,
            "m3" | "m^3" | "m³" | "mtq" | "cbm" => Self::Mtq,
            "h" | "hur" | "std" | "stunden" => Self::Hur,
            _ => Self::C62,
        }
    }

    /// Human-readable symbol used in exports.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Mtr => "m",
            Self::Mtk => "m^2",
            Self::Mtq => "m^3",
            Self::Hur => "h",
            Self::C62 => "Stk",
        }
    }

    /// UNECE code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Mtr => "MTR",
            Self::Mtk => "MTK",
            Self::Mtq => "MTQ",
            Self::Hur => "HUR",
            Self::C62 => "C62",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_normalization() {
        assert_eq!(Unit::from_raw("m"), Unit::Mtr);
        assert_eq!(Unit::from_raw("lfdm"), Unit::Mtr);
        assert_eq!(Unit::from_raw(" qm "), Unit::Mtk);
        assert_eq!(Unit::from_raw("m²"), Unit::Mtk);
        assert_eq!(Unit::from_raw("cbm"), Unit::Mtq);
        assert_eq!(Unit::from_raw("Std."), Unit::Hur);
        assert_eq!(Unit::from_raw("Stück"), Unit::C62);
    }

    #[test]
    fn test_unknown_unit_falls_back_to_piece() {
        assert_eq!(Unit::from_raw("psch"), Unit::C62);
        assert_eq!(Unit::from_raw(""), Unit::C62);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for unit in [Unit::Mtr, Unit::Mtk, Unit::Mtq, Unit::Hur, Unit::C62] {
            assert_eq!(Unit::from_raw(unit.symbol()), unit);
            assert_eq!(Unit::from_raw(unit.code()), unit);
        }
    }
}
