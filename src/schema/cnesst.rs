//! CNESST priority risk categories (RC1-RC8)

use serde::{Deserialize, Serialize};

/// The regulator's priority risk families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CnesstCategory {
    #[serde(rename = "RC1_CHUTES_HAUTEUR")]
    FallFromHeight,
    #[serde(rename = "RC2_ENSEVELISSEMENT")]
    Burial,
    #[serde(rename = "RC3_MACHINES")]
    Machinery,
    #[serde(rename = "RC4_VEHICULES")]
    Vehicles,
    #[serde(rename = "RC5_ESPACES_CLOS")]
    ConfinedSpace,
    #[serde(rename = "RC6_ELECTRICITE")]
    Electrical,
    #[serde(rename = "RC7_CHIMIQUE_BIO")]
    ChemicalBiological,
    #[serde(rename = "RC8_ERGONOMIE_TMS")]
    Ergonomic,
    #[serde(rename = "RC0_AUTRE")]
    Other,
}

impl CnesstCategory {
    pub fn code(&self) -> &'static str {
        match self {
            Self::FallFromHeight => "RC1_CHUTES_HAUTEUR",
            Self::Burial => "RC2_ENSEVELISSEMENT",
            Self::Machinery => "RC3_MACHINES",
            Self::Vehicles => "RC4_VEHICULES",
            Self::ConfinedSpace => "RC5_ESPACES_CLOS",
            Self::Electrical => "RC6_ELECTRICITE",
            Self::ChemicalBiological => "RC7_CHIMIQUE_BIO",
            Self::Ergonomic => "RC8_ERGONOMIE_TMS",
            Self::Other => "RC0_AUTRE",
        }
    }

    /// Parse a full code (`RC5_ESPACES_CLOS`) or its short prefix (`RC5`).
    pub fn from_code(code: &str) -> Option<Self> {
        let prefix = code.split('_').next().unwrap_or(code);
        match prefix {
            "RC1" => Some(Self::FallFromHeight),
            "RC2" => Some(Self::Burial),
            "RC3" => Some(Self::Machinery),
            "RC4" => Some(Self::Vehicles),
            "RC5" => Some(Self::ConfinedSpace),
            "RC6" => Some(Self::Electrical),
            "RC7" => Some(Self::ChemicalBiological),
            "RC8" => Some(Self::Ergonomic),
            "RC0" => Some(Self::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for CnesstCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Map a platform's free-form risk category to a CNESST category.
///
/// Matching is case-insensitive on the source keyword; anything unrecognized
/// falls into `RC0_AUTRE`.
pub fn cnesst_category(source_category: &str) -> CnesstCategory {
    match source_category.trim().to_lowercase().as_str() {
        "fall_height" => CnesstCategory::FallFromHeight,
        "burial" => CnesstCategory::Burial,
        "machine" => CnesstCategory::Machinery,
        "vehicle" => CnesstCategory::Vehicles,
        "confined_space" => CnesstCategory::ConfinedSpace,
        "electrical" => CnesstCategory::Electrical,
        "chemical" => CnesstCategory::ChemicalBiological,
        "ergonomic" => CnesstCategory::Ergonomic,
        _ => CnesstCategory::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keywords_map_to_their_category() {
        assert_eq!(cnesst_category("fall_height").code(), "RC1_CHUTES_HAUTEUR");
        assert_eq!(cnesst_category("confined_space").code(), "RC5_ESPACES_CLOS");
        assert_eq!(cnesst_category("Ergonomic"), CnesstCategory::Ergonomic);
    }

    #[test]
    fn unknown_keyword_is_other() {
        assert_eq!(cnesst_category("weather"), CnesstCategory::Other);
        assert_eq!(cnesst_category(""), CnesstCategory::Other);
    }

    #[test]
    fn from_code_accepts_short_prefix() {
        assert_eq!(CnesstCategory::from_code("RC3"), Some(CnesstCategory::Machinery));
        assert_eq!(
            CnesstCategory::from_code("RC5_ESPACES_CLOS"),
            Some(CnesstCategory::ConfinedSpace)
        );
        assert_eq!(CnesstCategory::from_code("XX"), None);
    }

    #[test]
    fn serializes_as_code() {
        let json = serde_json::to_string(&CnesstCategory::Machinery).unwrap();
        assert_eq!(json, "\"RC3_MACHINES\"");
    }
}
