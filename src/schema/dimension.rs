//! The fixed set of canonical HSE dimensions (ISO 45001 / ISO 14001)

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::SchemaError;

/// One canonical safety/compliance data category.
///
/// Serializes as its snake_case identifier (e.g. `"risks_opportunities"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    GovernancePolicy,
    RisksOpportunities,
    ComplianceRequirements,
    OccupationalHealthSafety,
    Environment,
    HazardousMaterials,
    OperationsControls,
    IncidentsNonconformities,
    ChangeManagement,
    CompetenciesCulture,
    CommunicationParticipation,
    EmergencyCrisis,
    AuditsInspections,
    IndicatorsReporting,
    ContinuousImprovement,
}

impl Dimension {
    /// Every dimension, in catalog order.
    pub const ALL: [Dimension; 15] = [
        Dimension::GovernancePolicy,
        Dimension::RisksOpportunities,
        Dimension::ComplianceRequirements,
        Dimension::OccupationalHealthSafety,
        Dimension::Environment,
        Dimension::HazardousMaterials,
        Dimension::OperationsControls,
        Dimension::IncidentsNonconformities,
        Dimension::ChangeManagement,
        Dimension::CompetenciesCulture,
        Dimension::CommunicationParticipation,
        Dimension::EmergencyCrisis,
        Dimension::AuditsInspections,
        Dimension::IndicatorsReporting,
        Dimension::ContinuousImprovement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GovernancePolicy => "governance_policy",
            Self::RisksOpportunities => "risks_opportunities",
            Self::ComplianceRequirements => "compliance_requirements",
            Self::OccupationalHealthSafety => "occupational_health_safety",
            Self::Environment => "environment",
            Self::HazardousMaterials => "hazardous_materials",
            Self::OperationsControls => "operations_controls",
            Self::IncidentsNonconformities => "incidents_nonconformities",
            Self::ChangeManagement => "change_management",
            Self::CompetenciesCulture => "competencies_culture",
            Self::CommunicationParticipation => "communication_participation",
            Self::EmergencyCrisis => "emergency_crisis",
            Self::AuditsInspections => "audits_inspections",
            Self::IndicatorsReporting => "indicators_reporting",
            Self::ContinuousImprovement => "continuous_improvement",
        }
    }

    /// Human-readable title ("Risks Opportunities").
    pub fn title(&self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownDimension(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_identifier_back_to_itself() {
        for dim in Dimension::ALL {
            assert_eq!(dim.as_str().parse::<Dimension>().unwrap(), dim);
        }
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let err = "weather".parse::<Dimension>().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownDimension(ref s) if s == "weather"));
    }

    #[test]
    fn serde_uses_snake_case_identifier() {
        let json = serde_json::to_string(&Dimension::IncidentsNonconformities).unwrap();
        assert_eq!(json, "\"incidents_nonconformities\"");
    }

    #[test]
    fn title_capitalizes_words() {
        assert_eq!(Dimension::AuditsInspections.title(), "Audits Inspections");
    }
}
