//! Dimension schemas and the read-only registry that serves them

use super::dimension::Dimension;
use super::SchemaError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// A declared relationship `TYPE:TargetLabel` from a dimension's primary node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelationshipDecl {
    pub relationship: &'static str,
    pub target_label: &'static str,
}

impl RelationshipDecl {
    pub const fn new(relationship: &'static str, target_label: &'static str) -> Self {
        Self {
            relationship,
            target_label,
        }
    }

    /// The record field holding the target's identifier: lower-cased label + `_id`.
    pub fn foreign_key(&self) -> String {
        format!("{}_id", self.target_label.to_lowercase())
    }
}

impl std::fmt::Display for RelationshipDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.relationship, self.target_label)
    }
}

/// Canonical schema for one dimension.
#[derive(Debug, Clone, Serialize)]
pub struct DimensionSchema {
    pub dimension: Dimension,
    /// Ordered; the first entry is the dimension's primary key.
    pub required_fields: &'static [&'static str],
    pub optional_fields: &'static [&'static str],
    pub relationships: &'static [RelationshipDecl],
    /// Target graph labels, primary label first.
    pub labels: &'static [&'static str],
    pub iso_clause: Option<&'static str>,
    pub cnesst_mapping: Option<&'static str>,
}

impl DimensionSchema {
    /// The field whose value identifies the dimension's graph node.
    pub fn primary_key(&self) -> &'static str {
        self.required_fields[0]
    }

    pub fn primary_label(&self) -> &'static str {
        self.labels[0]
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.required_fields.is_empty() {
            return Err(SchemaError::InvalidSchema {
                dimension: self.dimension,
                reason: "required_fields is empty".to_string(),
            });
        }
        if self.labels.is_empty() {
            return Err(SchemaError::InvalidSchema {
                dimension: self.dimension,
                reason: "labels is empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Process-wide catalog of dimension schemas.
///
/// Immutable once built. `SchemaRegistry::standard()` hands out the shared
/// catalog of all fifteen dimensions; `from_schemas` builds a restricted
/// registry for hosts that only accept a subset.
#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: HashMap<Dimension, DimensionSchema>,
}

impl SchemaRegistry {
    /// Build a registry from explicit schemas.
    ///
    /// Rejects duplicate dimensions and schemas without required fields or labels.
    pub fn from_schemas(
        schemas: impl IntoIterator<Item = DimensionSchema>,
    ) -> Result<Self, SchemaError> {
        let mut map = HashMap::new();
        for schema in schemas {
            schema.validate()?;
            let dimension = schema.dimension;
            if map.insert(dimension, schema).is_some() {
                return Err(SchemaError::DuplicateDimension(dimension));
            }
        }
        Ok(Self { schemas: map })
    }

    /// The shared standard catalog, built on first use.
    pub fn standard() -> Arc<SchemaRegistry> {
        static STANDARD: OnceLock<Arc<SchemaRegistry>> = OnceLock::new();
        STANDARD
            .get_or_init(|| {
                let schemas = standard_schemas();
                Arc::new(SchemaRegistry {
                    schemas: schemas.into_iter().map(|s| (s.dimension, s)).collect(),
                })
            })
            .clone()
    }

    pub fn schema_for(&self, dimension: Dimension) -> Result<&DimensionSchema, SchemaError> {
        self.schemas
            .get(&dimension)
            .ok_or_else(|| SchemaError::UnknownDimension(dimension.to_string()))
    }

    /// Look up a schema by its string identifier.
    pub fn schema_by_name(&self, name: &str) -> Result<&DimensionSchema, SchemaError> {
        let dimension: Dimension = name.parse()?;
        self.schema_for(dimension)
    }

    pub fn contains(&self, dimension: Dimension) -> bool {
        self.schemas.contains_key(&dimension)
    }

    /// Registered dimensions in catalog order.
    pub fn dimensions(&self) -> Vec<Dimension> {
        Dimension::ALL
            .iter()
            .copied()
            .filter(|d| self.schemas.contains_key(d))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// The fifteen ISO 45001/14001 dimension schemas.
pub fn standard_schemas() -> Vec<DimensionSchema> {
    vec![
        DimensionSchema {
            dimension: Dimension::GovernancePolicy,
            required_fields: &[
                "policy_id", "title", "version", "effective_date", "approved_by", "scope",
                "objectives",
            ],
            optional_fields: &[
                "review_date", "document_url", "responsibilities", "committee_members",
                "meeting_frequency",
            ],
            relationships: &[
                RelationshipDecl { relationship: "APPLIES_TO", target_label: "Zone" },
                RelationshipDecl { relationship: "OWNED_BY", target_label: "Organization" },
                RelationshipDecl { relationship: "REVIEWED_BY", target_label: "Person" },
            ],
            labels: &["Policy", "Governance", "Committee"],
            iso_clause: Some("ISO 45001:5.1-5.4"),
            cnesst_mapping: Some("Programme de prévention"),
        },
        DimensionSchema {
            dimension: Dimension::RisksOpportunities,
            required_fields: &[
                "risk_id", "title", "category", "severity", "probability", "risk_score",
                "status", "identified_date",
            ],
            optional_fields: &[
                "description", "location", "coordinates", "affected_workers",
                "control_measures", "residual_risk", "review_date", "owner",
            ],
            relationships: &[
                RelationshipDecl { relationship: "LOCATED_IN", target_label: "Zone" },
                RelationshipDecl { relationship: "AFFECTS", target_label: "Equipment" },
                RelationshipDecl { relationship: "MITIGATED_BY", target_label: "ControlMeasure" },
                RelationshipDecl { relationship: "IDENTIFIED_BY", target_label: "Person" },
                RelationshipDecl { relationship: "LINKED_TO", target_label: "Incident" },
            ],
            labels: &["Risk", "Hazard", "Opportunity"],
            iso_clause: Some("ISO 45001:6.1"),
            cnesst_mapping: Some("RC1-RC8 Catégories CNESST"),
        },
        DimensionSchema {
            dimension: Dimension::ComplianceRequirements,
            required_fields: &[
                "requirement_id", "title", "type", "source", "jurisdiction", "effective_date",
                "status",
            ],
            optional_fields: &[
                "description", "deadline", "responsible_party", "evidence_required",
                "last_evaluation", "next_evaluation",
            ],
            relationships: &[
                RelationshipDecl { relationship: "APPLIES_TO", target_label: "Organization" },
                RelationshipDecl { relationship: "EVALUATED_BY", target_label: "Audit" },
                RelationshipDecl { relationship: "DOCUMENTED_IN", target_label: "Document" },
                RelationshipDecl { relationship: "ENFORCED_BY", target_label: "Authority" },
            ],
            labels: &["Requirement", "Regulation", "Standard", "Obligation"],
            iso_clause: Some("ISO 45001:6.1.3"),
            cnesst_mapping: Some("LSST, RSST, CNESST"),
        },
        DimensionSchema {
            dimension: Dimension::OccupationalHealthSafety,
            required_fields: &["record_id", "type", "worker_id", "date", "status"],
            optional_fields: &[
                "description", "body_part", "injury_type", "days_lost", "treatment",
                "restrictions", "return_to_work_date", "exposure_type", "exposure_level",
                "medical_surveillance",
            ],
            relationships: &[
                RelationshipDecl { relationship: "INVOLVES", target_label: "Worker" },
                RelationshipDecl { relationship: "OCCURRED_AT", target_label: "Zone" },
                RelationshipDecl { relationship: "CAUSED_BY", target_label: "Risk" },
                RelationshipDecl { relationship: "TREATED_BY", target_label: "MedicalProvider" },
                RelationshipDecl { relationship: "REPORTED_TO", target_label: "Authority" },
            ],
            labels: &["HealthRecord", "Injury", "Exposure", "Ergonomic"],
            iso_clause: Some("ISO 45001:8.1.2"),
            cnesst_mapping: Some("Lésions professionnelles, AT/MP"),
        },
        DimensionSchema {
            dimension: Dimension::Environment,
            required_fields: &["aspect_id", "type", "impact_type", "significance", "status"],
            optional_fields: &[
                "description", "location", "measurement_value", "unit", "threshold",
                "monitoring_frequency", "mitigation_measures",
            ],
            relationships: &[
                RelationshipDecl { relationship: "LOCATED_AT", target_label: "Zone" },
                RelationshipDecl { relationship: "MONITORED_BY", target_label: "Equipment" },
                RelationshipDecl { relationship: "REGULATED_BY", target_label: "Requirement" },
                RelationshipDecl { relationship: "REPORTED_IN", target_label: "Report" },
            ],
            labels: &["EnvironmentalAspect", "Emission", "Waste", "Energy"],
            iso_clause: Some("ISO 14001:6.1.2"),
            cnesst_mapping: Some("Aspects environnementaux"),
        },
        DimensionSchema {
            dimension: Dimension::HazardousMaterials,
            required_fields: &[
                "material_id", "name", "cas_number", "hazard_class", "quantity", "location",
                "sds_available",
            ],
            optional_fields: &[
                "supplier", "sds_date", "storage_requirements", "ppe_required",
                "exposure_limits", "first_aid", "spill_procedure",
            ],
            relationships: &[
                RelationshipDecl { relationship: "STORED_IN", target_label: "Zone" },
                RelationshipDecl { relationship: "USED_BY", target_label: "Process" },
                RelationshipDecl { relationship: "REQUIRES", target_label: "PPE" },
                RelationshipDecl { relationship: "DOCUMENTED_IN", target_label: "SDS" },
                RelationshipDecl { relationship: "REGULATED_BY", target_label: "Requirement" },
            ],
            labels: &["HazardousMaterial", "Chemical", "SDS"],
            iso_clause: Some("ISO 45001:8.1.2"),
            cnesst_mapping: Some("SIMDUT, SGH"),
        },
        DimensionSchema {
            dimension: Dimension::OperationsControls,
            required_fields: &["control_id", "type", "title", "status", "effective_date"],
            optional_fields: &[
                "description", "procedure_url", "responsible", "frequency",
                "verification_method", "deviation_handling",
            ],
            relationships: &[
                RelationshipDecl { relationship: "APPLIES_TO", target_label: "Process" },
                RelationshipDecl { relationship: "DOCUMENTED_IN", target_label: "Procedure" },
                RelationshipDecl { relationship: "VERIFIED_BY", target_label: "Inspection" },
                RelationshipDecl { relationship: "MITIGATES", target_label: "Risk" },
            ],
            labels: &["Control", "Procedure", "Permit", "LOTO"],
            iso_clause: Some("ISO 45001:8.1"),
            cnesst_mapping: Some("Procédures de travail sécuritaire"),
        },
        DimensionSchema {
            dimension: Dimension::IncidentsNonconformities,
            required_fields: &[
                "incident_id", "type", "date", "time", "location", "severity", "status",
            ],
            optional_fields: &[
                "description", "immediate_cause", "root_cause", "witnesses", "injuries",
                "damages", "corrective_actions", "preventive_actions", "investigation_date",
                "closure_date", "lessons_learned",
            ],
            relationships: &[
                RelationshipDecl { relationship: "OCCURRED_AT", target_label: "Zone" },
                RelationshipDecl { relationship: "INVOLVED", target_label: "Worker" },
                RelationshipDecl { relationship: "CAUSED_BY", target_label: "Risk" },
                RelationshipDecl { relationship: "INVESTIGATED_BY", target_label: "Person" },
                RelationshipDecl { relationship: "RESULTED_IN", target_label: "Action" },
            ],
            labels: &["Incident", "NearMiss", "NonConformity", "Accident"],
            iso_clause: Some("ISO 45001:10.2"),
            cnesst_mapping: Some("Déclaration CNESST, ADR"),
        },
        DimensionSchema {
            dimension: Dimension::ChangeManagement,
            required_fields: &[
                "change_id", "title", "type", "status", "requested_date", "requestor",
            ],
            optional_fields: &[
                "description", "justification", "risk_assessment", "affected_areas",
                "implementation_date", "approval_status", "approvers", "rollback_plan",
            ],
            relationships: &[
                RelationshipDecl { relationship: "AFFECTS", target_label: "Zone" },
                RelationshipDecl { relationship: "ASSESSED_FOR", target_label: "Risk" },
                RelationshipDecl { relationship: "APPROVED_BY", target_label: "Person" },
                RelationshipDecl { relationship: "DOCUMENTED_IN", target_label: "Document" },
                RelationshipDecl { relationship: "TRIGGERS", target_label: "Action" },
            ],
            labels: &["Change", "MOC", "Project"],
            iso_clause: Some("ISO 45001:8.1.3"),
            cnesst_mapping: Some("Gestion des changements"),
        },
        DimensionSchema {
            dimension: Dimension::CompetenciesCulture,
            required_fields: &["training_id", "title", "type", "status", "target_audience"],
            optional_fields: &[
                "description", "duration", "provider", "certification", "validity_period",
                "completion_date", "score", "refresher_date",
            ],
            relationships: &[
                RelationshipDecl { relationship: "COMPLETED_BY", target_label: "Worker" },
                RelationshipDecl { relationship: "REQUIRED_FOR", target_label: "Job" },
                RelationshipDecl { relationship: "COVERS", target_label: "Risk" },
                RelationshipDecl { relationship: "PROVIDED_BY", target_label: "Trainer" },
                RelationshipDecl { relationship: "DOCUMENTED_IN", target_label: "Certificate" },
            ],
            labels: &["Training", "Competency", "Certification", "Awareness"],
            iso_clause: Some("ISO 45001:7.2-7.3"),
            cnesst_mapping: Some("Formation SST obligatoire"),
        },
        DimensionSchema {
            dimension: Dimension::CommunicationParticipation,
            required_fields: &["communication_id", "type", "date", "participants", "status"],
            optional_fields: &[
                "subject", "summary", "decisions", "action_items", "next_meeting",
                "attachments",
            ],
            relationships: &[
                RelationshipDecl { relationship: "ATTENDED_BY", target_label: "Person" },
                RelationshipDecl { relationship: "DISCUSSED", target_label: "Risk" },
                RelationshipDecl { relationship: "RESULTED_IN", target_label: "Action" },
                RelationshipDecl { relationship: "DOCUMENTED_IN", target_label: "Minutes" },
                RelationshipDecl { relationship: "RELATED_TO", target_label: "Incident" },
            ],
            labels: &["Meeting", "Communication", "Consultation", "Observation"],
            iso_clause: Some("ISO 45001:7.4"),
            cnesst_mapping: Some("CSS, Comité SST"),
        },
        DimensionSchema {
            dimension: Dimension::EmergencyCrisis,
            required_fields: &["plan_id", "title", "type", "version", "effective_date", "status"],
            optional_fields: &[
                "description", "scope", "responsibilities", "resources", "evacuation_routes",
                "assembly_points", "communication_tree", "drill_frequency", "last_drill_date",
                "next_drill_date",
            ],
            relationships: &[
                RelationshipDecl { relationship: "APPLIES_TO", target_label: "Zone" },
                RelationshipDecl { relationship: "INVOLVES", target_label: "Equipment" },
                RelationshipDecl { relationship: "COORDINATED_BY", target_label: "Person" },
                RelationshipDecl { relationship: "TESTED_BY", target_label: "Drill" },
                RelationshipDecl { relationship: "DOCUMENTED_IN", target_label: "Procedure" },
            ],
            labels: &["EmergencyPlan", "Drill", "Crisis", "Evacuation"],
            iso_clause: Some("ISO 45001:8.2"),
            cnesst_mapping: Some("Plan d'urgence, Évacuation"),
        },
        DimensionSchema {
            dimension: Dimension::AuditsInspections,
            required_fields: &["audit_id", "type", "date", "auditor", "scope", "status"],
            optional_fields: &[
                "checklist_used", "findings", "score", "non_conformities", "observations",
                "recommendations", "follow_up_date", "closure_date", "report_url",
            ],
            relationships: &[
                RelationshipDecl { relationship: "AUDITED", target_label: "Zone" },
                RelationshipDecl { relationship: "CONDUCTED_BY", target_label: "Auditor" },
                RelationshipDecl { relationship: "FOUND", target_label: "NonConformity" },
                RelationshipDecl { relationship: "DOCUMENTED_IN", target_label: "Report" },
                RelationshipDecl { relationship: "RESULTED_IN", target_label: "Action" },
            ],
            labels: &["Audit", "Inspection", "Review", "Assessment"],
            iso_clause: Some("ISO 45001:9.2-9.3"),
            cnesst_mapping: Some("Audit interne, Inspection CNESST"),
        },
        DimensionSchema {
            dimension: Dimension::IndicatorsReporting,
            required_fields: &["kpi_id", "name", "type", "value", "unit", "period", "target"],
            optional_fields: &[
                "description", "formula", "data_source", "frequency", "trend", "benchmark",
                "responsible", "dashboard_url",
            ],
            relationships: &[
                RelationshipDecl { relationship: "MEASURES", target_label: "Process" },
                RelationshipDecl { relationship: "REPORTED_TO", target_label: "Stakeholder" },
                RelationshipDecl { relationship: "COMPARED_TO", target_label: "Benchmark" },
                RelationshipDecl { relationship: "VISUALIZED_IN", target_label: "Dashboard" },
            ],
            labels: &["KPI", "Metric", "Report", "Dashboard"],
            iso_clause: Some("ISO 45001:9.1"),
            cnesst_mapping: Some("TRIR, LTIFR, Fréquence/Gravité"),
        },
        DimensionSchema {
            dimension: Dimension::ContinuousImprovement,
            required_fields: &["action_id", "type", "title", "status", "created_date", "owner"],
            optional_fields: &[
                "description", "source", "priority", "target_date", "completion_date",
                "effectiveness", "lessons_learned", "related_incidents", "cost_savings",
            ],
            relationships: &[
                RelationshipDecl { relationship: "ADDRESSES", target_label: "Risk" },
                RelationshipDecl { relationship: "ASSIGNED_TO", target_label: "Person" },
                RelationshipDecl { relationship: "ORIGINATED_FROM", target_label: "Incident" },
                RelationshipDecl { relationship: "DOCUMENTED_IN", target_label: "Report" },
                RelationshipDecl { relationship: "VERIFIED_BY", target_label: "Audit" },
            ],
            labels: &["Action", "CAPA", "Improvement", "LessonLearned"],
            iso_clause: Some("ISO 45001:10.3"),
            cnesst_mapping: Some("Actions correctives/préventives"),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_covers_every_dimension() {
        let registry = SchemaRegistry::standard();
        assert_eq!(registry.len(), Dimension::ALL.len());
        for dim in Dimension::ALL {
            let schema = registry.schema_for(dim).unwrap();
            assert_eq!(schema.dimension, dim);
        }
    }

    #[test]
    fn no_schema_has_empty_required_fields_or_labels() {
        for schema in standard_schemas() {
            assert!(!schema.required_fields.is_empty(), "{}", schema.dimension);
            assert!(!schema.labels.is_empty(), "{}", schema.dimension);
        }
    }

    #[test]
    fn primary_key_is_first_required_field() {
        let registry = SchemaRegistry::standard();
        let risks = registry.schema_for(Dimension::RisksOpportunities).unwrap();
        assert_eq!(risks.primary_key(), "risk_id");
        assert_eq!(risks.primary_label(), "Risk");
    }

    #[test]
    fn relationship_declarations_outlive_the_catalog() {
        let decls: &'static [RelationshipDecl] = standard_schemas()[1].relationships;
        assert_eq!(decls.len(), 5);
        assert_eq!(decls[0].to_string(), "LOCATED_IN:Zone");
    }

    #[test]
    fn foreign_key_follows_lowercase_label_convention() {
        assert_eq!(RelationshipDecl::new("LOCATED_IN", "Zone").foreign_key(), "zone_id");
        assert_eq!(
            RelationshipDecl::new("MITIGATED_BY", "ControlMeasure").foreign_key(),
            "controlmeasure_id"
        );
    }

    #[test]
    fn restricted_registry_reports_unknown_dimension() {
        let only_risks = standard_schemas()
            .into_iter()
            .filter(|s| s.dimension == Dimension::RisksOpportunities);
        let registry = SchemaRegistry::from_schemas(only_risks).unwrap();

        assert!(registry.schema_for(Dimension::RisksOpportunities).is_ok());
        let err = registry.schema_for(Dimension::Environment).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownDimension(ref d) if d == "environment"));
    }

    #[test]
    fn schema_by_name_rejects_unknown_identifier() {
        let registry = SchemaRegistry::standard();
        assert!(registry.schema_by_name("audits_inspections").is_ok());
        assert!(matches!(
            registry.schema_by_name("nope"),
            Err(SchemaError::UnknownDimension(_))
        ));
    }

    #[test]
    fn from_schemas_rejects_duplicates_and_empty_required_fields() {
        let mut schemas = standard_schemas();
        let dup = schemas[0].clone();
        schemas.push(dup);
        assert!(matches!(
            SchemaRegistry::from_schemas(schemas),
            Err(SchemaError::DuplicateDimension(Dimension::GovernancePolicy))
        ));

        let mut broken = standard_schemas().remove(0);
        broken.required_fields = &[];
        assert!(matches!(
            SchemaRegistry::from_schemas(vec![broken]),
            Err(SchemaError::InvalidSchema { .. })
        ));
    }
}
