//! Prevention playbooks generated from the risks held by a twin

use crate::graph::{GraphNode, NodeId};
use crate::schema::{cnesst_category, CnesstCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Risks at or above this count in one category make its playbook P1.
const P1_RISK_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookStep {
    pub step: usize,
    pub action: String,
    pub responsible: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub id: String,
    pub title: String,
    pub category: CnesstCategory,
    pub triggers: Vec<String>,
    pub steps: Vec<PlaybookStep>,
    pub references: Vec<String>,
    pub risks_covered: Vec<NodeId>,
    pub priority: String,
    pub generated_at: DateTime<Utc>,
}

struct Template {
    category: CnesstCategory,
    title: &'static str,
    triggers: &'static [&'static str],
    steps: &'static [(&'static str, &'static str)],
    references: &'static [&'static str],
}

const TEMPLATES: &[Template] = &[
    Template {
        category: CnesstCategory::FallFromHeight,
        title: "Playbook Prévention Chutes de Hauteur",
        triggers: &["Travaux > 3m", "Échafaudage", "Toiture", "Échelle"],
        steps: &[
            ("Vérifier EPI (harnais, longe, point d'ancrage)", "Superviseur"),
            ("Inspecter garde-corps et protections collectives", "Préventeur"),
            ("Former travailleurs sur procédure sécuritaire", "Formateur HSE"),
            ("Délimiter zone de travail", "Chef d'équipe"),
            ("Documenter dans registre SST", "Coordonnateur"),
        ],
        references: &["RSST art. 346-354", "LMRSST art. 51", "Vision Zero - Chutes"],
    },
    Template {
        category: CnesstCategory::ConfinedSpace,
        title: "Playbook Entrée Espaces Clos",
        triggers: &["Permis espace clos actif", "Réservoir", "Cuve", "Tunnel"],
        steps: &[
            ("Émettre permis d'entrée", "Superviseur qualifié"),
            ("Tester atmosphère (O2, LEL, H2S, CO)", "Entrant qualifié"),
            ("Positionner surveillant à l'entrée", "Surveillant"),
            ("Vérifier équipement de sauvetage", "Équipe secours"),
            ("Communication continue pendant travaux", "Tous"),
        ],
        references: &["RSST art. 297-310", "CSA Z1006", "LMRSST art. 51.3"],
    },
    Template {
        category: CnesstCategory::Machinery,
        title: "Playbook Sécurité Machines",
        triggers: &["Maintenance machine", "Cadenassage", "Déblocage"],
        steps: &[
            ("Appliquer procédure LOTO (Lock Out Tag Out)", "Opérateur"),
            ("Vérifier absence d'énergie résiduelle", "Électricien"),
            ("Installer protecteurs avant remise en marche", "Mécanicien"),
            ("Test fonctionnel sécuritaire", "Superviseur"),
            ("Documenter intervention", "Maintenance"),
        ],
        references: &["RSST art. 185-195", "CSA Z460", "LMRSST art. 51"],
    },
    Template {
        category: CnesstCategory::Ergonomic,
        title: "Playbook Prévention TMS",
        triggers: &["Manutention répétitive", "Postures contraignantes", "Vibrations"],
        steps: &[
            ("Évaluer poste avec grille OSHA/NIOSH", "Ergonome"),
            ("Implanter aides mécaniques", "Ingénieur"),
            ("Former aux techniques de manutention", "Formateur"),
            ("Organiser rotation des tâches", "Superviseur"),
            ("Suivi médical préventif", "SST"),
        ],
        references: &["RSST art. 166-170", "Guide IRSST TMS", "Vision Zero - Ergonomie"],
    },
];

fn template_for(category: CnesstCategory) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.category == category)
}

/// CNESST category of a risk node.
///
/// Full risk records carry `cnesst_category`; reference nodes created from a
/// permit's risk list are keyed by the code itself.
fn risk_category(node: &GraphNode) -> CnesstCategory {
    if let Some(code) = node.property("cnesst_category").and_then(|v| v.as_str()) {
        if let Some(category) = CnesstCategory::from_code(code) {
            return category;
        }
    }
    if let Some(raw) = node.property("category").and_then(|v| v.as_str()) {
        return CnesstCategory::from_code(raw).unwrap_or_else(|| cnesst_category(raw));
    }
    CnesstCategory::from_code(node.id.as_str()).unwrap_or(CnesstCategory::Other)
}

fn is_critical(node: &GraphNode) -> bool {
    node.property("severity")
        .and_then(|v| v.as_str())
        .is_some_and(|s| s.eq_ignore_ascii_case("critical"))
}

/// Playbooks and recommendations for every risk node among `nodes`.
pub fn generate_playbooks(nodes: &[GraphNode]) -> (Vec<Playbook>, Vec<String>) {
    let mut by_category: BTreeMap<CnesstCategory, Vec<&GraphNode>> = BTreeMap::new();
    for node in nodes.iter().filter(|n| n.has_label("Risk")) {
        by_category.entry(risk_category(node)).or_default().push(node);
    }

    let mut playbooks = Vec::new();
    let mut recommendations = Vec::new();
    let now = Utc::now();

    for (category, risks) in &by_category {
        let Some(template) = template_for(*category) else {
            recommendations.push(format!(
                "{} risques {}: Créer playbook personnalisé",
                risks.len(),
                category
            ));
            continue;
        };

        let priority = if risks.len() >= P1_RISK_COUNT || risks.iter().any(|r| is_critical(r)) {
            "P1"
        } else {
            "P2"
        };
        playbooks.push(Playbook {
            id: format!("PLB-{}", &Uuid::new_v4().simple().to_string()[..8]),
            title: template.title.to_string(),
            category: *category,
            triggers: template.triggers.iter().map(|t| t.to_string()).collect(),
            steps: template
                .steps
                .iter()
                .enumerate()
                .map(|(i, (action, responsible))| PlaybookStep {
                    step: i + 1,
                    action: action.to_string(),
                    responsible: responsible.to_string(),
                })
                .collect(),
            references: template.references.iter().map(|r| r.to_string()).collect(),
            risks_covered: risks.iter().map(|r| r.id.clone()).collect(),
            priority: priority.to_string(),
            generated_at: now,
        });
        recommendations.push(format!(
            "{} risques {}: Appliquer '{}'",
            risks.len(),
            category,
            template.title
        ));
    }

    let critical = by_category.values().flatten().filter(|r| is_critical(r)).count();
    if critical > 0 {
        recommendations.insert(
            0,
            format!("{} risques CRITIQUES nécessitent action immédiate", critical),
        );
    }

    (playbooks, recommendations)
}
