use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fields;

/// Group a requirement is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequirementCategory {
    #[serde(rename = "habilitacao_juridica")]
    Legal,
    #[serde(rename = "qualificacao_tecnica")]
    Technical,
    #[serde(rename = "qualificacao_economica")]
    Economic,
    #[serde(rename = "documentos_fiscais")]
    Fiscal,
    #[serde(rename = "requisitos_amostra")]
    Samples,
    #[serde(rename = "garantias")]
    Guarantees,
    #[serde(rename = "prazos_importantes")]
    Deadlines,
}

impl RequirementCategory {
    pub const ALL: [RequirementCategory; 7] = [
        RequirementCategory::Legal,
        RequirementCategory::Technical,
        RequirementCategory::Economic,
        RequirementCategory::Fiscal,
        RequirementCategory::Samples,
        RequirementCategory::Guarantees,
        RequirementCategory::Deadlines,
    ];

    /// Key of the category list in the model response
    pub fn key(&self) -> &'static str {
        match self {
            RequirementCategory::Legal => "habilitacao_juridica",
            RequirementCategory::Technical => "qualificacao_tecnica",
            RequirementCategory::Economic => "qualificacao_economica",
            RequirementCategory::Fiscal => "documentos_fiscais",
            RequirementCategory::Samples => "requisitos_amostra",
            RequirementCategory::Guarantees => "garantias",
            RequirementCategory::Deadlines => "prazos_importantes",
        }
    }
}

impl std::fmt::Display for RequirementCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Effort needed to satisfy a requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(rename = "baixa")]
    Low,
    #[default]
    #[serde(rename = "media")]
    Medium,
    #[serde(rename = "alta")]
    High,
}

impl Difficulty {
    fn from_json(value: &Value) -> Self {
        match fields::one_of(value, "dificuldade", &["baixa", "media", "alta"]).as_deref() {
            Some("baixa") => Difficulty::Low,
            Some("alta") => Difficulty::High,
            _ => Difficulty::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Requirement {
    #[serde(rename = "categoria")]
    pub category: RequirementCategory,
    #[serde(rename = "descricao")]
    pub description: String,
    /// Only an explicit `false` makes a requirement optional
    #[serde(rename = "obrigatorio")]
    pub mandatory: bool,
    #[serde(rename = "dificuldade")]
    pub difficulty: Difficulty,
    #[serde(rename = "observacao")]
    pub note: Option<String>,
    /// Deadline attached to the requirement (ISO 8601 when the model complies)
    #[serde(rename = "data")]
    pub deadline: Option<String>,
}

impl Requirement {
    fn from_json(category: RequirementCategory, value: &Value) -> Self {
        Self {
            category,
            description: fields::string(value, "descricao").unwrap_or_default(),
            mandatory: fields::boolean(value, "obrigatorio") != Some(false),
            difficulty: Difficulty::from_json(value),
            note: fields::string(value, "observacao"),
            deadline: fields::string(value, "data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Certification {
    #[serde(rename = "nome")]
    pub name: String,
    /// abnt, inmetro, iso, procel, anvisa, bpm or outro
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "norma")]
    pub standard: Option<String>,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "obrigatoria")]
    pub mandatory: bool,
    #[serde(rename = "aplica_a")]
    pub applies_to: Option<String>,
}

impl Certification {
    fn from_json(value: &Value) -> Self {
        Self {
            name: fields::string(value, "nome").unwrap_or_else(|| "Certificação".to_string()),
            kind: fields::string(value, "tipo")
                .map(|k| k.to_lowercase())
                .unwrap_or_else(|| "outro".to_string()),
            standard: fields::string(value, "norma"),
            description: fields::string(value, "descricao"),
            mandatory: fields::boolean(value, "obrigatoria").unwrap_or(true),
            applies_to: fields::string(value, "aplica_a"),
        }
    }
}

/// Eligibility and compliance requirements of a notice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Requirements {
    /// All categories flattened, in category order
    #[serde(rename = "requisitos")]
    pub requirements: Vec<Requirement>,
    #[serde(rename = "certificacoes")]
    pub certifications: Vec<Certification>,
    #[serde(rename = "visita_tecnica_obrigatoria")]
    pub technical_visit_required: Option<bool>,
    #[serde(rename = "resumo_requisitos")]
    pub summary: Option<String>,
}

impl Requirements {
    pub fn from_json(value: &Value) -> Self {
        let requirements = RequirementCategory::ALL
            .iter()
            .flat_map(|category| {
                fields::objects(value, category.key())
                    .map(move |item| Requirement::from_json(*category, item))
            })
            .collect();

        Self {
            requirements,
            certifications: fields::objects(value, "certificacoes")
                .map(Certification::from_json)
                .collect(),
            technical_visit_required: fields::boolean(value, "visita_tecnica_obrigatoria"),
            summary: fields::string(value, "resumo_requisitos"),
        }
    }

    pub fn in_category(&self, category: RequirementCategory) -> impl Iterator<Item = &Requirement> {
        self.requirements
            .iter()
            .filter(move |r| r.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requirements_defaults() {
        let value = json!({
            "habilitacao_juridica": [
                {"descricao": "Contrato social", "dificuldade": "baixa"},
                {"descricao": "Procuração", "obrigatorio": false, "dificuldade": "impossivel"}
            ],
            "prazos_importantes": [
                {"descricao": "Envio de amostras", "data": "2025-04-01", "obrigatorio": "true"}
            ],
            "garantias": "nenhuma",
            "certificacoes": [
                {"norma": "ABNT NBR 13961"},
                {"nome": "INMETRO", "tipo": "INMETRO", "obrigatoria": false}
            ],
            "visita_tecnica_obrigatoria": false
        });

        let req = Requirements::from_json(&value);

        assert_eq!(req.requirements.len(), 3);
        let legal: Vec<_> = req.in_category(RequirementCategory::Legal).collect();
        assert_eq!(legal.len(), 2);
        assert!(legal[0].mandatory);
        assert_eq!(legal[0].difficulty, Difficulty::Low);
        assert!(!legal[1].mandatory);
        assert_eq!(legal[1].difficulty, Difficulty::Medium);

        let deadline = req.in_category(RequirementCategory::Deadlines).next().unwrap();
        assert_eq!(deadline.deadline.as_deref(), Some("2025-04-01"));

        assert_eq!(req.certifications[0].name, "Certificação");
        assert_eq!(req.certifications[0].kind, "outro");
        assert!(req.certifications[0].mandatory);
        assert_eq!(req.certifications[1].kind, "inmetro");
        assert!(!req.certifications[1].mandatory);
        assert_eq!(req.technical_visit_required, Some(false));
    }

    #[test]
    fn test_category_order_is_preserved() {
        let value = json!({
            "prazos_importantes": [{"descricao": "d"}],
            "habilitacao_juridica": [{"descricao": "a"}],
            "documentos_fiscais": [{"descricao": "c"}]
        });

        let categories: Vec<_> = Requirements::from_json(&value)
            .requirements
            .iter()
            .map(|r| r.category)
            .collect();

        assert_eq!(
            categories,
            vec![
                RequirementCategory::Legal,
                RequirementCategory::Fiscal,
                RequirementCategory::Deadlines
            ]
        );
    }

    #[test]
    fn test_category_keys_match_serde() {
        for category in RequirementCategory::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.key()));
        }
    }
}
