use serde::Serialize;
use serde_json::Value;

use super::fields;

fn score(value: &Value, key: &str) -> Option<f64> {
    fields::number(value, key).map(|s| s.clamp(0.0, 100.0))
}

/// Production assessment for one item.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemAnalysis {
    #[serde(rename = "numero_item")]
    pub item_number: Option<String>,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "pode_produzir")]
    pub can_produce: bool,
    /// 0-100
    #[serde(rename = "nota_viabilidade")]
    pub score: Option<f64>,
    #[serde(rename = "justificativa")]
    pub justification: Option<String>,
    #[serde(rename = "restricoes")]
    pub restrictions: Vec<String>,
}

impl ItemAnalysis {
    fn from_json(value: &Value) -> Self {
        Self {
            item_number: fields::string(value, "numero_item"),
            description: fields::string(value, "descricao"),
            can_produce: fields::boolean(value, "pode_produzir").unwrap_or(false),
            score: score(value, "nota_viabilidade"),
            justification: fields::string(value, "justificativa"),
            restrictions: fields::strings(value, "restricoes"),
        }
    }
}

/// Whether participating in the notice is worthwhile.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Feasibility {
    /// viavel, parcialmente_viavel or inviavel
    #[serde(rename = "veredicto")]
    pub verdict: Option<String>,
    /// 0-100
    #[serde(rename = "score")]
    pub score: Option<f64>,
    #[serde(rename = "justificativa")]
    pub justification: Option<String>,
    #[serde(rename = "itens_analise")]
    pub items: Vec<ItemAnalysis>,
    #[serde(rename = "pontos_atencao")]
    pub attention_points: Vec<String>,
    #[serde(rename = "vantagens_competitivas")]
    pub advantages: Vec<String>,
    #[serde(rename = "certificacoes_faltantes")]
    pub missing_certifications: Vec<String>,
    #[serde(rename = "estimativa_complexidade")]
    pub complexity: Option<String>,
    #[serde(rename = "impacto_logistico")]
    pub logistic_impact: Option<String>,
    #[serde(rename = "recomendacao")]
    pub recommendation: Option<String>,
}

impl Feasibility {
    pub fn from_json(value: &Value) -> Self {
        Self {
            verdict: fields::string(value, "veredicto"),
            score: score(value, "score"),
            justification: fields::string(value, "justificativa"),
            items: fields::objects(value, "itens_analise")
                .map(ItemAnalysis::from_json)
                .collect(),
            attention_points: fields::strings(value, "pontos_atencao"),
            advantages: fields::strings(value, "vantagens_competitivas"),
            missing_certifications: fields::strings(value, "certificacoes_faltantes"),
            complexity: fields::one_of(value, "estimativa_complexidade", &["baixa", "media", "alta"]),
            logistic_impact: fields::one_of(value, "impacto_logistico", &["baixo", "medio", "alto"]),
            recommendation: fields::string(value, "recomendacao"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeyData {
    #[serde(rename = "valor_total_estimado")]
    pub total_value: Option<f64>,
    #[serde(rename = "quantidade_total_itens")]
    pub item_count: Option<i64>,
    #[serde(rename = "prazo_entrega_dias")]
    pub delivery_days: Option<i64>,
    #[serde(rename = "data_limite_proposta")]
    pub proposal_deadline: Option<String>,
    #[serde(rename = "modalidade")]
    pub modality: Option<String>,
    #[serde(rename = "orgao")]
    pub organization: Option<String>,
}

impl KeyData {
    fn from_json(value: &Value) -> Self {
        Self {
            total_value: fields::number(value, "valor_total_estimado"),
            item_count: fields::integer(value, "quantidade_total_itens"),
            delivery_days: fields::integer(value, "prazo_entrega_dias"),
            proposal_deadline: fields::string(value, "data_limite_proposta"),
            modality: fields::string(value, "modalidade"),
            organization: fields::string(value, "orgao"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Opportunity {
    pub score: Option<f64>,
    /// excelente, boa, regular, baixa or nula
    #[serde(rename = "nivel")]
    pub level: Option<String>,
    #[serde(rename = "motivo")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NextAction {
    #[serde(rename = "acao")]
    pub action: String,
    #[serde(rename = "prazo")]
    pub deadline: Option<String>,
    #[serde(rename = "responsavel")]
    pub owner: Option<String>,
}

/// Decision-oriented report for the whole notice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutiveSummary {
    #[serde(rename = "titulo_resumo")]
    pub title: Option<String>,
    #[serde(rename = "resumo_executivo")]
    pub summary: Option<String>,
    #[serde(rename = "dados_chave")]
    pub key_data: Option<KeyData>,
    #[serde(rename = "oportunidade")]
    pub opportunity: Option<Opportunity>,
    #[serde(rename = "proximas_acoes")]
    pub next_actions: Vec<NextAction>,
    #[serde(rename = "palavras_chave")]
    pub keywords: Vec<String>,
}

impl ExecutiveSummary {
    pub fn from_json(value: &Value) -> Self {
        Self {
            title: fields::string(value, "titulo_resumo"),
            summary: fields::string(value, "resumo_executivo"),
            key_data: fields::object(value, "dados_chave").map(KeyData::from_json),
            opportunity: fields::object(value, "oportunidade").map(|o| Opportunity {
                score: score(o, "score"),
                level: fields::string(o, "nivel"),
                reason: fields::string(o, "motivo"),
            }),
            next_actions: fields::objects(value, "proximas_acoes")
                .filter_map(|a| {
                    Some(NextAction {
                        action: fields::string(a, "acao")?,
                        deadline: fields::string(a, "prazo"),
                        owner: fields::string(a, "responsavel"),
                    })
                })
                .collect(),
            keywords: fields::strings(value, "palavras_chave"),
        }
    }
}
