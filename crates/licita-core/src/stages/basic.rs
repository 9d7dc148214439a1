use serde::Serialize;
use serde_json::Value;

use super::fields;

/// Issuing body of a notice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Organization {
    #[serde(rename = "nome")]
    pub name: Option<String>,
    #[serde(rename = "nome_curto")]
    pub short_name: Option<String>,
    pub cnpj: Option<String>,
    #[serde(rename = "municipio")]
    pub municipality: Option<String>,
    #[serde(rename = "uf")]
    pub state: Option<String>,
    /// federal, estadual or municipal
    #[serde(rename = "esfera")]
    pub sphere: Option<String>,
}

impl Organization {
    /// `None` when the object carries nothing usable.
    pub fn from_json(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let org = Self {
            name: fields::string(value, "nome"),
            short_name: fields::string(value, "nome_curto"),
            cnpj: fields::string(value, "cnpj"),
            municipality: fields::string(value, "municipio"),
            state: fields::string(value, "uf").map(|uf| uf.to_uppercase()),
            sphere: fields::one_of(value, "esfera", &["federal", "estadual", "municipal"]),
        };
        (org != Self::default()).then_some(org)
    }
}

/// Identifying metadata of a notice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BasicData {
    #[serde(rename = "numero_edital")]
    pub notice_number: Option<String>,
    #[serde(rename = "numero_processo")]
    pub process_number: Option<String>,
    #[serde(rename = "modalidade")]
    pub modality: Option<String>,
    #[serde(rename = "objeto")]
    pub object: Option<String>,
    #[serde(rename = "orgao")]
    pub organization: Option<Organization>,
    #[serde(rename = "valor_estimado")]
    pub estimated_value: Option<f64>,
    /// ISO 8601
    #[serde(rename = "data_abertura")]
    pub opening_date: Option<String>,
    #[serde(rename = "data_encerramento")]
    pub closing_date: Option<String>,
    #[serde(rename = "prazo_execucao_dias")]
    pub execution_days: Option<i64>,
    #[serde(rename = "endereco_entrega")]
    pub delivery_address: Option<String>,
    #[serde(rename = "municipio_entrega")]
    pub delivery_municipality: Option<String>,
    #[serde(rename = "uf_entrega")]
    pub delivery_state: Option<String>,
    #[serde(rename = "condicoes_pagamento")]
    pub payment_terms: Option<String>,
    #[serde(rename = "criterio_julgamento")]
    pub judgment_criterion: Option<String>,
}

impl BasicData {
    pub fn from_json(value: &Value) -> Self {
        Self {
            notice_number: fields::string(value, "numero_edital"),
            process_number: fields::string(value, "numero_processo"),
            modality: fields::string(value, "modalidade"),
            object: fields::string(value, "objeto"),
            organization: fields::object(value, "orgao").and_then(Organization::from_json),
            estimated_value: fields::number(value, "valor_estimado").filter(|v| *v > 0.0),
            opening_date: fields::string(value, "data_abertura"),
            closing_date: fields::string(value, "data_encerramento"),
            execution_days: fields::integer(value, "prazo_execucao_dias").filter(|d| *d > 0),
            delivery_address: fields::string(value, "endereco_entrega"),
            delivery_municipality: fields::string(value, "municipio_entrega"),
            delivery_state: fields::string(value, "uf_entrega").map(|uf| uf.to_uppercase()),
            payment_terms: fields::string(value, "condicoes_pagamento"),
            judgment_criterion: fields::string(value, "criterio_julgamento"),
        }
    }

    /// CNPJ of the issuing body, when one was found.
    pub fn organization_cnpj(&self) -> Option<&str> {
        self.organization.as_ref()?.cnpj.as_deref()
    }
}

/// Estimated value for one lot or group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LotValue {
    #[serde(rename = "lote")]
    pub lot: Option<String>,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "valor")]
    pub value: Option<f64>,
}

/// Total and per-lot estimated value of a notice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EstimatedValue {
    #[serde(rename = "valor_estimado_total")]
    pub total: Option<f64>,
    #[serde(rename = "moeda")]
    pub currency: Option<String>,
    #[serde(rename = "valores_por_lote")]
    pub lots: Vec<LotValue>,
    /// Where in the notice the value was found
    #[serde(rename = "fonte_do_valor")]
    pub source: Option<String>,
    /// alta, media or baixa
    #[serde(rename = "confianca")]
    pub confidence: Option<String>,
    #[serde(rename = "observacao")]
    pub note: Option<String>,
}

impl EstimatedValue {
    pub fn from_json(value: &Value) -> Self {
        Self {
            total: fields::number(value, "valor_estimado_total"),
            currency: fields::string(value, "moeda"),
            lots: fields::objects(value, "valores_por_lote")
                .map(|lot| LotValue {
                    lot: fields::string(lot, "lote"),
                    description: fields::string(lot, "descricao"),
                    value: fields::number(lot, "valor"),
                })
                .collect(),
            source: fields::string(value, "fonte_do_valor"),
            confidence: fields::one_of(value, "confianca", &["alta", "media", "baixa"]),
            note: fields::string(value, "observacao"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_data_from_full_response() {
        let value = json!({
            "numero_edital": "90012/2025",
            "numero_processo": "23000.001234/2025-11",
            "modalidade": "pregao_eletronico",
            "objeto": "Aquisição de mobiliário escolar",
            "orgao": {
                "nome": "Instituto Federal de São Paulo - Campus Campinas",
                "nome_curto": "IFSP Campinas",
                "cnpj": "10.882.594/0001-65",
                "municipio": "Campinas",
                "uf": "sp",
                "esfera": "federal"
            },
            "valor_estimado": "R$ 125.000,00",
            "data_abertura": "2025-03-15T10:00:00-03:00",
            "prazo_execucao_dias": 60,
            "uf_entrega": "sp",
            "criterio_julgamento": "menor_preco"
        });

        let data = BasicData::from_json(&value);

        assert_eq!(data.notice_number.as_deref(), Some("90012/2025"));
        assert_eq!(data.estimated_value, Some(125_000.0));
        assert_eq!(data.execution_days, Some(60));
        assert_eq!(data.delivery_state.as_deref(), Some("SP"));
        assert_eq!(data.organization_cnpj(), Some("10.882.594/0001-65"));
        let org = data.organization.unwrap();
        assert_eq!(org.state.as_deref(), Some("SP"));
        assert_eq!(org.sphere.as_deref(), Some("federal"));
        assert!(data.closing_date.is_none());
    }

    #[test]
    fn test_basic_data_from_garbage() {
        let data = BasicData::from_json(&json!({"orgao": "Prefeitura", "valor_estimado": 0}));
        assert_eq!(data, BasicData::default());

        let data = BasicData::from_json(&json!({"orgao": {"cnpj": null, "esfera": "galactica"}}));
        assert!(data.organization.is_none());
    }

    #[test]
    fn test_estimated_value_lots() {
        let value = json!({
            "valor_estimado_total": 98000.5,
            "moeda": "BRL",
            "valores_por_lote": [
                {"lote": "Lote 01", "descricao": "Cadeiras", "valor": "48.000,50"},
                "lixo",
                {"lote": "Lote 02", "valor": 50000}
            ],
            "confianca": "Alta"
        });

        let estimated = EstimatedValue::from_json(&value);

        assert_eq!(estimated.total, Some(98_000.5));
        assert_eq!(estimated.lots.len(), 2);
        assert_eq!(estimated.lots[0].value, Some(48_000.5));
        assert_eq!(estimated.confidence.as_deref(), Some("alta"));
    }

    #[test]
    fn test_serialized_keys_match_response_keys() {
        let data = BasicData {
            notice_number: Some("1/2025".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["numero_edital"], "1/2025");
        assert!(json["orgao"].is_null());
    }
}
