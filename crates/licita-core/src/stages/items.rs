use serde::Serialize;
use serde_json::Value;

use super::fields;

/// Characters of the description that take part in item identity
const IDENTITY_DESCRIPTION_CHARS: usize = 80;

/// One item line found in a notice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedItem {
    /// Numbering as printed in the notice ("001", "Item 3")
    #[serde(rename = "numero_item")]
    pub item_number: Option<String>,
    #[serde(rename = "numero_lote")]
    pub lot_number: Option<String>,
    #[serde(rename = "nome_lote")]
    pub lot_name: Option<String>,
    #[serde(rename = "descricao")]
    pub description: Option<String>,
    #[serde(rename = "descricao_detalhada")]
    pub detailed_description: Option<String>,
    #[serde(rename = "unidade")]
    pub unit: Option<String>,
    #[serde(rename = "quantidade")]
    pub quantity: Option<f64>,
    #[serde(rename = "valor_unitario_estimado")]
    pub unit_value: Option<f64>,
    #[serde(rename = "valor_total_estimado")]
    pub total_value: Option<f64>,
    /// Free-form technical attributes
    #[serde(rename = "especificacoes")]
    pub specifications: Option<Value>,
    #[serde(rename = "codigo_catmat")]
    pub catalog_code: Option<String>,
    #[serde(rename = "categoria")]
    pub category: Option<String>,
    /// alta, media or baixa
    #[serde(rename = "confianca_quantidade")]
    pub quantity_confidence: Option<String>,
}

impl ExtractedItem {
    pub fn from_json(value: &Value) -> Self {
        Self {
            item_number: fields::string(value, "numero_item"),
            lot_number: fields::string(value, "numero_lote"),
            lot_name: fields::string(value, "nome_lote"),
            description: fields::string(value, "descricao"),
            detailed_description: fields::string(value, "descricao_detalhada"),
            unit: fields::string(value, "unidade"),
            quantity: fields::number(value, "quantidade"),
            unit_value: fields::number(value, "valor_unitario_estimado"),
            total_value: fields::number(value, "valor_total_estimado"),
            specifications: fields::object(value, "especificacoes").cloned(),
            catalog_code: fields::string(value, "codigo_catmat"),
            category: fields::string(value, "categoria"),
            quantity_confidence: fields::one_of(
                value,
                "confianca_quantidade",
                &["alta", "media", "baixa"],
            ),
        }
    }

    /// Lot, item number and description prefix. Two items with the same key
    /// are the same line seen through overlapping windows.
    pub fn identity_key(&self) -> ItemKey {
        let description: String = self
            .description
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(IDENTITY_DESCRIPTION_CHARS)
            .collect();
        (
            self.lot_number.clone().unwrap_or_default(),
            self.item_number.clone().unwrap_or_default(),
            description,
        )
    }
}

/// Identity of an extracted item line: (lot, item number, description prefix)
pub type ItemKey = (String, String, String);

/// Items found in one window of the full-text scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkItems {
    #[serde(rename = "itens")]
    pub items: Vec<ExtractedItem>,
    /// Count reported by the model, which may disagree with `items`
    #[serde(rename = "total_itens_encontrados")]
    pub reported_count: Option<i64>,
    #[serde(rename = "chunk_info")]
    pub note: Option<String>,
}

impl ChunkItems {
    pub fn from_json(value: &Value) -> Self {
        Self {
            items: fields::objects(value, "itens")
                .map(ExtractedItem::from_json)
                .collect(),
            reported_count: fields::integer(value, "total_itens_encontrados"),
            note: fields::string(value, "chunk_info"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunk_items_skip_non_objects() {
        let value = json!({
            "itens": [
                {
                    "numero_item": 1,
                    "numero_lote": "Lote 01",
                    "descricao": "Cadeira giratória",
                    "quantidade": "120",
                    "valor_unitario_estimado": 850.0,
                    "especificacoes": {"cor": "preta"},
                    "confianca_quantidade": "alta"
                },
                null,
                "Mesa"
            ],
            "total_itens_encontrados": 3
        });

        let chunk = ChunkItems::from_json(&value);

        assert_eq!(chunk.items.len(), 1);
        assert_eq!(chunk.reported_count, Some(3));
        let item = &chunk.items[0];
        assert_eq!(item.item_number.as_deref(), Some("1"));
        assert_eq!(item.quantity, Some(120.0));
        assert_eq!(item.specifications, Some(json!({"cor": "preta"})));
    }

    #[test]
    fn test_missing_items_array_is_empty() {
        assert!(ChunkItems::from_json(&json!({"itens": "nenhum"})).items.is_empty());
        assert!(ChunkItems::from_json(&json!({})).items.is_empty());
    }

    #[test]
    fn test_identity_key_truncates_description() {
        let long = "x".repeat(200);
        let a = ExtractedItem {
            item_number: Some("3".into()),
            lot_number: Some("1".into()),
            description: Some(format!("{long}a")),
            ..Default::default()
        };
        let b = ExtractedItem {
            description: Some(format!("{long}b")),
            unit: Some("UN".into()),
            ..a.clone()
        };

        assert_eq!(a.identity_key(), b.identity_key());
        assert_eq!(
            a.identity_key(),
            ("1".to_string(), "3".to_string(), "x".repeat(80))
        );
    }

    #[test]
    fn test_identity_key_distinguishes_lots() {
        let a = ExtractedItem {
            item_number: Some("1".into()),
            lot_number: Some("1".into()),
            description: Some("Mesa".into()),
            ..Default::default()
        };
        let b = ExtractedItem {
            lot_number: Some("2".into()),
            ..a.clone()
        };
        assert_ne!(a.identity_key(), b.identity_key());
        assert_eq!(ExtractedItem::default().identity_key(), ItemKey::default());
    }

    #[test]
    fn test_identity_key_keeps_separators_in_fields() {
        let a = ExtractedItem {
            lot_number: Some("1|2".into()),
            item_number: Some("3".into()),
            ..Default::default()
        };
        let b = ExtractedItem {
            lot_number: Some("1".into()),
            item_number: Some("2|3".into()),
            ..Default::default()
        };
        assert_ne!(a.identity_key(), b.identity_key());
    }
}
