//! In-memory [`PersistenceGateway`] whose whole state can be snapshotted.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use super::{
    CertificationRow, DocumentPatch, DocumentStatus, ItemFeasibility, ItemRow,
    PersistenceGateway, RequirementRow, StageResult,
};
use crate::stages::Organization;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: Option<String>,
    pub status: DocumentStatus,
    /// Every status the document went through, oldest first
    pub status_history: Vec<DocumentStatus>,
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub fields: DocumentPatch,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredOrganization {
    pub id: String,
    #[serde(flatten)]
    pub organization: Organization,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredStageResult {
    pub document_id: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub result: StageResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredItem {
    pub id: String,
    pub document_id: String,
    #[serde(flatten)]
    pub row: ItemRow,
    pub feasibility: Option<ItemFeasibility>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredRequirement {
    pub id: String,
    pub document_id: String,
    #[serde(flatten)]
    pub row: RequirementRow,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredCertification {
    pub id: String,
    pub document_id: String,
    #[serde(flatten)]
    pub row: CertificationRow,
}

/// Everything the store holds, in insertion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSnapshot {
    pub documents: Vec<DocumentRecord>,
    pub organizations: Vec<StoredOrganization>,
    pub stage_results: Vec<StoredStageResult>,
    pub items: Vec<StoredItem>,
    pub requirements: Vec<StoredRequirement>,
    pub certifications: Vec<StoredCertification>,
}

impl StoreSnapshot {
    pub fn document(&self, document_id: &str) -> Option<&DocumentRecord> {
        self.documents.iter().find(|d| d.id == document_id)
    }

    fn document_mut(&mut self, document_id: &str) -> Result<&mut DocumentRecord> {
        self.documents
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or_else(|| anyhow!("Unknown document: {document_id}"))
    }

    fn ensure_document(&self, document_id: &str) -> Result<()> {
        self.document(document_id)
            .map(|_| ())
            .ok_or_else(|| anyhow!("Unknown document: {document_id}"))
    }

    pub fn stage_results_for(&self, document_id: &str) -> Vec<&StageResult> {
        self.stage_results
            .iter()
            .filter(|r| r.document_id == document_id)
            .map(|r| &r.result)
            .collect()
    }

    pub fn items_for(&self, document_id: &str) -> Vec<&StoredItem> {
        self.items
            .iter()
            .filter(|i| i.document_id == document_id)
            .collect()
    }

    pub fn requirements_for(&self, document_id: &str) -> Vec<&StoredRequirement> {
        self.requirements
            .iter()
            .filter(|r| r.document_id == document_id)
            .collect()
    }

    pub fn certifications_for(&self, document_id: &str) -> Vec<&StoredCertification> {
        self.certifications
            .iter()
            .filter(|c| c.document_id == document_id)
            .collect()
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Gateway backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new `pending` document and return its id.
    pub async fn create_document(&self, title: Option<&str>) -> String {
        let now = Utc::now();
        let id = new_id();
        self.state.lock().await.documents.push(DocumentRecord {
            id: id.clone(),
            title: title.map(str::to_string),
            status: DocumentStatus::Pending,
            status_history: vec![DocumentStatus::Pending],
            error_message: None,
            fields: DocumentPatch::default(),
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryStore {
    async fn set_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        message: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let document = state.document_mut(document_id)?;
        document.status = status;
        document.status_history.push(status);
        if let Some(message) = message {
            document.error_message = Some(message.to_string());
        }
        document.updated_at = Utc::now();
        Ok(())
    }

    async fn update_document(&self, document_id: &str, patch: &DocumentPatch) -> Result<()> {
        let mut state = self.state.lock().await;
        let document = state.document_mut(document_id)?;
        document.fields.apply(patch);
        document.updated_at = Utc::now();
        Ok(())
    }

    async fn record_stage(&self, document_id: &str, result: &StageResult) -> Result<()> {
        let mut state = self.state.lock().await;
        state.ensure_document(document_id)?;
        state.stage_results.push(StoredStageResult {
            document_id: document_id.to_string(),
            recorded_at: Utc::now(),
            result: result.clone(),
        });
        Ok(())
    }

    async fn upsert_organization(
        &self,
        cnpj: &str,
        organization: &Organization,
    ) -> Result<String> {
        let mut state = self.state.lock().await;

        let existing = state
            .organizations
            .iter_mut()
            .find(|o| o.organization.cnpj.as_deref() == Some(cnpj));
        if let Some(existing) = existing {
            let current = &mut existing.organization;
            let incoming = organization.clone();
            current.name = incoming.name.or(current.name.take());
            current.short_name = incoming.short_name.or(current.short_name.take());
            current.municipality = incoming.municipality.or(current.municipality.take());
            current.state = incoming.state.or(current.state.take());
            current.sphere = incoming.sphere.or(current.sphere.take());
            return Ok(existing.id.clone());
        }

        let id = new_id();
        state.organizations.push(StoredOrganization {
            id: id.clone(),
            organization: Organization {
                cnpj: Some(cnpj.to_string()),
                ..organization.clone()
            },
        });
        Ok(id)
    }

    async fn insert_items(&self, document_id: &str, rows: &[ItemRow]) -> Result<()> {
        let mut state = self.state.lock().await;
        state.ensure_document(document_id)?;
        state.items.extend(rows.iter().map(|row| StoredItem {
            id: new_id(),
            document_id: document_id.to_string(),
            row: row.clone(),
            feasibility: None,
        }));
        Ok(())
    }

    async fn insert_requirements(&self, document_id: &str, rows: &[RequirementRow]) -> Result<()> {
        let mut state = self.state.lock().await;
        state.ensure_document(document_id)?;
        state
            .requirements
            .extend(rows.iter().map(|row| StoredRequirement {
                id: new_id(),
                document_id: document_id.to_string(),
                row: row.clone(),
            }));
        Ok(())
    }

    async fn insert_certifications(
        &self,
        document_id: &str,
        rows: &[CertificationRow],
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.ensure_document(document_id)?;
        state
            .certifications
            .extend(rows.iter().map(|row| StoredCertification {
                id: new_id(),
                document_id: document_id.to_string(),
                row: row.clone(),
            }));
        Ok(())
    }

    async fn update_item_feasibility(
        &self,
        document_id: &str,
        item_number: &str,
        feasibility: &ItemFeasibility,
    ) -> Result<usize> {
        let mut state = self.state.lock().await;
        let mut matched = 0;
        for item in state
            .items
            .iter_mut()
            .filter(|i| i.document_id == document_id && i.row.item_number == item_number)
        {
            item.feasibility = Some(feasibility.clone());
            matched += 1;
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::ChunkPosition;
    use crate::stages::Stage;
    use serde_json::json;

    fn item_row(number: &str) -> ItemRow {
        ItemRow {
            item_number: number.to_string(),
            lot_number: None,
            lot_name: None,
            description: format!("Item {number}"),
            detailed_description: None,
            specifications: json!({}),
            unit: Some("UN".into()),
            quantity: Some(10.0),
            unit_value: None,
            total_value: None,
            catalog_code: None,
            item_kind: "material".into(),
            category: None,
            quantity_confidence: None,
        }
    }

    #[tokio::test]
    async fn test_status_history_and_error_message() {
        let store = MemoryStore::new();
        let id = store.create_document(Some("edital.pdf")).await;

        store.set_status(&id, DocumentStatus::Analyzing, None).await.unwrap();
        store
            .set_status(&id, DocumentStatus::Error, Some("boom"))
            .await
            .unwrap();

        let snapshot = store.snapshot().await;
        let doc = snapshot.document(&id).unwrap();
        assert_eq!(doc.status, DocumentStatus::Error);
        assert_eq!(
            doc.status_history,
            vec![DocumentStatus::Pending, DocumentStatus::Analyzing, DocumentStatus::Error]
        );
        assert_eq!(doc.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_unknown_document_is_an_error() {
        let store = MemoryStore::new();
        let err = store
            .set_status("missing", DocumentStatus::Analyzing, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown document"));
        assert!(store.insert_items("missing", &[item_row("1")]).await.is_err());
    }

    #[tokio::test]
    async fn test_organization_upsert_by_cnpj() {
        let store = MemoryStore::new();
        let first = Organization {
            name: Some("Prefeitura Municipal de Curitiba".into()),
            municipality: Some("Curitiba".into()),
            ..Default::default()
        };
        let second = Organization {
            short_name: Some("Prefeitura de Curitiba".into()),
            ..Default::default()
        };

        let a = store.upsert_organization("76.417.005/0001-86", &first).await.unwrap();
        let b = store.upsert_organization("76.417.005/0001-86", &second).await.unwrap();

        assert_eq!(a, b);
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.organizations.len(), 1);
        let org = &snapshot.organizations[0].organization;
        assert_eq!(org.name.as_deref(), Some("Prefeitura Municipal de Curitiba"));
        assert_eq!(org.short_name.as_deref(), Some("Prefeitura de Curitiba"));
        assert_eq!(org.cnpj.as_deref(), Some("76.417.005/0001-86"));
    }

    #[tokio::test]
    async fn test_item_feasibility_matches_by_number() {
        let store = MemoryStore::new();
        let id = store.create_document(None).await;
        store
            .insert_items(&id, &[item_row("1"), item_row("2")])
            .await
            .unwrap();

        let verdict = ItemFeasibility {
            can_produce: true,
            score: Some(85.0),
            ..Default::default()
        };
        assert_eq!(store.update_item_feasibility(&id, "2", &verdict).await.unwrap(), 1);
        assert_eq!(store.update_item_feasibility(&id, "9", &verdict).await.unwrap(), 0);

        let snapshot = store.snapshot().await;
        let items = snapshot.items_for(&id);
        assert!(items[0].feasibility.is_none());
        assert_eq!(items[1].feasibility.as_ref().unwrap().score, Some(85.0));
    }

    #[tokio::test]
    async fn test_snapshot_serializes() {
        let store = MemoryStore::new();
        let id = store.create_document(None).await;
        store
            .record_stage(
                &id,
                &StageResult {
                    stage: Stage::Items,
                    model: "llama3.2:3b".into(),
                    prompt_version: "3.0".into(),
                    input_chunk_count: 1,
                    json: json!({"itens": []}),
                    duration_ms: 12,
                    succeeded: true,
                    chunk: Some(ChunkPosition { index: 0, total: 2 }),
                },
            )
            .await
            .unwrap();

        let value = serde_json::to_value(store.snapshot().await).unwrap();

        assert_eq!(value["documents"][0]["status"], "pending");
        assert_eq!(value["stage_results"][0]["stage"], "itens_completos");
        assert_eq!(value["stage_results"][0]["chunk"]["total"], 2);
    }
}
