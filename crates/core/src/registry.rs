use crate::models::PolicyRecord;
use crate::summary::PolicySummary;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Uploaded policies known to this process. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    records: Arc<RwLock<HashMap<String, PolicyRecord>>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record`, replacing any record filed under the same policy id.
    pub async fn insert(&self, record: PolicyRecord) -> Option<PolicyRecord> {
        self.records
            .write()
            .await
            .insert(record.policy_id.clone(), record)
    }

    pub async fn get(&self, policy_id: &str) -> Option<PolicyRecord> {
        self.records.read().await.get(policy_id).cloned()
    }

    pub async fn contains(&self, policy_id: &str) -> bool {
        self.records.read().await.contains_key(policy_id)
    }

    /// Newest upload first.
    pub async fn list(&self) -> Vec<PolicyRecord> {
        let mut records = self
            .records
            .read()
            .await
            .values()
            .cloned()
            .collect::<Vec<_>>();
        records.sort_by(|left, right| {
            right
                .uploaded_at
                .cmp(&left.uploaded_at)
                .then_with(|| left.policy_id.cmp(&right.policy_id))
        });
        records
    }

    pub async fn set_summary(
        &self,
        policy_id: &str,
        summary: PolicySummary,
    ) -> Option<PolicyRecord> {
        let mut records = self.records.write().await;
        let record = records.get_mut(policy_id)?;
        record.summary = Some(summary);
        Some(record.clone())
    }
}
