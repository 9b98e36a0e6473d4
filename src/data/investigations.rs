//! Investigation records bracketing one pipeline run.

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{
    store::{to_document, DocumentStore},
    users, validate_asin, INVESTIGATIONS,
};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestigationStatus {
    Started,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investigation {
    pub id: String,
    pub user_id: String,
    pub asin_list: Vec<String>,
    pub status: InvestigationStatus,
    pub start_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub end_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub results: Option<Value>,
}

/// Create an investigation in the `started` state.
pub async fn start_investigation(
    store: &dyn DocumentStore,
    user_id: &str,
    asins: &[String],
) -> Result<Investigation> {
    if user_id.trim().is_empty() {
        return Err(PipelineError::MissingField("userId"));
    }
    if asins.is_empty() {
        return Err(PipelineError::MissingField("asinList"));
    }
    let mut unique = IndexSet::new();
    for asin in asins {
        let asin = asin.trim();
        validate_asin(asin)?;
        unique.insert(asin.to_string());
    }
    users::use_investigation(store, user_id.trim()).await?;

    let investigation = Investigation {
        id: store.new_id(),
        user_id: user_id.trim().to_string(),
        asin_list: unique.into_iter().collect(),
        status: InvestigationStatus::Started,
        start_timestamp: Utc::now(),
        end_timestamp: None,
        results: None,
    };
    store
        .set(
            INVESTIGATIONS,
            &investigation.id,
            to_document(&investigation)?,
            false,
        )
        .await?;
    info!(id = %investigation.id, asins = investigation.asin_list.len(), "investigation started");
    Ok(investigation)
}

pub async fn get_investigation(store: &dyn DocumentStore, id: &str) -> Result<Option<Investigation>> {
    match store.get(INVESTIGATIONS, id).await? {
        Some(doc) => Ok(Some(serde_json::from_value(Value::Object(doc)).map_err(|err| {
            PipelineError::validation(format!("malformed investigation {id}: {err}"))
        })?)),
        None => Ok(None),
    }
}

/// ASINs attached to an investigation; an investigation without any is invalid.
pub async fn asins_for(store: &dyn DocumentStore, id: &str) -> Result<Vec<String>> {
    let investigation = get_investigation(store, id)
        .await?
        .ok_or_else(|| PipelineError::not_found(INVESTIGATIONS, id))?;
    if investigation.asin_list.is_empty() {
        return Err(PipelineError::validation(format!(
            "investigation {id} has no ASINs"
        )));
    }
    Ok(investigation.asin_list)
}

/// Move an investigation to `completed` and attach its results. One-way.
pub async fn complete_investigation(
    store: &dyn DocumentStore,
    id: &str,
    results: Value,
) -> Result<Investigation> {
    let empty = match &results {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if empty {
        return Err(PipelineError::validation(
            "results are required to complete an investigation",
        ));
    }
    let mut investigation = get_investigation(store, id)
        .await?
        .ok_or_else(|| PipelineError::not_found(INVESTIGATIONS, id))?;
    if investigation.status == InvestigationStatus::Completed {
        return Err(PipelineError::validation(format!(
            "investigation {id} is already completed"
        )));
    }
    investigation.status = InvestigationStatus::Completed;
    investigation.end_timestamp = Some(Utc::now());
    investigation.results = Some(results);
    store
        .set(INVESTIGATIONS, id, to_document(&investigation)?, false)
        .await?;
    info!(%id, "investigation completed");
    Ok(investigation)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::data::memory::MemoryStore;

    fn asins(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn start_then_complete_once() {
        let store = MemoryStore::default();
        let inv = start_investigation(&store, "user-1", &asins(&["B000000001", "B000000001"]))
            .await
            .unwrap();
        assert_eq!(inv.status, InvestigationStatus::Started);
        assert_eq!(inv.asin_list, vec!["B000000001"]);
        assert_eq!(inv.id.len(), 20);

        let done = complete_investigation(&store, &inv.id, json!({ "clusters": 3 }))
            .await
            .unwrap();
        assert_eq!(done.status, InvestigationStatus::Completed);
        assert!(done.end_timestamp.is_some());

        let again = complete_investigation(&store, &inv.id, json!({ "clusters": 3 })).await;
        assert!(matches!(again, Err(PipelineError::Validation(_))));
    }

    #[tokio::test]
    async fn start_rejects_bad_input() {
        let store = MemoryStore::default();
        assert!(start_investigation(&store, "", &asins(&["B000000001"])).await.is_err());
        assert!(start_investigation(&store, "u", &[]).await.is_err());
        assert!(start_investigation(&store, "u", &asins(&["short"])).await.is_err());
    }

    #[tokio::test]
    async fn start_consumes_the_user_allowance() {
        let store = MemoryStore::default();
        let user = users::create_user(&store, json!({ "remainingInvestigations": 1 }))
            .await
            .unwrap();
        start_investigation(&store, &user, &asins(&["B000000001"])).await.unwrap();
        assert_eq!(
            users::remaining_investigations(&store, &user).await.unwrap(),
            Some(0)
        );

        let err = start_investigation(&store, &user, &asins(&["B000000001"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(store.count(INVESTIGATIONS), 1);
    }

    #[tokio::test]
    async fn unknown_investigation_is_not_found() {
        let store = MemoryStore::default();
        assert!(get_investigation(&store, "missing").await.unwrap().is_none());
        let err = asins_for(&store, "missing").await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));
        let err = complete_investigation(&store, "missing", json!({ "x": 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn completion_requires_results() {
        let store = MemoryStore::default();
        let inv = start_investigation(&store, "u", &asins(&["B000000001"])).await.unwrap();
        let err = complete_investigation(&store, &inv.id, json!({})).await.unwrap_err();
        assert!(err.is_client_error());
    }
}
