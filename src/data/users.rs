//! User accounts and package subscriptions.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{
    store::{child_path, to_document, Document, DocumentStore},
    SUBSCRIPTIONS, USERS,
};
use crate::error::{PipelineError, Result};

const REMAINING: &str = "remainingInvestigations";

/// Packages a user can subscribe to, with the investigations each grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Package {
    Basic,
    Pro,
}

impl Package {
    pub fn investigations(self) -> u32 {
        match self {
            Self::Basic => 50,
            Self::Pro => 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub package: Package,
    pub start_date: chrono::DateTime<Utc>,
}

/// Store a new user profile and return its generated id.
pub async fn create_user(store: &dyn DocumentStore, profile: Value) -> Result<String> {
    let mut doc: Document = match profile {
        Value::Object(map) => map,
        Value::Null => Document::new(),
        other => {
            return Err(PipelineError::validation(format!(
                "user profile must be an object, got {other}"
            )))
        }
    };
    let id = store.new_id();
    doc.insert("id".into(), Value::String(id.clone()));
    store.set(USERS, &id, doc, false).await?;
    info!(%id, "user created");
    Ok(id)
}

pub async fn get_user(store: &dyn DocumentStore, id: &str) -> Result<Option<Document>> {
    store.get(USERS, id).await
}

/// Record a subscription and reset the user's investigation allowance.
pub async fn subscribe_user(
    store: &dyn DocumentStore,
    user_id: &str,
    package: Package,
) -> Result<Subscription> {
    if store.get(USERS, user_id).await?.is_none() {
        return Err(PipelineError::not_found(USERS, user_id));
    }
    let subscription = Subscription {
        id: store.new_id(),
        user_id: user_id.to_string(),
        package,
        start_date: Utc::now(),
    };
    store
        .set(
            &child_path(USERS, user_id, SUBSCRIPTIONS),
            &subscription.id,
            to_document(&subscription)?,
            false,
        )
        .await?;
    let patch = to_document(&json!({
        "currentPackage": package,
        REMAINING: package.investigations(),
    }))?;
    store.set(USERS, user_id, patch, true).await?;
    info!(%user_id, ?package, "user subscribed");
    Ok(subscription)
}

/// Investigations left on the user's package; `None` for unknown or unsubscribed users.
pub async fn remaining_investigations(store: &dyn DocumentStore, user_id: &str) -> Result<Option<u64>> {
    let Some(user) = store.get(USERS, user_id).await? else {
        return Ok(None);
    };
    match user.get(REMAINING) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            PipelineError::validation(format!("user {user_id} has a malformed {REMAINING}"))
        }),
    }
}

/// Consume one investigation from the user's allowance.
///
/// Users without a recorded allowance are not metered.
pub async fn use_investigation(store: &dyn DocumentStore, user_id: &str) -> Result<()> {
    let Some(remaining) = remaining_investigations(store, user_id).await? else {
        return Ok(());
    };
    if remaining == 0 {
        return Err(PipelineError::validation(format!(
            "user {user_id} has no investigations left on the current package"
        )));
    }
    let patch = to_document(&json!({ REMAINING: remaining - 1 }))?;
    store.set(USERS, user_id, patch, true).await?;
    debug!(%user_id, remaining = remaining - 1, "investigation allowance used");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::MemoryStore;

    #[tokio::test]
    async fn subscribe_sets_allowance() {
        let store = MemoryStore::default();
        let id = create_user(&store, json!({ "email": "a@b.c" })).await.unwrap();
        let sub = subscribe_user(&store, &id, Package::Basic).await.unwrap();
        assert_eq!(sub.user_id, id);

        let user = get_user(&store, &id).await.unwrap().unwrap();
        assert_eq!(user["email"], "a@b.c");
        assert_eq!(user["remainingInvestigations"], 50);
        assert_eq!(user["currentPackage"], "basic");
    }

    #[tokio::test]
    async fn subscribing_unknown_user_fails() {
        let store = MemoryStore::default();
        let err = subscribe_user(&store, "ghost", Package::Pro).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn using_an_investigation_decrements_allowance() {
        let store = MemoryStore::default();
        let id = create_user(&store, json!({ "email": "a@b.c" })).await.unwrap();
        subscribe_user(&store, &id, Package::Pro).await.unwrap();

        use_investigation(&store, &id).await.unwrap();
        use_investigation(&store, &id).await.unwrap();
        assert_eq!(remaining_investigations(&store, &id).await.unwrap(), Some(98));
        let user = get_user(&store, &id).await.unwrap().unwrap();
        assert_eq!(user["email"], "a@b.c");
    }

    #[tokio::test]
    async fn exhausted_allowance_is_rejected() {
        let store = MemoryStore::default();
        let id = create_user(&store, json!({ "remainingInvestigations": 0 }))
            .await
            .unwrap();
        let err = use_investigation(&store, &id).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(remaining_investigations(&store, &id).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn unmetered_users_are_not_charged() {
        let store = MemoryStore::default();
        use_investigation(&store, "cli-user").await.unwrap();
        let id = create_user(&store, json!({})).await.unwrap();
        use_investigation(&store, &id).await.unwrap();
        assert_eq!(remaining_investigations(&store, &id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn profile_must_be_an_object() {
        let store = MemoryStore::default();
        assert!(create_user(&store, json!([1, 2])).await.is_err());
    }
}
