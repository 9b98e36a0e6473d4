//! Request and response bodies for the JSON API.

use serde::{Deserialize, Serialize};

use crate::data::users::Package;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedDto {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub package: Package,
}

/// Fields are optional so a missing one maps to a 400 rather than a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartInvestigationRequest {
    pub user_id: Option<String>,
    pub asin_list: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunRequest {
    pub clusters: Option<usize>,
}
