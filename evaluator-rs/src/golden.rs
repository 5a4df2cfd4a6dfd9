// evaluator-rs/src/golden.rs
// Golden cases: fixed complaint inputs paired with the expected routing.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{EvalError, Result};

/// User id for cases that do not name one
pub const DEFAULT_EVAL_USER: &str = "eval-user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expected {
    pub department: String,
    pub issue_category: String,
    pub severity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenCase {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub location: String,
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub expected: Expected,
}

impl GoldenCase {
    pub fn user_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or(DEFAULT_EVAL_USER)
    }
}

/// Read the golden file, a JSON array of cases
pub async fn load_golden_cases(path: impl AsRef<Path>) -> Result<Vec<GoldenCase>> {
    let path = path.as_ref();
    if !tokio::fs::try_exists(path).await? {
        return Err(EvalError::GoldenNotFound(path.display().to_string()));
    }

    let raw = tokio::fs::read_to_string(path).await?;
    let cases: Vec<GoldenCase> = serde_json::from_str(&raw)?;
    tracing::info!(cases = cases.len(), path = %path.display(), "loaded golden cases");
    Ok(cases)
}
