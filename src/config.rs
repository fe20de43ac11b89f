use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::activity::ACTIVITY_LOG_LIMIT;
use crate::lifecycle::RequestStatus;
use crate::request::RequestDoc;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Settings injected into the request service.
///
/// Every field has a default, so a partial TOML file is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Where the sled database lives.
    pub db_path: PathBuf,

    /// Number of activity entries kept per request. Older entries are
    /// discarded on write.
    pub activity_log_limit: usize,

    /// Department whose members act as the store for every department.
    pub store_department: String,

    /// Origin department minted as `STR` in request codes.
    pub store_dept_code_source: String,

    /// Code used when a request has no origin department.
    pub default_dept_code: String,

    /// Zero padding of the daily sequence in request codes.
    pub sequence_digits: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("inventory-requests.db"),
            activity_log_limit: ACTIVITY_LOG_LIMIT,
            store_department: "STORE".to_string(),
            store_dept_code_source: "Store".to_string(),
            default_dept_code: "GEN".to_string(),
            sequence_digits: 3,
        }
    }
}

impl ServiceConfig {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn set_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn set_store_department(mut self, dept: &str) -> Self {
        self.store_department = dept.trim().to_string();
        self
    }

    pub fn set_activity_log_limit(mut self, limit: usize) -> Self {
        self.activity_log_limit = limit.max(1);
        self
    }
}

/// List filter for the requests overview, persisted per user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestFilter {
    /// Empty matches every status.
    pub statuses: Vec<RequestStatus>,
    pub department: Option<String>,
    pub urgent_only: bool,
    /// Case-insensitive text matched against code, note and item names.
    pub search: Option<String>,
}

impl RequestFilter {
    pub fn with_status(mut self, status: RequestStatus) -> Self {
        if !self.statuses.contains(&status) {
            self.statuses.push(status);
        }
        self
    }

    pub fn set_department(mut self, dept: &str) -> Self {
        self.department = crate::utils::normalize_dept_id(dept);
        self
    }

    pub fn set_urgent_only(mut self, urgent_only: bool) -> Self {
        self.urgent_only = urgent_only;
        self
    }

    pub fn set_search(mut self, text: &str) -> Self {
        let text = text.trim();
        self.search = (!text.is_empty()).then(|| text.to_lowercase());
        self
    }

    pub fn matches(&self, doc: &RequestDoc) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&doc.status) {
            return false;
        }
        if self.urgent_only && !doc.urgent {
            return false;
        }
        if let Some(dept) = &self.department {
            let from_match = doc
                .from_dept()
                .is_some_and(|d| d.eq_ignore_ascii_case(dept));
            if !from_match && !doc.touches_any_department(std::slice::from_ref(dept)) {
                return false;
            }
        }
        match &self.search {
            None => true,
            Some(text) => {
                let text = text.to_lowercase();
                doc.rq_code.to_lowercase().contains(&text)
                    || doc.note.to_lowercase().contains(&text)
                    || doc.lines.iter().any(|l| {
                        l.item_name.to_lowercase().contains(&text)
                            || l.item_id.to_lowercase().contains(&text)
                    })
            }
        }
    }
}
