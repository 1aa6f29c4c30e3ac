use super::BackendId;
use serde::{Deserialize, Serialize};

/// A configured endpoint grouping exchange types and default policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    pub id: BackendId,
    pub name: String,
    /// Backend type code, used to match handlers and generic exchange types
    pub backend_type_code: String,
    pub company_id: Option<i64>,
    pub active: bool,
    /// Mark outputs as processed as soon as they are sent (the counterpart
    /// processes documents on the fly)
    pub output_sent_processed_auto: bool,
}

impl Backend {
    pub fn new(
        id: BackendId,
        name: impl Into<String>,
        backend_type_code: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            backend_type_code: backend_type_code.into(),
            company_id: None,
            active: true,
            output_sent_processed_auto: false,
        }
    }

    pub fn with_auto_process(mut self, enabled: bool) -> Self {
        self.output_sent_processed_auto = enabled;
        self
    }

    pub fn with_company(mut self, company_id: i64) -> Self {
        self.company_id = Some(company_id);
        self
    }
}
