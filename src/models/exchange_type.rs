use super::{BackendId, ExchangeTypeId};
use crate::constants::{system, ExchangeAction};
use crate::encoding::EncodingErrorPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Whether a record flows outbound or inbound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeDirection {
    Input,
    Output,
}

impl ExchangeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for ExchangeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExchangeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            _ => Err(format!("Invalid exchange direction: {s}")),
        }
    }
}

/// Per-action handler selection override declared on an exchange type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerOverride {
    /// Usage tried before the generic `<direction>.<action>` usage
    pub usage: String,
    /// Extra keys injected into the handler work context
    #[serde(default)]
    pub work_ctx: HashMap<String, Value>,
    /// Extra environment keys propagated to the handler
    #[serde(default)]
    pub env_ctx: HashMap<String, Value>,
}

impl HandlerOverride {
    pub fn new(usage: impl Into<String>) -> Self {
        Self {
            usage: usage.into(),
            ..Default::default()
        }
    }

    pub fn with_work_ctx(mut self, key: impl Into<String>, value: Value) -> Self {
        self.work_ctx.insert(key.into(), value);
        self
    }

    pub fn with_env_ctx(mut self, key: impl Into<String>, value: Value) -> Self {
        self.env_ctx.insert(key.into(), value);
        self
    }
}

/// A document contract definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeType {
    pub id: ExchangeTypeId,
    pub code: String,
    pub name: String,
    pub direction: ExchangeDirection,
    pub backend_type_code: String,
    /// Restrict the type to one backend; `None` makes it generic for the backend type
    pub backend_id: Option<BackendId>,
    pub encoding: Option<String>,
    pub encoding_out_error_handler: EncodingErrorPolicy,
    pub allow_empty_files_on_receive: bool,
    /// Output records of this type are generated by the output sweep
    pub exchange_file_auto_generate: bool,
    pub handler_overrides: HashMap<ExchangeAction, HandlerOverride>,
}

impl ExchangeType {
    pub fn new(
        id: ExchangeTypeId,
        code: impl Into<String>,
        direction: ExchangeDirection,
        backend_type_code: impl Into<String>,
    ) -> Self {
        let code = code.into();
        Self {
            id,
            name: code.clone(),
            code,
            direction,
            backend_type_code: backend_type_code.into(),
            backend_id: None,
            encoding: None,
            encoding_out_error_handler: EncodingErrorPolicy::default(),
            allow_empty_files_on_receive: false,
            exchange_file_auto_generate: false,
            handler_overrides: HashMap::new(),
        }
    }

    pub fn with_backend(mut self, backend_id: BackendId) -> Self {
        self.backend_id = Some(backend_id);
        self
    }

    pub fn with_encoding(
        mut self,
        encoding: impl Into<String>,
        policy: EncodingErrorPolicy,
    ) -> Self {
        self.encoding = Some(encoding.into());
        self.encoding_out_error_handler = policy;
        self
    }

    pub fn with_auto_generate(mut self, enabled: bool) -> Self {
        self.exchange_file_auto_generate = enabled;
        self
    }

    pub fn with_allow_empty_files(mut self, allowed: bool) -> Self {
        self.allow_empty_files_on_receive = allowed;
        self
    }

    pub fn with_override(
        mut self,
        action: ExchangeAction,
        handler_override: HandlerOverride,
    ) -> Self {
        self.handler_overrides.insert(action, handler_override);
        self
    }

    /// Charset used to encode textual output
    pub fn encoding_or_default(&self) -> &str {
        self.encoding
            .as_deref()
            .filter(|label| !label.trim().is_empty())
            .unwrap_or(system::DEFAULT_ENCODING)
    }

    pub fn handler_override(&self, action: ExchangeAction) -> Option<&HandlerOverride> {
        self.handler_overrides
            .get(&action)
            .filter(|conf| !conf.usage.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_defaults_to_utf8() {
        let exchange_type = ExchangeType::new(1, "INVOICE_OUT", ExchangeDirection::Output, "demo");
        assert_eq!(exchange_type.encoding_or_default(), "UTF-8");

        let latin = exchange_type.with_encoding("latin1", EncodingErrorPolicy::Replace);
        assert_eq!(latin.encoding_or_default(), "latin1");
    }

    #[test]
    fn test_empty_override_usage_is_ignored() {
        let exchange_type = ExchangeType::new(1, "ORDER_IN", ExchangeDirection::Input, "demo")
            .with_override(ExchangeAction::Receive, HandlerOverride::default());
        assert!(exchange_type.handler_override(ExchangeAction::Receive).is_none());
    }
}
