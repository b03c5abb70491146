//! ReCap capability encoding: delegated actions embedded in a SIWE message as
//! a `urn:recap:` resource plus a human readable statement suffix.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MessageError, invalid_siwe};

pub const RECAP_PREFIX: &str = "urn:recap:";
pub const RECAP_STATEMENT_PREFIX: &str =
    "I further authorize the stated URI to perform the following actions on my behalf:";

/// Capabilities grouped as `target -> "namespace/action" -> [extra fields]`.
///
/// Targets and abilities are kept sorted by name, not by grant order, so a
/// recap decoded from its resource renders the same statement.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Recap {
    att: BTreeMap<String, BTreeMap<String, Vec<Value>>>,
    #[serde(default)]
    prf: Vec<String>,
}

impl Recap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.att.values().all(BTreeMap::is_empty)
    }

    /// Grant `actions` in `namespace` over `target`. Repeated grants add to
    /// what is already there.
    pub fn grant(
        &mut self,
        namespace: &str,
        target: &str,
        actions: &[String],
        extra_fields: &Map<String, Value>,
    ) {
        if actions.is_empty() {
            return;
        }
        let abilities = self.att.entry(target.to_string()).or_default();
        for action in actions {
            let slot = abilities
                .entry(format!("{namespace}/{action}"))
                .or_default();
            let note = Value::Object(extra_fields.clone());
            if !slot.contains(&note) {
                slot.push(note);
            }
        }
    }

    pub fn targets(&self) -> impl Iterator<Item = (&str, Vec<&str>)> {
        self.att
            .iter()
            .map(|(target, abilities)| (target.as_str(), abilities.keys().map(String::as_str).collect()))
    }

    pub fn to_resource(&self) -> Result<String, MessageError> {
        let json = serde_json::to_vec(self).map_err(|e| invalid_siwe(e.to_string()))?;
        Ok(format!("{RECAP_PREFIX}{}", URL_SAFE_NO_PAD.encode(json)))
    }

    pub fn from_resource(resource: &str) -> Result<Self, MessageError> {
        let encoded = resource
            .strip_prefix(RECAP_PREFIX)
            .ok_or_else(|| invalid_siwe("not a recap resource"))?;
        let json = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| invalid_siwe(format!("invalid recap encoding: {e}")))?;
        serde_json::from_slice(&json).map_err(|e| invalid_siwe(format!("invalid recap: {e}")))
    }

    /// The sentence describing every grant, numbered per namespace and
    /// target in name order.
    pub fn statement(&self) -> String {
        let mut out = String::from(RECAP_STATEMENT_PREFIX);
        let mut index = 1;
        for (target, abilities) in &self.att {
            let mut by_namespace: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for ability in abilities.keys() {
                let (namespace, action) = ability.split_once('/').unwrap_or(("", ability));
                by_namespace.entry(namespace).or_default().push(action);
            }
            for (namespace, actions) in by_namespace {
                let actions = actions
                    .iter()
                    .map(|a| format!("'{a}'"))
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push_str(&format!(" ({index}) '{namespace}': {actions} for '{target}'."));
                index += 1;
            }
        }
        out
    }

    /// Fold the grants into message fields: the statement suffix goes after
    /// any existing statement and the recap resource after existing resources.
    pub fn apply(
        &self,
        statement: Option<String>,
        resources: &mut Vec<String>,
    ) -> Result<Option<String>, MessageError> {
        if self.is_empty() {
            return Ok(statement);
        }
        resources.push(self.to_resource()?);
        let suffix = self.statement();
        Ok(Some(match statement {
            Some(existing) if !existing.is_empty() => format!("{existing} {suffix}"),
            _ => suffix,
        }))
    }
}
