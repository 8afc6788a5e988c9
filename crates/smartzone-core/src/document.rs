// ── Desired-state documents ──
//
// The declarative input of `apply`: one object of one kind, addressed by
// name (and zone, for zone-scoped kinds).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{ResourceKind, Scope};
use crate::engine::RequestedState;
use crate::error::CoreError;
use crate::membership::MembershipRequest;
use crate::model::DesiredState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesiredDocument {
    pub kind: ResourceKind,
    /// Parent zone name for zone-scoped kinds; the target zone for APs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// Identity value; omitted for settings singletons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub state: RequestedState,
    #[serde(default)]
    pub fields: DesiredState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<MembershipRequest>,
}

impl DesiredDocument {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            zone: None,
            name: Some(name.into()),
            state: RequestedState::Present,
            fields: DesiredState::new(),
            groups: None,
        }
    }

    /// Check the document's shape against its kind before any request.
    pub fn validate(&self) -> Result<(), CoreError> {
        let kind = self.kind;
        match kind.scope() {
            Scope::Singleton => {
                if self.state == RequestedState::Absent {
                    return Err(CoreError::validation(format!(
                        "'{kind}' is a settings object and cannot be absent"
                    )));
                }
                if self.name.is_some() {
                    return Err(CoreError::validation(format!("'{kind}' takes no name")));
                }
            }
            scope => {
                if self.name.as_deref().is_none_or(str::is_empty) {
                    return Err(CoreError::validation(format!("'{kind}' requires a name")));
                }
                if scope == Scope::Zone && self.zone.is_none() {
                    return Err(CoreError::validation(format!("'{kind}' requires a zone")));
                }
            }
        }
        if let Some(groups) = &self.groups {
            if !matches!(kind, ResourceKind::Wlan | ResourceKind::Wlan8021x) {
                return Err(CoreError::validation(format!(
                    "'{kind}' has no group membership"
                )));
            }
            groups.validate()?;
        }
        let identity = kind.identity_field();
        if let (Some(name), Some(field)) = (&self.name, self.fields.get_str(identity)) {
            if field != name {
                return Err(CoreError::validation(format!(
                    "fields.{identity} '{field}' does not match name '{name}'"
                )));
            }
        }
        Ok(())
    }

    /// Fields with the identity filled in from `name`.
    pub fn desired(&self) -> DesiredState {
        let mut desired = self.fields.clone();
        if let Some(name) = &self.name {
            desired.set(self.kind.identity_field(), Value::String(name.clone()));
        }
        desired
    }
}
