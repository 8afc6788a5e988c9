// ── Reconciliation engine ──
//
// Decides create / update / delete / no-op for one resource and, outside
// check mode, issues exactly that one write, then re-reads the object so
// the reported `after` is what the controller actually stores.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smartzone_api::{Method, PageConfig, Session, Transport, strip_query};
use strum::{Display, EnumString};
use tracing::{debug, info};

use crate::diff::{Comparison, DiffPolicy, SecretField, UpdateSet, compute_diff};
use crate::error::CoreError;
use crate::model::{DesiredState, Resource};

// ── Vocabulary ───────────────────────────────────────────────────────

/// Whether the resource should exist.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestedState {
    #[default]
    Present,
    Absent,
}

/// What a reconciliation did (or would do in check mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Created,
    Updated,
    Deleted,
    Unchanged,
}

/// How updates are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdateMode {
    /// `PATCH` with the update set only.
    #[default]
    Patch,
    /// Read-modify-write: the observed object merged with the update set.
    Put,
}

/// How the target object is located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Page through the collection matching the identity field.
    List,
    /// Post a full-text query to `path` and match the identity field.
    Query { path: String },
    /// `GET {collection}/{identity}`; 403/404 mean absent.
    Probe,
}

/// Accepted status codes per write. Anything else is a remote error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessCodes {
    pub create: Vec<u16>,
    pub update: Vec<u16>,
    pub delete: Vec<u16>,
}

impl Default for SuccessCodes {
    fn default() -> Self {
        Self {
            create: vec![200, 201],
            update: vec![200, 204],
            delete: vec![200, 204],
        }
    }
}

// ── Resource spec ────────────────────────────────────────────────────

/// Maps caller fields to the controller's wire names.
pub type ToRemote = Arc<dyn Fn(&DesiredState) -> DesiredState + Send + Sync>;

/// Everything the engine needs to know about one kind of resource.
#[derive(Clone)]
pub struct ResourceSpec {
    /// Collection path relative to the versioned API root. May carry a
    /// query (`apSyslogServerProfiles?domainId=...`) used only for listing.
    pub path: String,
    /// Alternate endpoint for `POST`.
    pub create_path: Option<String>,
    pub codes: SuccessCodes,
    pub update_mode: UpdateMode,
    pub lookup: Lookup,
    /// Field that names the object (`name`, or `userName` for admins).
    pub identity: String,
    /// Field addressing the object in item paths (`id`, or `mac` for APs).
    pub key: String,
    pub policy: DiffPolicy,
    /// Fields the controller refuses in a `PUT` body.
    pub server_owned: Vec<String>,
    to_remote: Option<ToRemote>,
}

impl fmt::Debug for ResourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSpec")
            .field("path", &self.path)
            .field("create_path", &self.create_path)
            .field("codes", &self.codes)
            .field("update_mode", &self.update_mode)
            .field("lookup", &self.lookup)
            .field("identity", &self.identity)
            .field("key", &self.key)
            .field("policy", &self.policy)
            .field("server_owned", &self.server_owned)
            .field("to_remote", &self.to_remote.is_some())
            .finish()
    }
}

impl ResourceSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            create_path: None,
            codes: SuccessCodes::default(),
            update_mode: UpdateMode::default(),
            lookup: Lookup::List,
            identity: "name".into(),
            key: "id".into(),
            policy: DiffPolicy::default(),
            server_owned: Vec::new(),
            to_remote: None,
        }
    }

    pub fn create_path(mut self, path: impl Into<String>) -> Self {
        self.create_path = Some(path.into());
        self
    }

    pub fn update_mode(mut self, mode: UpdateMode) -> Self {
        self.update_mode = mode;
        self
    }

    pub fn lookup_query(mut self, path: impl Into<String>) -> Self {
        self.lookup = Lookup::Query { path: path.into() };
        self
    }

    pub fn identity(mut self, field: impl Into<String>) -> Self {
        self.identity = field.into();
        self
    }

    pub fn lookup_probe(mut self) -> Self {
        self.lookup = Lookup::Probe;
        self
    }

    pub fn key(mut self, field: impl Into<String>) -> Self {
        self.key = field.into();
        self
    }

    pub fn secret(mut self, field: SecretField) -> Self {
        self.policy = self.policy.secret(field);
        self
    }

    pub fn compare(mut self, field: impl Into<String>, comparison: Comparison) -> Self {
        self.policy = self.policy.compare(field, comparison);
        self
    }

    pub fn server_owned(mut self, fields: &[&str]) -> Self {
        self.server_owned = fields.iter().map(|f| (*f).to_owned()).collect();
        self
    }

    pub fn create_codes(mut self, codes: &[u16]) -> Self {
        self.codes.create = codes.to_vec();
        self
    }

    pub fn update_codes(mut self, codes: &[u16]) -> Self {
        self.codes.update = codes.to_vec();
        self
    }

    pub fn delete_codes(mut self, codes: &[u16]) -> Self {
        self.codes.delete = codes.to_vec();
        self
    }

    pub fn to_remote(
        mut self,
        f: impl Fn(&DesiredState) -> DesiredState + Send + Sync + 'static,
    ) -> Self {
        self.to_remote = Some(Arc::new(f));
        self
    }

    /// Collection path without its listing query.
    pub fn collection(&self) -> &str {
        strip_query(&self.path)
    }

    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{id}", self.collection())
    }

    fn create_target(&self) -> &str {
        self.create_path.as_deref().unwrap_or_else(|| self.collection())
    }

    fn remote(&self, desired: &DesiredState) -> DesiredState {
        match &self.to_remote {
            Some(map) => map(desired),
            None => desired.clone(),
        }
    }

    /// Body for an update write.
    fn update_body(&self, observed: &Resource, update: &UpdateSet) -> Value {
        match self.update_mode {
            UpdateMode::Patch => update.to_value(),
            UpdateMode::Put => {
                let mut full = observed.merged(update);
                let fields = full.fields_mut();
                for field in &self.server_owned {
                    fields.remove(field);
                }
                for secret in &self.policy.secrets {
                    crate::model::resource::remove_path(fields, &secret.update_flag);
                }
                full.into_value()
            }
        }
    }
}

// ── Planning ─────────────────────────────────────────────────────────

/// The single write a reconciliation would make.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Noop,
    Create(Value),
    Update { id: String, update: UpdateSet },
    Delete { id: String },
}

/// Pure decision over `(desired, observed, requested)`.
///
/// `desired` is already in wire form.
pub fn plan(
    spec: &ResourceSpec,
    desired: &DesiredState,
    observed: Option<&Resource>,
    requested: RequestedState,
) -> Result<Plan, CoreError> {
    match (observed, requested) {
        (None, RequestedState::Absent) => Ok(Plan::Noop),
        (None, RequestedState::Present) => Ok(Plan::Create(spec.policy.create_payload(desired))),
        (Some(current), RequestedState::Present) => {
            let update = compute_diff(desired, current, &spec.policy);
            if update.is_empty() {
                return Ok(Plan::Noop);
            }
            Ok(Plan::Update {
                id: observed_id(current, spec)?,
                update,
            })
        }
        (Some(current), RequestedState::Absent) => Ok(Plan::Delete {
            id: observed_id(current, spec)?,
        }),
    }
}

fn observed_id(resource: &Resource, spec: &ResourceSpec) -> Result<String, CoreError> {
    resource
        .get(&spec.key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| CoreError::UnexpectedResponse {
            path: spec.collection().to_owned(),
            message: format!("object has no '{}'", spec.key),
        })
}

// ── Outcome ──────────────────────────────────────────────────────────

/// Result of one reconciliation. Secrets in `before`/`after` are masked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub changed: bool,
    pub action: Action,
    pub before: Option<Resource>,
    pub after: Option<Resource>,
    /// Update that was (or would be) sent. Empty except for updates.
    #[serde(skip_serializing_if = "UpdateSet::is_empty")]
    pub update: UpdateSet,
}

// ── Reconciler ───────────────────────────────────────────────────────

/// Drives one resource kind against an authenticated session.
pub struct Reconciler<'s, T: Transport> {
    session: &'s Session<T>,
    spec: &'s ResourceSpec,
    check_mode: bool,
}

impl<'s, T: Transport> Reconciler<'s, T> {
    pub fn new(session: &'s Session<T>, spec: &'s ResourceSpec) -> Self {
        Self {
            session,
            spec,
            check_mode: false,
        }
    }

    /// Compute and report, but never write.
    pub fn check_mode(mut self, enabled: bool) -> Self {
        self.check_mode = enabled;
        self
    }

    pub fn spec(&self) -> &ResourceSpec {
        self.spec
    }

    /// Fetch the current object by its identity value.
    ///
    /// Lookups run in check mode too.
    pub async fn observe(
        &self,
        identity: &str,
        required: bool,
    ) -> Result<Option<Resource>, CoreError> {
        let spec = self.spec;
        let found = match &spec.lookup {
            Lookup::List => {
                let config = PageConfig::default();
                self.session
                    .find_by_field(&spec.path, &spec.identity, identity, required, &config)
                    .await?
            }
            Lookup::Query { path } => {
                self.session
                    .find_by_query(path, &spec.identity, identity, required)
                    .await?
            }
            Lookup::Probe => {
                let found = self.session.probe(&spec.item_path(identity)).await?;
                if found.is_none() && required {
                    return Err(CoreError::NotFound {
                        resource: spec.collection().to_owned(),
                        name: identity.to_owned(),
                    });
                }
                found
            }
        };
        found
            .map(|body| Resource::from_value(body, spec.collection()))
            .transpose()
    }

    /// Bring one object to `requested` with at most one write.
    pub async fn reconcile(
        &self,
        desired: &DesiredState,
        requested: RequestedState,
    ) -> Result<Outcome, CoreError> {
        let spec = self.spec;
        let identity = desired.get_str(&spec.identity).ok_or_else(|| {
            CoreError::validation(format!("desired state is missing '{}'", spec.identity))
        })?;
        let remote = spec.remote(desired);
        let observed = self.observe(identity, false).await?;
        let plan = plan(spec, &remote, observed.as_ref(), requested)?;
        debug!(
            path = %spec.path,
            identity,
            check_mode = self.check_mode,
            plan = plan_kind(&plan),
            "planned"
        );

        let (action, after, update) = match plan {
            Plan::Noop => (Action::Unchanged, observed.clone(), UpdateSet::default()),
            Plan::Create(payload) => {
                let after = self.create(identity, payload).await?;
                (Action::Created, Some(after), UpdateSet::default())
            }
            Plan::Update { id, update } => {
                let Some(current) = observed.as_ref() else {
                    return Err(CoreError::validation("nothing observed to update"));
                };
                let after = self.update(&spec.item_path(&id), current, &update).await?;
                (Action::Updated, Some(after), update)
            }
            Plan::Delete { id } => {
                if !self.check_mode {
                    self.session
                        .call(Method::Delete, &spec.item_path(&id), None, &spec.codes.delete)
                        .await?;
                }
                (Action::Deleted, None, UpdateSet::default())
            }
        };

        let changed = action != Action::Unchanged;
        if changed {
            info!(
                path = %spec.collection(),
                identity,
                %action,
                check_mode = self.check_mode,
                "reconciled"
            );
        }
        Ok(Outcome {
            changed,
            action,
            before: observed.map(|r| spec.policy.mask(&r)),
            after: after.map(|r| spec.policy.mask(&r)),
            update,
        })
    }

    /// Settings objects that always exist: read, diff, write once.
    pub async fn reconcile_singleton(&self, desired: &DesiredState) -> Result<Outcome, CoreError> {
        let spec = self.spec;
        let remote = spec.remote(desired);
        let body = self.session.get(&spec.path).await?;
        let current = Resource::from_value(body, &spec.path)?;

        let update = compute_diff(&remote, &current, &spec.policy);
        if update.is_empty() {
            let masked = spec.policy.mask(&current);
            return Ok(Outcome {
                changed: false,
                action: Action::Unchanged,
                before: Some(masked.clone()),
                after: Some(masked),
                update,
            });
        }

        let after = self.update(&spec.path, &current, &update).await?;
        info!(path = %spec.path, check_mode = self.check_mode, "settings updated");
        Ok(Outcome {
            changed: true,
            action: Action::Updated,
            before: Some(spec.policy.mask(&current)),
            after: Some(spec.policy.mask(&after)),
            update,
        })
    }

    async fn create(&self, identity: &str, payload: Value) -> Result<Resource, CoreError> {
        let spec = self.spec;
        if self.check_mode {
            return Resource::from_value(payload, spec.create_target());
        }
        let created = self
            .session
            .call(Method::Post, spec.create_target(), Some(&payload), &spec.codes.create)
            .await?;

        match created.get(&spec.key).and_then(Value::as_str) {
            Some(id) => {
                let body = self.session.get(&spec.item_path(id)).await?;
                Resource::from_value(body, spec.collection())
            }
            None => {
                let found = self.observe(identity, true).await?;
                found.ok_or_else(|| CoreError::NotFound {
                    resource: spec.collection().to_owned(),
                    name: identity.to_owned(),
                })
            }
        }
    }

    async fn update(
        &self,
        path: &str,
        current: &Resource,
        update: &UpdateSet,
    ) -> Result<Resource, CoreError> {
        if self.check_mode {
            return Ok(current.merged(update));
        }
        let spec = self.spec;
        let method = match spec.update_mode {
            UpdateMode::Patch => Method::Patch,
            UpdateMode::Put => Method::Put,
        };
        let body = spec.update_body(current, update);
        self.session
            .call(method, path, Some(&body), &spec.codes.update)
            .await?;
        let body = self.session.get(path).await?;
        Resource::from_value(body, path)
    }
}

fn plan_kind(plan: &Plan) -> &'static str {
    match plan {
        Plan::Noop => "noop",
        Plan::Create(_) => "create",
        Plan::Update { .. } => "update",
        Plan::Delete { .. } => "delete",
    }
}
