// ── Controller facade ──
//
// One authenticated session plus the catalog: resolves parents by name,
// runs the reconciler for a desired-state document, and follows up with
// membership reconciliation where the kind has group relations.

use serde::Serialize;
use serde_json::{Value, json};
use smartzone_api::{Credentials, HttpTransport, Session, Transport};
use tracing::{debug, info};

use crate::catalog::{Parent, ResourceKind, Scope};
use crate::config::ControllerConfig;
use crate::document::DesiredDocument;
use crate::engine::{Action, Lookup, Reconciler, RequestedState, ResourceSpec};
use crate::error::CoreError;
use crate::membership::{MembershipOutcome, MembershipReconciler};
use crate::model::Resource;

/// Everything `apply` did for one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyReport {
    pub kind: ResourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub changed: bool,
    pub action: Action,
    pub check_mode: bool,
    pub before: Option<Resource>,
    pub after: Option<Resource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<MembershipOutcome>,
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Owns the authenticated [`Session`]. Each call starts from a fresh
/// observation; nothing is cached between calls.
pub struct Controller<T: Transport = HttpTransport> {
    session: Session<T>,
}

impl Controller<HttpTransport> {
    /// Build the HTTP transport, negotiate the API version and log in.
    pub async fn connect(config: &ControllerConfig) -> Result<Self, CoreError> {
        let transport = HttpTransport::new(config.url.clone(), &config.transport())?;
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let controller = Self::with_transport(transport, &credentials).await?;
        info!(url = %config.url, "connected to controller");
        Ok(controller)
    }
}

impl<T: Transport> Controller<T> {
    /// Connect over an arbitrary transport.
    pub async fn with_transport(
        transport: T,
        credentials: &Credentials,
    ) -> Result<Self, CoreError> {
        let mut session = Session::new(transport);
        session.connect(credentials).await?;
        Ok(Self { session })
    }

    /// Wrap a session that is already connected.
    pub fn from_session(session: Session<T>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// Release the service ticket. Failures are logged, not returned.
    pub async fn logout(&mut self) {
        self.session.logout().await;
    }

    // ── Parents ──────────────────────────────────────────────────

    async fn resolve_parent(
        &self,
        kind: ResourceKind,
        zone: Option<&str>,
    ) -> Result<Parent, CoreError> {
        match kind.scope() {
            Scope::Zone => {
                let name = zone
                    .ok_or_else(|| CoreError::validation(format!("'{kind}' requires a zone")))?;
                self.resolve_zone(name).await
            }
            Scope::Domain => Ok(Parent::domain(self.session.domain_id().await?)),
            Scope::Global if kind.accepts_zone() => match zone {
                Some(name) => self.resolve_zone(name).await,
                None => Ok(Parent::default()),
            },
            Scope::Global | Scope::Singleton => Ok(Parent::default()),
        }
    }

    async fn resolve_zone(&self, name: &str) -> Result<Parent, CoreError> {
        let found = self.session.find_by_name("rkszones", name, true).await?;
        let id = found
            .as_ref()
            .and_then(|z| z.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::NotFound {
                resource: "rkszones".into(),
                name: name.to_owned(),
            })?;
        debug!(zone = name, id, "zone resolved");
        Ok(Parent::zone(id))
    }

    // ── Reconciliation ───────────────────────────────────────────

    /// Reconcile one desired-state document.
    pub async fn apply(
        &self,
        document: &DesiredDocument,
        check_mode: bool,
    ) -> Result<ApplyReport, CoreError> {
        document.validate()?;
        let kind = document.kind;
        let parent = self.resolve_parent(kind, document.zone.as_deref()).await?;
        let spec = kind.spec(&parent)?;
        let reconciler = Reconciler::new(&self.session, &spec).check_mode(check_mode);
        let desired = document.desired();

        let outcome = if kind.is_singleton() {
            reconciler.reconcile_singleton(&desired).await?
        } else {
            reconciler.reconcile(&desired, document.state).await?
        };

        let mut report = ApplyReport {
            kind,
            name: document.name.clone(),
            changed: outcome.changed,
            action: outcome.action,
            check_mode,
            before: outcome.before,
            after: outcome.after,
            groups: None,
        };

        let Some(request) = document.groups.as_ref().filter(|r| !r.is_empty()) else {
            return Ok(report);
        };
        let Some(membership) = kind.membership(&parent)? else {
            return Ok(report);
        };
        if document.state == RequestedState::Absent {
            return Ok(report);
        }
        // A check-mode create has no id to relate yet.
        let Some(member_id) = report.after.as_ref().and_then(Resource::id).map(str::to_owned)
        else {
            return Ok(report);
        };

        let groups = MembershipReconciler::new(&self.session, &membership)
            .check_mode(check_mode)
            .reconcile(&member_id, request)
            .await?;

        if let Some(before) = report.before.as_mut() {
            before.insert("groups", json!(groups.before));
        }
        if let Some(after) = report.after.as_mut() {
            after.insert("groups", json!(groups.after));
        }
        if groups.changed {
            report.changed = true;
            if report.action == Action::Unchanged {
                report.action = Action::Updated;
            }
        }
        report.groups = Some(groups);
        Ok(report)
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Fetch one object, or a settings singleton when `name` is `None`.
    pub async fn get(
        &self,
        kind: ResourceKind,
        zone: Option<&str>,
        name: Option<&str>,
    ) -> Result<Resource, CoreError> {
        let parent = self.resolve_parent(kind, zone).await?;
        let spec = kind.spec(&parent)?;

        if kind.is_singleton() {
            let body = self.session.get(&spec.path).await?;
            return Ok(spec.policy.mask(&Resource::from_value(body, &spec.path)?));
        }

        let name = name.ok_or_else(|| CoreError::validation(format!("'{kind}' requires a name")))?;
        let found = Reconciler::new(&self.session, &spec)
            .observe(name, true)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                resource: spec.collection().to_owned(),
                name: name.to_owned(),
            })?;
        Ok(spec.policy.mask(&found))
    }

    /// Every object of a kind. Secrets are masked.
    pub async fn list(
        &self,
        kind: ResourceKind,
        zone: Option<&str>,
    ) -> Result<Vec<Resource>, CoreError> {
        if kind.is_singleton() {
            return Err(CoreError::validation(format!(
                "'{kind}' is a settings object; use get"
            )));
        }
        let parent = self.resolve_parent(kind, zone).await?;
        let spec = kind.spec(&parent)?;
        let items = self.list_items(&spec).await?;

        items
            .into_iter()
            .map(|item| {
                Resource::from_value(item, spec.collection()).map(|r| spec.policy.mask(&r))
            })
            .collect()
    }

    async fn list_items(&self, spec: &ResourceSpec) -> Result<Vec<Value>, CoreError> {
        match &spec.lookup {
            Lookup::List | Lookup::Probe => Ok(self.session.list(&spec.path).await?),
            // An empty query matches everything.
            Lookup::Query { path } => Ok(self.session.query_all(path, &json!({})).await?),
        }
    }
}
