// smartzone-core: Declarative reconciliation between desired state and a
// SmartZone controller, on top of smartzone-api.

pub mod catalog;
pub mod config;
pub mod controller;
pub mod diff;
pub mod document;
pub mod engine;
pub mod error;
pub mod membership;
pub mod model;

// ── Primary re-exports ──────────────────────────────────────────────
pub use catalog::{Parent, ResourceKind, Scope};
pub use config::{ControllerConfig, TlsVerification};
pub use controller::{ApplyReport, Controller};
pub use diff::{Comparison, DiffPolicy, MASK, SecretField, UpdateSet, compute_diff, mask_secrets};
pub use document::DesiredDocument;
pub use engine::{
    Action, Lookup, Outcome, Plan, Reconciler, RequestedState, ResourceSpec, SuccessCodes,
    UpdateMode, plan,
};
pub use error::CoreError;
pub use membership::{
    GroupRef, MembershipOutcome, MembershipPlan, MembershipReconciler, MembershipRequest,
    MembershipSpec, desugar_set, plan_membership,
};
pub use model::{DesiredState, Field, Resource};

// The transport seam, for callers that bring their own.
pub use smartzone_api::{Credentials, HttpTransport, Method, RawResponse, Session, Transport};
