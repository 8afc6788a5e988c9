// ── Desired vs observed diff ──
//
// `compute_diff` is pure: it never talks to the controller. It yields the
// minimal `UpdateSet` under a `DiffPolicy` that declares secret fields and
// per-field comparison rules.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::resource::{remove_path, replace_path};
use crate::model::{DesiredState, Resource};

/// Placeholder reported in place of secret values.
pub const MASK: &str = "********";

/// Field name to new value. Keys are always a subset of the desired keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UpdateSet(IndexMap<String, Value>);

impl UpdateSet {
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The PATCH body.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

// ── Secrets ──────────────────────────────────────────────────────────

/// A write-once field paired with the boolean flag that unlocks rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretField {
    /// Dotted path, e.g. `primary.sharedSecret`.
    pub path: String,
    /// Dotted path of the flag, e.g. `primary.sharedSecret_update`.
    pub update_flag: String,
}

impl SecretField {
    /// Secret at `path` with the conventional `{path}_update` flag.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let update_flag = format!("{path}_update");
        Self { path, update_flag }
    }

    pub fn with_flag(path: impl Into<String>, update_flag: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            update_flag: update_flag.into(),
        }
    }

    /// Absent flag means no rotation.
    fn rotation_requested(&self, desired: &DesiredState) -> bool {
        desired
            .get_path(&self.update_flag)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Path relative to the top-level field `field`, if nested under it.
    fn relative<'a>(path: &'a str, field: &str) -> Option<&'a str> {
        path.strip_prefix(field)?.strip_prefix('.')
    }
}

// ── Comparison ───────────────────────────────────────────────────────

/// How a desired field is matched against the observed one.
#[derive(Debug, Clone, Copy, Default)]
pub enum Comparison {
    /// Deep equality.
    #[default]
    Exact,
    /// Nested mapping: equal when every desired sub-key matches. Updates
    /// send the observed mapping overlaid with the desired sub-keys.
    Subset,
    /// Caller-supplied predicate over `(desired, observed)`.
    Custom(fn(&Value, &Value) -> bool),
}

impl Comparison {
    fn matches(self, wanted: &Value, current: Option<&Value>) -> bool {
        let Some(current) = current else {
            // Absent remotely and explicitly emptied locally.
            return wanted.is_null();
        };
        match self {
            Self::Exact => wanted == current,
            Self::Subset => is_subset(wanted, current),
            Self::Custom(eq) => eq(wanted, current),
        }
    }

    fn update_value(self, wanted: Value, current: Option<&Value>) -> Value {
        match (self, current) {
            (Self::Subset, Some(current)) => overlay(current, &wanted),
            _ => wanted,
        }
    }
}

fn is_subset(wanted: &Value, current: &Value) -> bool {
    match (wanted, current) {
        (Value::Object(want), Value::Object(have)) => want.iter().all(|(k, w)| match have.get(k) {
            Some(h) => is_subset(w, h),
            None => w.is_null(),
        }),
        _ => wanted == current,
    }
}

fn overlay(base: &Value, top: &Value) -> Value {
    match (base, top) {
        (Value::Object(base), Value::Object(top)) => {
            let mut out = base.clone();
            for (k, v) in top {
                let merged = match out.get(k) {
                    Some(existing) => overlay(existing, v),
                    None => v.clone(),
                };
                out.insert(k.clone(), merged);
            }
            Value::Object(out)
        }
        _ => top.clone(),
    }
}

/// Lists compared as multisets; anything else falls back to equality.
pub fn unordered_eq(wanted: &Value, current: &Value) -> bool {
    match (wanted, current) {
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().all(|item| {
                a.iter().filter(|x| *x == item).count() == b.iter().filter(|x| *x == item).count()
            })
        }
        _ => wanted == current,
    }
}

// ── Policy ───────────────────────────────────────────────────────────

/// Declared secrets and comparison overrides for one resource kind.
#[derive(Debug, Clone, Default)]
pub struct DiffPolicy {
    pub secrets: Vec<SecretField>,
    pub comparisons: IndexMap<String, Comparison>,
}

impl DiffPolicy {
    pub fn secret(mut self, field: SecretField) -> Self {
        self.secrets.push(field);
        self
    }

    pub fn compare(mut self, field: impl Into<String>, comparison: Comparison) -> Self {
        self.comparisons.insert(field.into(), comparison);
        self
    }

    fn comparison(&self, field: &str) -> Comparison {
        self.comparisons.get(field).copied().unwrap_or_default()
    }

    fn is_flag(&self, field: &str) -> bool {
        self.secrets.iter().any(|s| s.update_flag == field)
    }

    /// The desired value for `field` with flags stripped and locked
    /// secrets replaced by what the controller already holds. `None` when
    /// the whole field is a locked secret.
    fn effective(
        &self,
        field: &str,
        wanted: &Value,
        desired: &DesiredState,
        observed: &Resource,
    ) -> Option<Value> {
        if let Some(secret) = self.secrets.iter().find(|s| s.path == field) {
            return secret
                .rotation_requested(desired)
                .then(|| wanted.clone());
        }

        let mut value = wanted.clone();
        let Value::Object(map) = &mut value else {
            return Some(value);
        };
        for secret in &self.secrets {
            if let Some(flag) = SecretField::relative(&secret.update_flag, field) {
                remove_path(map, flag);
            }
            let Some(rel) = SecretField::relative(&secret.path, field) else {
                continue;
            };
            if secret.rotation_requested(desired) {
                continue;
            }
            match observed.get_path(&secret.path) {
                Some(held) => replace_path(map, rel, held),
                None => remove_path(map, rel),
            }
        }
        Some(value)
    }

    /// Full create payload: every desired field except rotation flags.
    pub fn create_payload(&self, desired: &DesiredState) -> Value {
        let mut map = desired.to_map();
        strip_flags(&mut map, &self.secrets);
        Value::Object(map)
    }

    /// Copy of `resource` with declared secrets masked and flags removed.
    pub fn mask(&self, resource: &Resource) -> Resource {
        let mut out = resource.clone();
        mask_secrets(out.fields_mut(), &self.secrets);
        out
    }
}

fn strip_flags(map: &mut Map<String, Value>, secrets: &[SecretField]) {
    for secret in secrets {
        remove_path(map, &secret.update_flag);
    }
}

/// Replace every present secret with [`MASK`] and drop rotation flags.
pub fn mask_secrets(map: &mut Map<String, Value>, secrets: &[SecretField]) {
    let mask = Value::String(MASK.to_owned());
    for secret in secrets {
        replace_path(map, &secret.path, &mask);
        remove_path(map, &secret.update_flag);
    }
}

/// Minimal field-level diff of `desired` against `observed`.
///
/// Never contains a key missing from `desired`, a rotation flag, a locked
/// secret, or a field whose desired value already matches.
pub fn compute_diff(desired: &DesiredState, observed: &Resource, policy: &DiffPolicy) -> UpdateSet {
    let mut update = UpdateSet::default();
    for (field, wanted) in desired.iter() {
        if policy.is_flag(field) {
            continue;
        }
        let Some(wanted) = policy.effective(field, wanted, desired, observed) else {
            continue;
        };
        let current = observed.get(field);
        let comparison = policy.comparison(field);
        if comparison.matches(&wanted, current) {
            continue;
        }
        update.insert(field.clone(), comparison.update_value(wanted, current));
    }
    update
}
