// ── Group membership ──
//
// N:M relations exposed as `POST {groups}/{gid}/members` and
// `DELETE {groups}/{gid}/members/{mid}`. Planning is pure set algebra over
// group ids; names are only resolved against the group listing.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use smartzone_api::{Method, Session, Transport};
use tracing::info;

use crate::error::CoreError;

/// Requested relation changes, by group name.
///
/// `set` replaces the whole relation and cannot be combined with
/// `add`/`remove`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MembershipRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<Vec<String>>,
}

impl MembershipRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.set.is_some() && !(self.add.is_empty() && self.remove.is_empty()) {
            return Err(CoreError::validation(
                "groups: 'set' cannot be combined with 'add' or 'remove'",
            ));
        }
        if let Some(name) = self.add.iter().find(|n| self.remove.contains(n)) {
            return Err(CoreError::validation(format!(
                "groups: '{name}' is both added and removed"
            )));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.set.is_none()
    }
}

/// Where a kind's groups live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipSpec {
    /// Group collection, e.g. `rkszones/{zone}/wlangroups`.
    pub groups_path: String,
    pub add_codes: Vec<u16>,
    pub remove_codes: Vec<u16>,
}

impl MembershipSpec {
    pub fn new(groups_path: impl Into<String>) -> Self {
        Self {
            groups_path: groups_path.into(),
            add_codes: vec![200, 201, 204],
            remove_codes: vec![200, 204],
        }
    }

    fn members_path(&self, group_id: &str) -> String {
        format!("{}/{group_id}/members", self.groups_path)
    }
}

/// A group identified by id, carrying its name for reporting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct GroupRef {
    pub id: String,
    pub name: String,
}

impl GroupRef {
    fn from_value(item: &Value) -> Option<Self> {
        Some(Self {
            id: item.get("id")?.as_str()?.to_owned(),
            name: item
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
        })
    }
}

/// Concrete writes for one member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembershipPlan {
    pub add: Vec<GroupRef>,
    pub remove: Vec<GroupRef>,
}

impl MembershipPlan {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// `set` as `(add, remove)`: `set − current` and `current − set`, by id.
pub fn desugar_set(current: &[GroupRef], set: &[GroupRef]) -> (Vec<GroupRef>, Vec<GroupRef>) {
    let add = set
        .iter()
        .filter(|g| !current.iter().any(|c| c.id == g.id))
        .cloned()
        .collect();
    let remove = current
        .iter()
        .filter(|c| !set.iter().any(|g| g.id == c.id))
        .cloned()
        .collect();
    (add, remove)
}

/// Keep only adds not already present and removes that are present.
pub fn plan_membership(
    current: &[GroupRef],
    add: &[GroupRef],
    remove: &[GroupRef],
) -> MembershipPlan {
    let held: BTreeSet<&str> = current.iter().map(|g| g.id.as_str()).collect();
    let mut plan = MembershipPlan::default();
    let mut seen = BTreeSet::new();
    for group in add {
        if !held.contains(group.id.as_str()) && seen.insert(group.id.clone()) {
            plan.add.push(group.clone());
        }
    }
    for group in remove {
        if held.contains(group.id.as_str()) && seen.insert(group.id.clone()) {
            plan.remove.push(group.clone());
        }
    }
    plan
}

/// Result of a membership reconciliation. Group lists are sorted names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembershipOutcome {
    pub changed: bool,
    pub before: Vec<String>,
    pub after: Vec<String>,
    #[serde(skip_serializing_if = "MembershipPlan::is_empty")]
    pub plan: MembershipPlan,
}

// ── Reconciler ───────────────────────────────────────────────────────

pub struct MembershipReconciler<'s, T: Transport> {
    session: &'s Session<T>,
    spec: &'s MembershipSpec,
    check_mode: bool,
}

impl<'s, T: Transport> MembershipReconciler<'s, T> {
    pub fn new(session: &'s Session<T>, spec: &'s MembershipSpec) -> Self {
        Self {
            session,
            spec,
            check_mode: false,
        }
    }

    pub fn check_mode(mut self, enabled: bool) -> Self {
        self.check_mode = enabled;
        self
    }

    async fn groups(&self) -> Result<Vec<Value>, CoreError> {
        Ok(self.session.list(&self.spec.groups_path).await?)
    }

    /// Groups whose `members[].id` contains `member_id`.
    pub async fn current_groups(&self, member_id: &str) -> Result<Vec<GroupRef>, CoreError> {
        let groups = self.groups().await?;
        Ok(holding(&groups, member_id))
    }

    /// Apply `request` to the relations of `member_id`.
    pub async fn reconcile(
        &self,
        member_id: &str,
        request: &MembershipRequest,
    ) -> Result<MembershipOutcome, CoreError> {
        request.validate()?;
        let groups = self.groups().await?;
        let current = holding(&groups, member_id);

        let (add, remove) = match &request.set {
            Some(set) => {
                let wanted = resolve_all(&groups, set, &self.spec.groups_path)?;
                desugar_set(&current, &wanted)
            }
            None => {
                let add = resolve_all(&groups, &request.add, &self.spec.groups_path)?;
                // Removing a relation to a group that does not exist is a no-op.
                let remove: Vec<GroupRef> = request
                    .remove
                    .iter()
                    .filter_map(|name| resolve(&groups, name))
                    .collect();
                (add, remove)
            }
        };
        let plan = plan_membership(&current, &add, &remove);

        if !self.check_mode {
            for group in &plan.remove {
                let path = format!("{}/{member_id}", self.spec.members_path(&group.id));
                self.session
                    .call(Method::Delete, &path, None, &self.spec.remove_codes)
                    .await?;
            }
            for group in &plan.add {
                let body = json!({ "id": member_id });
                self.session
                    .call(
                        Method::Post,
                        &self.spec.members_path(&group.id),
                        Some(&body),
                        &self.spec.add_codes,
                    )
                    .await?;
            }
        }

        let mut after: Vec<GroupRef> = current
            .iter()
            .filter(|c| !plan.remove.iter().any(|r| r.id == c.id))
            .cloned()
            .collect();
        after.extend(plan.add.iter().cloned());

        let changed = !plan.is_empty();
        if changed {
            info!(
                member = member_id,
                added = plan.add.len(),
                removed = plan.remove.len(),
                check_mode = self.check_mode,
                "membership reconciled"
            );
        }
        Ok(MembershipOutcome {
            changed,
            before: sorted_names(&current),
            after: sorted_names(&after),
            plan,
        })
    }
}

fn holding(groups: &[Value], member_id: &str) -> Vec<GroupRef> {
    groups
        .iter()
        .filter(|g| {
            g.get("members")
                .and_then(Value::as_array)
                .is_some_and(|members| {
                    members
                        .iter()
                        .any(|m| m.get("id").and_then(Value::as_str) == Some(member_id))
                })
        })
        .filter_map(GroupRef::from_value)
        .collect()
}

fn resolve(groups: &[Value], name: &str) -> Option<GroupRef> {
    groups
        .iter()
        .find(|g| g.get("name").and_then(Value::as_str) == Some(name))
        .and_then(GroupRef::from_value)
}

fn resolve_all(
    groups: &[Value],
    names: &[String],
    path: &str,
) -> Result<Vec<GroupRef>, CoreError> {
    names
        .iter()
        .map(|name| {
            resolve(groups, name).ok_or_else(|| CoreError::NotFound {
                resource: path.to_owned(),
                name: name.clone(),
            })
        })
        .collect()
}

fn sorted_names(groups: &[GroupRef]) -> Vec<String> {
    let mut names: Vec<String> = groups.iter().map(|g| g.name.clone()).collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn g(id: &str) -> GroupRef {
        GroupRef {
            id: id.into(),
            name: id.to_uppercase(),
        }
    }

    fn ids(groups: &[GroupRef]) -> Vec<&str> {
        let mut out: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn set_desugars_by_id() {
        let (add, remove) = desugar_set(&[g("a"), g("b"), g("c")], &[g("b"), g("d")]);
        assert_eq!(ids(&add), ["d"]);
        assert_eq!(ids(&remove), ["a", "c"]);
    }

    #[test]
    fn plan_skips_held_adds_and_missing_removes() {
        let plan = plan_membership(&[g("a")], &[g("a"), g("b")], &[g("c"), g("a")]);
        assert_eq!(ids(&plan.add), ["b"]);
        assert_eq!(ids(&plan.remove), ["a"]);
    }

    #[test]
    fn duplicate_names_in_add_yield_one_write() {
        let plan = plan_membership(&[], &[g("b"), g("b")], &[]);
        assert_eq!(plan.add.len(), 1);
    }

    #[test]
    fn set_excludes_add_and_remove() {
        let request = MembershipRequest {
            add: vec!["A".into()],
            set: Some(vec!["B".into()]),
            ..MembershipRequest::default()
        };
        assert!(matches!(request.validate(), Err(CoreError::Validation { .. })));
    }

    #[test]
    fn same_group_added_and_removed_is_rejected() {
        let request = MembershipRequest {
            add: vec!["A".into()],
            remove: vec!["A".into()],
            set: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn holding_reads_member_ids() {
        let groups = vec![
            json!({ "id": "g1", "name": "one", "members": [{ "id": "w1" }] }),
            json!({ "id": "g2", "name": "two", "members": [{ "id": "w2" }] }),
            json!({ "id": "g3", "name": "three" }),
        ];
        let expected = GroupRef {
            id: "g1".into(),
            name: "one".into(),
        };
        assert_eq!(holding(&groups, "w1"), vec![expected]);
    }
}
