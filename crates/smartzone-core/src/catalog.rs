// ── Resource catalog ──
//
// Ready-made engine configuration for each kind of controller object the
// crate manages: paths, write codes, secrets and comparison overrides.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::diff::{Comparison, SecretField, unordered_eq};
use crate::engine::{ResourceSpec, UpdateMode};
use crate::error::CoreError;
use crate::membership::MembershipSpec;
use crate::model::DesiredState;

/// Manageable object kinds, spelled kebab-case on the command line and in
/// desired-state documents.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Zone,
    WlanGroup,
    Wlan,
    #[strum(serialize = "wlan-8021x")]
    #[serde(rename = "wlan-8021x")]
    Wlan8021x,
    ApGroup,
    Radius,
    SyslogProfile,
    SnmpProfile,
    EthernetPort,
    ApRegistration,
    Ap,
    AdminUser,
    AdminGroup,
    AdminAaa,
    Ftp,
    // Settings singletons
    SystemSyslog,
    SystemSnmp,
    SystemTime,
    ApAutoApprove,
    BackupExport,
    BackupSchedule,
}

/// Where a kind lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Top-level collection.
    Global,
    /// Under `rkszones/{zone}`.
    Zone,
    /// Filtered by the session's management domain.
    Domain,
    /// A settings object that always exists.
    Singleton,
}

/// Resolved ids of the objects a kind is nested under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parent {
    pub zone_id: Option<String>,
    pub domain_id: Option<String>,
}

impl Parent {
    pub fn zone(id: impl Into<String>) -> Self {
        Self {
            zone_id: Some(id.into()),
            domain_id: None,
        }
    }

    pub fn domain(id: impl Into<String>) -> Self {
        Self {
            zone_id: None,
            domain_id: Some(id.into()),
        }
    }
}

const SYSLOG_SERVER_OWNED: &[&str] = &[
    "createDateTime",
    "creatorUsername",
    "domainId",
    "id",
    "modifiedDateTime",
    "modifierUsername",
];

impl ResourceKind {
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }

    pub fn scope(self) -> Scope {
        match self {
            Self::Zone
            | Self::Ap
            | Self::AdminUser
            | Self::AdminGroup
            | Self::AdminAaa
            | Self::Ftp => Scope::Global,
            Self::WlanGroup
            | Self::Wlan
            | Self::Wlan8021x
            | Self::ApGroup
            | Self::Radius
            | Self::EthernetPort
            | Self::ApRegistration => Scope::Zone,
            Self::SyslogProfile | Self::SnmpProfile => Scope::Domain,
            Self::SystemSyslog
            | Self::SystemSnmp
            | Self::SystemTime
            | Self::ApAutoApprove
            | Self::BackupExport
            | Self::BackupSchedule => Scope::Singleton,
        }
    }

    /// Global kinds that may name a zone to move into.
    pub fn accepts_zone(self) -> bool {
        self.scope() == Scope::Zone || self == Self::Ap
    }

    pub fn is_singleton(self) -> bool {
        self.scope() == Scope::Singleton
    }

    /// Field naming an object of this kind.
    pub fn identity_field(self) -> &'static str {
        match self {
            Self::AdminUser => "userName",
            Self::Ftp => "ftpName",
            Self::Ap => "mac",
            Self::ApRegistration => "description",
            _ => "name",
        }
    }

    /// Engine configuration for this kind under `parent`.
    pub fn spec(self, parent: &Parent) -> Result<ResourceSpec, CoreError> {
        let spec = match self {
            Self::Zone => ResourceSpec::new("rkszones")
                .compare("login", Comparison::Subset)
                .compare("syslog", Comparison::Subset)
                .compare("snmpAgent", Comparison::Subset)
                .compare("smartMonitor", Comparison::Subset)
                .secret(SecretField::new("login.apLoginPassword")),
            Self::WlanGroup => ResourceSpec::new(format!("{}/wlangroups", zone_root(self, parent)?)),
            Self::Wlan => wlan_spec(&zone_root(self, parent)?),
            Self::Wlan8021x => {
                let root = zone_root(self, parent)?;
                wlan_spec(&root).create_path(format!("{root}/wlans/standard8021X"))
            }
            Self::ApGroup => ResourceSpec::new(format!("{}/apgroups", zone_root(self, parent)?)),
            Self::Radius => ResourceSpec::new(format!("{}/aaa/radius", zone_root(self, parent)?))
                .compare("primary", Comparison::Subset)
                .compare("secondary", Comparison::Subset)
                .secret(SecretField::new("primary.sharedSecret"))
                .secret(SecretField::new("secondary.sharedSecret")),
            Self::SyslogProfile => {
                let domain = domain_id(self, parent)?;
                ResourceSpec::new(format!("apSyslogServerProfiles?domainId={domain}"))
                    .update_mode(UpdateMode::Put)
                    .server_owned(SYSLOG_SERVER_OWNED)
                    .delete_codes(&[200])
                    .to_remote(with_default("domainId", domain))
            }
            Self::SnmpProfile => {
                let domain = domain_id(self, parent)?;
                ResourceSpec::new(format!("apSnmpAgentProfiles?domainId={domain}"))
                    .update_mode(UpdateMode::Put)
                    .server_owned(&["domainId", "id"])
                    .compare("snmpV2Agent", Comparison::Custom(unordered_eq))
                    .compare("snmpV3Agent", Comparison::Custom(unordered_eq))
                    .to_remote(with_default("domainId", domain))
            }
            Self::EthernetPort => {
                ResourceSpec::new(format!("{}/profile/ethernetPort", zone_root(self, parent)?))
                    .compare("_8021X", Comparison::Subset)
                    .secret(SecretField::new("_8021X.supplicant.password"))
            }
            Self::ApRegistration => {
                let zone = zone_id(self, parent)?;
                ResourceSpec::new("apRules")
                    .identity("description")
                    .compare("mobilityZone", Comparison::Custom(same_id))
                    .compare("ipAddressRange", Comparison::Subset)
                    .compare("subnet", Comparison::Subset)
                    .compare("gpsCoordinates", Comparison::Subset)
                    .to_remote(with_default("mobilityZone", json!({ "id": zone })))
            }
            Self::Ap => {
                let spec = ResourceSpec::new("aps")
                    .identity("mac")
                    .key("mac")
                    .lookup_probe();
                match parent.zone_id.clone() {
                    Some(zone) => spec.to_remote(with_default("zoneId", zone)),
                    None => spec,
                }
            }
            Self::AdminUser => ResourceSpec::new("users")
                .lookup_query("users/query")
                .identity("userName")
                .secret(SecretField::new("newPassphrase"))
                .to_remote(admin_passphrase),
            Self::AdminGroup => ResourceSpec::new("userGroups").lookup_query("userGroups/query"),
            Self::AdminAaa => ResourceSpec::new("adminaaa?type=AD")
                .update_mode(UpdateMode::Put)
                .server_owned(&["id"])
                .compare("activeDirectoryServer", Comparison::Subset)
                .secret(SecretField::new("activeDirectoryServer.proxyUserPassword"))
                .to_remote(with_default("type", "AD")),
            Self::Ftp => ResourceSpec::new("ftps")
                .lookup_query("ftps/query")
                .identity("ftpName")
                .secret(SecretField::new("ftpPassword")),
            Self::SystemSyslog => ResourceSpec::new("system/syslog"),
            Self::SystemSnmp => ResourceSpec::new("system/snmpAgent")
                .update_mode(UpdateMode::Put)
                .compare("snmpV2Agent", Comparison::Custom(unordered_eq))
                .compare("snmpV3Agent", Comparison::Custom(unordered_eq)),
            Self::SystemTime => ResourceSpec::new("system/systemTime"),
            Self::ApAutoApprove => ResourceSpec::new("system/apSettings/approval"),
            Self::BackupExport => ResourceSpec::new("configurationSettings/autoExportBackup"),
            Self::BackupSchedule => ResourceSpec::new("configurationSettings/scheduleBackup"),
        };
        Ok(spec)
    }

    /// Group relation managed alongside this kind, if any.
    pub fn membership(self, parent: &Parent) -> Result<Option<MembershipSpec>, CoreError> {
        match self {
            Self::Wlan | Self::Wlan8021x => Ok(Some(MembershipSpec::new(format!(
                "{}/wlangroups",
                zone_root(self, parent)?
            )))),
            _ => Ok(None),
        }
    }
}

fn wlan_spec(root: &str) -> ResourceSpec {
    ResourceSpec::new(format!("{root}/wlans"))
        .compare("encryption", Comparison::Subset)
        .secret(SecretField::new("encryption.passphrase"))
        .secret(SecretField::new("encryption.saePassphrase"))
}

fn zone_id(kind: ResourceKind, parent: &Parent) -> Result<String, CoreError> {
    parent
        .zone_id
        .clone()
        .ok_or_else(|| CoreError::validation(format!("'{kind}' requires a zone")))
}

fn zone_root(kind: ResourceKind, parent: &Parent) -> Result<String, CoreError> {
    zone_id(kind, parent).map(|id| format!("rkszones/{id}"))
}

fn domain_id(kind: ResourceKind, parent: &Parent) -> Result<String, CoreError> {
    parent
        .domain_id
        .clone()
        .ok_or_else(|| CoreError::validation(format!("'{kind}' requires a management domain")))
}

/// Fill `field` unless the caller set it.
fn with_default(
    field: &'static str,
    value: impl Into<Value>,
) -> impl Fn(&DesiredState) -> DesiredState + Send + Sync + 'static {
    let value = value.into();
    move |desired| {
        let mut out = desired.clone();
        if !out.contains(field) {
            out.set(field, value.clone());
        }
        out
    }
}

/// Admin passwords are written as `newPassphrase`; `password` is accepted.
fn admin_passphrase(desired: &DesiredState) -> DesiredState {
    let mut out = desired.clone();
    for (from, to) in [
        ("password", "newPassphrase"),
        ("password_update", "newPassphrase_update"),
    ] {
        let Some(value) = out.unset(from) else {
            continue;
        };
        if !out.contains(to) {
            out.set(to, value);
        }
    }
    out
}

/// References match on `id`; the controller adds the display name.
fn same_id(wanted: &Value, current: &Value) -> bool {
    match wanted.get("id") {
        Some(id) => current.get("id") == Some(id),
        None => wanted == current,
    }
}
