// Session context for the SmartZone public API
//
// Wraps a `Transport` with API-version discovery and the service-ticket
// lifecycle. Every resource call goes through `call()`, which versions the
// path, attaches the ticket, and turns statuses outside the caller's
// whitelist into `Error::Remote`.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::Error;
use crate::transport::{Method, RawResponse, Transport};

/// Root of the public API on the controller.
pub const API_ROOT: &str = "/wsg/api/public";

const API_INFO_PATH: &str = "/wsg/api/public/apiInfo";
const TICKET_PATH: &str = "serviceTicket";

/// Username/password pair exchanged for a service ticket.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInfo {
    #[serde(default)]
    api_support_versions: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TicketResponse {
    service_ticket: String,
}

/// An authenticated, version-negotiated conversation with one controller.
///
/// Lifecycle: [`negotiate()`](Self::negotiate) once, then
/// [`authenticate()`](Self::authenticate) once, then any number of
/// [`call()`](Self::call)s. Nothing is cached beyond the version and the
/// ticket; the session is dropped at the end of an invocation.
pub struct Session<T: Transport> {
    transport: T,
    api_version: Option<String>,
    ticket: Option<SecretString>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            api_version: None,
            ticket: None,
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The negotiated API version, once known.
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.ticket.is_some()
    }

    /// Negotiate, then authenticate.
    pub async fn connect(&mut self, credentials: &Credentials) -> Result<(), Error> {
        self.negotiate().await?;
        self.authenticate(credentials).await
    }

    // ── Version negotiation ──────────────────────────────────────────

    /// Discover the highest API version the controller supports.
    ///
    /// Queries the version-discovery endpoint once; later calls return the
    /// cached value.
    pub async fn negotiate(&mut self) -> Result<&str, Error> {
        if self.api_version.is_none() {
            debug!("GET {API_INFO_PATH}");
            let resp = self.transport.send(Method::Get, API_INFO_PATH, None).await?;
            let version = Self::parse_api_info(&resp)?;
            debug!(version = %version, "negotiated API version");
            self.api_version = Some(version);
        }
        Ok(self.api_version.as_deref().unwrap_or_default())
    }

    fn parse_api_info(resp: &RawResponse) -> Result<String, Error> {
        let unusable = || Error::Connectivity {
            message: format!(
                "could not read supported API versions from {API_INFO_PATH} (HTTP {})",
                resp.status
            ),
        };

        if resp.status != 200 {
            return Err(unusable());
        }
        let info: ApiInfo = serde_json::from_value(resp.body.clone()).map_err(|_| unusable())?;
        select_version(&info.api_support_versions).ok_or_else(unusable)
    }

    // ── Service ticket lifecycle ─────────────────────────────────────

    /// Exchange credentials for a service ticket.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), Error> {
        if credentials.username.is_empty() || credentials.password.expose_secret().is_empty() {
            return Err(Error::Authentication {
                message: "username and password are required for login".into(),
            });
        }

        let body = json!({
            "username": credentials.username,
            "password": credentials.password.expose_secret(),
        });

        debug!(username = %credentials.username, "requesting service ticket");
        let resp = self.send(Method::Post, TICKET_PATH, Some(&body)).await?;

        if resp.status != 200 {
            let message = match resp.body.get("message").and_then(Value::as_str) {
                Some(msg) => msg.to_owned(),
                None => format!("[{}] {}", resp.status, resp.body),
            };
            return Err(Error::Authentication { message });
        }

        let ticket: TicketResponse =
            serde_json::from_value(resp.body).map_err(|_| Error::Authentication {
                message: "login response carried no serviceTicket".into(),
            })?;

        self.ticket = Some(SecretString::from(ticket.service_ticket));
        debug!("service ticket acquired");
        Ok(())
    }

    /// Release the service ticket. Failures are logged, not raised.
    pub async fn logout(&mut self) {
        if self.ticket.is_none() {
            return;
        }
        match self.send(Method::Delete, TICKET_PATH, None).await {
            Ok(resp) if resp.status < 300 => debug!("service ticket released"),
            Ok(resp) => warn!(status = resp.status, "logout rejected by controller"),
            Err(e) => warn!(error = %e, "logout failed"),
        }
        self.ticket = None;
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Build the absolute request path for an API-relative `path`.
    ///
    /// `rkszones?index=0` becomes
    /// `/wsg/api/public/v11_1/rkszones?index=0&serviceTicket=…`.
    fn request_path(&self, path: &str) -> Result<String, Error> {
        let version = self.api_version.as_deref().ok_or_else(|| Error::Connectivity {
            message: "API version not negotiated".into(),
        })?;
        let mut full = format!("{API_ROOT}/{version}/{}", path.trim_start_matches('/'));
        if let Some(ticket) = &self.ticket {
            let sep = if full.contains('?') { '&' } else { '?' };
            full.push(sep);
            full.push_str("serviceTicket=");
            full.push_str(ticket.expose_secret());
        }
        Ok(full)
    }

    /// Send a request and return the raw status/body, whatever the status.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, Error> {
        let full = self.request_path(path)?;
        debug!("{method} {path}");
        self.transport.send(method, &full, body).await
    }

    /// Send a request and require a status from `expected`.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        expected: &[u16],
    ) -> Result<Value, Error> {
        let resp = self.send(method, path, body).await?;
        if expected.contains(&resp.status) {
            Ok(resp.body)
        } else {
            Err(Error::Remote {
                method,
                path: path.to_owned(),
                status: resp.status,
                body: resp.body,
            })
        }
    }

    /// `GET` expecting 200.
    pub async fn get(&self, path: &str) -> Result<Value, Error> {
        self.call(Method::Get, path, None, &[200]).await
    }

    /// Existence probe: 403/404 mean "not there", not an error.
    pub async fn probe(&self, path: &str) -> Result<Option<Value>, Error> {
        match self.get(path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The management domain of the logged-in account.
    pub async fn domain_id(&self) -> Result<String, Error> {
        let session = self.get("session").await?;
        session
            .get("domainId")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| Error::Deserialization {
                path: "session".into(),
                message: "missing domainId".into(),
            })
    }
}

// ── Version selection ────────────────────────────────────────────────

fn parse_version(raw: &str) -> Option<(u32, u32)> {
    let rest = raw.strip_prefix('v')?;
    let (major, minor) = rest.split_once('_').unwrap_or((rest, "0"));
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Pick the highest version from `apiSupportVersions`.
///
/// Versions look like `v9_1`. If any entry does not follow that shape,
/// the controller's own ordering is trusted and the last entry wins.
pub fn select_version(versions: &[String]) -> Option<String> {
    let parsed: Option<Vec<(u32, u32)>> = versions.iter().map(|v| parse_version(v)).collect();
    match parsed {
        Some(keys) => keys
            .iter()
            .zip(versions)
            .max_by_key(|(key, _)| **key)
            .map(|(_, v)| v.clone()),
        None => versions.last().cloned(),
    }
}
