// smartzone-api: Async Rust client for the Ruckus SmartZone public API
//
// Transport capability, versioned service-ticket session, and the paginated
// collection reader shared by every resource manager.

pub mod error;
pub mod pagination;
pub mod session;
pub mod transport;

pub use error::Error;
pub use pagination::{Page, PageConfig, QUERY_PAGE_LIMIT, strip_query, with_query};
pub use session::{API_ROOT, Credentials, Session, select_version};
pub use transport::{HttpTransport, Method, RawResponse, TlsMode, Transport, TransportConfig};
