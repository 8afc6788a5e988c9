// Paginated collection reader
//
// Collection endpoints answer `{"list": [...], "hasMore": bool}` and take an
// `index` query parameter. The reader walks pages sequentially (each index
// depends on the previous page's length) and yields items lazily, so a name
// lookup stops fetching as soon as it finds a match. Search endpoints
// (`users/query`) are POSTed and paged by a 1-based `page` in the body.

use async_stream::try_stream;
use futures_util::{Stream, TryStreamExt};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::Error;
use crate::session::Session;
use crate::transport::{Method, Transport};

/// Per-endpoint pagination parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageConfig {
    /// Query parameter carrying the start offset.
    pub index_param: String,
    /// Field holding the page's items.
    pub list_field: String,
    /// Field holding the continuation flag.
    pub has_more_field: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            index_param: "index".into(),
            list_field: "list".into(),
            has_more_field: "hasMore".into(),
        }
    }
}

/// Rows requested per page from a search endpoint.
pub const QUERY_PAGE_LIMIT: usize = 100;

/// One decoded page of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub has_more: bool,
}

impl Page {
    /// Decode a page body. A missing continuation flag means "last page".
    pub fn from_value(body: Value, config: &PageConfig, path: &str) -> Result<Self, Error> {
        let Value::Object(mut map) = body else {
            return Err(Error::Deserialization {
                path: path.to_owned(),
                message: "collection page is not a JSON object".into(),
            });
        };

        let items = match map.remove(&config.list_field) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(Error::Deserialization {
                    path: path.to_owned(),
                    message: format!("'{}' is not an array", config.list_field),
                });
            }
        };
        let has_more = map
            .get(&config.has_more_field)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Self { items, has_more })
    }
}

/// Append a query parameter, respecting an existing query string.
pub fn with_query(path: &str, key: &str, value: impl std::fmt::Display) -> String {
    let sep = if path.contains('?') { '&' } else { '?' };
    format!("{path}{sep}{key}={value}")
}

/// Strip the query string from a collection path (`profiles?domainId=x` → `profiles`).
pub fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(base, _)| base)
}

fn item_id<'a>(item: &'a Value, path: &str) -> Result<&'a str, Error> {
    item.get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Deserialization {
            path: path.to_owned(),
            message: "collection item has no 'id'".into(),
        })
}

impl<T: Transport> Session<T> {
    /// Lazily stream every item of a collection.
    ///
    /// Each invocation starts at index 0 against current remote state, so
    /// the stream is restartable. A failed page fetch ends the stream with
    /// that error; items already yielded must not be treated as a complete
    /// result.
    pub fn stream<'a>(
        &'a self,
        path: &'a str,
        config: &'a PageConfig,
    ) -> impl Stream<Item = Result<Value, Error>> + 'a {
        try_stream! {
            let mut index: usize = 0;
            loop {
                let page_path = with_query(path, &config.index_param, index);
                let body = self.get(&page_path).await?;
                let page = Page::from_value(body, config, path)?;
                let received = page.items.len();
                debug!(path, index, received, has_more = page.has_more, "page fetched");

                for item in page.items {
                    yield item;
                }

                if !page.has_more {
                    break;
                }
                if received == 0 {
                    warn!(path, index, "empty page claims more results; stopping");
                    break;
                }
                index += received;
            }
        }
    }

    /// Collect a whole collection with the default page parameters.
    pub async fn list(&self, path: &str) -> Result<Vec<Value>, Error> {
        self.list_with(path, &PageConfig::default()).await
    }

    /// Collect a whole collection.
    pub async fn list_with(&self, path: &str, config: &PageConfig) -> Result<Vec<Value>, Error> {
        self.stream(path, config).try_collect().await
    }

    /// Lazily stream every match of a search endpoint.
    ///
    /// `criteria` is the query body without paging; `page` and `limit` are
    /// set per request. Same restart and failure rules as [`Session::stream`].
    pub fn stream_query<'a>(
        &'a self,
        path: &'a str,
        criteria: &'a Value,
    ) -> impl Stream<Item = Result<Value, Error>> + 'a {
        try_stream! {
            let config = PageConfig::default();
            let mut page_no: usize = 1;
            loop {
                let body = query_page(criteria, page_no);
                let resp = self.call(Method::Post, path, Some(&body), &[200]).await?;
                let page = Page::from_value(resp, &config, path)?;
                let received = page.items.len();
                debug!(path, page = page_no, received, has_more = page.has_more, "query page fetched");

                for item in page.items {
                    yield item;
                }

                if !page.has_more {
                    break;
                }
                if received == 0 {
                    warn!(path, page = page_no, "empty page claims more results; stopping");
                    break;
                }
                page_no += 1;
            }
        }
    }

    /// Collect every match of a search endpoint.
    pub async fn query_all(&self, path: &str, criteria: &Value) -> Result<Vec<Value>, Error> {
        self.stream_query(path, criteria).try_collect().await
    }

    /// Find the first item whose `name` equals `name` and fetch it in full.
    pub async fn find_by_name(
        &self,
        path: &str,
        name: &str,
        required: bool,
    ) -> Result<Option<Value>, Error> {
        self.find_by_field(path, "name", name, required, &PageConfig::default())
            .await
    }

    /// Find the first item whose `field` equals `value` and fetch it in full.
    ///
    /// List pages may carry summary projections, so a match costs one more
    /// `GET {path}/{id}`. Remote collections are assumed unique on `field`.
    pub async fn find_by_field(
        &self,
        path: &str,
        field: &str,
        value: &str,
        required: bool,
        config: &PageConfig,
    ) -> Result<Option<Value>, Error> {
        let stream = self.stream(path, config);
        let mut stream = std::pin::pin!(stream);

        while let Some(item) = stream.try_next().await? {
            if item.get(field).and_then(Value::as_str) == Some(value) {
                let id = item_id(&item, path)?;
                let full = self.get(&format!("{}/{id}", strip_query(path))).await?;
                return Ok(Some(full));
            }
        }

        if required {
            return Err(Error::NotFound {
                resource: strip_query(path).to_owned(),
                name: value.to_owned(),
            });
        }
        Ok(None)
    }

    /// Query-style lookup for collections that are searched, not listed.
    ///
    /// Posts a full-text search restricted to `field` and returns the exact
    /// match from the result list. The result list is authoritative; no
    /// follow-up fetch is made.
    pub async fn find_by_query(
        &self,
        path: &str,
        field: &str,
        value: &str,
        required: bool,
    ) -> Result<Option<Value>, Error> {
        let query = json!({
            "fullTextSearch": {
                "type": "OR",
                "value": value,
                "fields": [field],
            }
        });
        let stream = self.stream_query(path, &query);
        let mut stream = std::pin::pin!(stream);

        while let Some(item) = stream.try_next().await? {
            if item.get(field).and_then(Value::as_str) == Some(value) {
                return Ok(Some(item));
            }
        }

        if required {
            return Err(Error::NotFound {
                resource: strip_query(path).to_owned(),
                name: value.to_owned(),
            });
        }
        Ok(None)
    }
}

/// Search body for one page. Non-object criteria are replaced.
fn query_page(criteria: &Value, page: usize) -> Value {
    let mut body = match criteria {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    body.insert("page".into(), json!(page));
    body.insert("limit".into(), json!(QUERY_PAGE_LIMIT));
    Value::Object(body)
}
