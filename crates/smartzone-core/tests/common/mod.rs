#![allow(clippy::unwrap_used, dead_code)]
// In-memory SmartZone double for engine tests.
//
// Speaks the public API's wire shapes: versioned paths, service ticket,
// `{list, hasMore}` pages driven by `index`, `{id}` on create, 204 on
// update/delete, paged `*/query` search, and group `members` sub-collections.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::{Map, Value, json};
use smartzone_api::{Error, Method, RawResponse, Transport};
use smartzone_core::{Credentials, Session};

const VERSIONED: &str = "/wsg/api/public/v11_1/";

/// One request as the controller saw it, API-relative and ticket-free.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct State {
    collections: BTreeMap<String, Vec<Value>>,
    singletons: BTreeMap<String, Value>,
    /// Alternate create endpoint -> collection.
    create_aliases: BTreeMap<String, String>,
    /// Dotted paths the controller never echoes back.
    hidden: Vec<String>,
    /// Collections whose create answers without an id.
    anonymous_creates: Vec<String>,
    next_id: u32,
    page_size: usize,
    calls: Vec<Call>,
}

pub struct FakeController {
    state: Mutex<State>,
}

impl Default for FakeController {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeController {
    pub fn new() -> Self {
        let state = State {
            page_size: 2,
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_collection(self, path: &str, items: Vec<Value>) -> Self {
        self.state
            .lock()
            .unwrap()
            .collections
            .insert(path.to_owned(), items);
        self
    }

    pub fn with_singleton(self, path: &str, value: Value) -> Self {
        self.state
            .lock()
            .unwrap()
            .singletons
            .insert(path.to_owned(), value);
        self
    }

    pub fn with_create_alias(self, alias: &str, collection: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .create_aliases
            .insert(alias.to_owned(), collection.to_owned());
        self
    }

    pub fn creating_without_id(self, collection: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .anonymous_creates
            .push(collection.to_owned());
        self
    }

    pub fn hiding(self, field: &str) -> Self {
        self.state.lock().unwrap().hidden.push(field.to_owned());
        self
    }

    pub fn items(&self, path: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn singleton(&self, path: &str) -> Value {
        self.state.lock().unwrap().singletons[path].clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Mutating calls, excluding login/logout and search queries.
    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method.is_mutating())
            .filter(|c| c.path != "serviceTicket" && !c.path.ends_with("/query"))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

impl Transport for FakeController {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, Error> {
        if path == "/wsg/api/public/apiInfo" {
            return Ok(RawResponse::new(
                200,
                json!({ "apiSupportVersions": ["v10_0", "v11_1"] }),
            ));
        }
        let relative = path.strip_prefix(VERSIONED).unwrap();
        let (route, query) = split_query(relative);

        let mut state = self.state.lock().unwrap();
        let mut logged = route.to_owned();
        if let Some(q) = query.iter().find(|(k, _)| k == "domainId") {
            logged = format!("{route}?domainId={}", q.1);
        }
        state.calls.push(Call {
            method,
            path: logged,
            body: body.cloned(),
        });
        Ok(state.route(method, route, &query, body))
    }
}

fn split_query(path: &str) -> (&str, Vec<(String, String)>) {
    match path.split_once('?') {
        None => (path, Vec::new()),
        Some((route, query)) => {
            let pairs = query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            (route, pairs)
        }
    }
}

fn not_found() -> RawResponse {
    RawResponse::new(404, json!({ "message": "Resource not found" }))
}

fn no_content() -> RawResponse {
    RawResponse::new(204, Value::Null)
}

impl State {
    fn route(
        &mut self,
        method: Method,
        route: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> RawResponse {
        match (method, route) {
            (Method::Post, "serviceTicket") => {
                return RawResponse::new(200, json!({ "serviceTicket": "ST-1" }));
            }
            (Method::Delete, "serviceTicket") => return RawResponse::new(200, Value::Null),
            (Method::Get, "session") => {
                return RawResponse::new(200, json!({ "domainId": "d1", "userName": "admin" }));
            }
            _ => {}
        }
        if method == Method::Post {
            if let Some(collection) = route.strip_suffix("/query") {
                return self.query(collection, body);
            }
        }

        if let Some(resp) = self.route_members(method, route, body) {
            return resp;
        }

        if self.singletons.contains_key(route) {
            return self.route_singleton(method, route, body);
        }

        if let Some(collection) = self.create_aliases.get(route).cloned() {
            return self.create(&collection, body);
        }

        if self.collections.contains_key(route) {
            return match method {
                Method::Get => self.page(route, query),
                Method::Post => self.create(route, body),
                _ => RawResponse::new(405, json!({ "message": "method not allowed" })),
            };
        }

        let Some((collection, id)) = route.rsplit_once('/') else {
            return not_found();
        };
        if !self.collections.contains_key(collection) {
            return not_found();
        }
        self.route_item(method, collection, id, body)
    }

    fn visible(&self, item: &Value) -> Value {
        let mut item = item.clone();
        if let Value::Object(map) = &mut item {
            for field in &self.hidden {
                remove_dotted(map, field);
            }
        }
        item
    }

    fn page(&self, route: &str, query: &[(String, String)]) -> RawResponse {
        let index: usize = query
            .iter()
            .find(|(k, _)| k == "index")
            .map_or(0, |(_, v)| v.parse().unwrap());
        let items = &self.collections[route];
        let end = (index + self.page_size).min(items.len());
        let list: Vec<Value> = items
            .get(index..end)
            .unwrap_or_default()
            .iter()
            .map(|i| self.visible(i))
            .collect();
        RawResponse::new(
            200,
            json!({
                "totalCount": items.len(),
                "hasMore": end < items.len(),
                "firstIndex": index,
                "list": list,
            }),
        )
    }

    /// Full-text search over one field, paged by `page` (1-based) and `limit`.
    fn query(&self, collection: &str, body: Option<&Value>) -> RawResponse {
        let search = body
            .and_then(|b| b.pointer("/fullTextSearch/value"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let field = body
            .and_then(|b| b.pointer("/fullTextSearch/fields/0"))
            .and_then(Value::as_str)
            .unwrap_or("name");
        let page = body
            .and_then(|b| b.get("page"))
            .and_then(Value::as_u64)
            .map_or(1, |p| usize::try_from(p).unwrap());
        let limit = body
            .and_then(|b| b.get("limit"))
            .and_then(Value::as_u64)
            .map_or(self.page_size, |l| usize::try_from(l).unwrap())
            .min(self.page_size);

        let matches: Vec<Value> = self
            .collections
            .get(collection)
            .into_iter()
            .flatten()
            .filter(|item| {
                search.is_empty()
                    || item
                        .get(field)
                        .and_then(Value::as_str)
                        .is_some_and(|n| n.contains(search))
            })
            .map(|i| self.visible(i))
            .collect();
        let start = (page - 1) * limit;
        let end = (start + limit).min(matches.len());
        let list = matches.get(start..end).unwrap_or_default().to_vec();
        RawResponse::new(
            200,
            json!({ "totalCount": matches.len(), "hasMore": end < matches.len(), "list": list }),
        )
    }

    fn create(&mut self, collection: &str, body: Option<&Value>) -> RawResponse {
        let Some(Value::Object(fields)) = body else {
            return RawResponse::new(400, json!({ "message": "body required" }));
        };
        self.next_id += 1;
        let id = format!("id-{}", self.next_id);
        let mut item = fields.clone();
        item.insert("id".into(), json!(id));
        self.collections
            .entry(collection.to_owned())
            .or_default()
            .push(Value::Object(item));
        if self.anonymous_creates.iter().any(|c| c == collection) {
            return RawResponse::new(201, Value::Null);
        }
        RawResponse::new(201, json!({ "id": id }))
    }

    fn route_item(
        &mut self,
        method: Method,
        collection: &str,
        id: &str,
        body: Option<&Value>,
    ) -> RawResponse {
        let items = self.collections.get_mut(collection).unwrap();
        let Some(pos) = items.iter().position(|i| i["id"] == id || i["mac"] == id) else {
            return not_found();
        };
        match method {
            Method::Get => {
                let item = items[pos].clone();
                RawResponse::new(200, self.visible(&item))
            }
            Method::Patch => {
                if let (Value::Object(target), Some(Value::Object(patch))) = (&mut items[pos], body)
                {
                    for (k, v) in patch {
                        target.insert(k.clone(), v.clone());
                    }
                }
                no_content()
            }
            Method::Put => {
                let mut replaced = body.cloned().unwrap_or(Value::Null);
                if let Value::Object(map) = &mut replaced {
                    map.insert("id".into(), json!(id));
                }
                items[pos] = replaced;
                no_content()
            }
            Method::Delete => {
                items.remove(pos);
                no_content()
            }
            Method::Post => RawResponse::new(405, json!({ "message": "method not allowed" })),
        }
    }

    fn route_singleton(
        &mut self,
        method: Method,
        route: &str,
        body: Option<&Value>,
    ) -> RawResponse {
        let current = self.singletons.get_mut(route).unwrap();
        match (method, body) {
            (Method::Get, _) => RawResponse::new(200, current.clone()),
            (Method::Patch, Some(Value::Object(patch))) => {
                if let Value::Object(target) = current {
                    for (k, v) in patch {
                        target.insert(k.clone(), v.clone());
                    }
                }
                no_content()
            }
            (Method::Put, Some(value)) => {
                *current = value.clone();
                no_content()
            }
            _ => RawResponse::new(400, json!({ "message": "bad request" })),
        }
    }

    /// `{groups}/{gid}/members` and `{groups}/{gid}/members/{mid}`.
    fn route_members(
        &mut self,
        method: Method,
        route: &str,
        body: Option<&Value>,
    ) -> Option<RawResponse> {
        let (group_path, member) = if let Some(prefix) = route.strip_suffix("/members") {
            (prefix, None)
        } else {
            let (prefix, mid) = route.rsplit_once("/members/")?;
            (prefix, Some(mid.to_owned()))
        };
        let (collection, gid) = group_path.rsplit_once('/')?;
        let groups = self.collections.get_mut(collection)?;
        let Some(group) = groups.iter_mut().find(|g| g["id"] == gid) else {
            return Some(not_found());
        };
        let members = group
            .as_object_mut()
            .unwrap()
            .entry("members")
            .or_insert_with(|| json!([]))
            .as_array_mut()
            .unwrap();

        let resp = match (method, member) {
            (Method::Post, None) => {
                let id = body.and_then(|b| b.get("id")).cloned().unwrap_or(Value::Null);
                members.push(json!({ "id": id }));
                RawResponse::new(201, Value::Null)
            }
            (Method::Delete, Some(mid)) => {
                members.retain(|m| m["id"] != mid.as_str());
                no_content()
            }
            _ => RawResponse::new(405, json!({ "message": "method not allowed" })),
        };
        Some(resp)
    }
}

fn remove_dotted(map: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            map.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = map.get_mut(head) {
                remove_dotted(inner, rest);
            }
        }
    }
}

// ── Session helpers ─────────────────────────────────────────────────

pub async fn connect(fake: FakeController) -> Session<FakeController> {
    let mut session = Session::new(fake);
    session
        .connect(&Credentials::new("admin", "secret".to_string()))
        .await
        .unwrap();
    session.transport().clear_calls();
    session
}

pub fn zone(id: &str, name: &str) -> Value {
    json!({ "id": id, "name": name, "description": "", "countryCode": "US" })
}
