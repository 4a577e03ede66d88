use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP Method enum
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HttpMethod {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }

    pub fn next(&self) -> HttpMethod {
        match self {
            HttpMethod::GET => HttpMethod::POST,
            HttpMethod::POST => HttpMethod::PUT,
            HttpMethod::PUT => HttpMethod::PATCH,
            HttpMethod::PATCH => HttpMethod::DELETE,
            HttpMethod::DELETE => HttpMethod::HEAD,
            HttpMethod::HEAD => HttpMethod::OPTIONS,
            HttpMethod::OPTIONS => HttpMethod::GET,
        }
    }

    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::POST | HttpMethod::PUT | HttpMethod::PATCH)
    }
}

/// Authentication type
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum AuthType {
    #[default]
    None,
    Bearer(String),
    Basic {
        username: String,
        password: String,
    },
}

/// HTTP Header
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub value: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Header {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }
}

/// A single HTTP request, optionally carrying runner scripts
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub name: String,
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub auth: AuthType,
    /// Runs before the request is substituted and sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_request_script: Option<String>,
    /// Runs once a response has been received
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_response_script: Option<String>,
}

impl Request {
    pub fn new(name: impl Into<String>, method: HttpMethod, url: impl Into<String>) -> Self {
        Request {
            name: name.into(),
            method,
            url: url.into(),
            headers: Vec::new(),
            body: String::new(),
            auth: AuthType::None,
            pre_request_script: None,
            post_response_script: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(key, value));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_pre_request_script(mut self, script: impl Into<String>) -> Self {
        self.pre_request_script = Some(script.into());
        self
    }

    pub fn with_post_response_script(mut self, script: impl Into<String>) -> Self {
        self.post_response_script = Some(script.into());
        self
    }

    /// Value of the first enabled header matching `key`, case-insensitively
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.enabled && h.key.eq_ignore_ascii_case(key))
            .map(|h| h.value.as_str())
    }
}

impl Default for Request {
    fn default() -> Self {
        use crate::constants::DEFAULT_HTTP_URL;
        Request::new("New Request", HttpMethod::GET, DEFAULT_HTTP_URL)
            .with_header("Content-Type", "application/json")
            .with_header("Accept", "application/json")
    }
}

/// A named group of requests and nested folders
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub name: String,
    #[serde(default)]
    pub items: Vec<CollectionItem>,
}

impl Folder {
    pub fn new(name: impl Into<String>, items: Vec<CollectionItem>) -> Self {
        Folder {
            name: name.into(),
            items,
        }
    }
}

/// Entry of a collection tree
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CollectionItem {
    Request(Request),
    Folder(Folder),
}

impl CollectionItem {
    pub fn name(&self) -> &str {
        match self {
            CollectionItem::Request(r) => &r.name,
            CollectionItem::Folder(f) => &f.name,
        }
    }
}

/// A collection of requests, organised as a tree of folders
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    #[serde(default)]
    pub items: Vec<CollectionItem>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Collection {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: CollectionItem) -> Self {
        self.items.push(item);
        self
    }

    /// Items of the folder at `path`; the empty path is the collection root
    pub fn folder_items(&self, path: &[String]) -> Option<&[CollectionItem]> {
        let mut items = self.items.as_slice();
        for segment in path {
            items = items.iter().find_map(|item| match item {
                CollectionItem::Folder(f) if &f.name == segment => Some(f.items.as_slice()),
                _ => None,
            })?;
        }
        Some(items)
    }

    /// Request reached by walking `path` (folder names, then the request index)
    pub fn request_at(&self, path: &[String], index: usize) -> Option<&Request> {
        match self.folder_items(path)?.get(index)? {
            CollectionItem::Request(r) => Some(r),
            CollectionItem::Folder(_) => None,
        }
    }

    pub fn request_at_mut(&mut self, path: &[String], index: usize) -> Option<&mut Request> {
        let mut items = &mut self.items;
        for segment in path {
            items = items.iter_mut().find_map(|item| match item {
                CollectionItem::Folder(f) if &f.name == segment => Some(&mut f.items),
                _ => None,
            })?;
        }
        match items.get_mut(index)? {
            CollectionItem::Request(r) => Some(r),
            CollectionItem::Folder(_) => None,
        }
    }

    /// Built-in collection offered when nothing is stored yet
    pub fn sample() -> Self {
        use crate::constants::SAMPLE_BASE_URL;

        let login = Request::new("Issue token", HttpMethod::POST, "{{base}}/post")
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"user":"demo"}"#)
            .with_pre_request_script("set token demo-token\nlog issuing token for {{base}}")
            .with_post_response_script(
                "assert status == 200\nextract echoed json.user",
            );
        let profile = Request::new("Fetch profile", HttpMethod::GET, "{{base}}/get?auth={{token}}")
            .with_header("Accept", "application/json")
            .with_post_response_script("assert status == 200\nassert body contains demo-token");
        let missing = Request::new("Missing page", HttpMethod::GET, "{{base}}/status/404")
            .with_post_response_script("assert status == 404");

        let mut collection = Collection::new("Sample");
        collection.items = vec![
            CollectionItem::Folder(Folder::new(
                "Auth",
                vec![
                    CollectionItem::Request(login),
                    CollectionItem::Request(profile),
                ],
            )),
            CollectionItem::Request(missing),
            CollectionItem::Request(Request::new(
                "Health",
                HttpMethod::GET,
                format!("{}/get", SAMPLE_BASE_URL),
            )),
        ];
        collection
    }
}

/// A single environment variable; only enabled variables are active
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

/// Environment variables
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Environment {
            name: name.into(),
            variables: Vec::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.variables.iter_mut().find(|v| v.name == key) {
            Some(var) => {
                var.value = value;
                var.enabled = true;
            }
            None => self.variables.push(Variable {
                name: key,
                value,
                enabled: true,
            }),
        }
    }

    /// Keeps the variable in storage but hides it from runs and scripts
    pub fn disable(&mut self, key: &str) {
        if let Some(var) = self.variables.iter_mut().find(|v| v.name == key) {
            var.enabled = false;
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|v| v.enabled && v.name == key)
            .map(|v| v.value.as_str())
    }

    /// Name to value map of the active variables
    pub fn active_variables(&self) -> HashMap<String, String> {
        self.variables
            .iter()
            .filter(|v| v.enabled)
            .map(|v| (v.name.clone(), v.value.clone()))
            .collect()
    }

    pub fn sample() -> Self {
        let mut env = Environment::new("httpbin");
        env.set("base", crate::constants::SAMPLE_BASE_URL);
        env
    }
}

/// Response from HTTP request
#[derive(Clone, Debug)]
pub struct Response {
    pub status_code: Option<u16>,
    pub body: String,
    pub time_ms: u64,
}

impl Default for Response {
    fn default() -> Self {
        Response {
            status_code: None,
            body: String::from(
                r#"Quick Reference:
────────────────────────────
  ↑/↓   Browse collection
  Enter Load request
  r     Run folder / collection
  s     Send request
  Tab   Next panel
  e     Edit field
  v     Switch environment
  ?     Full help
  q     Quit
────────────────────────────
Press 'r' on a folder to run it!"#,
            ),
            time_ms: 0,
        }
    }
}

/// History entry
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub request: Request,
    pub response: Response,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
