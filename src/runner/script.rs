//! Script bridge - the shapes scripts see and how their effects flow back
//!
//! Scripts never touch a `Request` or the session directly. They work on a
//! `ScriptRequest` copy and report variable changes as `EnvChange`s, which
//! the executor applies through `RunSession`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::ScriptError;
use crate::models::{Header, Request};
use crate::runner::result::HttpResponse;
use crate::runner::session::RunSession;

/// Named pass/fail check declared by a post-response script
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AssertionResult {
    pub fn pass(name: impl Into<String>) -> Self {
        AssertionResult {
            name: name.into(),
            passed: true,
            message: None,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        AssertionResult {
            name: name.into(),
            passed: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvChangeKind {
    Set,
    Unset,
}

/// A variable mutation requested by a script
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvChange {
    pub kind: EnvChangeKind,
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub previous_value: Option<String>,
}

impl EnvChange {
    pub fn set(name: impl Into<String>, value: impl Into<String>, previous: Option<String>) -> Self {
        EnvChange {
            kind: EnvChangeKind::Set,
            name: name.into(),
            value: value.into(),
            previous_value: previous,
        }
    }

    pub fn unset(name: impl Into<String>, previous: Option<String>) -> Self {
        EnvChange {
            kind: EnvChangeKind::Unset,
            name: name.into(),
            value: String::new(),
            previous_value: previous,
        }
    }
}

/// Error details kept on a `ScriptResult`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptErrorInfo {
    pub message: String,
    #[serde(default)]
    pub line: Option<usize>,
}

impl From<&ScriptError> for ScriptErrorInfo {
    fn from(err: &ScriptError) -> Self {
        ScriptErrorInfo {
            message: err.message.clone(),
            line: err.line,
        }
    }
}

/// Everything a script run produced
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptResult {
    #[serde(default)]
    pub console_output: Vec<String>,
    #[serde(default)]
    pub assertions: Vec<AssertionResult>,
    #[serde(default)]
    pub env_changes: Vec<EnvChange>,
    #[serde(default)]
    pub error: Option<ScriptErrorInfo>,
}

impl ScriptResult {
    /// Result standing in for a script that failed before returning anything
    pub fn from_error(err: &ScriptError) -> Self {
        ScriptResult {
            error: Some(err.into()),
            ..ScriptResult::default()
        }
    }

    pub fn has_failed_assertions(&self) -> bool {
        self.assertions.iter().any(|a| !a.passed)
    }
}

/// Request as seen by a script: method, URL, enabled headers and body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ScriptRequest {
    pub fn from_request(request: &Request) -> Self {
        ScriptRequest {
            method: request.method.as_str().to_string(),
            url: request.url.clone(),
            headers: request
                .headers
                .iter()
                .filter(|h| h.enabled)
                .map(|h| (h.key.clone(), h.value.clone()))
                .collect(),
            body: request.body.clone(),
        }
    }

    /// Sets a header, replacing an existing one with the same name
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((key, value)),
        }
    }
}

/// Response as seen by a post-response script
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub time_ms: u64,
}

impl ScriptResponse {
    pub fn from_response(response: &HttpResponse) -> Self {
        ScriptResponse {
            status_code: response.status_code,
            status_text: response.status_text.clone(),
            headers: response.headers.clone(),
            body: response.body.clone(),
            time_ms: response.time_ms,
        }
    }
}

/// Sandboxed script execution.
///
/// Implementations must return in bounded time; the runner imposes no
/// timeout of its own.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Runs `script` against a working copy of the outgoing request.
    /// Edits made to `request` are copied back onto the real one.
    async fn execute_pre_request(
        &self,
        script: &str,
        request: &mut ScriptRequest,
        env: &HashMap<String, String>,
    ) -> Result<ScriptResult, ScriptError>;

    async fn execute_post_response(
        &self,
        script: &str,
        request: &ScriptRequest,
        response: &ScriptResponse,
        env: &HashMap<String, String>,
    ) -> Result<ScriptResult, ScriptError>;
}

/// Applies script-declared changes to the session environment, in order
pub fn apply_env_changes(session: &mut RunSession, changes: &[EnvChange]) {
    for change in changes {
        match change.kind {
            EnvChangeKind::Set => {
                session.set_session_env_variable(change.name.clone(), change.value.clone());
            }
            EnvChangeKind::Unset => {
                session.unset_session_env_variable(&change.name);
            }
        }
    }
}

/// Copies URL, header and body edits from a script's working copy.
///
/// Headers are left untouched unless the script changed them. Otherwise
/// disabled headers are kept as they were and enabled ones are replaced by
/// the working copy's list, preserving its order.
pub fn apply_request_edits(request: &mut Request, edited: &ScriptRequest) {
    request.url = edited.url.clone();
    request.body = edited.body.clone();
    if edited.headers == ScriptRequest::from_request(request).headers {
        return;
    }
    request.headers.retain(|h| !h.enabled);
    request
        .headers
        .extend(edited.headers.iter().map(|(k, v)| Header::new(k.clone(), v.clone())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HttpMethod;
    use crate::runner::config::RunConfig;

    #[test]
    fn test_script_request_hides_disabled_headers() {
        let mut request = Request::new("r", HttpMethod::GET, "{{base}}/x")
            .with_header("Accept", "application/json")
            .with_header("X-Debug", "1");
        request.headers[1].enabled = false;

        let view = ScriptRequest::from_request(&request);
        assert_eq!(view.url, "{{base}}/x");
        assert_eq!(view.method, "GET");
        assert_eq!(view.headers, [("Accept".to_string(), "application/json".to_string())]);
    }

    #[test]
    fn test_request_edits_copied_back() {
        let mut request = Request::new("r", HttpMethod::POST, "http://a/x")
            .with_header("Accept", "text/plain")
            .with_header("X-Off", "1")
            .with_body("old");
        request.headers[1].enabled = false;

        let mut view = ScriptRequest::from_request(&request);
        view.url = "http://b/y".into();
        view.body = "new".into();
        view.set_header("accept", "application/json");
        view.set_header("X-Added", "yes");
        apply_request_edits(&mut request, &view);

        assert_eq!(request.url, "http://b/y");
        assert_eq!(request.body, "new");
        assert_eq!(request.header("Accept"), Some("application/json"));
        assert_eq!(request.header("X-Added"), Some("yes"));
        assert!(request.headers.iter().any(|h| h.key == "X-Off" && !h.enabled));
    }

    #[test]
    fn test_untouched_headers_keep_their_order() {
        let mut request = Request::new("r", HttpMethod::GET, "http://a/x")
            .with_header("Accept", "application/json")
            .with_header("X-Off", "1")
            .with_header("X-Trace", "abc");
        request.headers[1].enabled = false;
        let before = request.headers.clone();

        let mut view = ScriptRequest::from_request(&request);
        view.url = "http://a/y".into();
        apply_request_edits(&mut request, &view);

        assert_eq!(request.url, "http://a/y");
        assert_eq!(request.headers, before);
    }

    #[test]
    fn test_env_changes_apply_in_order() {
        let mut session = RunSession::new("c", vec![], None, RunConfig::default());
        session.start(1);
        apply_env_changes(
            &mut session,
            &[
                EnvChange::set("a", "1", None),
                EnvChange::set("b", "2", None),
                EnvChange::unset("a", Some("1".into())),
                EnvChange::set("b", "3", Some("2".into())),
            ],
        );
        assert!(!session.session_env().contains_key("a"));
        assert_eq!(session.session_env()["b"], "3");
    }
}
