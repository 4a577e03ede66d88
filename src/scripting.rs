//! Built-in script runner
//!
//! Scripts are plain text, one directive per line. Blank lines and lines
//! starting with `#` are ignored. `{{name}}` inside a directive resolves
//! against the working environment, which already reflects earlier `set`,
//! `unset` and `extract` lines of the same script.
//!
//! ```text
//! set token abc123
//! header Authorization: Bearer {{token}}
//! assert status == 200
//! extract user_id data.id
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::errors::ScriptError;
use crate::runner::script::{
    AssertionResult, EnvChange, ScriptRequest, ScriptResponse, ScriptResult, ScriptRunner,
};
use crate::runner::substitute::substitute;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    PreRequest,
    PostResponse,
}

impl Phase {
    fn as_str(&self) -> &str {
        match self {
            Phase::PreRequest => "pre-request",
            Phase::PostResponse => "post-response",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    fn holds(&self, left: u64, right: u64) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Gt => left > right,
            CompareOp::Ge => left >= right,
        }
    }
}

/// Runs the directive language for both script phases
#[derive(Clone, Debug, Default)]
pub struct DirectiveScriptRunner;

impl DirectiveScriptRunner {
    pub fn new() -> Self {
        DirectiveScriptRunner
    }
}

#[async_trait]
impl ScriptRunner for DirectiveScriptRunner {
    async fn execute_pre_request(
        &self,
        script: &str,
        request: &mut ScriptRequest,
        env: &HashMap<String, String>,
    ) -> Result<ScriptResult, ScriptError> {
        let mut interpreter = Interpreter::new(Phase::PreRequest, env);
        interpreter.run(script, |_, line, directive, rest| match directive {
            "url" => {
                request.url = rest.to_string();
                Ok(true)
            }
            "header" => {
                let (name, value) = rest.split_once(':').ok_or_else(|| {
                    ScriptError::at_line(line, "header expects `NAME: VALUE`")
                })?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(ScriptError::at_line(line, "header name is empty"));
                }
                request.set_header(name, value.trim());
                Ok(true)
            }
            "body" => {
                request.body = rest.to_string();
                Ok(true)
            }
            _ => Ok(false),
        })?;
        Ok(interpreter.finish())
    }

    async fn execute_post_response(
        &self,
        script: &str,
        _request: &ScriptRequest,
        response: &ScriptResponse,
        env: &HashMap<String, String>,
    ) -> Result<ScriptResult, ScriptError> {
        let mut interpreter = Interpreter::new(Phase::PostResponse, env);
        let mut json: Option<Value> = None;
        interpreter.run(script, |state, line, directive, rest| match directive {
            "assert" => {
                let assertion = evaluate_assertion(line, rest, response)?;
                state.result.assertions.push(assertion);
                Ok(true)
            }
            "extract" => {
                let (name, path) = split_word(rest);
                if name.is_empty() || path.is_empty() {
                    return Err(ScriptError::at_line(line, "extract expects `NAME PATH`"));
                }
                if json.is_none() {
                    let parsed = serde_json::from_str::<Value>(&response.body).map_err(|e| {
                        ScriptError::at_line(line, format!("response body is not JSON: {}", e))
                    })?;
                    json = Some(parsed);
                }
                match json.as_ref().and_then(|root| value_at_path(root, path)) {
                    Some(value) => state.set(name, &display_value(value)),
                    None => state.result.assertions.push(AssertionResult::fail(
                        format!("extract {}", name),
                        format!("no value at `{}`", path),
                    )),
                }
                Ok(true)
            }
            _ => Ok(false),
        })?;
        Ok(interpreter.finish())
    }
}

/// Working environment and accumulated output of one script
struct State {
    env: HashMap<String, String>,
    result: ScriptResult,
}

impl State {
    fn set(&mut self, name: &str, value: &str) {
        let previous = self.env.insert(name.to_string(), value.to_string());
        self.result
            .env_changes
            .push(EnvChange::set(name, value, previous));
    }
}

/// Line-by-line evaluation shared by both phases
struct Interpreter {
    phase: Phase,
    state: State,
}

impl Interpreter {
    fn new(phase: Phase, env: &HashMap<String, String>) -> Self {
        Interpreter {
            phase,
            state: State {
                env: env.clone(),
                result: ScriptResult::default(),
            },
        }
    }

    fn finish(self) -> ScriptResult {
        self.state.result
    }

    /// Evaluates `script`. `phase_directive` handles the directives owned
    /// by the current phase and returns `false` for ones it does not know.
    fn run<F>(&mut self, script: &str, mut phase_directive: F) -> Result<(), ScriptError>
    where
        F: FnMut(&mut State, usize, &str, &str) -> Result<bool, ScriptError>,
    {
        for (index, raw) in script.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let resolved = substitute(trimmed, &self.state.env);
            let (directive, rest) = split_word(&resolved);

            match directive {
                "set" => {
                    let (name, value) = split_word(rest);
                    if name.is_empty() {
                        return Err(ScriptError::at_line(line, "set expects `NAME VALUE`"));
                    }
                    self.state.set(name, value);
                }
                "unset" => {
                    if rest.is_empty() {
                        return Err(ScriptError::at_line(line, "unset expects `NAME`"));
                    }
                    let previous = self.state.env.remove(rest);
                    self.state
                        .result
                        .env_changes
                        .push(EnvChange::unset(rest, previous));
                }
                "log" => {
                    debug!(phase = self.phase.as_str(), "{}", rest);
                    self.state.result.console_output.push(rest.to_string());
                }
                "fail" => {
                    let message = if rest.is_empty() { "script failed" } else { rest };
                    return Err(ScriptError::at_line(line, message));
                }
                other => {
                    if !phase_directive(&mut self.state, line, other, rest)? {
                        return Err(self.unknown(line, other));
                    }
                }
            }
        }
        Ok(())
    }

    fn unknown(&self, line: usize, directive: &str) -> ScriptError {
        let owner = match directive {
            "url" | "header" | "body" => Some(Phase::PreRequest),
            "assert" | "extract" => Some(Phase::PostResponse),
            _ => None,
        };
        match owner {
            Some(phase) => ScriptError::at_line(
                line,
                format!(
                    "`{}` is only allowed in {} scripts, not {}",
                    directive,
                    phase.as_str(),
                    self.phase.as_str()
                ),
            ),
            None => ScriptError::at_line(line, format!("unknown directive `{}`", directive)),
        }
    }
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (text, ""),
    }
}

fn evaluate_assertion(
    line: usize,
    rest: &str,
    response: &ScriptResponse,
) -> Result<AssertionResult, ScriptError> {
    let name = rest.to_string();
    let (subject, args) = split_word(rest);
    match subject {
        "status" => {
            let (op, expected) = comparison(line, args)?;
            let actual = u64::from(response.status_code);
            Ok(check(name, op.holds(actual, expected), || {
                format!("status was {}", actual)
            }))
        }
        "time" => {
            let (op, expected) = comparison(line, args)?;
            Ok(check(name, op.holds(response.time_ms, expected), || {
                format!("took {}ms", response.time_ms)
            }))
        }
        "body" => {
            let needle = args
                .strip_prefix("contains")
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| ScriptError::at_line(line, "expected `assert body contains TEXT`"))?;
            Ok(check(name, response.body.contains(needle), || {
                format!("body does not contain `{}`", needle)
            }))
        }
        "header" => {
            let (header, expected) = split_word(args);
            if header.is_empty() {
                return Err(ScriptError::at_line(line, "expected `assert header NAME`"));
            }
            let actual = response
                .headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(header))
                .map(|(_, v)| v.as_str());
            match expected.strip_prefix("==").map(str::trim) {
                Some(want) => Ok(check(name, actual == Some(want), || match actual {
                    Some(v) => format!("header {} was `{}`", header, v),
                    None => format!("header {} missing", header),
                })),
                None if expected.is_empty() => Ok(check(name, actual.is_some(), || {
                    format!("header {} missing", header)
                })),
                None => Err(ScriptError::at_line(
                    line,
                    "expected `assert header NAME` or `assert header NAME == VALUE`",
                )),
            }
        }
        other => Err(ScriptError::at_line(
            line,
            format!("cannot assert on `{}`", other),
        )),
    }
}

fn comparison(line: usize, args: &str) -> Result<(CompareOp, u64), ScriptError> {
    let (op, value) = split_word(args);
    let op = CompareOp::parse(op)
        .ok_or_else(|| ScriptError::at_line(line, format!("unknown operator `{}`", op)))?;
    let value = value
        .parse::<u64>()
        .map_err(|_| ScriptError::at_line(line, format!("`{}` is not a number", value)))?;
    Ok((op, value))
}

fn check<F>(name: String, passed: bool, why: F) -> AssertionResult
where
    F: FnOnce() -> String,
{
    if passed {
        AssertionResult::pass(name)
    } else {
        AssertionResult::fail(name, why())
    }
}

/// Dot path lookup; numeric segments index arrays
fn value_at_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for part in path.split('.').filter(|p| !p.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
