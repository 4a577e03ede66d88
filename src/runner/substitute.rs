//! `{{name}}` placeholder resolution

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

use crate::models::{AuthType, Request};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").unwrap());

/// Replaces every known placeholder in `text`.
///
/// Unknown names are left exactly as written. Values are inserted verbatim
/// and never re-scanned, so one pass is all that happens.
pub fn substitute(text: &str, vars: &HashMap<String, String>) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Copy of `request` with URL, header values, body and auth credentials resolved
pub fn substitute_request(request: &Request, vars: &HashMap<String, String>) -> Request {
    let mut resolved = request.clone();
    resolved.url = substitute(&request.url, vars);
    for header in &mut resolved.headers {
        header.value = substitute(&header.value, vars);
    }
    resolved.body = substitute(&request.body, vars);
    resolved.auth = match &request.auth {
        AuthType::None => AuthType::None,
        AuthType::Bearer(token) => AuthType::Bearer(substitute(token, vars)),
        AuthType::Basic { username, password } => AuthType::Basic {
            username: substitute(username, vars),
            password: substitute(password, vars),
        },
    };
    resolved
}

/// Names of placeholders in `text` that `vars` cannot resolve, in order of appearance
pub fn unresolved_placeholders(text: &str, vars: &HashMap<String, String>) -> Vec<String> {
    PLACEHOLDER_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .filter(|name| !vars.contains_key(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Header, HttpMethod};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_known_placeholders_are_replaced() {
        let v = vars(&[("base", "http://api"), ("token", "abc")]);
        assert_eq!(
            substitute("{{base}}/x?auth={{token}}", &v),
            "http://api/x?auth=abc"
        );
        assert_eq!(substitute("{{ base }}/y", &v), "http://api/y");
    }

    #[test]
    fn test_unknown_placeholders_pass_through() {
        let v = vars(&[("base", "http://api")]);
        assert_eq!(
            substitute("{{base}}/{{missing}}/{{}}", &v),
            "http://api/{{missing}}/{{}}"
        );
        assert_eq!(unresolved_placeholders("{{base}}/{{missing}}", &v), ["missing"]);
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let v = vars(&[("a", "{{b}}"), ("b", "nope")]);
        assert_eq!(substitute("{{a}}", &v), "{{b}}");
    }

    #[test]
    fn test_substitute_request_leaves_input_untouched() {
        let mut request = Request::new("r", HttpMethod::POST, "{{base}}/users")
            .with_body(r#"{"id":"{{id}}"}"#);
        request.headers.push(Header::new("X-Trace", "{{trace}}"));
        request.auth = AuthType::Bearer("{{token}}".into());
        let original = request.clone();

        let v = vars(&[("base", "http://h"), ("id", "7"), ("trace", "t1"), ("token", "tok")]);
        let resolved = substitute_request(&request, &v);

        assert_eq!(request, original);
        assert_eq!(resolved.url, "http://h/users");
        assert_eq!(resolved.body, r#"{"id":"7"}"#);
        assert_eq!(resolved.headers[0].value, "t1");
        assert_eq!(resolved.auth, AuthType::Bearer("tok".into()));
        assert_eq!(substitute_request(&request, &v), resolved);
    }
}
