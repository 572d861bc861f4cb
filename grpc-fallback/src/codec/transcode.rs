//! Request transcoding for `google.api.http` rules.
//!
//! A request in its proto3 JSON form is split into the variables bound by
//! the path template, an optional body, and query parameters for whatever
//! is left.

use crate::HttpRule;
use http::Method;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};
use tracing::trace;

// Everything but the RFC 3986 unreserved characters.
const COMPONENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, PartialEq)]
pub(crate) struct Transcoded {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<Value>,
}

impl Transcoded {
    /// The `a=1&b=2` form of the query parameters.
    pub(crate) fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(key, COMPONENT_ENCODE_SET),
                    utf8_percent_encode(value, COMPONENT_ENCODE_SET)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Apply `rule` to `request`, trying the main binding first and then each
/// additional binding. Returns `None` when no binding can be satisfied.
pub(crate) fn transcode(request: &Map<String, Value>, rule: &HttpRule) -> Option<Transcoded> {
    rule.bindings()
        .find_map(|binding| transcode_binding(request, binding))
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Literal(&'a str),
    Variable {
        field: &'a str,
        pattern: Option<&'a str>,
    },
}

fn transcode_binding(request: &Map<String, Value>, binding: &HttpRule) -> Option<Transcoded> {
    let template = parse_template(binding.path())?;
    let mut remaining = request.clone();
    let mut path = String::new();

    for segment in template {
        match segment {
            Segment::Literal(text) => path.push_str(text),
            Segment::Variable { field, pattern } => {
                let value = take_field(&mut remaining, field)?;
                let text = match value {
                    Value::String(text) if !text.is_empty() => text,
                    Value::Number(number) => number.to_string(),
                    Value::Bool(flag) => flag.to_string(),
                    _ => {
                        trace!("path variable {field} is not a non-empty scalar");
                        return None;
                    }
                };

                if let Some(pattern) = pattern {
                    if !matches_pattern(pattern, &text) {
                        trace!("{:?} does not match {} for {}", text, pattern, field);
                        return None;
                    }
                }

                let encoded = text
                    .split('/')
                    .map(|part| utf8_percent_encode(part, COMPONENT_ENCODE_SET).to_string())
                    .collect::<Vec<_>>();
                if pattern.is_none() {
                    // A plain variable is a single segment, slashes included.
                    path.push_str(&encoded.join("%2F"));
                } else {
                    path.push_str(&encoded.join("/"));
                }
            }
        }
    }

    let (body, unbound) = match binding.body() {
        Some("*") => (Some(Value::Object(remaining)), None),
        Some(field) => {
            let body = take_field(&mut remaining, field);
            (body, Some(remaining))
        }
        None => (None, Some(remaining)),
    };

    let mut query = Vec::new();
    if let Some(unbound) = unbound {
        flatten_query("", &Value::Object(unbound), &mut query);
    }

    Some(Transcoded {
        method: binding.method().clone(),
        path,
        query,
        body,
    })
}

fn parse_template(template: &str) -> Option<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = template;

    while !rest.is_empty() {
        match rest.find('{') {
            Some(0) => {
                let end = rest.find('}')?;
                let variable = &rest[1..end];
                let (field, pattern) = match variable.split_once('=') {
                    Some((field, pattern)) => (field, Some(pattern)),
                    None => (variable, None),
                };
                if field.is_empty() {
                    return None;
                }
                segments.push(Segment::Variable { field, pattern });
                rest = &rest[end + 1..];
            }
            Some(start) => {
                segments.push(Segment::Literal(&rest[..start]));
                rest = &rest[start..];
            }
            None => {
                segments.push(Segment::Literal(rest));
                rest = "";
            }
        }
    }

    Some(segments)
}

fn matches_pattern(pattern: &str, value: &str) -> bool {
    fn matches(pattern: &[&str], value: &[&str]) -> bool {
        match pattern.split_first() {
            None => value.is_empty(),
            Some((&"**", rest)) => (1..=value.len()).any(|n| matches(rest, &value[n..])),
            Some((&"*", rest)) => {
                value.first().is_some_and(|segment| !segment.is_empty())
                    && matches(rest, &value[1..])
            }
            Some((literal, rest)) => value.first() == Some(literal) && matches(rest, &value[1..]),
        }
    }

    let pattern = pattern.split('/').collect::<Vec<_>>();
    let value = value.split('/').collect::<Vec<_>>();
    matches(&pattern, &value)
}

/// Remove the field at the dotted `path` from `request` and return it.
///
/// Rules name fields in `snake_case` while the JSON form uses
/// `lowerCamelCase`, so each step tries the camel case key first.
fn take_field(request: &mut Map<String, Value>, path: &str) -> Option<Value> {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };

    let mut current = request;
    if let Some(parents) = parents {
        for part in parents.split('.') {
            let key = resolve_key(current, part)?;
            current = current.get_mut(&key)?.as_object_mut()?;
        }
    }

    let key = resolve_key(current, leaf)?;
    match current.remove(&key)? {
        Value::Null => None,
        value => Some(value),
    }
}

fn resolve_key(map: &Map<String, Value>, field: &str) -> Option<String> {
    let camel = snake_to_camel(field);
    if map.contains_key(&camel) {
        Some(camel)
    } else if map.contains_key(field) {
        Some(field.to_owned())
    } else {
        None
    }
}

fn snake_to_camel(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Flatten the unbound fields into query parameters: nested messages use
/// dotted keys and repeated fields repeat the key.
fn flatten_query(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, value) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_query(&key, value, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten_query(prefix, item, out);
            }
        }
        Value::String(text) => {
            if !text.is_empty() {
                out.push((prefix.to_owned(), text.clone()));
            }
        }
        Value::Number(number) => out.push((prefix.to_owned(), number.to_string())),
        Value::Bool(flag) => out.push((prefix.to_owned(), flag.to_string())),
    }
}
