use http::{Method, Request};
use std::collections::HashMap;

#[derive(Debug)]
enum PathSegment {
    Static(&'static str),
    Param(&'static str),
}

/// A path pattern such as `/get/{job}/{build}`.
#[derive(Debug)]
struct Pattern {
    segments: Vec<PathSegment>,
}

impl Pattern {
    fn parse(pattern: &'static str) -> Self {
        let segments = pattern
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => PathSegment::Param(name),
                None => PathSegment::Static(s),
            })
            .collect();

        Pattern { segments }
    }

    /// Returns the captured parameters if `path` has exactly this shape.
    /// A trailing slash on the request is ignored; empty segments never match
    /// a parameter.
    fn matches<'a>(&self, path: &'a str) -> Option<HashMap<&'static str, &'a str>> {
        let normalized = path.trim().trim_matches('/');
        let request_segments: Vec<&'a str> = if normalized.is_empty() {
            vec![]
        } else {
            normalized.split('/').collect()
        };

        if request_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, actual) in self.segments.iter().zip(request_segments) {
            match segment {
                PathSegment::Static(expected) if *expected == actual => {}
                PathSegment::Static(_) => return None,
                PathSegment::Param(_) if actual.is_empty() => return None,
                PathSegment::Param(name) => {
                    params.insert(*name, actual);
                }
            }
        }

        Some(params)
    }
}

/// The two notification endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Render the message and return it as JSON.
    Get,
    /// Render the message and post it to a channel.
    Notify,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub action: Action,
    pub job: String,
    pub build: String,
    /// Channel requested through `?channel=`, if any.
    pub channel: Option<String>,
}

pub struct Router {
    routes: Vec<(Pattern, Action)>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Router {
            routes: vec![
                (Pattern::parse("/get/{job}/{build}"), Action::Get),
                (Pattern::parse("/notify/{job}/{build}"), Action::Notify),
            ],
        }
    }

    /// Matches a request to an endpoint. Only `GET` is routed.
    pub fn resolve<B>(&self, request: &Request<B>) -> Option<Endpoint> {
        if request.method() != Method::GET {
            return None;
        }

        let path = request.uri().path();
        let (params, action) = self
            .routes
            .iter()
            .find_map(|(pattern, action)| Some((pattern.matches(path)?, *action)))?;

        Some(Endpoint {
            action,
            job: decode(params.get("job")?),
            build: decode(params.get("build")?),
            channel: request.uri().query().and_then(channel_param),
        })
    }
}

/// Percent-decodes a path segment. `+` stays literal, unlike in queries.
fn decode(segment: &str) -> String {
    let escaped = segment.replace('+', "%2B").replace('&', "%26");
    url::form_urlencoded::parse(format!("v={escaped}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| segment.to_string())
}

fn channel_param(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "channel")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
