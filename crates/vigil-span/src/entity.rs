//! Behavior shared by all four hierarchy levels.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::env_tags;
use crate::tags;
use crate::tracer::{Span, SpanContext, TagValue};

/// Common state of a hierarchy node: the wrapped span, the node's domain
/// tags (its own plus its ancestors', inherited at creation time so the
/// backend can reconstruct the hierarchy from any single event), and the
/// close-once guard.
pub(crate) struct EntityCore {
    start_time: DateTime<Utc>,
    domain_tags: Vec<(String, String)>,
    span: Span,
    closed: Mutex<bool>,
}

impl EntityCore {
    pub(crate) fn new(
        span: Span,
        start_time: DateTime<Utc>,
        domain_tags: Vec<(String, String)>,
    ) -> Self {
        Self {
            start_time,
            domain_tags,
            span,
            closed: Mutex::new(false),
        }
    }

    pub(crate) fn context(&self) -> SpanContext {
        self.span.context()
    }

    pub(crate) fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub(crate) fn span(&self) -> &Span {
        &self.span
    }

    /// Domain tags inherited by child nodes.
    pub(crate) fn domain_tags(&self) -> &[(String, String)] {
        &self.domain_tags
    }

    pub(crate) fn set_tag(&self, key: &str, value: impl Into<TagValue>) {
        self.span.set_tag(key, value);
    }

    pub(crate) fn set_error(&self, message: &str) {
        self.span.set_error(message);
    }

    pub(crate) fn set_error_info(&self, kind: &str, message: &str, stack: &str) {
        self.span.set_error_info(kind, message, stack);
    }

    /// Perform the close transition exactly once: run `f` against the span
    /// and finish it. Returns whether this call won the transition.
    pub(crate) fn close_once(
        &self,
        finish_time: DateTime<Utc>,
        f: impl FnOnce(&Span),
    ) -> bool {
        let mut closed = self.closed.lock().unwrap();
        if *closed {
            return false;
        }
        f(&self.span);
        self.span.finish(finish_time);
        *closed = true;
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

/// `{framework}.{kind}` with a lowercased framework, or just `kind` when
/// no framework is known.
pub(crate) fn operation_name(framework: &str, kind: &str) -> String {
    if framework.is_empty() {
        kind.to_string()
    } else {
        format!("{}.{}", framework.to_lowercase(), kind)
    }
}

/// Start tags applied to every entity span: the origin marker, the
/// process-wide environment tags, then the node's domain tags.
pub(crate) fn with_common_tags(domain_tags: &[(String, String)]) -> Vec<(String, TagValue)> {
    let mut out: Vec<(String, TagValue)> = Vec::with_capacity(domain_tags.len() + 8);
    out.push((tags::ORIGIN.to_string(), TagValue::from(tags::CI_TEST_ORIGIN)));
    for (key, value) in env_tags::env_tags() {
        out.push((key.clone(), TagValue::from(value.as_str())));
    }
    for (key, value) in domain_tags {
        out.push((key.clone(), TagValue::from(value.as_str())));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_name() {
        assert_eq!(operation_name("", "test_session"), "test_session");
        assert_eq!(
            operation_name("Vigil.Harness", "test"),
            "vigil.harness.test"
        );
    }

    #[test]
    fn common_tags_include_origin_and_domain() {
        let domain = vec![("test.module".to_string(), "pkg".to_string())];
        let all = with_common_tags(&domain);
        assert!(all
            .iter()
            .any(|(k, v)| k == tags::ORIGIN && matches!(v, TagValue::Str(s) if s == tags::CI_TEST_ORIGIN)));
        assert!(all
            .iter()
            .any(|(k, v)| k == "test.module" && matches!(v, TagValue::Str(s) if s == "pkg")));
    }
}
