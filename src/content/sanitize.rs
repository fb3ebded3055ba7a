use ammonia::Builder;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Elements removed together with everything inside them, unless the policy
/// explicitly allows them.
const DROPPED_WITH_CONTENT: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "object", "embed", "head", "title",
];

/// Allow-lists applied when feed HTML is embedded into an email.
///
/// Anything not listed is removed. Disallowed elements are unwrapped (their
/// text and allowed children stay), except script-like elements, which are
/// dropped with their content. A policy is an immutable value: build it once
/// from configuration and pass it to [`sanitize_html`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SanitizePolicy {
    pub tags: BTreeSet<String>,
    /// Allowed attributes per tag name.
    pub attributes: BTreeMap<String, BTreeSet<String>>,
    /// URL schemes permitted in `href`/`src`. Relative URLs are always allowed.
    pub protocols: BTreeSet<String>,
}

impl Default for SanitizePolicy {
    fn default() -> Self {
        let set = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();

        Self {
            tags: set(&[
                "p", "br", "strong", "em", "b", "i", "u", "a", "ul", "ol", "li", "blockquote",
                "code", "pre", "h1", "h2", "h3", "abbr", "acronym", "img",
            ]),
            attributes: [
                ("a", set(&["href", "title", "target"])),
                ("img", set(&["src", "alt"])),
                ("abbr", set(&["title"])),
                ("acronym", set(&["title"])),
            ]
            .into_iter()
            .map(|(tag, attrs)| (tag.to_string(), attrs))
            .collect(),
            protocols: set(&["http", "https", "mailto"]),
        }
    }
}

impl SanitizePolicy {
    pub fn allows_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Relative URLs pass; absolute URLs need a listed scheme.
    pub fn allows_url(&self, value: &str) -> bool {
        match url::Url::parse(value.trim()) {
            Ok(url) => self.protocols.contains(url.scheme()),
            Err(url::ParseError::RelativeUrlWithoutBase) => true,
            Err(_) => false,
        }
    }

    /// An ammonia cleaner configured from this policy.
    ///
    /// Starts from an empty builder so nothing outside the allow-lists
    /// survives. Relative URLs pass through and no `rel` is added to links.
    fn builder(&self) -> Builder<'_> {
        let tags: HashSet<&str> = self.tags.iter().map(String::as_str).collect();
        let clean_content: HashSet<&str> = DROPPED_WITH_CONTENT
            .iter()
            .copied()
            .filter(|tag| !tags.contains(tag))
            .collect();
        let attributes: HashMap<&str, HashSet<&str>> = self
            .attributes
            .iter()
            .map(|(tag, attrs)| (tag.as_str(), attrs.iter().map(String::as_str).collect()))
            .collect();
        let schemes: HashSet<&str> = self.protocols.iter().map(String::as_str).collect();

        let mut builder = Builder::empty();
        builder
            .tags(tags)
            .clean_content_tags(clean_content)
            .tag_attributes(attributes)
            .url_schemes(schemes)
            .strip_comments(true);
        builder
    }
}

/// Cleans an HTML fragment down to what `policy` allows.
///
/// Text is re-escaped, comments are removed and attribute values are quoted
/// and escaped.
pub fn sanitize_html(input: &str, policy: &SanitizePolicy) -> String {
    policy.builder().clean(input).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn clean(input: &str) -> String {
        sanitize_html(input, &SanitizePolicy::default())
    }

    #[test]
    fn test_allowed_markup_kept() {
        assert_eq!(
            clean("<p>Hello <b>world</b><br>next</p>"),
            "<p>Hello <b>world</b><br>next</p>"
        );
    }

    #[test]
    fn test_script_dropped_with_content() {
        assert_eq!(
            clean("<p>Hi<script>alert('x')</script><style>p{}</style></p>"),
            "<p>Hi</p>"
        );
    }

    #[test]
    fn test_disallowed_tags_unwrapped() {
        assert_eq!(clean("<div><span>kept <em>text</em></span></div>"), "kept <em>text</em>");
    }

    #[test]
    fn test_disallowed_attributes_removed() {
        assert_eq!(
            clean(
                r#"<a href="https://example.com" onclick="steal()" title="t" class="x">link</a>"#
            ),
            r#"<a href="https://example.com" title="t">link</a>"#
        );
        assert_eq!(clean(r#"<p style="color:red">x</p>"#), "<p>x</p>");
    }

    #[test]
    fn test_dangerous_protocols_removed() {
        assert_eq!(clean(r#"<a href="javascript:alert(1)">x</a>"#), "<a>x</a>");
        assert_eq!(clean("<a href=\"java\tscript:alert(1)\">x</a>"), "<a>x</a>");
        assert_eq!(clean(r#"<a href="JAVASCRIPT:alert(1)">x</a>"#), "<a>x</a>");
        assert_eq!(
            clean(r#"<img src="data:image/png;base64,AAAA" alt="pic">"#),
            r#"<img alt="pic">"#
        );
    }

    #[test]
    fn test_allowed_and_relative_urls_kept() {
        assert_eq!(
            clean(r#"<a href="mailto:me@example.com">mail</a>"#),
            r#"<a href="mailto:me@example.com">mail</a>"#
        );
        assert_eq!(clean(r#"<a href="/posts/1">rel</a>"#), r#"<a href="/posts/1">rel</a>"#);
        assert_eq!(
            clean(r#"<a href="?page=2&amp;x=1">q</a>"#),
            r#"<a href="?page=2&amp;x=1">q</a>"#
        );
    }

    #[test]
    fn test_text_is_escaped_and_comments_removed() {
        assert_eq!(clean("<p>1 &lt; 2 <!-- hidden --></p>"), "<p>1 &lt; 2 </p>");
    }

    #[test]
    fn test_plain_text_input() {
        assert_eq!(clean("no markup here"), "no markup here");
        assert_eq!(clean(""), "");
    }

    #[test]
    fn test_custom_policy() {
        let policy = SanitizePolicy {
            tags: ["a".to_string()].into_iter().collect(),
            attributes: [("a".to_string(), ["href".to_string()].into_iter().collect())]
                .into_iter()
                .collect(),
            protocols: ["https".to_string()].into_iter().collect(),
        };

        assert_eq!(
            sanitize_html(
                concat!(
                    r#"<p><a href="http://plain.example.com">a</a>"#,
                    r#"<a href="https://ok.example.com">b</a></p>"#,
                ),
                &policy
            ),
            r#"<a>a</a><a href="https://ok.example.com">b</a>"#
        );
    }

    #[test]
    fn test_explicitly_allowed_script_like_tag_is_kept() {
        let mut policy = SanitizePolicy::default();
        policy.tags.insert("noscript".to_string());

        assert_eq!(
            sanitize_html("<p>a</p><noscript>fallback</noscript><script>x()</script>", &policy),
            "<p>a</p><noscript>fallback</noscript>"
        );
    }

    #[test]
    fn test_policy_from_toml_uses_defaults_for_missing_fields() {
        let policy: SanitizePolicy = toml::from_str(r#"protocols = ["https"]"#).unwrap();
        assert!(policy.allows_tag("blockquote"));
        assert!(!policy.allows_url("mailto:me@example.com"));
        assert!(policy.allows_url("https://example.com"));
    }
}
