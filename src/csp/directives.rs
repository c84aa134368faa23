// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - CSP Directive Model
 * Directive registry with per-directive option kinds, placement flags,
 * strictest construction and violation-driven adjustment
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::warn;

use super::options::{
    parse_text_list, MimeTypeOption, SandboxOption, SourceOption,
};

/// The five families a known directive can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveFamily {
    Document,
    Fetch,
    Navigation,
    Reporting,
    /// `block-all-mixed-content` / `upgrade-insecure-requests`
    Boolean,
}

/// Which option variant a directive's value is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Source,
    Sandbox,
    MimeType,
    Text,
    NoValue,
}

/// Static per-directive attributes consulted during policy generation.
#[derive(Debug)]
pub struct DirectiveInfo {
    pub name: &'static str,
    pub family: DirectiveFamily,
    pub option_kind: OptionKind,
    pub in_header: bool,
    pub in_report_only: bool,
    pub in_meta: bool,
}

const fn info(
    name: &'static str,
    family: DirectiveFamily,
    option_kind: OptionKind,
) -> DirectiveInfo {
    DirectiveInfo {
        name,
        family,
        option_kind,
        in_header: true,
        in_report_only: true,
        in_meta: true,
    }
}

const fn no_meta(
    name: &'static str,
    family: DirectiveFamily,
    option_kind: OptionKind,
) -> DirectiveInfo {
    DirectiveInfo {
        name,
        family,
        option_kind,
        in_header: true,
        in_report_only: true,
        in_meta: false,
    }
}

/// Every directive this generator knows about. Scan order matters for
/// prefix parsing: the `-attr`/`-elem` variants are declared before the
/// bare directive whose name is their prefix.
pub static DIRECTIVES: &[DirectiveInfo] = &[
    info("base-uri", DirectiveFamily::Document, OptionKind::Source),
    info("plugin-types", DirectiveFamily::Document, OptionKind::MimeType),
    DirectiveInfo {
        name: "sandbox",
        family: DirectiveFamily::Document,
        option_kind: OptionKind::Sandbox,
        in_header: true,
        in_report_only: false,
        in_meta: false,
    },
    info("child-src", DirectiveFamily::Fetch, OptionKind::Source),
    info("connect-src", DirectiveFamily::Fetch, OptionKind::Source),
    info("default-src", DirectiveFamily::Fetch, OptionKind::Source),
    info("font-src", DirectiveFamily::Fetch, OptionKind::Source),
    info("frame-src", DirectiveFamily::Fetch, OptionKind::Source),
    info("img-src", DirectiveFamily::Fetch, OptionKind::Source),
    info("manifest-src", DirectiveFamily::Fetch, OptionKind::Source),
    info("media-src", DirectiveFamily::Fetch, OptionKind::Source),
    info("object-src", DirectiveFamily::Fetch, OptionKind::Source),
    info("prefetch-src", DirectiveFamily::Fetch, OptionKind::Source),
    info("script-src-attr", DirectiveFamily::Fetch, OptionKind::Source),
    info("script-src-elem", DirectiveFamily::Fetch, OptionKind::Source),
    info("script-src", DirectiveFamily::Fetch, OptionKind::Source),
    info("style-src-attr", DirectiveFamily::Fetch, OptionKind::Source),
    info("style-src-elem", DirectiveFamily::Fetch, OptionKind::Source),
    info("style-src", DirectiveFamily::Fetch, OptionKind::Source),
    info("worker-src", DirectiveFamily::Fetch, OptionKind::Source),
    info("form-action", DirectiveFamily::Navigation, OptionKind::Source),
    no_meta("frame-ancestors", DirectiveFamily::Navigation, OptionKind::Source),
    no_meta("navigate-to", DirectiveFamily::Navigation, OptionKind::Source),
    no_meta("report-to", DirectiveFamily::Reporting, OptionKind::Text),
    no_meta("report-uri", DirectiveFamily::Reporting, OptionKind::Text),
    info(
        "block-all-mixed-content",
        DirectiveFamily::Boolean,
        OptionKind::NoValue,
    ),
    info(
        "upgrade-insecure-requests",
        DirectiveFamily::Boolean,
        OptionKind::NoValue,
    ),
];

/// Look up a directive record by exact name.
pub fn lookup(name: &str) -> Option<&'static DirectiveInfo> {
    DIRECTIVES.iter().find(|d| d.name == name)
}

// Bare scheme names as browsers report them in blocked-uri ("data", "blob")
static BARE_SCHEME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z-]+$").expect("bare scheme pattern"));

/// The parsed value of one directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveValue {
    Sources(Vec<SourceOption>),
    Sandbox(Vec<SandboxOption>),
    MimeTypes(Vec<MimeTypeOption>),
    Text(Vec<String>),
    NoValue,
}

impl DirectiveValue {
    fn is_empty(&self) -> bool {
        match self {
            DirectiveValue::Sources(options) => options.is_empty(),
            DirectiveValue::Sandbox(options) => options.is_empty(),
            DirectiveValue::MimeTypes(options) => options.is_empty(),
            DirectiveValue::Text(options) => options.is_empty(),
            DirectiveValue::NoValue => true,
        }
    }
}

/// One CSP directive: a registry record plus a parsed value.
///
/// Instances are immutable; adjustment returns a fresh directive.
#[derive(Debug, Clone)]
pub struct Directive {
    info: &'static DirectiveInfo,
    value: DirectiveValue,
}

impl Directive {
    pub fn name(&self) -> &'static str {
        self.info.name
    }

    pub fn info(&self) -> &'static DirectiveInfo {
        self.info
    }

    pub fn value(&self) -> &DirectiveValue {
        &self.value
    }

    /// Parse a single directive string ("script-src 'self' cdn.example").
    ///
    /// The registry is scanned in declaration order; the first entry whose
    /// name is a prefix of the input wins and the remainder is handed to
    /// that directive's option parser. Unrecognized names yield nothing.
    pub fn parse(input: &str) -> Option<Directive> {
        let input = input.trim();
        let info = DIRECTIVES.iter().find(|d| input.starts_with(d.name))?;
        let remainder = &input[info.name.len()..];
        Some(Directive {
            info,
            value: Self::parse_value(info.option_kind, remainder),
        })
    }

    fn parse_value(kind: OptionKind, input: &str) -> DirectiveValue {
        match kind {
            OptionKind::Source => DirectiveValue::Sources(SourceOption::parse_list(input)),
            OptionKind::Sandbox => DirectiveValue::Sandbox(SandboxOption::parse_list(input)),
            OptionKind::MimeType => DirectiveValue::MimeTypes(MimeTypeOption::parse_list(input)),
            OptionKind::Text => DirectiveValue::Text(parse_text_list(input)),
            OptionKind::NoValue => DirectiveValue::NoValue,
        }
    }

    /// Maximally restrictive instance of a directive: `'none'` for source
    /// directives, an empty option list for sandbox and plugin types (which
    /// the CSP grammar reads as deny-all), bare presence for the boolean
    /// directives. Reporting directives have no strictest form.
    pub fn strictest(info: &'static DirectiveInfo) -> Option<Directive> {
        let value = match info.option_kind {
            OptionKind::Source => DirectiveValue::Sources(vec![SourceOption::None]),
            OptionKind::Sandbox => DirectiveValue::Sandbox(Vec::new()),
            OptionKind::MimeType => DirectiveValue::MimeTypes(Vec::new()),
            OptionKind::NoValue => DirectiveValue::NoValue,
            OptionKind::Text => return None,
        };
        Some(Directive { info, value })
    }

    /// Build a text-valued directive from a single opaque token. Only the
    /// reporting directives are constructed this way.
    pub fn simple(info: &'static DirectiveInfo, value: &str) -> Option<Directive> {
        if info.option_kind != OptionKind::Text || value.is_empty() {
            return None;
        }
        Some(Directive {
            info,
            value: DirectiveValue::Text(vec![value.to_string()]),
        })
    }

    /// Widen this directive so that a previously blocked URI is admitted.
    ///
    /// Only source-valued directives are adjustable; anything else returns
    /// `None` and is dropped from the policy by the caller. A URI no rule
    /// recognizes leaves the directive unchanged.
    pub fn adjust_to_uri(&self, uri: &str, self_pattern: &Regex) -> Option<Directive> {
        let DirectiveValue::Sources(existing) = &self.value else {
            return None;
        };

        let addition = if self_pattern.is_match(uri) {
            SourceOption::SelfOrigin
        } else if uri == "inline" {
            SourceOption::UnsafeInline
        } else if uri == "eval" {
            SourceOption::UnsafeEval
        } else if BARE_SCHEME_PATTERN.is_match(uri) {
            SourceOption::Scheme(uri.to_string())
        } else if let Some(host) = SourceOption::parse_host(uri) {
            host
        } else {
            warn!("Couldn't handle URI: {}", uri);
            return Some(self.clone());
        };

        // Adding a real source invalidates 'none'; duplicates collapse.
        let mut options: Vec<SourceOption> = existing
            .iter()
            .filter(|o| !matches!(o, SourceOption::None))
            .cloned()
            .collect();
        if !options.contains(&addition) {
            options.push(addition);
        }

        Some(Directive {
            info: self.info,
            value: DirectiveValue::Sources(options),
        })
    }
}

fn set_eq<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x))
}

// Equality is up to option-set equality: option order never matters.
impl PartialEq for Directive {
    fn eq(&self, other: &Self) -> bool {
        if !std::ptr::eq(self.info, other.info) {
            return false;
        }
        match (&self.value, &other.value) {
            (DirectiveValue::Sources(a), DirectiveValue::Sources(b)) => set_eq(a, b),
            (DirectiveValue::Sandbox(a), DirectiveValue::Sandbox(b)) => set_eq(a, b),
            (DirectiveValue::MimeTypes(a), DirectiveValue::MimeTypes(b)) => set_eq(a, b),
            (DirectiveValue::Text(a), DirectiveValue::Text(b)) => set_eq(a, b),
            (DirectiveValue::NoValue, DirectiveValue::NoValue) => true,
            _ => false,
        }
    }
}

impl Eq for Directive {}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info.name)?;
        if self.value.is_empty() {
            return Ok(());
        }
        match &self.value {
            DirectiveValue::Sources(options) => {
                for option in options {
                    write!(f, " {}", option)?;
                }
            }
            DirectiveValue::Sandbox(options) => {
                for option in options {
                    write!(f, " {}", option)?;
                }
            }
            DirectiveValue::MimeTypes(options) => {
                for option in options {
                    write!(f, " {}", option)?;
                }
            }
            DirectiveValue::Text(options) => {
                for option in options {
                    write!(f, " {}", option)?;
                }
            }
            DirectiveValue::NoValue => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_pattern(port: u16) -> Regex {
        Regex::new(&format!(r"^(https?://localhost:{}).*", port)).unwrap()
    }

    #[test]
    fn test_parse_known_directive() {
        let directive = Directive::parse("script-src 'self' https://cdn.example").unwrap();
        assert_eq!(directive.name(), "script-src");
        match directive.value() {
            DirectiveValue::Sources(options) => assert_eq!(options.len(), 2),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_parse_attr_variant_not_swallowed_by_prefix() {
        let directive = Directive::parse("script-src-attr 'none'").unwrap();
        assert_eq!(directive.name(), "script-src-attr");
        let directive = Directive::parse("style-src-elem 'self'").unwrap();
        assert_eq!(directive.name(), "style-src-elem");
    }

    #[test]
    fn test_parse_unknown_directive_dropped() {
        assert!(Directive::parse("trusted-types default").is_none());
        assert!(Directive::parse("referrer origin").is_none());
    }

    #[test]
    fn test_strictest_serializes_parseable() {
        for info in DIRECTIVES {
            let Some(directive) = Directive::strictest(info) else {
                assert_eq!(info.option_kind, OptionKind::Text);
                continue;
            };
            let wire = directive.to_string();
            assert!(!wire.is_empty());
            let reparsed = Directive::parse(&wire).unwrap();
            assert_eq!(reparsed, directive);
        }
    }

    #[test]
    fn test_round_trip_with_options() {
        let inputs = [
            "script-src 'self' 'unsafe-inline' 'nonce-abc' https://cdn.example:8443 data:",
            "sandbox allow-forms allow-scripts",
            "plugin-types application/pdf",
            "report-uri http://localhost:9/uri",
            "upgrade-insecure-requests",
        ];
        for input in inputs {
            let directive = Directive::parse(input).unwrap();
            let reparsed = Directive::parse(&directive.to_string()).unwrap();
            assert_eq!(reparsed, directive);
        }
    }

    #[test]
    fn test_adjust_self() {
        let directive = Directive::parse("img-src 'none'").unwrap();
        let adjusted = directive
            .adjust_to_uri("http://localhost:9000/a.png", &self_pattern(9000))
            .unwrap();
        assert_eq!(adjusted.to_string(), "img-src 'self'");
    }

    #[test]
    fn test_adjust_inline_and_eval() {
        let directive = Directive::parse("style-src 'none'").unwrap();
        let adjusted = directive.adjust_to_uri("inline", &self_pattern(8080)).unwrap();
        assert_eq!(adjusted.to_string(), "style-src 'unsafe-inline'");

        let directive = Directive::parse("script-src 'none'").unwrap();
        let adjusted = directive.adjust_to_uri("eval", &self_pattern(8080)).unwrap();
        assert_eq!(adjusted.to_string(), "script-src 'unsafe-eval'");
    }

    #[test]
    fn test_adjust_scheme_and_host() {
        let directive = Directive::parse("img-src 'none'").unwrap();
        let adjusted = directive.adjust_to_uri("data", &self_pattern(8080)).unwrap();
        assert_eq!(adjusted.to_string(), "img-src data:");

        let adjusted = directive
            .adjust_to_uri("https://other.example", &self_pattern(8080))
            .unwrap();
        assert_eq!(adjusted.to_string(), "img-src https://other.example");
    }

    #[test]
    fn test_adjust_removes_none_and_dedups() {
        let directive = Directive::parse("script-src 'none'").unwrap();
        let once = directive
            .adjust_to_uri("https://cdn.example/lib.js", &self_pattern(8080))
            .unwrap();
        assert_eq!(once.to_string(), "script-src https://cdn.example");
        let twice = once
            .adjust_to_uri("https://cdn.example/other.js", &self_pattern(8080))
            .unwrap();
        assert_eq!(twice.to_string(), "script-src https://cdn.example");
    }

    #[test]
    fn test_adjust_unhandled_uri_leaves_directive_unchanged() {
        let directive = Directive::parse("script-src 'self'").unwrap();
        let adjusted = directive
            .adjust_to_uri("###garbage###", &self_pattern(8080))
            .unwrap();
        assert_eq!(adjusted, directive);
    }

    #[test]
    fn test_adjust_non_source_directive_yields_nothing() {
        let directive = Directive::parse("sandbox").unwrap();
        assert!(directive
            .adjust_to_uri("https://other.example", &self_pattern(8080))
            .is_none());
    }

    #[test]
    fn test_original_instance_untouched() {
        let directive = Directive::parse("img-src 'none'").unwrap();
        let _ = directive.adjust_to_uri("data", &self_pattern(8080));
        assert_eq!(directive.to_string(), "img-src 'none'");
    }

    #[test]
    fn test_placement_flags() {
        assert!(!lookup("sandbox").unwrap().in_report_only);
        assert!(!lookup("sandbox").unwrap().in_meta);
        assert!(!lookup("frame-ancestors").unwrap().in_meta);
        assert!(!lookup("report-uri").unwrap().in_meta);
        assert!(lookup("script-src").unwrap().in_report_only);
        assert!(lookup("default-src").unwrap().in_header);
    }
}
