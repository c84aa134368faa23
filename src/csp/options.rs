// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - CSP Directive Options
 * Typed source expressions, sandbox keywords and MIME types with
 * their wire-format parsers and serializers
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

// Recognizer patterns. Nonce must be tried before Hash ('nonce-X' is a
// valid hash spelling), Host must always come last: it is the most
// permissive pattern of the set.
static NONCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^'nonce-([^'-]+)'$").expect("nonce pattern"));
static HASH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^'([^'-]+)-([^'-]+)'$").expect("hash pattern"));
static SCHEME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.-]*):$").expect("scheme pattern"));
// Anchored at the start only: blocked URIs reported by browsers carry a
// path suffix ("https://cdn.example/lib.js") that is irrelevant to the
// source expression.
static HOST_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:([A-Za-z][A-Za-z0-9+.-]*):/{1,2})?([\w.~-]+)(?::(\d+))?")
        .expect("host pattern")
});
static MIME_TYPE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\w.+-]+)/([\w.+-]+)((?:;[^;\s]+)*)$").expect("mime pattern"));

/// One source expression in a fetch/navigation/document directive value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceOption {
    /// `'self'` - the origin the document was served from
    SelfOrigin,
    UnsafeEval,
    UnsafeHashes,
    UnsafeInline,
    /// `'none'` - matches nothing
    None,
    StrictDynamic,
    ReportSample,
    Nonce(String),
    Hash { algorithm: String, hash: String },
    Scheme(String),
    Host {
        host: String,
        scheme: Option<String>,
        port: Option<u16>,
    },
}

impl SourceOption {
    /// Recognize a single space-delimited token. Fixed tokens are
    /// case-sensitive; unrecognized tokens yield `None`.
    pub fn parse_token(token: &str) -> Option<SourceOption> {
        match token {
            "'self'" => return Some(SourceOption::SelfOrigin),
            "'unsafe-eval'" => return Some(SourceOption::UnsafeEval),
            "'unsafe-hashes'" => return Some(SourceOption::UnsafeHashes),
            "'unsafe-inline'" => return Some(SourceOption::UnsafeInline),
            "'none'" => return Some(SourceOption::None),
            "'strict-dynamic'" => return Some(SourceOption::StrictDynamic),
            "'report-sample'" => return Some(SourceOption::ReportSample),
            _ => {}
        }

        if let Some(caps) = NONCE_PATTERN.captures(token) {
            return Some(SourceOption::Nonce(caps[1].to_string()));
        }
        if let Some(caps) = HASH_PATTERN.captures(token) {
            return Some(SourceOption::Hash {
                algorithm: caps[1].to_string(),
                hash: caps[2].to_string(),
            });
        }
        if let Some(caps) = SCHEME_PATTERN.captures(token) {
            return Some(SourceOption::Scheme(caps[1].to_string()));
        }
        Self::parse_host(token)
    }

    /// Parse a token against the host-source pattern alone. Also used
    /// when folding violation URIs back into a directive.
    pub fn parse_host(token: &str) -> Option<SourceOption> {
        let caps = HOST_PATTERN.captures(token)?;
        let port = match caps.get(3) {
            // A port that does not fit u16 invalidates the whole token
            Some(p) => Some(p.as_str().parse::<u16>().ok()?),
            Option::None => Option::None,
        };
        Some(SourceOption::Host {
            host: caps[2].to_string(),
            scheme: caps.get(1).map(|m| m.as_str().to_string()),
            port,
        })
    }

    /// Parse a directive value: split on ASCII space, keep every token
    /// the recognizer list accepts, drop the rest silently.
    pub fn parse_list(input: &str) -> Vec<SourceOption> {
        input
            .split(' ')
            .filter(|t| !t.is_empty())
            .filter_map(Self::parse_token)
            .collect()
    }
}

impl fmt::Display for SourceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOption::SelfOrigin => write!(f, "'self'"),
            SourceOption::UnsafeEval => write!(f, "'unsafe-eval'"),
            SourceOption::UnsafeHashes => write!(f, "'unsafe-hashes'"),
            SourceOption::UnsafeInline => write!(f, "'unsafe-inline'"),
            SourceOption::None => write!(f, "'none'"),
            SourceOption::StrictDynamic => write!(f, "'strict-dynamic'"),
            SourceOption::ReportSample => write!(f, "'report-sample'"),
            SourceOption::Nonce(nonce) => write!(f, "'nonce-{}'", nonce),
            SourceOption::Hash { algorithm, hash } => write!(f, "'{}-{}'", algorithm, hash),
            SourceOption::Scheme(scheme) => write!(f, "{}:", scheme),
            SourceOption::Host { host, scheme, port } => {
                if let Some(scheme) = scheme {
                    write!(f, "{}://", scheme)?;
                }
                write!(f, "{}", host)?;
                if let Some(port) = port {
                    write!(f, ":{}", port)?;
                }
                Ok(())
            }
        }
    }
}

/// Keywords accepted in a `sandbox` directive value.
pub const SANDBOX_KEYWORDS: &[&str] = &[
    "allow-downloads",
    "allow-forms",
    "allow-modals",
    "allow-orientation-lock",
    "allow-pointer-lock",
    "allow-popups",
    "allow-popups-to-escape-sandbox",
    "allow-presentation",
    "allow-same-origin",
    "allow-scripts",
    "allow-storage-access-by-user-activation",
    "allow-top-navigation",
    "allow-top-navigation-by-user-activation",
    "allow-top-navigation-to-custom-protocols",
];

/// One `allow-*` keyword of a `sandbox` directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SandboxOption(String);

impl SandboxOption {
    pub fn parse_token(token: &str) -> Option<SandboxOption> {
        SANDBOX_KEYWORDS
            .contains(&token)
            .then(|| SandboxOption(token.to_string()))
    }

    pub fn parse_list(input: &str) -> Vec<SandboxOption> {
        input
            .split(' ')
            .filter(|t| !t.is_empty())
            .filter_map(Self::parse_token)
            .collect()
    }

    pub fn keyword(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SandboxOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One media type of a `plugin-types` directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MimeTypeOption {
    pub mime_type: String,
    pub subtype: String,
    pub parameters: Vec<String>,
}

impl MimeTypeOption {
    pub fn parse_token(token: &str) -> Option<MimeTypeOption> {
        let caps = MIME_TYPE_PATTERN.captures(token)?;
        let parameters = caps[3]
            .split(';')
            .filter(|p| !p.is_empty())
            .map(|p| p.to_string())
            .collect();
        Some(MimeTypeOption {
            mime_type: caps[1].to_string(),
            subtype: caps[2].to_string(),
            parameters,
        })
    }

    pub fn parse_list(input: &str) -> Vec<MimeTypeOption> {
        input
            .split(' ')
            .filter(|t| !t.is_empty())
            .filter_map(Self::parse_token)
            .collect()
    }
}

impl fmt::Display for MimeTypeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.mime_type, self.subtype)?;
        for parameter in &self.parameters {
            write!(f, ";{}", parameter)?;
        }
        Ok(())
    }
}

/// Parse opaque text tokens (report group names, report URIs).
pub fn parse_text_list(input: &str) -> Vec<String> {
    input
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}
