// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Policy Relaxation Engine
 * Folds browser violation reports into directive adjustments on the
 * live policy map
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::{Context, Result};
use regex::Regex;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::csp::Policy;
use crate::report::ViolationReport;

/// Owns the mutable policy map. Reports are applied one at a time on the
/// endpoint's request path; proxy handlers only read serialized snapshots.
pub struct PolicyEngine {
    policy: RwLock<Policy>,
    self_pattern: Regex,
}

impl PolicyEngine {
    /// Build an engine holding the strictest policy for a crawl through
    /// the proxy on `proxy_port`. The self pattern matches anything the
    /// browser loaded from the proxied origin itself.
    pub fn new(
        proxy_port: u16,
        report_to_group: Option<&str>,
        report_uri: Option<&str>,
    ) -> Result<Self> {
        let self_pattern = Regex::new(&format!(r"^(https?://localhost:{}).*", proxy_port))
            .context("Failed to compile self pattern")?;
        Ok(Self {
            policy: RwLock::new(Policy::strict(report_to_group, report_uri)),
            self_pattern,
        })
    }

    /// Apply one decoded violation to the policy.
    ///
    /// An adjustable directive is replaced by its widened form; a
    /// directive that cannot be adjusted, or a report with no blocked
    /// URI, drops out of the policy; a directive the policy no longer
    /// carries is ignored.
    pub async fn evaluate_violation(&self, report: &ViolationReport) {
        let Some(name) = report.effective_directive.as_deref() else {
            debug!("Violation report without effective directive ignored");
            return;
        };

        let mut policy = self.policy.write().await;
        let Some(directive) = policy.get(name) else {
            debug!("Violation for directive not in policy ignored: {}", name);
            return;
        };

        match report.blocked_uri.as_deref() {
            Some(blocked_uri) => {
                match directive.adjust_to_uri(blocked_uri, &self.self_pattern) {
                    Some(adjusted) => {
                        debug!("[Engine] {} -> {}", name, adjusted);
                        policy.replace(adjusted);
                    }
                    None => {
                        info!("[Engine] Dropping unadjustable directive {}", name);
                        policy.remove(name);
                    }
                }
            }
            None => {
                info!("[Engine] Report without blocked URI: {:?}", report);
                policy.remove(name);
            }
        }
    }

    /// Widen `form-action` to admit a scraped form target.
    pub async fn adjust_form_action(&self, target: &str) {
        let mut policy = self.policy.write().await;
        let Some(directive) = policy.get("form-action") else {
            return;
        };
        if let Some(adjusted) = directive.adjust_to_uri(target, &self.self_pattern) {
            policy.replace(adjusted);
        }
    }

    /// Serialized policy as injected into the report-only header.
    pub async fn header_value(&self) -> String {
        self.policy.read().await.to_string()
    }

    /// Current policy state, cloned.
    pub async fn snapshot(&self) -> Policy {
        self.policy.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csp::{DirectiveValue, SourceOption};

    fn violation(directive: &str, blocked_uri: Option<&str>) -> ViolationReport {
        ViolationReport {
            effective_directive: Some(directive.to_string()),
            blocked_uri: blocked_uri.map(|u| u.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_script_violation_relaxes_script_src() {
        let engine = PolicyEngine::new(8080, None, Some("http://localhost:9/uri")).unwrap();
        engine
            .evaluate_violation(&violation("script-src", Some("https://cdn.example/lib.js")))
            .await;

        let policy = engine.snapshot().await;
        assert_eq!(
            policy.get("script-src").unwrap().to_string(),
            "script-src https://cdn.example"
        );
    }

    #[tokio::test]
    async fn test_inline_violation() {
        let engine = PolicyEngine::new(8080, None, None).unwrap();
        engine
            .evaluate_violation(&violation("style-src", Some("inline")))
            .await;
        assert_eq!(
            engine.snapshot().await.get("style-src").unwrap().to_string(),
            "style-src 'unsafe-inline'"
        );
    }

    #[tokio::test]
    async fn test_self_violation() {
        let engine = PolicyEngine::new(9000, None, None).unwrap();
        engine
            .evaluate_violation(&violation("img-src", Some("http://localhost:9000/a.png")))
            .await;
        assert_eq!(
            engine.snapshot().await.get("img-src").unwrap().to_string(),
            "img-src 'self'"
        );
    }

    #[tokio::test]
    async fn test_null_blocked_uri_removes_directive() {
        let engine = PolicyEngine::new(8080, None, None).unwrap();
        engine.evaluate_violation(&violation("font-src", None)).await;
        assert!(engine.snapshot().await.get("font-src").is_none());
    }

    #[tokio::test]
    async fn test_unknown_directive_ignored() {
        let engine = PolicyEngine::new(8080, None, None).unwrap();
        let before = engine.snapshot().await;
        engine
            .evaluate_violation(&violation("sandbox", Some("inline")))
            .await;
        // sandbox never enters a report-only policy, so nothing changes
        assert_eq!(engine.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_relaxation_is_monotonic() {
        let engine = PolicyEngine::new(8080, None, None).unwrap();
        let reports = [
            violation("script-src", Some("https://cdn.example/a.js")),
            violation("script-src", Some("inline")),
            violation("script-src", Some("eval")),
            violation("script-src", Some("data")),
            violation("script-src", Some("http://localhost:8080/app.js")),
        ];
        let mut allowed = 0;
        for report in &reports {
            engine.evaluate_violation(report).await;
            let policy = engine.snapshot().await;
            let DirectiveValue::Sources(options) =
                policy.get("script-src").unwrap().value().clone()
            else {
                panic!("script-src lost its sources");
            };
            // Each step only ever widens, and 'none' never coexists
            assert!(options.len() >= allowed);
            assert!(!options.contains(&SourceOption::None));
            allowed = options.len();
        }
        assert_eq!(allowed, 5);
    }

    #[tokio::test]
    async fn test_form_action_adjustment() {
        let engine = PolicyEngine::new(8080, None, None).unwrap();
        engine
            .adjust_form_action("https://localhost:8080/submit")
            .await;
        assert_eq!(
            engine.snapshot().await.get("form-action").unwrap().to_string(),
            "form-action 'self'"
        );
    }
}
