// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - CSP Violation Wire Formats
 * Serde models for the legacy csp-report payload, the Reporting API
 * payload and the Report-To group definition
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::{Deserialize, Serialize};

/// Name of the Reporting API group the generated policy points at.
pub const REPORTING_API_GROUP: &str = "csp-endpoint";

/// Max age advertised in the Report-To group definition (126 days).
pub const REPORTING_API_MAX_AGE: u64 = 10_886_400;

/// Wrapper object of a legacy `application/csp-report` POST body.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyReportBody {
    #[serde(rename = "csp-report")]
    pub csp_report: Option<ViolationReport>,
}

/// The decoded fields of one browser CSP violation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViolationReport {
    #[serde(rename = "blocked-uri")]
    pub blocked_uri: Option<String>,
    pub disposition: Option<String>,
    #[serde(rename = "document-uri")]
    pub document_uri: Option<String>,
    #[serde(rename = "effective-directive")]
    pub effective_directive: Option<String>,
    #[serde(rename = "original-policy")]
    pub original_policy: Option<String>,
    pub referrer: Option<String>,
    #[serde(rename = "script-sample")]
    pub script_sample: Option<String>,
    #[serde(rename = "status-code")]
    pub status_code: Option<String>,
    #[serde(rename = "violated-directive")]
    pub violated_directive: Option<String>,
}

/// One entry of an `application/reports+json` POST body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiReport {
    #[serde(rename = "type")]
    pub report_type: Option<String>,
    pub age: Option<i64>,
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub body: Option<ApiReportBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiReportBody {
    pub blocked: Option<String>,
    pub directive: Option<String>,
    pub policy: Option<String>,
    pub status: Option<String>,
    pub referrer: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReportingGroup<'a> {
    group: &'a str,
    max_age: u64,
    endpoints: [ReportingGroupEndpoint<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ReportingGroupEndpoint<'a> {
    url: &'a str,
}

/// Serialize the Report-To group definition for a reporting endpoint URL.
pub fn reporting_group_json(endpoint: &str) -> String {
    let group = ReportingGroup {
        group: REPORTING_API_GROUP,
        max_age: REPORTING_API_MAX_AGE,
        endpoints: [ReportingGroupEndpoint { url: endpoint }],
    };
    // Serialization of a flat struct of strings cannot fail
    serde_json::to_string(&group).unwrap_or_default()
}
