// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - CSP Policy Map
 * Directive-name keyed policy with strictest-possible construction
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::BTreeMap;
use std::fmt;

use super::directives::{Directive, DIRECTIVES};

/// An assembled Content Security Policy: a name-keyed directive map.
///
/// Only directives allowed in a report-only header ever appear here; the
/// key order is stable (alphabetical) so serialization is deterministic
/// within a process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    directives: BTreeMap<&'static str, Directive>,
}

impl Policy {
    /// Maximally restrictive policy over every known directive.
    ///
    /// `report_to_group` and `report_uri` wire the reporting directives;
    /// either left unset omits its directive entirely.
    pub fn strict(report_to_group: Option<&str>, report_uri: Option<&str>) -> Policy {
        let mut directives = BTreeMap::new();
        for info in DIRECTIVES {
            if !info.in_report_only {
                continue;
            }
            let directive = match info.name {
                "report-to" => report_to_group.and_then(|group| Directive::simple(info, group)),
                "report-uri" => report_uri.and_then(|uri| Directive::simple(info, uri)),
                _ => Directive::strictest(info),
            };
            if let Some(directive) = directive {
                directives.insert(info.name, directive);
            }
        }
        Policy { directives }
    }

    /// Parse a serialized policy ("a; b; c"). Unknown directives drop out.
    pub fn parse(input: &str) -> Policy {
        let mut directives = BTreeMap::new();
        for clause in input.split(';') {
            if let Some(directive) = Directive::parse(clause) {
                directives.insert(directive.name(), directive);
            }
        }
        Policy { directives }
    }

    pub fn get(&self, name: &str) -> Option<&Directive> {
        self.directives.get(name)
    }

    /// Replace a directive. The report-only invariant is the caller's to
    /// keep: entries enter either through `strict` or as adjustments of
    /// directives already present.
    pub fn replace(&mut self, directive: Directive) {
        self.directives.insert(directive.name(), directive);
    }

    pub fn remove(&mut self, name: &str) -> Option<Directive> {
        self.directives.remove(name)
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.directives.values()
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for directive in self.directives.values() {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}", directive)?;
            first = false;
        }
        Ok(())
    }
}
