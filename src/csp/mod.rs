// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Typed Content-Security-Policy model: directive options, the directive
//! registry, and the policy map. Wire format in, wire format out.

pub mod directives;
pub mod options;
pub mod policy;

pub use directives::{Directive, DirectiveFamily, DirectiveInfo, DirectiveValue, OptionKind};
pub use options::{MimeTypeOption, SandboxOption, SourceOption};
pub use policy::Policy;
