//! Knobs controlling how a file is turned into modules.

/// What to do with a member annotation other than `NoRuntime` and
/// `IncludePath`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemberAnnotationPolicy {
    /// Fail with an unsupported-feature error.
    #[default]
    Reject,
    /// Keep the annotation as metadata on each member value.
    Wrap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub member_annotations: MemberAnnotationPolicy,
    /// Log the value of `__print__` statements.
    pub debug_print: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            member_annotations: MemberAnnotationPolicy::Reject,
            debug_print: true,
        }
    }
}

impl ParseOptions {
    pub fn wrapping_member_annotations() -> Self {
        ParseOptions {
            member_annotations: MemberAnnotationPolicy::Wrap,
            ..ParseOptions::default()
        }
    }
}
