//! Diagnostic codes reported while checking and lowering bodies.
//!
//! Syntax codes live in `kiln-syntax`, flow codes in `kiln-flow`.

pub const TYPE: &str = "type";
pub const UNKNOWN_TYPE: &str = "unknown-type";
pub const UNKNOWN_VARIABLE: &str = "unknown-variable";
pub const UNKNOWN_FIELD: &str = "unknown-field";
pub const UNKNOWN_METHOD: &str = "unknown-method";
pub const AMBIGUOUS_CALL: &str = "ambiguous-call";
pub const NO_MATCH: &str = "no-match";
/// Warning grade unless `warnings_as_errors` is set.
pub const TYPE_PARAMETER: &str = "type-parameter";
pub const UNIMPLEMENTED_METHOD: &str = "unimplemented-method";
pub const DUPLICATE: &str = "duplicate";
