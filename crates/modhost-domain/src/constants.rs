//! Domain constants
//!
//! Secret reference scheme prefixes and well-known names shared by the
//! application and infrastructure layers.

// ============================================================================
// SECRET REFERENCE SCHEMES
// ============================================================================

/// Prefix of environment-variable secret references (`env://NAME`)
pub const SECRET_SCHEME_ENV: &str = "env://";

/// Prefix of file secret references (`file://PATH`)
pub const SECRET_SCHEME_FILE: &str = "file://";

/// Prefix of vault secret references (`vault://mount/path?secret=key`)
pub const SECRET_SCHEME_VAULT: &str = "vault://";

/// Query parameter naming the key inside a vault secret
pub const VAULT_SECRET_KEY_PARAM: &str = "secret";

// ============================================================================
// MODULE LAYOUT
// ============================================================================

/// Module manifest table holding named secret references
pub const SECRETS_SECTION: &str = "secrets";
