use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = talents_common::id::prefixed_ulid("conn");
/// assert!(id.starts_with("conn_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Well-known ID prefixes.
pub mod prefix {
    /// Relay connection, assigned at WebSocket upgrade time.
    pub const CONNECTION: &str = "conn";
    /// User account (issued by the REST API).
    pub const USER: &str = "usr";
    /// Tutoring session document (issued by the REST API); doubles as the
    /// chat room namespace.
    pub const SESSION: &str = "ses";
}
