/// HTTP middleware
///
/// - `security`: OWASP-recommended response headers

pub mod security;
