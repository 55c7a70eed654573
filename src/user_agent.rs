//! Default User-Agent string.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/wurl";

/// Default User-Agent for transfer requests (identifies the tool and version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("wurl/{version} (+{PROJECT_UA_URL})")
}
