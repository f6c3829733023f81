//! User-Agent string shared by outbound HTTP traffic.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/mixtape";

/// Default User-Agent for media requests (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("mixtape/{version} (+{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_names_tool_and_version() {
        let ua = default_user_agent();
        assert!(ua.starts_with("mixtape/"));
        assert!(ua.contains(env!("CARGO_PKG_VERSION")));
        assert!(ua.contains(PROJECT_UA_URL));
    }
}
