//! Shared User-Agent string for catalog and download HTTP clients.
//!
//! Single source for the UA format so catalog and download traffic stay
//! consistent and easy to update.

/// Tool description appended to the User-Agent product token.
const UA_COMMENT: &str = "catalog-harvester";

/// Default User-Agent for every outbound request (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("harvester/{version} ({UA_COMMENT})")
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_crate_version() {
        let ua = default_user_agent();
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("harvester/")
                .and_then(|s| s.split(' ').next())
                .expect("UA has version"),
        );
    }

    #[test]
    fn test_user_agent_identifies_tool() {
        assert!(default_user_agent().contains(UA_COMMENT));
    }
}
