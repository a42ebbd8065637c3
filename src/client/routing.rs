//! Method → channel routing.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;

use crate::transport::Channel;

// ============================================================================
// RoutingTable
// ============================================================================

/// Chooses the transport a method travels on.
///
/// Methods starting with one of the browser prefixes go to the
/// browser-level channel; everything else goes to the page channel.
/// The default table routes only the `Target.` namespace to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    browser_prefixes: Vec<Cow<'static, str>>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            browser_prefixes: vec![Cow::Borrowed("Target.")],
        }
    }
}

impl RoutingTable {
    /// Creates a table with no browser-level prefixes.
    #[must_use]
    pub fn page_only() -> Self {
        Self {
            browser_prefixes: Vec::new(),
        }
    }

    /// Adds a browser-level prefix such as `"Browser."`.
    #[must_use]
    pub fn with_browser_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.browser_prefixes.push(prefix.into());
        self
    }

    /// Returns the channel for `method`.
    #[must_use]
    pub fn route(&self, method: &str) -> Channel {
        if self
            .browser_prefixes
            .iter()
            .any(|prefix| method.starts_with(prefix.as_ref()))
        {
            Channel::Browser
        } else {
            Channel::Page
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routes_target_to_browser() {
        let table = RoutingTable::default();
        assert_eq!(table.route("Target.attachToTarget"), Channel::Browser);
        assert_eq!(table.route("Target.getTargets"), Channel::Browser);
        assert_eq!(table.route("Page.navigate"), Channel::Page);
        assert_eq!(table.route("Runtime.evaluate"), Channel::Page);
    }

    #[test]
    fn test_prefix_match_is_exact_namespace() {
        let table = RoutingTable::default();
        assert_eq!(table.route("TargetX.foo"), Channel::Page);
        assert_eq!(table.route("Target"), Channel::Page);
    }

    #[test]
    fn test_custom_prefixes() {
        let table = RoutingTable::page_only().with_browser_prefix("Browser.");
        assert_eq!(table.route("Browser.getVersion"), Channel::Browser);
        assert_eq!(table.route("Target.attachToTarget"), Channel::Page);
    }
}
