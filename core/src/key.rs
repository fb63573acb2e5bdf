//! Registry key for components.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a component: the owning transaction's name and the
/// component's own name, kept as two separate fields.
///
/// `("ab", "c")` and `("a", "bc")` are different keys.
///
/// ```
/// use apm_bridge_core::key::ComponentKey;
///
/// assert_ne!(ComponentKey::new("ab", "c"), ComponentKey::new("a", "bc"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentKey {
    transaction: String,
    component: String,
}

impl ComponentKey {
    /// Create a key from a transaction name and a component name
    #[must_use]
    pub fn new(transaction: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            transaction: transaction.into(),
            component: component.into(),
        }
    }

    /// Name of the owning transaction
    #[must_use]
    pub fn transaction(&self) -> &str {
        &self.transaction
    }

    /// Name of the component
    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.transaction, self.component)
    }
}
