use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// A named capability, e.g. `"listings.write"` or `"sales.transition"`.
///
/// Permissions stay opaque strings here; which permissions exist and which
/// roles carry them is the API policy layer's business. The `"*"` wildcard
/// lets that layer say "everything" (the admin role) without enumerating the
/// marketplace surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
