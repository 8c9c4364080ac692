//! Authenticated identity: the per-request user built from token claims (and,
//! optionally, the userinfo endpoint).

use serde::{Deserialize, Serialize};

/// Profile claims shared by access tokens and the userinfo response.
///
/// Empty strings are treated the same as absent claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl Profile {
    pub fn sub(&self) -> Option<&str> {
        present(&self.sub)
    }

    pub fn email(&self) -> Option<&str> {
        present(&self.email)
    }

    /// Name taken from the profile itself: `name`, then `given_name family_name`
    /// (either alone when only one is set), then `nickname`.
    pub fn explicit_name(&self) -> Option<String> {
        if let Some(name) = present(&self.name) {
            return Some(name.to_string());
        }
        match (present(&self.given_name), present(&self.family_name)) {
            (Some(given), Some(family)) => return Some(format!("{given} {family}")),
            (Some(only), None) | (None, Some(only)) => return Some(only.to_string()),
            (None, None) => {}
        }
        present(&self.nickname).map(str::to_string)
    }
}

/// Display name priority: explicit name, then email, then subject.
pub fn resolve_display_name(profile: &Profile) -> String {
    profile
        .explicit_name()
        .or_else(|| profile.email().map(str::to_string))
        .or_else(|| profile.sub().map(str::to_string))
        .unwrap_or_default()
}

/// The caller of the current request, as established by bearer verification.
///
/// Lives in the request extensions for the lifetime of the request only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub name: String,
    /// Whether `name` came from a name claim rather than the email/sub fallback.
    #[serde(skip)]
    pub(crate) has_explicit_name: bool,
}

impl AuthenticatedUser {
    /// `sub` must already have been checked to be present.
    pub fn from_profile(sub: &str, profile: &Profile) -> Self {
        Self {
            sub: sub.to_string(),
            email: profile.email().map(str::to_string),
            name: resolve_display_name(profile),
            has_explicit_name: profile.explicit_name().is_some(),
        }
    }

    pub fn needs_enrichment(&self) -> bool {
        !self.has_explicit_name || self.email.is_none()
    }

    /// Fill gaps from a userinfo profile; non-empty userinfo values win.
    pub fn merge(&mut self, info: &Profile) {
        if let Some(email) = info.email() {
            self.email = Some(email.to_string());
        }
        if let Some(name) = info.explicit_name() {
            self.name = name;
            self.has_explicit_name = true;
        } else if !self.has_explicit_name {
            self.name = self
                .email
                .clone()
                .unwrap_or_else(|| self.sub.clone());
        }
    }
}
