use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::SourceId;

/// What a caller is allowed to do across the control surface and the media
/// transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Broadcast operator
    /// - Full control surface: create, update, and stop broadcasts
    /// - Can subscribe to any feed
    Operator,

    /// Contribution feed
    /// - Publishes exactly its own named source, nothing else
    /// - Cannot touch the control surface
    Source,

    /// Audience member
    /// - Subscribes to the composite program feed
    /// - Cannot publish or control anything
    Viewer,
}

impl Role {
    #[must_use]
    pub const fn is_operator(&self) -> bool {
        matches!(self, Self::Operator)
    }

    /// Whether this role may publish media at all.
    #[must_use]
    pub const fn can_publish(&self) -> bool {
        matches!(self, Self::Operator | Self::Source)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Operator => "operator",
            Self::Source => "source",
            Self::Viewer => "viewer",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "operator" => Ok(Self::Operator),
            "source" => Ok(Self::Source),
            "viewer" => Ok(Self::Viewer),
            _ => Err(format!("Unknown role: {s}")),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub role: Role,

    /// For [`Role::Source`] accounts: the one source this account publishes.
    /// Operators and viewers leave this unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_source: Option<SourceId>,
}

impl Identity {
    pub fn operator(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: Role::Operator,
            home_source: None,
        }
    }

    pub fn source(name: impl Into<String>, home_source: impl Into<SourceId>) -> Self {
        Self {
            name: name.into(),
            role: Role::Source,
            home_source: Some(home_source.into()),
        }
    }

    pub fn viewer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: Role::Viewer,
            home_source: None,
        }
    }

    /// The source this identity may publish under, if any.
    ///
    /// Operators may publish anywhere (they run the compositor's program
    /// feed), sources only their own feed, viewers nowhere.
    pub fn publishable_source(&self, requested: &SourceId) -> Option<SourceId> {
        match self.role {
            Role::Operator => Some(requested.clone()),
            Role::Source => self
                .home_source
                .as_ref()
                .filter(|home| *home == requested)
                .cloned(),
            Role::Viewer => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_roundtrip() {
        for role in [Role::Operator, Role::Source, Role::Viewer] {
            assert_eq!(role.as_str().parse::<Role>().ok(), Some(role));
        }
        assert!("producer".parse::<Role>().is_err());
    }

    #[test]
    fn test_source_publishes_only_home() {
        let identity = Identity::source("gate-cam", "gate-north");
        assert_eq!(
            identity.publishable_source(&SourceId::from("gate-north")),
            Some(SourceId::from("gate-north"))
        );
        assert_eq!(identity.publishable_source(&SourceId::from("plaza")), None);
    }

    #[test]
    fn test_viewer_never_publishes() {
        let identity = Identity::viewer("audience");
        assert_eq!(identity.publishable_source(&SourceId::from("plaza")), None);
        assert!(!identity.role.can_publish());
    }
}
