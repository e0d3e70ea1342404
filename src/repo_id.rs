use std::fmt;

/// Owner and name parsed from a combined `"owner/name"` string.
///
/// Both parts are only present when the input contained a `/`. Without one,
/// the whole input lands in `name` and the owner stays unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryIdentifier {
    pub owner: Option<String>,
    pub name: Option<String>,
}

impl RepositoryIdentifier {
    pub fn parse(full_name: &str) -> Self {
        match full_name.split_once('/') {
            Some((owner, name)) => Self {
                owner: Some(owner.to_string()),
                name: Some(name.to_string()),
            },
            None if full_name.is_empty() => Self::default(),
            None => Self {
                owner: None,
                name: Some(full_name.to_string()),
            },
        }
    }

    /// Both parts, if both are known and non-empty.
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        match (self.owner.as_deref(), self.name.as_deref()) {
            (Some(owner), Some(name)) if !owner.is_empty() && !name.is_empty() => {
                Some((owner, name))
            }
            _ => None,
        }
    }

    /// Case-insensitive owner comparison. An unknown owner never matches.
    pub fn is_owned_by(&self, login: &str) -> bool {
        match self.owner.as_deref() {
            Some(owner) if !owner.is_empty() => owner.to_lowercase() == login.to_lowercase(),
            _ => false,
        }
    }
}

impl fmt::Display for RepositoryIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.owner, &self.name) {
            (Some(owner), Some(name)) => write!(f, "{}/{}", owner, name),
            (None, Some(name)) => write!(f, "{}", name),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_and_name() {
        let id = RepositoryIdentifier::parse("bob/repo");
        assert_eq!(id.owner.as_deref(), Some("bob"));
        assert_eq!(id.name.as_deref(), Some("repo"));
        assert_eq!(id.owner_and_name(), Some(("bob", "repo")));
    }

    #[test]
    fn splits_on_first_slash_only() {
        let id = RepositoryIdentifier::parse("bob/repo/extra");
        assert_eq!(id.owner.as_deref(), Some("bob"));
        assert_eq!(id.name.as_deref(), Some("repo/extra"));
    }

    #[test]
    fn no_slash_keeps_whole_input_as_name() {
        let id = RepositoryIdentifier::parse("lonely");
        assert_eq!(id.owner, None);
        assert_eq!(id.name.as_deref(), Some("lonely"));
        assert_eq!(id.owner_and_name(), None);
        assert!(!id.is_owned_by("lonely"));
    }

    #[test]
    fn empty_input_yields_empty_identifier() {
        let id = RepositoryIdentifier::parse("");
        assert_eq!(id, RepositoryIdentifier::default());
        assert_eq!(id.to_string(), "");
    }

    #[test]
    fn empty_owner_is_incomplete() {
        let id = RepositoryIdentifier::parse("/repo");
        assert_eq!(id.owner_and_name(), None);
        assert!(!id.is_owned_by(""));
    }

    #[test]
    fn ownership_ignores_case() {
        let id = RepositoryIdentifier::parse("Bob/repo");
        assert!(id.is_owned_by("bob"));
        assert!(id.is_owned_by("BOB"));
        assert!(!id.is_owned_by("alice"));
    }

    #[test]
    fn display_round_trips_full_name() {
        assert_eq!(RepositoryIdentifier::parse("bob/repo").to_string(), "bob/repo");
        assert_eq!(RepositoryIdentifier::parse("lonely").to_string(), "lonely");
    }
}
