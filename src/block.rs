use crate::repo_id::RepositoryIdentifier;

/// Logical navigation request bound to an anchor or an event row.
///
/// Resolving a target to a screen or URL is left to a [`crate::navigate::Navigator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavTarget {
    UserProfile {
        username: String,
    },
    Repository {
        owner: String,
        name: String,
    },
    Branches {
        owner: String,
        name: String,
    },
    Tags {
        owner: String,
        name: String,
    },
    Issue {
        owner: String,
        name: String,
        number: u64,
    },
    PullRequest {
        owner: String,
        name: String,
        number: u64,
    },
    PullRequests {
        owner: String,
        name: String,
    },
    Changeset {
        owner: String,
        name: String,
        sha: String,
    },
    Gist {
        id: String,
    },
    Noop,
}

impl NavTarget {
    pub fn user(login: &str) -> Self {
        if login.is_empty() {
            NavTarget::Noop
        } else {
            NavTarget::UserProfile {
                username: login.to_string(),
            }
        }
    }

    pub fn repository(repo: &RepositoryIdentifier) -> Option<Self> {
        let (owner, name) = repo.owner_and_name()?;
        Some(NavTarget::Repository {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn branches(repo: &RepositoryIdentifier) -> Option<Self> {
        let (owner, name) = repo.owner_and_name()?;
        Some(NavTarget::Branches {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn tags(repo: &RepositoryIdentifier) -> Option<Self> {
        let (owner, name) = repo.owner_and_name()?;
        Some(NavTarget::Tags {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn issue(repo: &RepositoryIdentifier, number: u64) -> Option<Self> {
        let (owner, name) = repo.owner_and_name()?;
        Some(NavTarget::Issue {
            owner: owner.to_string(),
            name: name.to_string(),
            number,
        })
    }

    pub fn pull_request(repo: &RepositoryIdentifier, number: u64) -> Option<Self> {
        let (owner, name) = repo.owner_and_name()?;
        Some(NavTarget::PullRequest {
            owner: owner.to_string(),
            name: name.to_string(),
            number,
        })
    }

    pub fn pull_requests(repo: &RepositoryIdentifier) -> Option<Self> {
        let (owner, name) = repo.owner_and_name()?;
        Some(NavTarget::PullRequests {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn changeset(repo: &RepositoryIdentifier, sha: &str) -> Option<Self> {
        let (owner, name) = repo.owner_and_name()?;
        Some(NavTarget::Changeset {
            owner: owner.to_string(),
            name: name.to_string(),
            sha: sha.to_string(),
        })
    }

    pub fn gist(id: &str) -> Self {
        NavTarget::Gist { id: id.to_string() }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, NavTarget::Noop)
    }
}

/// A unit of rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Anchor { text: String, target: NavTarget },
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text(text.into())
    }

    pub fn anchor(text: impl Into<String>, target: NavTarget) -> Self {
        Segment::Anchor {
            text: text.into(),
            target,
        }
    }

    /// Anchor whose target could not be built collapses to a no-op anchor.
    pub fn anchor_or_noop(text: impl Into<String>, target: Option<NavTarget>) -> Self {
        Segment::anchor(text, target.unwrap_or(NavTarget::Noop))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Segment::Text(text) | Segment::Anchor { text, .. } => text,
        }
    }

    pub fn target(&self) -> Option<&NavTarget> {
        match self {
            Segment::Text(_) => None,
            Segment::Anchor { target, .. } => Some(target),
        }
    }
}

/// Header and body segments derived from one event, plus the target opened
/// when the row itself is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedEvent {
    pub header: Vec<Segment>,
    pub body: Vec<Segment>,
    pub primary: Option<NavTarget>,
}

impl RenderedEvent {
    pub fn header_text(&self) -> String {
        self.header.iter().map(Segment::as_str).collect()
    }

    pub fn body_text(&self) -> String {
        self.body.iter().map(Segment::as_str).collect()
    }

    /// Inline anchors in display order, header first.
    pub fn anchors(&self) -> impl Iterator<Item = (&str, &NavTarget)> {
        self.header
            .iter()
            .chain(self.body.iter())
            .filter_map(|segment| segment.target().map(|target| (segment.as_str(), target)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_repository_has_no_target() {
        let repo = RepositoryIdentifier::parse("lonely");
        assert_eq!(NavTarget::repository(&repo), None);
        assert_eq!(NavTarget::issue(&repo, 1), None);
        assert_eq!(NavTarget::changeset(&repo, "abc"), None);
    }

    #[test]
    fn empty_login_is_noop() {
        assert!(NavTarget::user("").is_noop());
        assert_eq!(
            NavTarget::user("alice"),
            NavTarget::UserProfile {
                username: "alice".to_string()
            }
        );
    }

    #[test]
    fn anchor_or_noop_falls_back() {
        let segment = Segment::anchor_or_noop("#1", None);
        assert_eq!(segment.target(), Some(&NavTarget::Noop));
        assert_eq!(segment.as_str(), "#1");
    }

    #[test]
    fn text_segments_have_no_target() {
        assert_eq!(Segment::text("plain").target(), None);
    }

    #[test]
    fn rendered_text_concatenates_segments() {
        let repo = RepositoryIdentifier::parse("bob/repo");
        let rendered = RenderedEvent {
            header: vec![
                Segment::anchor("alice", NavTarget::user("alice")),
                Segment::text(" starred "),
                Segment::anchor_or_noop("bob/repo", NavTarget::repository(&repo)),
            ],
            body: vec![Segment::text("body")],
            primary: None,
        };
        assert_eq!(rendered.header_text(), "alice starred bob/repo");
        assert_eq!(rendered.body_text(), "body");
        assert_eq!(rendered.anchors().count(), 2);
    }
}
