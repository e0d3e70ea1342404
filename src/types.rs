use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

/// One activity feed item.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    pub actor: Option<UserRef>,
    pub repo: Option<RepoRef>,
    pub created_at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn actor_login(&self) -> &str {
        self.actor.as_ref().map(|a| a.login.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserRef {
    #[serde(default)]
    pub login: String,
}

/// Repository reference as carried by an event. A missing `name` usually
/// means the repository has since been deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RepoRef {
    pub name: Option<String>,
}

/// Full repository object embedded in fork and team payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RepoSummary {
    pub full_name: Option<String>,
}

impl From<&RepoSummary> for RepoRef {
    fn from(repo: &RepoSummary) -> Self {
        RepoRef {
            name: repo.full_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    CommitComment(CommitCommentPayload),
    Create(CreatePayload),
    Delete(DeletePayload),
    Download,
    Follow(FollowPayload),
    Fork(ForkPayload),
    ForkApply(ForkApplyPayload),
    Gist(GistPayload),
    Gollum,
    IssueComment(IssueCommentPayload),
    Issues(IssuesPayload),
    Member(MemberPayload),
    Public,
    PullRequest(PullRequestPayload),
    PullRequestReviewComment(PullRequestReviewCommentPayload),
    Push(PushPayload),
    TeamAdd(TeamAddPayload),
    Watch(WatchPayload),
    /// Event type this client does not know about
    Unknown { kind: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Comment {
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommitComment {
    #[serde(default)]
    pub commit_id: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommitCommentPayload {
    #[serde(default)]
    pub comment: CommitComment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CreatePayload {
    #[serde(default)]
    pub ref_type: String,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeletePayload {
    #[serde(default)]
    pub ref_type: String,
    #[serde(rename = "ref", default)]
    pub git_ref: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FollowPayload {
    pub target: Option<UserRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ForkPayload {
    #[serde(default)]
    pub forkee: RepoSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ForkApplyPayload {
    #[serde(default)]
    pub head: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Gist {
    #[serde(default)]
    pub id: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GistPayload {
    #[serde(default)]
    pub action: String,
    pub gist: Option<Gist>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PullRequestLink {
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IssueRef {
    #[serde(default)]
    pub number: u64,
    pub title: Option<String>,
    pub pull_request: Option<PullRequestLink>,
}

impl IssueRef {
    /// Issues that back a pull request carry a link to it.
    pub fn is_pull_request(&self) -> bool {
        self.pull_request
            .as_ref()
            .and_then(|pr| pr.html_url.as_deref())
            .is_some_and(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IssueCommentPayload {
    #[serde(default)]
    pub issue: IssueRef,
    #[serde(default)]
    pub comment: Comment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IssuesPayload {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub issue: IssueRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MemberPayload {
    #[serde(default)]
    pub action: String,
    pub member: Option<UserRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PullRequestRef {
    #[serde(default)]
    pub number: u64,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PullRequestPayload {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub pull_request: PullRequestRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PullRequestReviewCommentPayload {
    #[serde(default)]
    pub comment: Comment,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PushCommit {
    #[serde(default)]
    pub sha: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Team {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TeamAddPayload {
    pub team: Option<Team>,
    pub user: Option<UserRef>,
    pub repo: Option<RepoSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WatchPayload {
    #[serde(default)]
    pub action: String,
}

/// Event as returned by the REST `events` endpoints, before the payload is
/// matched against its `type`.
#[derive(Debug, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub actor: Option<UserRef>,
    pub repo: Option<RepoRef>,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<RawEvent> for Event {
    fn from(raw: RawEvent) -> Self {
        let payload = match decode_payload(&raw.kind, raw.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(id = %raw.id, kind = %raw.kind, error = %e, "undecodable event payload");
                EventPayload::Unknown { kind: raw.kind }
            }
        };

        Event {
            id: raw.id,
            actor: raw.actor,
            repo: raw.repo,
            created_at: raw.created_at.unwrap_or_else(Utc::now),
            payload,
        }
    }
}

fn decode_payload(
    kind: &str,
    payload: serde_json::Value,
) -> std::result::Result<EventPayload, serde_json::Error> {
    use serde_json::from_value;

    let payload = match kind {
        "CommitCommentEvent" => EventPayload::CommitComment(from_value(payload)?),
        "CreateEvent" => EventPayload::Create(from_value(payload)?),
        "DeleteEvent" => EventPayload::Delete(from_value(payload)?),
        "DownloadEvent" => EventPayload::Download,
        "FollowEvent" => EventPayload::Follow(from_value(payload)?),
        "ForkEvent" => EventPayload::Fork(from_value(payload)?),
        "ForkApplyEvent" => EventPayload::ForkApply(from_value(payload)?),
        "GistEvent" => EventPayload::Gist(from_value(payload)?),
        "GollumEvent" => EventPayload::Gollum,
        "IssueCommentEvent" => EventPayload::IssueComment(from_value(payload)?),
        "IssuesEvent" => EventPayload::Issues(from_value(payload)?),
        "MemberEvent" => EventPayload::Member(from_value(payload)?),
        "PublicEvent" => EventPayload::Public,
        "PullRequestEvent" => EventPayload::PullRequest(from_value(payload)?),
        "PullRequestReviewCommentEvent" => {
            EventPayload::PullRequestReviewComment(from_value(payload)?)
        }
        "PushEvent" => EventPayload::Push(from_value(payload)?),
        "TeamAddEvent" => EventPayload::TeamAdd(from_value(payload)?),
        "WatchEvent" => EventPayload::Watch(from_value(payload)?),
        other => EventPayload::Unknown {
            kind: other.to_string(),
        },
    };

    Ok(payload)
}
