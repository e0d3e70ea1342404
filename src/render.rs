use crate::block::{NavTarget, RenderedEvent, Segment};
use crate::feed::FeedEntry;
use crate::repo_id::RepositoryIdentifier;
use crate::types::{
    CommitCommentPayload, CreatePayload, DeletePayload, Event, EventPayload, FollowPayload,
    ForkApplyPayload, ForkPayload, GistPayload, IssueCommentPayload, IssuesPayload, MemberPayload,
    PullRequestPayload, PullRequestReviewCommentPayload, PushPayload, RepoRef, TeamAddPayload,
    WatchPayload,
};

const COMMIT_COMMENT_SHA_WIDTH: usize = 10;
const PUSH_SHA_WIDTH: usize = 6;

/// Read-only inputs shared by every render call.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Name the repository in headers. Off for feeds scoped to one repository.
    pub report_repository: bool,
    /// Login of the viewing account, for the self-owned repository shorthand.
    pub account: Option<String>,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            report_repository: true,
            account: None,
        }
    }
}

/// Render one event. Returns `None` for events that are deliberately not
/// shown (downloads, wiki edits, team additions without a subject).
pub fn render(event: &Event, ctx: &RenderContext) -> Option<RenderedEvent> {
    let renderer = Renderer::new(event, ctx);

    match &event.payload {
        EventPayload::CommitComment(p) => Some(renderer.commit_comment(p)),
        EventPayload::Create(p) => Some(renderer.create(p)),
        EventPayload::Delete(p) => renderer.delete(p),
        EventPayload::Download | EventPayload::Gollum => None,
        EventPayload::Follow(p) => Some(renderer.follow(p)),
        EventPayload::Fork(p) => Some(renderer.fork(p)),
        EventPayload::ForkApply(p) => Some(renderer.fork_apply(p)),
        EventPayload::Gist(p) => Some(renderer.gist(p)),
        EventPayload::IssueComment(p) => Some(renderer.issue_comment(p)),
        EventPayload::Issues(p) => Some(renderer.issues(p)),
        EventPayload::Member(p) => Some(renderer.member(p)),
        EventPayload::Public => Some(renderer.public()),
        EventPayload::PullRequest(p) => Some(renderer.pull_request(p)),
        EventPayload::PullRequestReviewComment(p) => Some(renderer.review_comment(p)),
        EventPayload::Push(p) => Some(renderer.push(p)),
        EventPayload::TeamAdd(p) => renderer.team_add(p),
        EventPayload::Watch(p) => Some(renderer.watch(p)),
        EventPayload::Unknown { .. } => Some(renderer.actor_only()),
    }
}

/// Render a page in order, dropping events that render to nothing.
pub fn render_page(events: Vec<Event>, ctx: &RenderContext) -> Vec<FeedEntry> {
    events
        .into_iter()
        .filter_map(|event| {
            let rendered = render(&event, ctx)?;
            Some(FeedEntry { event, rendered })
        })
        .collect()
}

struct Renderer<'a> {
    event: &'a Event,
    ctx: &'a RenderContext,
    repo_id: RepositoryIdentifier,
}

impl<'a> Renderer<'a> {
    fn new(event: &'a Event, ctx: &'a RenderContext) -> Self {
        let repo_id = event
            .repo
            .as_ref()
            .and_then(|r| r.name.as_deref())
            .map(RepositoryIdentifier::parse)
            .unwrap_or_default();

        Self {
            event,
            ctx,
            repo_id,
        }
    }

    fn actor(&self) -> Segment {
        let login = self.event.actor_login();
        Segment::anchor(login, NavTarget::user(login))
    }

    /// Header starting with the actor, followed by `rest`.
    fn header(&self, rest: impl IntoIterator<Item = Segment>) -> Vec<Segment> {
        std::iter::once(self.actor()).chain(rest).collect()
    }

    fn repository(&self, repo: Option<&RepoRef>) -> Segment {
        let Some(repo) = repo else {
            return Segment::text("Unknown Repository");
        };
        let Some(full_name) = repo.name.as_deref() else {
            return Segment::text("<Deleted Repository>");
        };

        let id = RepositoryIdentifier::parse(full_name);
        let (Some(_), Some(name)) = (id.owner.as_deref(), id.name.as_deref()) else {
            return Segment::text(full_name);
        };

        // An empty owner or name still anchors, with a no-op target.
        let self_owned = self
            .ctx
            .account
            .as_deref()
            .is_some_and(|account| id.is_owned_by(account));
        let text = if self_owned { name } else { full_name };

        Segment::anchor_or_noop(text, NavTarget::repository(&id))
    }

    fn event_repository(&self) -> Segment {
        self.repository(self.event.repo.as_ref())
    }

    /// `"{lead}{repo}"` when repositories are reported, nothing otherwise.
    fn repository_clause(&self, lead: &str) -> Vec<Segment> {
        if self.ctx.report_repository {
            vec![Segment::text(lead), self.event_repository()]
        } else {
            Vec::new()
        }
    }

    fn actor_only(&self) -> RenderedEvent {
        RenderedEvent {
            header: self.header(std::iter::empty()),
            ..RenderedEvent::default()
        }
    }

    fn commit_comment(&self, p: &CommitCommentPayload) -> RenderedEvent {
        let commit_id = p.comment.commit_id.as_str();
        let target = NavTarget::changeset(&self.repo_id, commit_id);

        let mut rest = vec![
            Segment::text(" commented on commit "),
            Segment::anchor_or_noop(
                short_sha(commit_id, COMMIT_COMMENT_SHA_WIDTH),
                target.clone(),
            ),
        ];
        rest.extend(self.repository_clause(" in "));

        RenderedEvent {
            header: self.header(rest),
            body: vec![Segment::text(p.comment.body.clone().unwrap_or_default())],
            primary: target,
        }
    }

    fn create(&self, p: &CreatePayload) -> RenderedEvent {
        let git_ref = p.git_ref.as_deref().unwrap_or("");

        match p.ref_type.as_str() {
            "repository" if self.ctx.report_repository => RenderedEvent {
                header: self.header([
                    Segment::text(" created repository "),
                    self.event_repository(),
                ]),
                body: Vec::new(),
                primary: NavTarget::repository(&self.repo_id),
            },
            "repository" => RenderedEvent {
                header: self.header([Segment::text(" created this repository")]),
                ..RenderedEvent::default()
            },
            "branch" => {
                let target = NavTarget::branches(&self.repo_id);
                self.ref_event(" created branch ", git_ref, target)
            }
            "tag" => {
                let target = NavTarget::tags(&self.repo_id);
                self.ref_event(" created tag ", git_ref, target)
            }
            _ => self.actor_only(),
        }
    }

    fn delete(&self, p: &DeletePayload) -> Option<RenderedEvent> {
        match p.ref_type.as_str() {
            "branch" => {
                let target = NavTarget::branches(&self.repo_id);
                Some(self.ref_event(" deleted branch ", &p.git_ref, target))
            }
            "tag" => {
                let target = NavTarget::tags(&self.repo_id);
                Some(self.ref_event(" deleted tag ", &p.git_ref, target))
            }
            _ => None,
        }
    }

    fn ref_event(&self, verb: &str, git_ref: &str, target: Option<NavTarget>) -> RenderedEvent {
        let mut rest = vec![
            Segment::text(verb),
            Segment::anchor_or_noop(git_ref, target.clone()),
        ];
        rest.extend(self.repository_clause(" in "));

        RenderedEvent {
            header: self.header(rest),
            body: Vec::new(),
            primary: target,
        }
    }

    fn follow(&self, p: &FollowPayload) -> RenderedEvent {
        let login = p.target.as_ref().map(|t| t.login.as_str()).unwrap_or("");
        let target = NavTarget::user(login);

        RenderedEvent {
            header: self.header([
                Segment::text(" started following "),
                Segment::anchor(login, target.clone()),
            ]),
            body: Vec::new(),
            primary: Some(target).filter(|t| !t.is_noop()),
        }
    }

    fn fork(&self, p: &ForkPayload) -> RenderedEvent {
        let forked = RepoRef::from(&p.forkee);
        let forked_id = forked
            .name
            .as_deref()
            .map(RepositoryIdentifier::parse)
            .unwrap_or_default();

        RenderedEvent {
            header: self.header([
                Segment::text(" forked "),
                self.event_repository(),
                Segment::text(" to "),
                self.repository(Some(&forked)),
            ]),
            body: Vec::new(),
            primary: NavTarget::repository(&forked_id),
        }
    }

    fn fork_apply(&self, p: &ForkApplyPayload) -> RenderedEvent {
        RenderedEvent {
            header: self.header([
                Segment::text(" applied fork to "),
                self.event_repository(),
                Segment::text(" on branch "),
                Segment::anchor_or_noop(&p.head, NavTarget::branches(&self.repo_id)),
            ]),
            body: Vec::new(),
            primary: NavTarget::repository(&self.repo_id),
        }
    }

    fn gist(&self, p: &GistPayload) -> RenderedEvent {
        let (id, description) = p
            .gist
            .as_ref()
            .map(|g| (g.id.as_str(), g.description.as_deref().unwrap_or("")))
            .unwrap_or(("", ""));
        let target = p.gist.as_ref().map(|_| NavTarget::gist(id));

        let mut rest = Vec::with_capacity(2);
        if p.action.eq_ignore_ascii_case("create") {
            rest.push(Segment::text(" created Gist #"));
        } else if p.action.eq_ignore_ascii_case("update") {
            rest.push(Segment::text(" updated Gist #"));
        }
        rest.push(Segment::anchor_or_noop(id, target.clone()));

        RenderedEvent {
            header: self.header(rest),
            body: vec![Segment::text(collapse_newlines(description))],
            primary: target,
        }
    }

    fn issue_comment(&self, p: &IssueCommentPayload) -> RenderedEvent {
        let number = p.issue.number;
        let target = NavTarget::issue(&self.repo_id, number);
        let verb = if p.issue.is_pull_request() {
            " commented on pull request "
        } else {
            " commented on issue "
        };

        RenderedEvent {
            header: self.header([
                Segment::text(verb),
                Segment::anchor_or_noop(format!("#{}", number), target.clone()),
                Segment::text(" in "),
                self.event_repository(),
            ]),
            body: vec![Segment::text(collapse_newlines(
                p.comment.body.as_deref().unwrap_or(""),
            ))],
            primary: target,
        }
    }

    fn issues(&self, p: &IssuesPayload) -> RenderedEvent {
        let number = p.issue.number;
        let target = NavTarget::issue(&self.repo_id, number);
        let action = p.action.to_lowercase();
        let verb = match action.as_str() {
            "opened" => Some(" opened issue "),
            "closed" => Some(" closed issue "),
            "reopened" => Some(" reopened issue "),
            _ => None,
        };

        let mut rest: Vec<Segment> = verb.map(Segment::text).into_iter().collect();
        rest.extend([
            Segment::anchor_or_noop(format!("#{}", number), target.clone()),
            Segment::text(" in "),
            self.event_repository(),
        ]);

        RenderedEvent {
            header: self.header(rest),
            body: vec![Segment::text(
                p.issue.title.as_deref().unwrap_or("").trim(),
            )],
            primary: target,
        }
    }

    fn member(&self, p: &MemberPayload) -> RenderedEvent {
        let mut rest = Vec::new();
        match p.action.as_str() {
            "added" => rest.push(Segment::text(" added as a collaborator")),
            "removed" => rest.push(Segment::text(" removed as a collaborator")),
            _ => {}
        }
        rest.extend(self.repository_clause(" to "));

        RenderedEvent {
            header: self.header(rest),
            body: Vec::new(),
            primary: NavTarget::repository(&self.repo_id),
        }
    }

    fn public(&self) -> RenderedEvent {
        let rest = if self.ctx.report_repository {
            vec![Segment::text(" has open sourced "), self.event_repository()]
        } else {
            vec![Segment::text(" has open sourced this repository!")]
        };

        RenderedEvent {
            header: self.header(rest),
            body: Vec::new(),
            primary: NavTarget::repository(&self.repo_id),
        }
    }

    fn pull_request(&self, p: &PullRequestPayload) -> RenderedEvent {
        let target = NavTarget::pull_request(&self.repo_id, p.number);
        let verb = match p.action.as_str() {
            "closed" => Some(" closed pull request "),
            "opened" => Some(" opened pull request "),
            "synchronize" => Some(" synchronized pull request "),
            "reopened" => Some(" reopened pull request "),
            _ => None,
        };

        let mut rest: Vec<Segment> = verb.map(Segment::text).into_iter().collect();
        rest.extend([
            Segment::anchor_or_noop(format!("#{}", p.pull_request.number), target.clone()),
            Segment::text(" in "),
            self.event_repository(),
        ]);

        RenderedEvent {
            header: self.header(rest),
            body: vec![Segment::text(
                p.pull_request.title.clone().unwrap_or_default(),
            )],
            primary: target,
        }
    }

    fn review_comment(&self, p: &PullRequestReviewCommentPayload) -> RenderedEvent {
        let mut rest = vec![Segment::text(" commented on pull request")];
        rest.extend(self.repository_clause(" in "));

        RenderedEvent {
            header: self.header(rest),
            body: vec![Segment::text(collapse_newlines(
                p.comment.body.as_deref().unwrap_or(""),
            ))],
            primary: NavTarget::pull_requests(&self.repo_id),
        }
    }

    fn push(&self, p: &PushPayload) -> RenderedEvent {
        let mut rest = vec![Segment::text(" pushed to ")];
        if let Some(git_ref) = p.git_ref.as_deref().filter(|r| !r.is_empty()) {
            rest.push(Segment::anchor_or_noop(
                branch_from_ref(git_ref),
                NavTarget::branches(&self.repo_id),
            ));
        }
        rest.extend(self.repository_clause(" at "));

        let body = p
            .commits
            .iter()
            .flat_map(|commit| {
                let summary = first_line(commit.message.as_deref().unwrap_or(""));
                [
                    Segment::anchor_or_noop(
                        short_sha(&commit.sha, PUSH_SHA_WIDTH),
                        NavTarget::changeset(&self.repo_id, &commit.sha),
                    ),
                    Segment::text(format!(" - {}\n", summary)),
                ]
            })
            .collect();

        let primary = self
            .event
            .repo
            .as_ref()
            .and(p.commits.first())
            .and_then(|commit| NavTarget::changeset(&self.repo_id, &commit.sha));

        RenderedEvent {
            header: self.header(rest),
            body,
            primary,
        }
    }

    fn team_add(&self, p: &TeamAddPayload) -> Option<RenderedEvent> {
        let subject = if let Some(user) = &p.user {
            Segment::anchor(&user.login, NavTarget::user(&user.login))
        } else if let Some(repo) = &p.repo {
            self.repository(Some(&RepoRef::from(repo)))
        } else {
            return None;
        };

        let mut rest = vec![Segment::text(" added "), subject];
        if let Some(team) = &p.team {
            rest.push(Segment::text(" to team "));
            rest.push(Segment::anchor(&team.name, NavTarget::Noop));
        }

        Some(RenderedEvent {
            header: self.header(rest),
            ..RenderedEvent::default()
        })
    }

    fn watch(&self, p: &WatchPayload) -> RenderedEvent {
        let verb = if p.action == "started" {
            " started watching "
        } else {
            " stopped watching "
        };

        RenderedEvent {
            header: self.header([Segment::text(verb), self.event_repository()]),
            body: Vec::new(),
            primary: NavTarget::repository(&self.repo_id),
        }
    }
}

/// Prefix of at most `width` characters.
fn short_sha(sha: &str, width: usize) -> &str {
    match sha.char_indices().nth(width) {
        Some((end, _)) => &sha[..end],
        None => sha,
    }
}

/// Segment after the last `/`, e.g. `refs/heads/main` -> `main`.
fn branch_from_ref(git_ref: &str) -> &str {
    match git_ref.rfind('/') {
        Some(idx) => &git_ref[idx + 1..],
        None => git_ref,
    }
}

fn first_line(message: &str) -> &str {
    message
        .split('\n')
        .next()
        .unwrap_or("")
        .trim_end_matches('\r')
}

fn collapse_newlines(text: &str) -> String {
    text.replace('\n', " ").replace('\r', "").trim().to_string()
}
