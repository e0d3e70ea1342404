use tracing::debug;

use crate::block::NavTarget;
use crate::error::Result;

/// Carries out navigation requests produced by the renderer.
pub trait Navigator {
    fn navigate(&self, target: &NavTarget) -> Result<()>;
}

/// Opens targets as github.com pages in the default browser.
#[derive(Debug, Clone)]
pub struct WebNavigator {
    web_url: String,
}

impl WebNavigator {
    pub fn new(web_url: &str) -> Self {
        Self {
            web_url: web_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, target: &NavTarget) -> Option<String> {
        let base = &self.web_url;
        let url = match target {
            NavTarget::UserProfile { username } => format!("{}/{}", base, username),
            NavTarget::Repository { owner, name } => format!("{}/{}/{}", base, owner, name),
            NavTarget::Branches { owner, name } => format!("{}/{}/{}/branches", base, owner, name),
            NavTarget::Tags { owner, name } => format!("{}/{}/{}/tags", base, owner, name),
            NavTarget::Issue {
                owner,
                name,
                number,
            } => format!("{}/{}/{}/issues/{}", base, owner, name, number),
            NavTarget::PullRequest {
                owner,
                name,
                number,
            } => format!("{}/{}/{}/pull/{}", base, owner, name, number),
            NavTarget::PullRequests { owner, name } => {
                format!("{}/{}/{}/pulls", base, owner, name)
            }
            NavTarget::Changeset { owner, name, sha } => {
                format!("{}/{}/{}/commit/{}", base, owner, name, sha)
            }
            NavTarget::Gist { id } if base == "https://github.com" => {
                format!("https://gist.github.com/{}", id)
            }
            // GitHub Enterprise serves gists under the main host
            NavTarget::Gist { id } => format!("{}/gist/{}", base, id),
            NavTarget::Noop => return None,
        };
        Some(url)
    }
}

impl Navigator for WebNavigator {
    fn navigate(&self, target: &NavTarget) -> Result<()> {
        let Some(url) = self.url_for(target) else {
            return Ok(());
        };
        debug!(%url, "opening in browser");
        open::that(&url)?;
        Ok(())
    }
}
