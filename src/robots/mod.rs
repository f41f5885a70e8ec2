//! Robots.txt handling module
//!
//! robots.txt is fetched once at the start of a run. `Disallow` rules filter
//! listing and detail URLs; a `Crawl-delay` raises the request spacing. A
//! missing or unreachable robots.txt allows everything.

use crate::crawler::Fetcher;
use robotstxt::DefaultMatcher;
use std::time::Duration;
use url::Url;

/// Longest request spacing a robots.txt `Crawl-delay` can impose
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60);

/// robots.txt rules as they apply to one user agent
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Product token matched against `User-agent` lines
    user_agent: String,
}

impl RobotsPolicy {
    /// Creates a policy from raw robots.txt content
    pub fn from_content(content: &str, user_agent: &str) -> Self {
        Self {
            content: content.to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    /// Creates a permissive policy that allows everything
    pub fn allow_all(user_agent: &str) -> Self {
        Self::from_content("", user_agent)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Checks if an absolute URL may be fetched
    pub fn is_allowed(&self, url: &str) -> bool {
        if self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, &self.user_agent, url)
    }

    /// Gets the crawl delay that applies to this user agent
    ///
    /// A group naming the agent wins over the `*` group. Values above
    /// `MAX_CRAWL_DELAY` are capped.
    pub fn crawl_delay(&self) -> Option<Duration> {
        if self.content.is_empty() {
            return None;
        }

        let agent = self.user_agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut group_open = false;
        let mut wildcard_delay = None;
        let mut agent_delay = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group
                    if !group_open {
                        group.clear();
                        group_open = true;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    group_open = false;
                    let Ok(seconds) = value.parse::<f64>() else {
                        continue;
                    };
                    if seconds < 0.0 || !seconds.is_finite() {
                        continue;
                    }
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        agent_delay = Some(seconds);
                    } else if group.iter().any(|ua| ua == "*") {
                        wildcard_delay = Some(seconds);
                    }
                }
                _ => group_open = false,
            }
        }

        let seconds = agent_delay.or(wildcard_delay)?;
        if seconds > MAX_CRAWL_DELAY.as_secs_f64() {
            tracing::warn!(
                "Crawl-delay of {}s capped at {}s",
                seconds,
                MAX_CRAWL_DELAY.as_secs()
            );
            return Some(MAX_CRAWL_DELAY);
        }

        match Duration::try_from_secs_f64(seconds) {
            Ok(delay) => Some(delay),
            Err(e) => {
                tracing::warn!("Ignoring Crawl-delay {}: {}", seconds, e);
                None
            }
        }
    }
}

/// Fetches robots.txt for the catalog host
///
/// Any transport failure (including 404) yields an allow-all policy.
pub async fn fetch_robots<F: Fetcher>(fetcher: &F, base_url: &Url, user_agent: &str) -> RobotsPolicy {
    let robots_url = match base_url.join("/robots.txt") {
        Ok(url) => url,
        Err(_) => return RobotsPolicy::allow_all(user_agent),
    };

    match fetcher.fetch(robots_url.as_str()).await {
        Ok(content) => {
            tracing::debug!("Loaded robots.txt from {}", robots_url);
            RobotsPolicy::from_content(&content, user_agent)
        }
        Err(failure) => {
            tracing::info!("No usable robots.txt ({}), allowing all", failure);
            RobotsPolicy::allow_all(user_agent)
        }
    }
}
