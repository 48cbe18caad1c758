//! Robots.txt registry (C1): fetch, parse, cache per origin, answer
//! allow/deny queries (spec §4.1).
//!
//! The parser is ported from `extraction::crawlers::robots::RobotsTxt` and
//! extended two ways the teacher's version doesn't need: longest-prefix-match
//! tie-breaking between `Allow`/`Disallow` rules (the teacher always prefers
//! `Allow`), and a TTL cache with a per-origin single-flight fetch guard so
//! concurrent queries for the same origin share one in-flight request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::http::security::UrlGuard;

#[derive(Debug, Clone, Default)]
struct AgentRules {
    disallow: Vec<String>,
    allow: Vec<String>,
}

/// Parsed robots.txt rules for one origin.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: HashMap<String, AgentRules>,
    default_rules: AgentRules,
}

impl RuleSet {
    pub fn parse(content: &str) -> Self {
        let mut ruleset = Self::default();
        let mut current_agents: Vec<String> = Vec::new();
        let mut current_rules = AgentRules::default();

        let flush = |robots: &mut Self, agents: &[String], rules: &AgentRules| {
            for agent in agents {
                if agent == "*" {
                    robots.default_rules = rules.clone();
                } else {
                    robots.rules.insert(agent.clone(), rules.clone());
                }
            }
        };

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if !current_agents.is_empty() {
                        flush(&mut ruleset, &current_agents, &current_rules);
                        current_rules = AgentRules::default();
                        current_agents.clear();
                    }
                    current_agents.push(value.to_lowercase());
                }
                "disallow" => {
                    if !value.is_empty() {
                        current_rules.disallow.push(value.to_string());
                    }
                }
                "allow" => {
                    if !value.is_empty() {
                        current_rules.allow.push(value.to_string());
                    }
                }
                _ => {}
            }
        }
        flush(&mut ruleset, &current_agents, &current_rules);
        ruleset
    }

    /// `isAllowed` per spec §4.1: select the most specific matching
    /// user-agent group (exact match over `*`), then the longest matching
    /// path rule; ties between an `Allow` and a `Disallow` of equal length
    /// favor `Allow`.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let agent_lower = user_agent.to_lowercase();
        let rules = self
            .rules
            .get(&agent_lower)
            .or_else(|| self.rules.iter().find(|(k, _)| agent_lower.contains(k.as_str())).map(|(_, v)| v))
            .unwrap_or(&self.default_rules);

        let mut best_len = 0usize;
        let mut best_allow = true;

        for rule in &rules.disallow {
            if path.starts_with(rule.as_str()) && rule.len() >= best_len {
                best_len = rule.len();
                best_allow = false;
            }
        }
        for rule in &rules.allow {
            if path.starts_with(rule.as_str()) && rule.len() >= best_len {
                best_len = rule.len();
                best_allow = true;
            }
        }

        best_allow
    }
}

struct CachedRuleSet {
    ruleset: RuleSet,
    refresh_deadline: std::time::Instant,
}

/// Per-origin robots.txt cache with TTL expiry and single-flight refresh.
pub struct RobotsRegistry {
    client: reqwest::Client,
    guard: UrlGuard,
    ttl: Duration,
    fetch_timeout: Duration,
    entries: RwLock<HashMap<String, Arc<Mutex<Option<CachedRuleSet>>>>>,
}

impl RobotsRegistry {
    pub fn new(client: reqwest::Client, ttl: Duration, fetch_timeout: Duration) -> Self {
        RobotsRegistry {
            client,
            guard: UrlGuard::new(),
            ttl,
            fetch_timeout,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn origin_of(url: &url::Url) -> String {
        format!(
            "{}://{}{}",
            url.scheme(),
            url.host_str().unwrap_or(""),
            url.port().map(|p| format!(":{p}")).unwrap_or_default()
        )
    }

    /// `isAllowed(url, userAgent)`. Unknown (fetch/parse failure, empty
    /// file) is treated as allowed.
    pub async fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        let Ok(parsed) = url::Url::parse(url) else {
            return true;
        };
        let origin = Self::origin_of(&parsed);
        let slot = self.slot_for(&origin).await;

        let mut guard = slot.lock().await;
        let needs_refresh = match &*guard {
            Some(cached) => std::time::Instant::now() >= cached.refresh_deadline,
            None => true,
        };

        if needs_refresh {
            let ruleset = self.fetch(&origin).await;
            *guard = Some(CachedRuleSet {
                ruleset,
                refresh_deadline: std::time::Instant::now() + self.ttl,
            });
        }

        guard
            .as_ref()
            .map(|cached| cached.ruleset.is_allowed(user_agent, parsed.path()))
            .unwrap_or(true)
    }

    async fn slot_for(&self, origin: &str) -> Arc<Mutex<Option<CachedRuleSet>>> {
        if let Some(slot) = self.entries.read().await.get(origin) {
            return slot.clone();
        }
        let mut write = self.entries.write().await;
        write
            .entry(origin.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    async fn fetch(&self, origin: &str) -> RuleSet {
        let robots_url = format!("{origin}/robots.txt");

        if self.guard.validate(&robots_url).is_err() {
            warn!(origin, "robots.txt url failed security validation, denying nothing, treating as allow-all");
            return RuleSet::default();
        }

        let request = match self.client.get(&robots_url).timeout(self.fetch_timeout).send().await {
            Ok(resp) => resp,
            Err(err) => {
                debug!(origin, error = %err, "robots.txt fetch failed, treating origin as allowed");
                return RuleSet::default();
            }
        };

        if !request.status().is_success() {
            debug!(origin, status = %request.status(), "robots.txt non-success status, treating origin as allowed");
            return RuleSet::default();
        }

        match request.text().await {
            Ok(body) => RuleSet::parse(&body),
            Err(err) => {
                debug!(origin, error = %err, "robots.txt body read failed, treating origin as allowed");
                RuleSet::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic() {
        let content = "User-agent: *\nDisallow: /private/\nAllow: /public/\n";
        let ruleset = RuleSet::parse(content);
        assert!(ruleset.is_allowed("TestBot", "/public/page"));
        assert!(!ruleset.is_allowed("TestBot", "/private/page"));
        assert!(ruleset.is_allowed("TestBot", "/other"));
    }

    #[test]
    fn specific_user_agent_overrides_wildcard() {
        let content = "User-agent: *\nDisallow: /\n\nUser-agent: goodbot\nAllow: /\n";
        let ruleset = RuleSet::parse(content);
        assert!(!ruleset.is_allowed("BadBot", "/page"));
        assert!(ruleset.is_allowed("GoodBot", "/page"));
    }

    #[test]
    fn longest_prefix_wins_over_order() {
        // Disallow is broader but Allow is more specific and listed first;
        // longest-prefix-match must still pick Allow.
        let content = "User-agent: *\nAllow: /private/public/\nDisallow: /private/\n";
        let ruleset = RuleSet::parse(content);
        assert!(ruleset.is_allowed("Bot", "/private/public/page"));
        assert!(!ruleset.is_allowed("Bot", "/private/secret"));
    }

    #[test]
    fn empty_robots_allows_all() {
        let ruleset = RuleSet::parse("");
        assert!(ruleset.is_allowed("AnyBot", "/any/path"));
    }

    #[test]
    fn disallow_all() {
        let ruleset = RuleSet::parse("User-agent: *\nDisallow: /\n");
        assert!(!ruleset.is_allowed("Bot", "/anything"));
    }

    #[tokio::test]
    async fn unknown_origin_defaults_to_allowed() {
        let registry = RobotsRegistry::new(
            reqwest::Client::new(),
            Duration::from_secs(60),
            Duration::from_millis(1),
        );
        // 203.0.113.0/24 is reserved for documentation (TEST-NET-3); this
        // never resolves, so the fetch fails and the origin is allow-all.
        assert!(registry.is_allowed("http://203.0.113.1/jobs", "TestBot").await);
    }
}
