// src/robots.rs
//! Per-host robots.txt compliance for the rendering-fetch tier. Policies are
//! fetched with a tight timeout, parsed once, and cached for the process
//! lifetime. When robots.txt cannot be fetched or parsed the answer is a
//! conservative deny.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

const ROBOTS_TIMEOUT: Duration = Duration::from_secs(3);

/// User-agent token matched against robots.txt groups.
pub const ROBOTS_UA: &str = "country-risk-analyzer";

#[derive(Debug, Clone)]
struct Rule {
    allow: bool,
    prefix: String,
}

/// Parsed rules applying to our user agent for one host.
#[derive(Debug, Clone, Default)]
struct HostPolicy {
    rules: Vec<Rule>,
}

impl HostPolicy {
    /// Longest-prefix match wins; a tie goes to Allow. No rules means allow.
    fn allows(&self, path: &str) -> bool {
        let mut best: Option<&Rule> = None;
        for rule in &self.rules {
            if rule.prefix.is_empty() || path.starts_with(&rule.prefix) {
                match best {
                    Some(b)
                        if rule.prefix.len() > b.prefix.len()
                            || (rule.prefix.len() == b.prefix.len() && rule.allow) =>
                    {
                        best = Some(rule)
                    }
                    None => best = Some(rule),
                    _ => {}
                }
            }
        }
        best.map(|r| r.allow).unwrap_or(true)
    }
}

fn parse_robots(content: &str, ua_token: &str) -> HostPolicy {
    let ua_token = ua_token.to_ascii_lowercase();
    let mut generic = HostPolicy::default();
    let mut specific = HostPolicy::default();
    let mut current_agents: Vec<String> = Vec::new();
    let mut in_group_body = false;

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if in_group_body {
                    current_agents.clear();
                    in_group_body = false;
                }
                current_agents.push(value.to_ascii_lowercase());
            }
            "allow" | "disallow" => {
                in_group_body = true;
                if value.is_empty() && key == "disallow" {
                    // "Disallow:" means everything is allowed; no rule needed.
                    continue;
                }
                let rule = Rule {
                    allow: key == "allow",
                    prefix: value.to_string(),
                };
                for agent in &current_agents {
                    if agent == "*" {
                        generic.rules.push(rule.clone());
                    } else if ua_token.contains(agent.as_str()) {
                        specific.rules.push(rule.clone());
                    }
                }
            }
            _ => in_group_body = true,
        }
    }

    if specific.rules.is_empty() {
        generic
    } else {
        specific
    }
}

/// Process-lifetime robots policy cache. Cheap to clone; safe to share across
/// country runs or duplicate per worker.
#[derive(Clone)]
pub struct RobotsCache {
    http: reqwest::Client,
    cache: Arc<Mutex<HashMap<String, Option<HostPolicy>>>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent(ROBOTS_UA)
            .connect_timeout(ROBOTS_TIMEOUT)
            .timeout(ROBOTS_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// True when robots.txt for the URL's host permits fetching it. Fetch or
    /// parse failure denies.
    pub async fn allowed(&self, target: &str) -> bool {
        let Ok(parsed) = Url::parse(target) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let scheme = parsed.scheme();
        let base = format!("{scheme}://{host}");
        let path = parsed.path();

        let mut cache = self.cache.lock().await;
        let policy = match cache.get(&base) {
            Some(cached) => cached.clone(),
            None => {
                let fetched = self.fetch_policy(&base).await;
                cache.insert(base.clone(), fetched.clone());
                fetched
            }
        };
        drop(cache);

        match policy {
            Some(p) => {
                let ok = p.allows(path);
                if !ok {
                    debug!(host, path, "robots policy disallows fetch");
                }
                ok
            }
            None => false,
        }
    }

    async fn fetch_policy(&self, base: &str) -> Option<HostPolicy> {
        let resp = self.http.get(format!("{base}/robots.txt")).send().await.ok()?;
        if resp.status().as_u16() >= 400 {
            return None;
        }
        let body = resp.text().await.ok()?;
        Some(parse_robots(&body, ROBOTS_UA))
    }

    /// Seed the cache for a host; used by tests to avoid network.
    #[doc(hidden)]
    pub async fn seed(&self, base: &str, robots_txt: Option<&str>) {
        let policy = robots_txt.map(|t| parse_robots(t, ROBOTS_UA));
        self.cache.lock().await.insert(base.to_string(), policy);
    }
}

impl Default for RobotsCache {
    fn default() -> Self {
        Self::new()
    }
}
