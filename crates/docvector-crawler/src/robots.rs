//! Per-host robots.txt cache (spec §4.1). Fetch failures cache a permissive
//! policy (fail-open) rather than blocking the crawl.

use std::sync::Arc;

use dashmap::DashMap;
use reqwest::Client;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    /// `(rule_path, is_allow)` pairs from the `User-agent: *` group, most
    /// specific (longest path) wins ties by later precedence.
    rules: Vec<(String, bool)>,
}

impl RobotsPolicy {
    /// A policy with no rules allows everything — used both for hosts
    /// without a robots.txt and as the fail-open fallback.
    pub fn permissive() -> Self {
        Self { rules: Vec::new() }
    }

    fn parse(body: &str) -> Self {
        let mut rules = Vec::new();
        let mut in_wildcard_group = false;

        for raw_line in body.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
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
                    in_wildcard_group = value == "*";
                }
                "disallow" if in_wildcard_group && !value.is_empty() => {
                    rules.push((value.to_string(), false));
                }
                "allow" if in_wildcard_group && !value.is_empty() => {
                    rules.push((value.to_string(), true));
                }
                _ => {}
            }
        }

        Self { rules }
    }

    /// Longest matching rule wins; no match means allowed.
    pub fn is_allowed(&self, path: &str) -> bool {
        let mut best: Option<(&str, bool)> = None;
        for (rule_path, is_allow) in &self.rules {
            if path.starts_with(rule_path.as_str()) {
                match best {
                    Some((best_path, _)) if best_path.len() >= rule_path.len() => {}
                    _ => best = Some((rule_path.as_str(), *is_allow)),
                }
            }
        }
        best.map(|(_, allow)| allow).unwrap_or(true)
    }
}

pub struct RobotsCache {
    client: Client,
    cache: DashMap<String, Arc<RobotsPolicy>>,
}

impl RobotsCache {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: DashMap::new(),
        }
    }

    /// Fetch (or return cached) policy for the host of `url`.
    pub async fn policy_for(&self, url: &str) -> Arc<RobotsPolicy> {
        let Ok(parsed) = Url::parse(url) else {
            return Arc::new(RobotsPolicy::permissive());
        };
        let Some(host) = parsed.host_str() else {
            return Arc::new(RobotsPolicy::permissive());
        };
        let origin = format!("{}://{}", parsed.scheme(), host);

        if let Some(policy) = self.cache.get(&origin) {
            return policy.clone();
        }

        let policy = self.fetch(&origin).await;
        let policy = Arc::new(policy);
        self.cache.insert(origin, policy.clone());
        policy
    }

    async fn fetch(&self, origin: &str) -> RobotsPolicy {
        let robots_url = format!("{}/robots.txt", origin);
        match self.client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => RobotsPolicy::parse(&body),
                Err(err) => {
                    debug!(%origin, error = %err, "failed to read robots.txt body, failing open");
                    RobotsPolicy::permissive()
                }
            },
            Ok(resp) => {
                debug!(%origin, status = %resp.status(), "no robots.txt, failing open");
                RobotsPolicy::permissive()
            }
            Err(err) => {
                debug!(%origin, error = %err, "robots.txt fetch failed, failing open");
                RobotsPolicy::permissive()
            }
        }
    }

    /// Check whether `url`'s path is allowed under its host's cached policy.
    pub async fn is_allowed(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(p) => p,
            Err(_) => return false,
        };
        let policy = self.policy_for(url).await;
        policy.is_allowed(parsed.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_allows_everything() {
        let policy = RobotsPolicy::permissive();
        assert!(policy.is_allowed("/anything"));
    }

    #[test]
    fn disallow_blocks_matching_prefix() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow: /admin\n");
        assert!(!policy.is_allowed("/admin/panel"));
        assert!(policy.is_allowed("/docs"));
    }

    #[test]
    fn more_specific_allow_overrides_disallow() {
        let policy = RobotsPolicy::parse(
            "User-agent: *\nDisallow: /private\nAllow: /private/public-notes\n",
        );
        assert!(!policy.is_allowed("/private/secret"));
        assert!(policy.is_allowed("/private/public-notes/page"));
    }

    #[test]
    fn ignores_non_wildcard_groups() {
        let policy = RobotsPolicy::parse("User-agent: Googlebot\nDisallow: /\n");
        assert!(policy.is_allowed("/docs"));
    }
}
