//! Navigation classification policy.

use crate::config::SecurityConfig;
use url::Url;

/// Decides which navigations need an explicit user decision.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    blocked_auth_domains: Vec<String>,
    intercept_https_downgrade: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::from_config(&SecurityConfig::default())
    }
}

impl SecurityPolicy {
    pub fn new<I, S>(blocked_auth_domains: I, intercept_https_downgrade: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            blocked_auth_domains: blocked_auth_domains
                .into_iter()
                .map(|d| normalize_domain(d.as_ref()))
                .filter(|d| !d.is_empty())
                .collect(),
            intercept_https_downgrade,
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(&config.blocked_auth_domains, config.intercept_https_downgrade)
    }

    pub fn intercepts_https_downgrade(&self) -> bool {
        self.intercept_https_downgrade
    }

    pub fn blocked_auth_domains(&self) -> &[String] {
        &self.blocked_auth_domains
    }

    /// Denylisted domain matched by `url`, if any.
    ///
    /// Matches the domain itself and any subdomain. Only http(s) targets are
    /// considered; unparseable input never matches.
    pub fn blocked_domain_for(&self, url: &str) -> Option<&str> {
        let parsed = Url::parse(url).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        let host = normalize_domain(parsed.host_str()?);
        self.blocked_auth_domains
            .iter()
            .find(|domain| {
                host == **domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
            .map(String::as_str)
    }

    pub fn is_blocked_auth_domain(&self, url: &str) -> bool {
        self.blocked_domain_for(url).is_some()
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}
