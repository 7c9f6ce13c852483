//! Same-site link discovery for the seed page
//!
//! Links are collected with a first-N policy: anchors are scanned in
//! document order and scanning stops once the cap is reached. The result
//! therefore depends on anchor order, and a page whose anchors are
//! reordered yields a different link set.

use std::collections::HashSet;

use tracing::{debug, info, instrument};
use url::{Host, Url};

use crate::crawler::CrawlerConfig;
use crate::crawler::content_extraction::extract_hrefs;
use crate::crawler::error::CrawlError;
use crate::crawler::fetch::Fetcher;

/// Second-level labels that act as public suffixes under a country code
const COUNTRY_SECOND_LEVEL: &[&str] = &["ac", "co", "com", "edu", "gov", "net", "org"];

/// Unique, normalized, same-site links discovered on a seed page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSet {
    seed: Url,
    links: Vec<Url>,
}

impl LinkSet {
    /// An empty link set for `seed`
    pub fn empty(seed: Url) -> Self {
        Self {
            seed,
            links: Vec::new(),
        }
    }

    /// The seed the links were collected from
    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// Number of links
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether no links were collected
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Whether `url` is in the set after normalization
    pub fn contains(&self, url: &Url) -> bool {
        let normalized = normalize_url(url);
        self.links.contains(&normalized)
    }

    /// Iterate the links in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.links.iter()
    }
}

impl<'a> IntoIterator for &'a LinkSet {
    type Item = &'a Url;
    type IntoIter = std::slice::Iter<'a, Url>;

    fn into_iter(self) -> Self::IntoIter {
        self.links.iter()
    }
}

/// Strip credentials, query and fragment, keeping scheme, host, port and path
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    // Only fails for URLs that cannot carry credentials in the first place
    let _ = normalized.set_username("");
    let _ = normalized.set_password(None);
    normalized.set_query(None);
    normalized.set_fragment(None);
    normalized
}

/// Registrable domain of `url`, used to decide same-site membership
///
/// Without a public suffix list this keeps the last two labels of the host,
/// or three when the second-to-last label is a common second-level suffix
/// under a two-letter country code (`example.co.uk`). IP addresses and
/// single-label hosts are returned unchanged.
pub fn registrable_domain(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(format!("[{}]", addr)),
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            let labels: Vec<&str> = domain.split('.').collect();
            let keep = match labels.as_slice() {
                [.., second, tld]
                    if labels.len() >= 3
                        && tld.len() == 2
                        && COUNTRY_SECOND_LEVEL.contains(second) =>
                {
                    3
                }
                _ => 2,
            };
            let start = labels.len().saturating_sub(keep);
            Some(labels[start..].join("."))
        }
    }
}

/// Whether `url`'s host is `domain` or one of its subdomains
fn is_same_site(url: &Url, domain: &str) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Collect up to `config.max_links` same-site links from the seed page
///
/// # Arguments
///
/// * `fetcher` - Source of the seed page body
/// * `seed` - The seed URL
/// * `config` - The crawler configuration
///
/// # Returns
///
/// The collected links, or the error that prevented the seed from being read
#[instrument(skip(fetcher, seed, config), fields(seed = %seed))]
pub async fn collect_links<F: Fetcher>(
    fetcher: &F,
    seed: &Url,
    config: &CrawlerConfig,
) -> Result<LinkSet, CrawlError> {
    if !matches!(seed.scheme(), "http" | "https") {
        return Err(CrawlError::InvalidSeed(seed.to_string()));
    }
    let domain =
        registrable_domain(seed).ok_or_else(|| CrawlError::InvalidSeed(seed.to_string()))?;
    debug!("Registrable domain: {}", domain);

    let html = fetcher.fetch(seed).await?;
    let hrefs = extract_hrefs(&html)?;

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for href in hrefs {
        if links.len() >= config.max_links {
            debug!("Link cap of {} reached", config.max_links);
            break;
        }

        let Ok(resolved) = seed.join(&href) else {
            debug!("Skipping unresolvable href {:?}", href);
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        let normalized = normalize_url(&resolved);
        if !is_same_site(&normalized, &domain) {
            continue;
        }
        if seen.insert(normalized.to_string()) {
            links.push(normalized);
        }
    }

    info!("Collected {} links from {}", links.len(), seed);
    Ok(LinkSet {
        seed: seed.clone(),
        links,
    })
}
