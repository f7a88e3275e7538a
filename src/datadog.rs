//! Datadog regions and the settings pages users are sent to.

/// A Datadog site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Control-plane enum value.
    pub site: &'static str,
    pub domain: &'static str,
    pub display_name: &'static str,
}

/// Known regions, most common first.
pub const REGIONS: &[Region] = &[
    Region { site: "US1", domain: "datadoghq.com", display_name: "US1" },
    Region { site: "US5", domain: "us5.datadoghq.com", display_name: "US5" },
    Region { site: "US3", domain: "us3.datadoghq.com", display_name: "US3" },
    Region { site: "EU1", domain: "datadoghq.eu", display_name: "EU1" },
    Region { site: "AP1", domain: "ap1.datadoghq.com", display_name: "AP1" },
    Region { site: "AP2", domain: "ap2.datadoghq.com", display_name: "AP2" },
    Region { site: "US1_FED", domain: "ddog-gov.com", display_name: "US1 FedRAMP" },
];

const FALLBACK_DOMAIN: &str = "datadoghq.com";

pub fn region(site: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|r| r.site == site)
}

fn domain_for(site: &str) -> &'static str {
    region(site).map(|r| r.domain).unwrap_or(FALLBACK_DOMAIN)
}

fn settings_url(site: &str, page: &str) -> String {
    let domain = domain_for(site);
    if site == "US1" {
        format!("https://app.{domain}/organization-settings/{page}")
    } else {
        format!("https://{domain}/organization-settings/{page}")
    }
}

/// Where to create an API key for `site`.
pub fn api_key_url(site: &str) -> String {
    settings_url(site, "api-keys")
}

/// Where to create an application key (via a service account) for `site`.
pub fn app_key_url(site: &str) -> String {
    settings_url(site, "service-accounts")
}
