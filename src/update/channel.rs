/// Organisation hosting the published builds, fixed at build time
const ORG: &str = match option_env!("APP_STUB_ORG") {
    Some(org) => org,
    None => "app-stub",
};

/// Repository holding the published manifests, fixed at build time
const REPO: &str = match option_env!("APP_STUB_REPO") {
    Some(repo) => repo,
    None => "app-stub-files",
};

/// Manifest file name published on the canary branch
pub const CANARY_MANIFEST: &str = "canary.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseChannel {
    Stable,
    Override(String),
    Canary,
}

impl ReleaseChannel {
    /// Pick the channel: a non-empty override pins the URL, then the canary flag, then stable
    pub fn select(override_url: Option<&str>, canary: bool) -> Self {
        match override_url.map(str::trim) {
            Some(url) if !url.is_empty() => Self::Override(url.to_string()),
            _ if canary => Self::Canary,
            _ => Self::Stable,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Override(_) => "override",
            Self::Canary => "canary",
        }
    }
}

/// Where the manifest for a channel lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestRequest {
    /// Fetch this URL and read `app.link` from it
    Direct(String),
    /// Fetch the branch reference first, read `commit.sha`, then fetch
    /// the content-addressed manifest built from it
    TwoStep { branch_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub stable_url: String,
    pub branch_url: String,
    /// URL template with `{sha}` and `{path}` placeholders
    pub cdn_template: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            stable_url: format!("https://{}.github.io/{}/stable.json", ORG, REPO),
            branch_url: format!(
                "https://api.github.com/repos/{}/{}/branches/canary",
                ORG, REPO
            ),
            cdn_template: format!("https://cdn.jsdelivr.net/gh/{}/{}@{{sha}}/{{path}}", ORG, REPO),
        }
    }
}

impl Endpoints {
    /// Instantiate the CDN template for a commit and a repository-relative path
    pub fn cdn_url(&self, sha: &str, path: &str) -> String {
        self.cdn_template
            .replace("{sha}", sha)
            .replace("{path}", path.trim_start_matches('/'))
    }

    /// Second-stage manifest URL for the canary channel
    pub fn canary_manifest_url(&self, sha: &str) -> String {
        self.cdn_url(sha, CANARY_MANIFEST)
    }
}

/// Decide which manifest to query for the configured channel
pub fn resolve(channel: &ReleaseChannel, endpoints: &Endpoints) -> ManifestRequest {
    match channel {
        ReleaseChannel::Override(url) => ManifestRequest::Direct(url.clone()),
        ReleaseChannel::Stable => ManifestRequest::Direct(endpoints.stable_url.clone()),
        ReleaseChannel::Canary => ManifestRequest::TwoStep {
            branch_url: endpoints.branch_url.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Endpoints {
        Endpoints {
            stable_url: "https://pages.test/files/stable.json".to_string(),
            branch_url: "https://api.test/repos/org/files/branches/canary".to_string(),
            cdn_template: "https://cdn.test/gh/org/files@{sha}/{path}".to_string(),
        }
    }

    #[test]
    fn test_override_wins_over_canary() {
        let channel = ReleaseChannel::select(Some("https://pin.test/m.json"), true);
        assert_eq!(channel, ReleaseChannel::Override("https://pin.test/m.json".to_string()));
        assert_eq!(
            resolve(&channel, &endpoints()),
            ManifestRequest::Direct("https://pin.test/m.json".to_string())
        );
    }

    #[test]
    fn test_empty_override_is_ignored() {
        assert_eq!(ReleaseChannel::select(Some(""), true), ReleaseChannel::Canary);
        assert_eq!(ReleaseChannel::select(Some("  "), false), ReleaseChannel::Stable);
        assert_eq!(ReleaseChannel::select(None, false), ReleaseChannel::Stable);
    }

    #[test]
    fn test_every_channel_resolves_to_one_request() {
        let ep = endpoints();
        for channel in [
            ReleaseChannel::Stable,
            ReleaseChannel::Canary,
            ReleaseChannel::Override("https://x.test/a.json".to_string()),
        ] {
            match resolve(&channel, &ep) {
                ManifestRequest::Direct(url) => assert_ne!(channel, ReleaseChannel::Canary, "{}", url),
                ManifestRequest::TwoStep { branch_url } => {
                    assert_eq!(channel, ReleaseChannel::Canary);
                    assert_eq!(branch_url, ep.branch_url);
                }
            }
        }
    }

    #[test]
    fn test_stable_targets_published_url() {
        assert_eq!(
            resolve(&ReleaseChannel::Stable, &endpoints()),
            ManifestRequest::Direct("https://pages.test/files/stable.json".to_string())
        );
    }

    #[test]
    fn test_canary_manifest_url_is_content_addressed() {
        assert_eq!(
            endpoints().canary_manifest_url("deadbeef"),
            "https://cdn.test/gh/org/files@deadbeef/canary.json"
        );
    }

    #[test]
    fn test_cdn_url_strips_leading_slash() {
        assert_eq!(
            endpoints().cdn_url("abcd", "/v1/app.apk"),
            "https://cdn.test/gh/org/files@abcd/v1/app.apk"
        );
    }

    #[test]
    fn test_default_endpoints_have_placeholders() {
        let ep = Endpoints::default();
        assert!(ep.stable_url.ends_with("/stable.json"));
        assert!(ep.branch_url.ends_with("/branches/canary"));
        assert!(ep.cdn_template.contains("@{sha}/{path}"));
    }
}
