use serde::Deserialize;
use serde_json::Value;

use super::channel::Endpoints;
use crate::error::FetchError;

/// Commit identifier read from the canary branch reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRef(String);

impl CommitRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The artifact a manifest points at, with any relative link already anchored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateManifest {
    pub artifact_url: String,
    /// Whether `app.link` was already absolute before rewriting
    pub is_absolute: bool,
    pub version: Option<String>,
    pub version_code: Option<i64>,
    pub note: Option<String>,
}

#[derive(Deserialize)]
struct BranchInfo {
    commit: CommitInfo,
}

#[derive(Deserialize)]
struct CommitInfo {
    sha: String,
}

#[derive(Deserialize)]
struct UpdateInfo {
    app: AppInfo,
}

#[derive(Deserialize)]
struct AppInfo {
    link: String,
}

/// Read `commit.sha` from a branch reference document
pub fn extract_commit_sha(json: &Value) -> Result<CommitRef, FetchError> {
    let branch = BranchInfo::deserialize(json)
        .map_err(|e| FetchError::parse(format!("branch reference: {}", e)))?;
    let sha = branch.commit.sha.trim();
    if sha.is_empty() {
        return Err(FetchError::parse("branch reference: empty commit.sha"));
    }
    // Substituted into the CDN template, so only plain revision ids get through
    if !sha.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(FetchError::parse(format!(
            "branch reference: commit.sha '{}' is not a revision id",
            sha
        )));
    }
    Ok(CommitRef(sha.to_string()))
}

/// Read `app.link` from a manifest, returning the link and whether it is absolute
pub fn extract_link(json: &Value) -> Result<(String, bool), FetchError> {
    let info = UpdateInfo::deserialize(json)
        .map_err(|e| FetchError::parse(format!("manifest: {}", e)))?;
    let link = info.app.link;
    if link.is_empty() {
        return Err(FetchError::parse("manifest: empty app.link"));
    }
    let is_absolute = link.starts_with("http");
    Ok((link, is_absolute))
}

/// Anchor a relative link on the CDN at the given commit
///
/// A relative link without a commit has nothing to anchor it and is rejected
pub fn resolve_artifact_url(
    link: &str,
    is_absolute: bool,
    commit: Option<&CommitRef>,
    endpoints: &Endpoints,
) -> Result<String, FetchError> {
    if is_absolute {
        return Ok(link.to_string());
    }
    match commit {
        Some(sha) => Ok(endpoints.cdn_url(sha.as_str(), link)),
        None => Err(FetchError::parse(format!(
            "manifest: relative link '{}' without a commit to resolve it against",
            link
        ))),
    }
}

/// Parse a manifest document into the artifact to download
pub fn parse_manifest(
    json: &Value,
    commit: Option<&CommitRef>,
    endpoints: &Endpoints,
) -> Result<UpdateManifest, FetchError> {
    let (link, is_absolute) = extract_link(json)?;
    let artifact_url = resolve_artifact_url(&link, is_absolute, commit, endpoints)?;

    // Display-only metadata; a wrong type here should not block the update
    let app = &json["app"];
    Ok(UpdateManifest {
        artifact_url,
        is_absolute,
        version: app["version"].as_str().filter(|v| !v.is_empty()).map(String::from),
        version_code: app["versionCode"].as_i64().filter(|code| *code >= 0),
        note: app["note"].as_str().filter(|n| !n.is_empty()).map(String::from),
    })
}
