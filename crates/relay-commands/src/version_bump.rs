use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates reasons a release branch version cannot be advanced.
pub enum VersionBumpError {
    #[error("version manifest content is not valid base64")]
    InvalidEncoding,
    #[error("version manifest is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("version manifest has no string `version` field")]
    MissingVersion,
    #[error("version `{0}` is not in major.minor.patch form")]
    MalformedVersion(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVersion {
    pub next: String,
    pub major_minor: String,
}

/// Decodes a base64 `package.json`-style manifest and returns its `version`.
pub fn decode_manifest_version(encoded: &str) -> Result<String, VersionBumpError> {
    let compact = encoded
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect::<String>();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|_| VersionBumpError::InvalidEncoding)?;
    let manifest: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|error| VersionBumpError::InvalidJson(error.to_string()))?;
    manifest
        .get("version")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .map(ToOwned::to_owned)
        .ok_or(VersionBumpError::MissingVersion)
}

/// Applies the release progression `X.Y.0-beta -> X.Y.1-rc -> X.Y.2 -> X.Y.(n+1)`.
pub fn next_release_version(current: &str) -> Result<ReleaseVersion, VersionBumpError> {
    let current = current.trim();
    let malformed = || VersionBumpError::MalformedVersion(current.to_string());
    let parts = current.split('.').collect::<Vec<_>>();
    if parts.len() < 3 {
        return Err(malformed());
    }
    let is_numeric = |part: &str| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit());
    if !is_numeric(parts[0]) || !is_numeric(parts[1]) {
        return Err(malformed());
    }
    let major_minor = format!("{}.{}", parts[0], parts[1]);
    let patch = if current.contains("beta") {
        "1-rc".to_string()
    } else if current.contains("rc") {
        "2".to_string()
    } else {
        let patch = parts[2].parse::<u64>().map_err(|_| malformed())?;
        patch.checked_add(1).ok_or_else(malformed)?.to_string()
    };
    Ok(ReleaseVersion {
        next: format!("{major_minor}.{patch}"),
        major_minor,
    })
}
