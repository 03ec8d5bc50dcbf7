// keglet-common/src/model/record.rs
//! The formula record: a declarative description of one released script.
//!
//! Records are validated when they are built. Structural problems (a source
//! URL that does not embed the version, a malformed license expression, ...)
//! reject the record outright. A checksum or homepage that is missing,
//! malformed or still holding a template placeholder marks the record as a
//! [`RecordStatus::Draft`]; drafts can be inspected but never installed.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{KegletError, Result};

/// Whole words left behind by formula templates that were never filled in.
const PLACEHOLDER_WORDS: &[&str] = &["TODO", "CHANGEME", "REPLACE_ME", "PLACEHOLDER"];

/// Prefixes of upper-case template slots such as `YOUR_USERNAME`.
const PLACEHOLDER_PREFIXES: &[&str] = &["YOUR_", "PUT_"];

const SHA256_HEX_LEN: usize = 64;

/// Why a record is only a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftReason {
    PlaceholderChecksum(String),
    MalformedChecksum(String),
    PlaceholderHomepage(String),
    MalformedHomepage(String),
}

impl fmt::Display for DraftReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftReason::PlaceholderChecksum(v) => {
                write!(f, "sha256 '{v}' is a template placeholder")
            }
            DraftReason::MalformedChecksum(v) => write!(
                f,
                "sha256 '{v}' is not {SHA256_HEX_LEN} hexadecimal characters"
            ),
            DraftReason::PlaceholderHomepage(v) => {
                write!(f, "homepage '{v}' is a template placeholder")
            }
            DraftReason::MalformedHomepage(v) => {
                write!(f, "homepage '{v}' is not an http(s) URL with a host")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RecordStatus {
    #[default]
    Released,
    Draft(Vec<DraftReason>),
}

impl RecordStatus {
    pub fn is_released(&self) -> bool {
        matches!(self, RecordStatus::Released)
    }
}

/// The on-disk shape of a formula record, before validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawRecord {
    pub name: String,
    #[serde(alias = "description")]
    pub desc: String,
    #[serde(default, alias = "homepage_url")]
    pub homepage: String,
    #[serde(alias = "source_url")]
    pub url: String,
    #[serde(default, alias = "checksum")]
    pub sha256: String,
    pub license: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord", into = "RawRecord")]
pub struct FormulaRecord {
    name: String,
    description: String,
    homepage: String,
    url: String,
    sha256: String,
    license: String,
    version: String,
    status: RecordStatus,
}

impl FormulaRecord {
    /// The released phpswitch 1.0.0 formula.
    pub fn phpswitch() -> Self {
        Self {
            name: "phpswitch".to_string(),
            description: "Simple PHP version switcher for macOS".to_string(),
            homepage: "https://github.com/madusha98/phpswitch".to_string(),
            url: "https://github.com/madusha98/phpswitch/archive/v1.0.0.tar.gz".to_string(),
            sha256: "7b38c4ae043ae5f53d6ca6544f62c8c17166f380541de4f7645cbe91c88a99e0"
                .to_string(),
            license: "MIT".to_string(),
            version: "1.0.0".to_string(),
            status: RecordStatus::Released,
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let raw: RawRecord = toml::from_str(s)?;
        Self::try_from(raw)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let raw: RawRecord = serde_json::from_str(s)?;
        Self::try_from(raw)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn homepage(&self) -> &str {
        &self.homepage
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn license(&self) -> &str {
        &self.license
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn status(&self) -> &RecordStatus {
        &self.status
    }

    pub fn is_draft(&self) -> bool {
        !self.status.is_released()
    }

    /// Fails with [`KegletError::DraftRecord`] unless the record is released.
    pub fn ensure_released(&self) -> Result<()> {
        match &self.status {
            RecordStatus::Released => Ok(()),
            RecordStatus::Draft(reasons) => Err(KegletError::DraftRecord {
                name: self.name.clone(),
                reasons: reasons.clone(),
            }),
        }
    }

    /// Last path segment of the source URL, e.g. `v1.0.0.tar.gz`.
    pub fn archive_filename(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("{}-{}.download", self.name, self.version))
    }

    /// Name of the download inside the cache; prefixed so two formulas
    /// sharing a tag name (`v1.0.0.tar.gz`) never collide.
    pub fn cache_filename(&self) -> String {
        format!("{}--{}", self.name, self.archive_filename())
    }

}

impl TryFrom<RawRecord> for FormulaRecord {
    type Error = KegletError;

    fn try_from(raw: RawRecord) -> Result<Self> {
        let name = raw.name.trim().to_string();
        validate_name(&name)?;
        if raw.desc.trim().is_empty() {
            return Err(invalid(&name, "desc must not be empty"));
        }
        let version = raw.version.trim().to_string();
        validate_version(&name, &version)?;
        let url = raw.url.trim().to_string();
        validate_source_url(&name, &url, &version)?;
        let license = raw.license.trim().to_string();
        validate_license(&name, &license)?;

        let homepage = raw.homepage.trim().to_string();
        let sha256 = raw.sha256.trim().to_string();
        let mut reasons = Vec::new();
        if let Some(reason) = checksum_draft_reason(&sha256) {
            reasons.push(reason);
        }
        if let Some(reason) = homepage_draft_reason(&homepage) {
            reasons.push(reason);
        }
        let status = if reasons.is_empty() {
            RecordStatus::Released
        } else {
            debug!("Formula '{}' is a draft: {:?}", name, reasons);
            RecordStatus::Draft(reasons)
        };

        Ok(Self {
            name,
            description: raw.desc.trim().to_string(),
            homepage,
            url,
            sha256,
            license,
            version,
            status,
        })
    }
}

impl From<FormulaRecord> for RawRecord {
    fn from(record: FormulaRecord) -> Self {
        RawRecord {
            name: record.name,
            desc: record.description,
            homepage: record.homepage,
            url: record.url,
            sha256: record.sha256,
            license: record.license,
            version: record.version,
        }
    }
}

fn invalid(name: &str, msg: impl fmt::Display) -> KegletError {
    KegletError::ValidationError(format!("formula '{name}': {msg}"))
}

/// A value holds a placeholder when it has a `<...>` slot or a word that is
/// an upper-case template marker. Words are split on anything but
/// alphanumerics and `_`, so `TODOGroup` or `todo` are ordinary text.
fn has_placeholder(value: &str) -> bool {
    let angle_slot = value
        .find('<')
        .is_some_and(|start| value[start..].contains('>'));
    angle_slot
        || value
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .any(is_placeholder_word)
}

fn is_placeholder_word(word: &str) -> bool {
    let shouting = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    shouting
        && (PLACEHOLDER_WORDS.contains(&word)
            || PLACEHOLDER_PREFIXES.iter().any(|p| word.starts_with(p)))
}

fn validate_name(name: &str) -> Result<()> {
    let starts_alnum = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let allowed = name.chars().all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '@' | '.' | '_' | '+' | '-')
    });
    if starts_alnum && allowed {
        Ok(())
    } else {
        Err(KegletError::ValidationError(format!(
            "invalid formula name '{name}'"
        )))
    }
}

fn validate_version(name: &str, version: &str) -> Result<()> {
    if semver::Version::parse(version).is_ok() {
        return Ok(());
    }
    let dotted_numeric = !version.is_empty()
        && version
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    if dotted_numeric {
        Ok(())
    } else {
        Err(invalid(name, format!("version '{version}' is not a release version")))
    }
}

fn validate_source_url(name: &str, url: &str, version: &str) -> Result<()> {
    let parsed =
        Url::parse(url).map_err(|e| invalid(name, format!("failed to parse url '{url}': {e}")))?;
    match parsed.scheme() {
        "https" | "file" => {}
        other => {
            return Err(invalid(
                name,
                format!("url '{url}' must use https or file, got '{other}'"),
            ))
        }
    }
    let embeds_version = parsed
        .path_segments()
        .into_iter()
        .flatten()
        .any(|segment| segment_names_version(segment, version));
    if !embeds_version {
        return Err(invalid(
            name,
            format!("url '{url}' does not reference version {version}"),
        ));
    }
    Ok(())
}

/// Whether `segment` holds `version` as a whole token: `v1.0.0.tar.gz`,
/// `phpswitch-1.0.0.zip` or `1.0.0`, but not `v1.0.0` for version `1.0`.
fn segment_names_version(segment: &str, version: &str) -> bool {
    segment.match_indices(version).any(|(start, _)| {
        let before = segment[..start].chars().next_back();
        let mut after = segment[start + version.len()..].chars();
        let bounded_before = matches!(before, None | Some('v' | 'V' | '-' | '_'));
        let bounded_after = match after.next() {
            None | Some('-' | '_') => true,
            Some('.') => !after.next().is_some_and(|c| c.is_ascii_digit()),
            Some(_) => false,
        };
        bounded_before && bounded_after
    })
}

fn validate_license(name: &str, license: &str) -> Result<()> {
    let tokens: Vec<&str> = license
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .filter(|t| !t.is_empty())
        .collect();
    let is_operator = |t: &str| matches!(t, "AND" | "OR" | "WITH");
    let well_formed = !tokens.is_empty()
        && !tokens.first().is_some_and(|t| is_operator(t))
        && !tokens.last().is_some_and(|t| is_operator(t))
        && tokens.iter().all(|t| {
            is_operator(t)
                || t.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'))
        });
    if well_formed {
        Ok(())
    } else {
        Err(invalid(
            name,
            format!("license '{license}' is not an SPDX expression"),
        ))
    }
}

fn checksum_draft_reason(sha256: &str) -> Option<DraftReason> {
    if sha256.len() == SHA256_HEX_LEN && sha256.chars().all(|c| c.is_ascii_hexdigit()) {
        None
    } else if sha256.is_empty() || has_placeholder(sha256) {
        Some(DraftReason::PlaceholderChecksum(sha256.to_string()))
    } else {
        Some(DraftReason::MalformedChecksum(sha256.to_string()))
    }
}

fn homepage_draft_reason(homepage: &str) -> Option<DraftReason> {
    if homepage.is_empty() || has_placeholder(homepage) {
        return Some(DraftReason::PlaceholderHomepage(homepage.to_string()));
    }
    match Url::parse(homepage) {
        Ok(u)
            if matches!(u.scheme(), "http" | "https")
                && u.host_str().is_some_and(|h| !h.is_empty()) =>
        {
            None
        }
        _ => Some(DraftReason::MalformedHomepage(homepage.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASED: &str = r#"
name = "phpswitch"
desc = "Simple PHP version switcher for macOS"
homepage = "https://github.com/madusha98/phpswitch"
url = "https://github.com/madusha98/phpswitch/archive/v1.0.0.tar.gz"
sha256 = "7b38c4ae043ae5f53d6ca6544f62c8c17166f380541de4f7645cbe91c88a99e0"
license = "MIT"
version = "1.0.0"
"#;

    fn raw() -> RawRecord {
        toml::from_str(RELEASED).unwrap()
    }

    #[test]
    fn released_record_parses() {
        let record = FormulaRecord::from_toml_str(RELEASED).unwrap();
        assert!(record.status().is_released());
        assert_eq!(record, FormulaRecord::phpswitch());
        assert_eq!(record.archive_filename(), "v1.0.0.tar.gz");
        assert_eq!(record.cache_filename(), "phpswitch--v1.0.0.tar.gz");
        assert!(record.ensure_released().is_ok());
    }

    #[test]
    fn template_record_is_a_draft() {
        let mut raw = raw();
        raw.homepage = "https://github.com/YOUR_USERNAME/phpswitch".to_string();
        raw.sha256 = "PUT_SHA256_HERE".to_string();
        let record = FormulaRecord::try_from(raw).unwrap();
        match record.status() {
            RecordStatus::Draft(reasons) => {
                assert_eq!(reasons.len(), 2);
                assert!(matches!(reasons[0], DraftReason::PlaceholderChecksum(_)));
                assert!(matches!(reasons[1], DraftReason::PlaceholderHomepage(_)));
            }
            RecordStatus::Released => panic!("placeholder record must be a draft"),
        }
        let err = record.ensure_released().unwrap_err();
        assert!(matches!(err, KegletError::DraftRecord { .. }));
    }

    #[test]
    fn short_checksum_is_malformed() {
        let mut raw = raw();
        raw.sha256 = "7b38c4ae".to_string();
        let record = FormulaRecord::try_from(raw).unwrap();
        assert_eq!(
            record.status(),
            &RecordStatus::Draft(vec![DraftReason::MalformedChecksum("7b38c4ae".into())])
        );
    }

    #[test]
    fn uppercase_checksum_is_accepted() {
        let mut raw = raw();
        raw.sha256 = raw.sha256.to_uppercase();
        let record = FormulaRecord::try_from(raw).unwrap();
        assert!(record.status().is_released());
    }

    #[test]
    fn homepage_without_host_is_malformed() {
        let mut raw = raw();
        raw.homepage = "mailto:someone".to_string();
        let record = FormulaRecord::try_from(raw).unwrap();
        assert!(record.is_draft());
    }

    #[test]
    fn url_must_embed_version() {
        let mut raw = raw();
        raw.version = "1.1.0".to_string();
        let err = FormulaRecord::try_from(raw).unwrap_err();
        assert!(matches!(err, KegletError::ValidationError(_)));
        assert!(err.to_string().contains("does not reference version 1.1.0"));
    }

    #[test]
    fn url_version_must_be_a_whole_token() {
        for version in ["1.0", "0", "0.0"] {
            let mut raw = raw();
            raw.version = version.to_string();
            let err = FormulaRecord::try_from(raw).unwrap_err();
            assert!(
                err.to_string().contains("does not reference version"),
                "{version} should not match v1.0.0.tar.gz"
            );
        }

        for url in [
            "https://github.com/madusha98/phpswitch/releases/download/v1.0.0/phpswitch.tar.gz",
            "https://example.org/dist/phpswitch-1.0.0.zip",
            "https://example.org/dist/phpswitch_1.0.0-src.tar.xz",
            "file:///srv/mirror/1.0.0/phpswitch.tar.gz",
        ] {
            let mut raw = raw();
            raw.url = url.to_string();
            assert!(FormulaRecord::try_from(raw).is_ok(), "{url} should be accepted");
        }
    }

    #[test]
    fn placeholders_are_whole_template_words() {
        for homepage in [
            "https://github.com/TODOGroup/phpswitch",
            "https://example.org/todo/phpswitch",
            "https://github.com/YOUR_handle/phpswitch",
        ] {
            let mut raw = raw();
            raw.homepage = homepage.to_string();
            let record = FormulaRecord::try_from(raw).unwrap();
            assert!(record.status().is_released(), "{homepage} is a real homepage");
        }

        for homepage in [
            "https://github.com/YOUR_USERNAME/phpswitch",
            "https://github.com/<user>/phpswitch",
            "https://example.org/TODO",
        ] {
            let mut raw = raw();
            raw.homepage = homepage.to_string();
            let record = FormulaRecord::try_from(raw).unwrap();
            assert_eq!(
                record.status(),
                &RecordStatus::Draft(vec![DraftReason::PlaceholderHomepage(homepage.into())]),
            );
        }
    }

    #[test]
    fn plain_http_source_is_rejected() {
        let mut raw = raw();
        raw.url = "http://github.com/madusha98/phpswitch/archive/v1.0.0.tar.gz".to_string();
        assert!(FormulaRecord::try_from(raw).is_err());
    }

    #[test]
    fn license_expressions() {
        for ok in ["MIT", "MIT OR Apache-2.0", "(MIT AND BSD-3-Clause)", "GPL-2.0+"] {
            let mut raw = raw();
            raw.license = ok.to_string();
            assert!(FormulaRecord::try_from(raw).is_ok(), "{ok} should be accepted");
        }
        for bad in ["", "MIT OR", "some license!"] {
            let mut raw = raw();
            raw.license = bad.to_string();
            assert!(FormulaRecord::try_from(raw).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn versions() {
        let mut raw = raw();
        raw.version = "1.0".to_string();
        raw.url = "https://example.org/archive/v1.0.tar.gz".to_string();
        assert!(FormulaRecord::try_from(raw.clone()).is_ok());

        raw.version = "latest".to_string();
        raw.url = "https://example.org/archive/latest.tar.gz".to_string();
        assert!(FormulaRecord::try_from(raw).is_err());
    }

    #[test]
    fn json_aliases_are_understood() {
        let json = r#"{
            "name": "phpswitch",
            "description": "Simple PHP version switcher for macOS",
            "homepage_url": "https://github.com/madusha98/phpswitch",
            "source_url": "https://github.com/madusha98/phpswitch/archive/v1.0.0.tar.gz",
            "checksum": "7b38c4ae043ae5f53d6ca6544f62c8c17166f380541de4f7645cbe91c88a99e0",
            "license": "MIT",
            "version": "1.0.0"
        }"#;
        let record = FormulaRecord::from_json_str(json).unwrap();
        assert_eq!(record, FormulaRecord::phpswitch());
    }

    #[test]
    fn serializes_with_formula_field_names() {
        let json = serde_json::to_value(FormulaRecord::phpswitch()).unwrap();
        assert_eq!(json["desc"], "Simple PHP version switcher for macOS");
        assert_eq!(json["version"], "1.0.0");
        assert!(json.get("status").is_none());
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut raw = raw();
        raw.name = "PHP Switch".to_string();
        assert!(FormulaRecord::try_from(raw).is_err());
    }
}
