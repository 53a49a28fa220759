//! Standard-file header: creation, version policy and validation.
//!
//! Every standard file carries these root attributes:
//!
//! | attribute     | content                                            |
//! |---------------|----------------------------------------------------|
//! | `io_version`  | version of the file layout the file complies with  |
//! | `created_on`  | ISO-8601 timestamp with an explicit UTC offset     |
//! | `created_by`  | `;`-terminated author list, e.g. `alice;bob;`      |
//! | `description` | optional free text                                 |

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};

use crate::container::{AttrValue, Container, ContainerFile, ROOT};
use crate::error::{Result, StdFileError};

/// Layout version written into new files.
pub const IO_VERSION: &str = "1.1.0";

/// Older layout versions that current code still reads unchanged.
pub const COMPATIBLE_VERSIONS: &[&str] = &["1.0.0"];

/// Header attribute names.
pub const ATTR_IO_VERSION: &str = "io_version";
/// See [`ATTR_IO_VERSION`].
pub const ATTR_CREATED_ON: &str = "created_on";
/// See [`ATTR_IO_VERSION`].
pub const ATTR_CREATED_BY: &str = "created_by";
/// See [`ATTR_IO_VERSION`].
pub const ATTR_DESCRIPTION: &str = "description";

const CREATED_ON_MINUTES: &str = "%Y-%m-%dT%H:%M%:z";
const CREATED_ON_SECONDS: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Which `io_version` values are accepted and which one is current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPolicy {
    /// Version written by this build
    pub current: String,
    /// Versions read without an update
    pub compatible: Vec<String>,
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self {
            current: IO_VERSION.to_string(),
            compatible: COMPATIBLE_VERSIONS.iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl VersionPolicy {
    /// Default policy plus `extra` compatible versions.
    pub fn with_extra_compatible<S: AsRef<str>>(extra: &[S]) -> Self {
        let mut policy = Self::default();
        for v in extra {
            let v = v.as_ref().trim();
            if !v.is_empty() && !policy.compatible.iter().any(|c| c == v) {
                policy.compatible.push(v.to_string());
            }
        }
        policy
    }

    /// Whether `version` is current or compatible.
    pub fn is_recognized(&self, version: &str) -> bool {
        version == self.current || self.compatible.iter().any(|c| c == version)
    }
}

/// Result of [`check_version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionCheck {
    /// Whether `io_version` should be (re)stamped with the current version
    pub needs_update: bool,
}

/// Ordered author list, written as `a;b;`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Authors(Vec<String>);

impl Authors {
    /// Author list from individual names. Names are trimmed; empty names are rejected.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                return Err(StdFileError::invalid_header(ATTR_CREATED_BY, "empty author entry"));
            }
            if name.contains(';') {
                return Err(StdFileError::invalid_header(
                    ATTR_CREATED_BY,
                    format!("author '{}' contains ';'", name),
                ));
            }
            out.push(name.to_string());
        }
        if out.is_empty() {
            return Err(StdFileError::invalid_header(ATTR_CREATED_BY, "no authors"));
        }
        Ok(Self(out))
    }

    /// Parses `a;b;`. The final `;` is optional.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
        let names: Vec<&str> = body.split(';').collect();
        Self::new(&names)
    }

    /// Author names in order.
    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Interleaves two lists by position, keeping the first occurrence of each name.
    pub fn merge(&self, other: &Authors) -> Authors {
        let mut out: Vec<String> = Vec::with_capacity(self.0.len() + other.0.len());
        let longest = self.0.len().max(other.0.len());
        for i in 0..longest {
            for name in [self.0.get(i), other.0.get(i)].into_iter().flatten() {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
        }
        Authors(out)
    }
}

impl fmt::Display for Authors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.0 {
            write!(f, "{};", name)?;
        }
        Ok(())
    }
}

impl FromStr for Authors {
    type Err = StdFileError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Merges two `created_by` strings. See [`Authors::merge`].
pub fn merge_authors(a: &str, b: &str) -> Result<String> {
    Ok(Authors::parse(a)?.merge(&Authors::parse(b)?).to_string())
}

/// Options for [`create_new_with`].
#[derive(Debug, Clone, Default)]
pub struct NewFileOptions {
    /// Replace an existing file
    pub overwrite: bool,
    /// Optional `description` attribute
    pub description: Option<String>,
    /// Write `created_on` with seconds
    pub with_seconds: bool,
}

/// Formats `created_on` for `when`.
pub fn format_created_on(when: DateTime<Utc>, with_seconds: bool) -> String {
    let layout = if with_seconds {
        CREATED_ON_SECONDS
    } else {
        CREATED_ON_MINUTES
    };
    when.format(layout).to_string()
}

/// Parses an ISO-8601 timestamp with offset, with or without seconds.
pub fn parse_created_on(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, CREATED_ON_MINUTES))
        .or_else(|_| DateTime::parse_from_str(text, CREATED_ON_SECONDS))
        .ok()
}

/// Writes a fresh header into `container`'s root attributes.
pub fn write_header(container: &mut Container, authors: &Authors, options: &NewFileOptions) {
    let attrs = container.attrs_mut();
    attrs.insert(ATTR_IO_VERSION.into(), IO_VERSION.into());
    attrs.insert(
        ATTR_CREATED_ON.into(),
        format_created_on(Utc::now(), options.with_seconds).into(),
    );
    attrs.insert(ATTR_CREATED_BY.into(), authors.to_string().into());
    if let Some(description) = &options.description {
        attrs.insert(ATTR_DESCRIPTION.into(), description.as_str().into());
    }
}

/// Creates a standard file with a fresh header and returns the open handle.
pub fn create_new<P: AsRef<Path>>(path: P, authors: &str, overwrite: bool) -> Result<ContainerFile> {
    create_new_with(
        path,
        authors,
        &NewFileOptions {
            overwrite,
            ..NewFileOptions::default()
        },
    )
}

/// [`create_new`] with explicit options.
pub fn create_new_with<P: AsRef<Path>>(
    path: P,
    authors: &str,
    options: &NewFileOptions,
) -> Result<ContainerFile> {
    let authors = Authors::parse(authors)?;
    let mut file = ContainerFile::create(path.as_ref(), options.overwrite)?;
    write_header(file.container_mut()?, &authors, options);
    file.flush()?;
    log::debug!(
        "[Header] Created {} (io_version {}, created_by {})",
        path.as_ref().display(),
        IO_VERSION,
        authors
    );
    Ok(file)
}

fn header_str<'a>(container: &'a Container, name: &str) -> Result<Option<&'a str>> {
    match container.attrs().get(name) {
        None => Ok(None),
        Some(AttrValue::Str(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(StdFileError::invalid_header(
            name,
            format!("expected a string, found {}", other.type_name()),
        )),
    }
}

/// Decides whether `io_version` needs stamping.
///
/// - missing: new file, `needs_update`
/// - current: `needs_update`
/// - compatible: no update, a warning is logged
/// - anything else: [`StdFileError::IncompatibleVersion`]
pub fn check_version(container: &Container, policy: &VersionPolicy) -> Result<VersionCheck> {
    let Some(found) = header_str(container, ATTR_IO_VERSION)? else {
        return Ok(VersionCheck { needs_update: true });
    };
    if found == policy.current {
        return Ok(VersionCheck { needs_update: true });
    }
    if policy.compatible.iter().any(|c| c == found) {
        log::warn!(
            "[Header] io_version {} is compatible with {}; leaving it unchanged",
            found,
            policy.current
        );
        return Ok(VersionCheck {
            needs_update: false,
        });
    }
    Err(StdFileError::IncompatibleVersion {
        found: found.to_string(),
        current: policy.current.clone(),
    })
}

/// Runs [`check_version`] and stamps the current version when needed.
pub fn apply_version_update(container: &mut Container, policy: &VersionPolicy) -> Result<VersionCheck> {
    let check = check_version(container, policy)?;
    if check.needs_update {
        container
            .attrs_mut()
            .insert(ATTR_IO_VERSION.into(), policy.current.as_str().into());
    }
    Ok(check)
}

/// Checks that the header is usable.
pub fn validate(container: &Container, policy: &VersionPolicy) -> Result<()> {
    let version = header_str(container, ATTR_IO_VERSION)?
        .ok_or_else(|| StdFileError::missing_attribute(ROOT, ATTR_IO_VERSION))?;

    if !policy.is_recognized(version) {
        log::warn!(
            "[Header] io_version {} is not a recognised layout; header fields not checked",
            version
        );
        return Ok(());
    }

    let created_on = header_str(container, ATTR_CREATED_ON)?
        .ok_or_else(|| StdFileError::missing_attribute(ROOT, ATTR_CREATED_ON))?;
    if parse_created_on(created_on).is_none() {
        return Err(StdFileError::invalid_header(
            ATTR_CREATED_ON,
            format!("'{}' is not an ISO-8601 timestamp with offset", created_on),
        ));
    }
    let created_by = header_str(container, ATTR_CREATED_BY)?
        .ok_or_else(|| StdFileError::missing_attribute(ROOT, ATTR_CREATED_BY))?;
    Authors::parse(created_by)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_version(v: &str) -> Container {
        let mut c = Container::new();
        c.attrs_mut().insert(ATTR_IO_VERSION.into(), v.into());
        c
    }

    #[test]
    fn test_authors_parse_and_display() {
        let a = Authors::parse(" alice ; bob;").unwrap();
        assert_eq!(a.names(), ["alice", "bob"]);
        assert_eq!(a.to_string(), "alice;bob;");
        assert!(Authors::parse("alice;;bob;").is_err());
        assert!(Authors::parse("").is_err());
        assert_eq!(Authors::parse("solo").unwrap().to_string(), "solo;");
    }

    #[test]
    fn test_merge_authors() {
        assert_eq!(merge_authors("alice;bob;", "carol;dan;").unwrap(), "alice;carol;bob;dan;");
        assert_eq!(merge_authors("alice;bob;", "bob;carol;").unwrap(), "alice;bob;carol;");
        assert_eq!(merge_authors("a;", "b;c;d;").unwrap(), "a;b;c;d;");
    }

    #[test]
    fn test_check_version() {
        let policy = VersionPolicy::default();
        assert!(check_version(&Container::new(), &policy).unwrap().needs_update);
        assert!(check_version(&with_version(IO_VERSION), &policy).unwrap().needs_update);
        assert!(!check_version(&with_version("1.0.0"), &policy).unwrap().needs_update);
        assert!(matches!(
            check_version(&with_version("0.3.0"), &policy),
            Err(StdFileError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn test_extra_compatible_versions() {
        let policy = VersionPolicy::with_extra_compatible(&["0.9.0", "1.0.0"]);
        assert_eq!(policy.compatible, vec!["1.0.0".to_string(), "0.9.0".to_string()]);
        assert!(!check_version(&with_version("0.9.0"), &policy).unwrap().needs_update);
    }

    #[test]
    fn test_created_on_formats() {
        let when = DateTime::parse_from_rfc3339("2026-03-04T05:06:07Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_created_on(when, false), "2026-03-04T05:06+00:00");
        assert_eq!(format_created_on(when, true), "2026-03-04T05:06:07+00:00");
        assert!(parse_created_on("2026-03-04T05:06+00:00").is_some());
        assert!(parse_created_on("2026-03-04T05:06:07+02:00").is_some());
        assert!(parse_created_on("2026-03-04 05:06").is_none());
    }

    #[test]
    fn test_validate() {
        let policy = VersionPolicy::default();
        assert!(matches!(
            validate(&Container::new(), &policy),
            Err(StdFileError::MissingAttribute { .. })
        ));

        let mut c = with_version(IO_VERSION);
        assert!(validate(&c, &policy).is_err());
        write_header(&mut c, &Authors::parse("alice;").unwrap(), &NewFileOptions::default());
        assert!(validate(&c, &policy).is_ok());

        c.attrs_mut().insert(ATTR_CREATED_ON.into(), "yesterday".into());
        assert!(matches!(validate(&c, &policy), Err(StdFileError::InvalidHeader { .. })));

        // unknown layouts are only checked for io_version here
        assert!(validate(&with_version("9.9.9"), &policy).is_ok());
    }
}
