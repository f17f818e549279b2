//! # ci_info: per-application build state kept outside the repository
//!
//! The CI metadata store is a directory with one sub-directory per application
//! name, each holding an `app-ci-info.yml`:
//!
//! ```yaml
//! ci-data:
//!   current-version: 1.4.0+7
//!   current-build-number: 7
//! ```
//!
//! The versioning tools mutate this file between stage runs. Stages only read
//! it, once, when they start. The property helpers at the bottom back the
//! `ci-metadata` utility; they go through `yaml-rust2` so that scalars they do
//! not touch are written back exactly as they were read.

use serde::{de, Deserialize, Deserializer};
use yaml_rust2::yaml::Hash;
use yaml_rust2::{EmitError, Yaml, YamlEmitter, YamlLoader};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::app_info::{read_app_info, AppInfo};
use crate::config::Layout;
use crate::error::MetadataError;

/// Mutable versioning state of one application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CiInfo {
    #[serde(rename = "ci-data")]
    pub ci_data: CiData,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CiData {
    /// Kept as written: serde_yaml hands plain scalars to a `String` field
    /// verbatim, so `1.10` stays `1.10` and `2` becomes `"2"`.
    #[serde(rename = "current-version")]
    pub current_version: String,
    #[serde(
        rename = "current-build-number",
        default,
        deserialize_with = "build_number"
    )]
    pub current_build_number: Option<u64>,
}

impl CiInfo {
    pub fn current_version(&self) -> &str {
        &self.ci_data.current_version
    }
}

/// The versioning tool writes the build number either as an integer or as a
/// quoted string of digits; both are accepted.
fn build_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| {
            de::Error::custom(format!("expected a build number, found {raw:?}"))
        }),
    }
}

/// Location of the CI info file for `app`, whether or not it exists.
pub fn ci_info_path(ci_metadata_dir: &Path, app: &AppInfo, layout: &Layout) -> PathBuf {
    layout.ci_info_path(ci_metadata_dir, &app.name)
}

/// Resolves the descriptor of `repo_dir` first, then the CI info keyed by its name.
pub fn read_app_ci_info(
    repo_dir: &Path,
    ci_metadata_dir: &Path,
    layout: &Layout,
) -> Result<CiInfo, MetadataError> {
    let app = read_app_info(repo_dir, layout)?;
    read_ci_info(&app, ci_metadata_dir, layout)
}

/// Reads the CI info of an already resolved application.
pub fn read_ci_info(
    app: &AppInfo,
    ci_metadata_dir: &Path,
    layout: &Layout,
) -> Result<CiInfo, MetadataError> {
    if !ci_metadata_dir.is_dir() {
        error!(path = %ci_metadata_dir.display(), "CI metadata directory does not exist or is not a directory");
        return Err(MetadataError::CiMetadataDirMissing(
            ci_metadata_dir.to_path_buf(),
        ));
    }

    let app_dir = ci_metadata_dir.join(&app.name);
    if !app_dir.is_dir() {
        error!(app = %app.name, path = %app_dir.display(), "No CI metadata directory for application");
        return Err(MetadataError::CiMetadataDirMissing(app_dir));
    }

    let path = ci_info_path(ci_metadata_dir, app, layout);
    let content = read_existing(&path)?;
    let ci_info: CiInfo = serde_yaml::from_str(&content).map_err(|source| {
        error!(error = %source, path = %path.display(), "Failed to parse CI info YAML");
        MetadataError::CiInfoParse {
            path: path.clone(),
            source,
        }
    })?;

    info!(
        app = %app.name,
        current_version = %ci_info.ci_data.current_version,
        build_number = ?ci_info.ci_data.current_build_number,
        "CI metadata resolved"
    );
    Ok(ci_info)
}

fn read_existing(path: &Path) -> Result<String, MetadataError> {
    if !path.is_file() {
        error!(path = %path.display(), "CI info file not found");
        return Err(MetadataError::CiInfoMissing(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(|source| {
        error!(error = ?source, path = %path.display(), "Failed to read CI info");
        MetadataError::CiInfoRead {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Loads the whole file as a text-preserving document: plain scalars such as
/// `1.10` keep their source spelling through a `set`.
fn load_document(path: &Path) -> Result<Yaml, MetadataError> {
    let content = read_existing(path)?;
    let documents = YamlLoader::load_from_str(&content).map_err(|source| {
        error!(error = %source, path = %path.display(), "Failed to parse CI info YAML");
        MetadataError::CiInfoSyntax {
            path: path.to_path_buf(),
            source,
        }
    })?;
    Ok(documents.into_iter().next().unwrap_or(Yaml::Null))
}

fn split_property(property: &str) -> Result<Vec<&str>, MetadataError> {
    let segments: Vec<&str> = property.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(MetadataError::InvalidProperty(format!(
            "{property:?} has an empty path segment"
        )));
    }
    Ok(segments)
}

fn key(segment: &str) -> Yaml {
    Yaml::String(segment.to_string())
}

fn dump(document: &Yaml) -> Result<String, EmitError> {
    let mut out = String::new();
    YamlEmitter::new(&mut out).dump(document)?;
    let body = out.strip_prefix("---\n").unwrap_or(&out);
    Ok(format!("{}\n", body.trim_end()))
}

/// Scalars as written in the file, mappings and sequences as YAML text.
fn render(value: &Yaml) -> Result<Option<String>, EmitError> {
    Ok(match value {
        Yaml::Null | Yaml::BadValue => None,
        Yaml::String(s) | Yaml::Real(s) => Some(s.clone()),
        Yaml::Integer(i) => Some(i.to_string()),
        Yaml::Boolean(b) => Some(b.to_string()),
        other => Some(dump(other)?.trim_end().to_string()),
    })
}

/// Looks up a dotted property such as `ci-data.current-version` and returns
/// it as text. `Ok(None)` when any segment along the way is absent, or the
/// value is null.
pub fn get_property(path: &Path, property: &str) -> Result<Option<String>, MetadataError> {
    let segments = split_property(property)?;
    let document = load_document(path)?;

    let mut current = &document;
    for segment in segments {
        let next = match current {
            Yaml::Hash(hash) => hash.get(&key(segment)),
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => {
                debug!(property, segment, "Property not present");
                return Ok(None);
            }
        }
    }
    render(current).map_err(|e| MetadataError::InvalidProperty(format!("{property}: {e}")))
}

/// Applies a JSON object of dotted properties to the CI info file, creating
/// intermediate mappings as needed, and rewrites the file.
///
/// Untouched scalars keep their spelling and keys keep their order. Comments
/// are not preserved.
pub fn set_properties(path: &Path, properties_json: &str) -> Result<(), MetadataError> {
    let properties: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(properties_json)
            .map_err(|e| MetadataError::InvalidProperty(format!("invalid properties map: {e}")))?;

    let mut document = match load_document(path)? {
        Yaml::Null => Yaml::Hash(Hash::new()),
        other => other,
    };

    for (property, value) in &properties {
        let segments = split_property(property)?;
        assign(&mut document, property, &segments, yaml_from_json(value))?;
        info!(property = %property, "Updated CI info property");
    }

    let rendered = dump(&document).map_err(|e| MetadataError::CiInfoWrite {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    fs::write(path, rendered).map_err(|e| MetadataError::CiInfoWrite {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn yaml_from_json(value: &serde_json::Value) -> Yaml {
    match value {
        serde_json::Value::Null => Yaml::Null,
        serde_json::Value::Bool(b) => Yaml::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Yaml::Integer(i),
            None => Yaml::Real(n.to_string()),
        },
        serde_json::Value::String(s) => Yaml::String(s.clone()),
        serde_json::Value::Array(items) => Yaml::Array(items.iter().map(yaml_from_json).collect()),
        serde_json::Value::Object(map) => Yaml::Hash(
            map.iter()
                .map(|(k, v)| (key(k), yaml_from_json(v)))
                .collect(),
        ),
    }
}

fn not_a_mapping(property: &str, segment: &str) -> MetadataError {
    MetadataError::InvalidProperty(format!(
        "{property}: parent of {segment:?} is not a mapping"
    ))
}

fn assign(
    document: &mut Yaml,
    property: &str,
    segments: &[&str],
    value: Yaml,
) -> Result<(), MetadataError> {
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return Err(MetadataError::InvalidProperty("empty property".to_string())),
    };

    let mut current = document;
    for segment in parents {
        let hash = match current {
            Yaml::Hash(hash) => hash,
            _ => return Err(not_a_mapping(property, segment)),
        };
        let segment_key = key(segment);
        if !hash.contains_key(&segment_key) {
            hash.insert(segment_key.clone(), Yaml::Hash(Hash::new()));
        }
        current = match hash.get_mut(&segment_key) {
            Some(next) => next,
            None => return Err(not_a_mapping(property, segment)),
        };
    }

    match current {
        Yaml::Hash(hash) => {
            hash.insert(key(last), value);
            Ok(())
        }
        _ => Err(not_a_mapping(property, last)),
    }
}
