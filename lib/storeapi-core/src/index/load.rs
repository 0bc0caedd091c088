use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{OperationIndex, derive_operation_index};
use crate::IndexError;

/// Documents whose name does not follow the `<name>.<group>` convention but belong to a group.
const MANUAL_ASSOCIATIONS: [(&str, ApiGroup); 1] = [("orders.v2.oas2", ApiGroup::V2)];

const DOCUMENT_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// The API generation a specification document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiGroup {
    /// Management API v2, no envelope.
    V2,
    /// Management API v3, `{data, meta}` envelope.
    V3,
    /// Storefront API.
    Storefront,
    /// Documents matching no known group.
    Misc,
}

impl ApiGroup {
    /// All groups.
    pub const ALL: [Self; 4] = [Self::V2, Self::V3, Self::Storefront, Self::Misc];

    /// Short name, also used as the file name suffix.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::V3 => "v3",
            Self::Storefront => "sf",
            Self::Misc => "misc",
        }
    }

    /// Finds a group from its short name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|group| group.as_str() == name)
    }

    /// Classifies a document from its file name, e.g. `catalog.v3.yaml`.
    /// Matching ignores case.
    pub fn from_file_name(file_name: &str) -> Self {
        let file_name = file_name.to_ascii_lowercase();
        let file_name = file_name.as_str();
        let stem = DOCUMENT_EXTENSIONS
            .iter()
            .find_map(|extension| {
                file_name
                    .strip_suffix(extension)
                    .and_then(|rest| rest.strip_suffix('.'))
            })
            .unwrap_or(file_name);

        if let Some((_, group)) = MANUAL_ASSOCIATIONS.iter().find(|(name, _)| *name == stem) {
            return *group;
        }

        stem.rsplit_once('.')
            .and_then(|(_, suffix)| Self::from_name(suffix))
            .filter(|group| *group != Self::Misc)
            .unwrap_or(Self::Misc)
    }
}

impl fmt::Display for ApiGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads and parses one `.yaml`, `.yml` or `.json` document.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed, or has another extension.
pub fn load_document(path: &Path) -> Result<Value, IndexError> {
    let content = fs::read_to_string(path)?;

    match document_extension(path).as_deref() {
        Some("json") => Ok(serde_json::from_str(&content)?),
        Some("yaml" | "yml") => {
            serde_saphyr::from_str(&content).map_err(|err| IndexError::Yaml {
                path: path.display().to_string(),
                message: err.to_string(),
            })
        }
        _ => Err(IndexError::InvalidSpec {
            message: format!("unsupported document '{}'", path.display()),
        }),
    }
}

/// The lowercased extension of a file.
fn document_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
}

/// Document files below `dir`, sorted by name; symbolic links are not followed.
fn collect_documents(dir: &Path) -> Result<Vec<PathBuf>, IndexError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file()
            && document_extension(entry.path())
                .is_some_and(|extension| DOCUMENT_EXTENSIONS.contains(&extension.as_str()))
        {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Loads every document below `dir` and derives one merged index per group.
///
/// Files are visited in sorted order, so the result is stable.
///
/// # Errors
///
/// Fails on the first unreadable document, or with
/// [`IndexError::DuplicateRequestLine`] when two documents of the same group
/// declare the same operation.
pub fn load_directory(dir: &Path) -> Result<IndexMap<ApiGroup, OperationIndex>, IndexError> {
    let documents = collect_documents(dir)?;

    let mut groups = IndexMap::<ApiGroup, OperationIndex>::new();
    for path in documents {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let group = ApiGroup::from_file_name(file_name);
        let document = load_document(&path)?;
        let index = derive_operation_index(&document)?;
        debug!(path = %path.display(), %group, operations = index.len(), "document loaded");
        groups.entry(group).or_default().merge(index)?;
    }
    groups.sort_keys();

    info!(groups = groups.len(), "specification directory loaded");
    Ok(groups)
}
