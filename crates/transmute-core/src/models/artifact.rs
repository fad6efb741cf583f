use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

/// Logical separation between not-yet-processed uploads and servable results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Intake,
    Output,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Intake, Namespace::Output];

    /// Directory name of the namespace below the storage root
    pub fn dir_name(self) -> &'static str {
        match self {
            Namespace::Intake => "intake",
            Namespace::Output => "output",
        }
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.dir_name())
    }
}

/// A file tracked by the artifact store.
///
/// Artifacts are immutable once written; `size_bytes` is only known after the content
/// has been materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub namespace: Namespace,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size_bytes: Option<u64>,
}

impl Artifact {
    pub fn new(name: String, namespace: Namespace, path: PathBuf) -> Self {
        Self {
            name,
            namespace,
            path,
            created_at: Utc::now(),
            size_bytes: None,
        }
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    /// Lower-cased file extension, if the name carries one
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

impl Display for Artifact {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
