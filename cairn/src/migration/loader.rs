//! Loading migration files from disk.
//!
//! Each file is named `<version>_<name>.yaml` (or `.yml`) and holds `up` and
//! `down` lists of [`SchemaOp`]s.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::ops::SchemaOp;
use super::MigrationVersion;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationFile {
    pub version: MigrationVersion,
    pub name: String,
    pub up: Vec<SchemaOp>,
    pub down: Vec<SchemaOp>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MigrationBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    up: Vec<SchemaOp>,
    #[serde(default)]
    down: Vec<SchemaOp>,
}

pub struct MigrationLoader {
    migrations_dir: PathBuf,
}

impl MigrationLoader {
    pub fn new(migrations_dir: impl AsRef<Path>) -> Self {
        Self {
            migrations_dir: migrations_dir.as_ref().to_path_buf(),
        }
    }

    /// Load every migration file, ascending by version
    pub fn load_all(&self) -> Result<Vec<MigrationFile>> {
        if !self.migrations_dir.exists() {
            return Err(Error::Migration(format!(
                "Migrations directory does not exist: {}",
                self.migrations_dir.display()
            )));
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.migrations_dir)? {
            let path = entry?.path();
            let ext = path.extension().and_then(|e| e.to_str());
            if !matches!(ext, Some("yaml") | Some("yml")) {
                continue;
            }
            files.push(self.load_file(&path)?);
        }

        files.sort_by_key(|f| f.version);
        for pair in files.windows(2) {
            if pair[0].version == pair[1].version {
                return Err(Error::DuplicateVersion(pair[0].version));
            }
        }

        tracing::debug!(
            dir = %self.migrations_dir.display(),
            count = files.len(),
            "Loaded migration files"
        );
        Ok(files)
    }

    pub fn load_file(&self, path: &Path) -> Result<MigrationFile> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Migration(format!("bad file name: {}", path.display())))?;
        let (version, name) = parse_file_stem(stem)?;

        let content = fs::read_to_string(path)?;
        let body: MigrationBody = serde_yaml::from_str(&content)
            .map_err(|e| Error::Migration(format!("{}: {}", path.display(), e)))?;
        if body.up.is_empty() && body.down.is_empty() {
            return Err(Error::Migration(format!(
                "{}: migration has no operations",
                path.display()
            )));
        }
        if let Some(description) = &body.description {
            tracing::trace!(version = %version, description = %description, "Migration description");
        }

        Ok(MigrationFile {
            version,
            name,
            up: body.up,
            down: body.down,
        })
    }
}

/// Load every migration file in `dir`, ascending by version
pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<MigrationFile>> {
    MigrationLoader::new(dir).load_all()
}

/// Split `1733513436_update_sortable_attributes` into version and name
fn parse_file_stem(stem: &str) -> Result<(MigrationVersion, String)> {
    let (version, name) = stem.split_once('_').ok_or_else(|| {
        Error::Migration(format!(
            "migration file '{}' must be named <version>_<name>",
            stem
        ))
    })?;

    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Migration(format!(
            "migration file '{}' does not start with a numeric version",
            stem
        )));
    }
    let version: MigrationVersion = version
        .parse()
        .map_err(|e| Error::Migration(format!("migration file '{}': {}", stem, e)))?;
    if version == MigrationVersion::ZERO {
        return Err(Error::Migration(format!(
            "migration file '{}': version 0 is reserved",
            stem
        )));
    }
    if name.is_empty() {
        return Err(Error::Migration(format!(
            "migration file '{}' has an empty name",
            stem
        )));
    }

    Ok((version, name.to_string()))
}
