//! Durable progress: per-branch watermarks and the retention cursor,
//! one small JSON document rewritten whole on every save.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::errors::ProgressError;

/// On-disk layout: repository slugs ("owner/repo") map to per-branch
/// watermark shas, with the retention cursor alongside.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProgressDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_archive_date: Option<String>,
    #[serde(flatten)]
    repos: BTreeMap<String, BTreeMap<String, String>>,
}

/// Watermark state bound to its file. A missing file is a normal
/// first boot; an unreadable one is fatal.
pub struct ProgressState {
    path: PathBuf,
    doc: ProgressDoc,
}

impl ProgressState {
    pub fn load(path: PathBuf) -> Result<Self, ProgressError> {
        let doc = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| ProgressError::Corrupt {
                path: path.clone(),
                source: e,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ProgressDoc::default(),
            Err(e) => return Err(ProgressError::Read { path, source: e }),
        };
        Ok(Self { path, doc })
    }

    /// Atomic full-document rewrite: serialize to a sibling temp file,
    /// then rename over the target. A crash mid-save leaves the prior
    /// file intact, never a torn one.
    pub fn save(&self) -> Result<(), ProgressError> {
        let text = serde_json::to_string_pretty(&self.doc).map_err(|e| ProgressError::Write {
            path: self.path.clone(),
            source: std::io::Error::other(e),
        })?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, text).map_err(|e| ProgressError::Write {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| ProgressError::Write {
            path: self.path.clone(),
            source: e,
        })
    }

    pub fn watermark(&self, owner: &str, repo: &str, branch: &str) -> Option<&str> {
        self.doc
            .repos
            .get(&slug(owner, repo))?
            .get(branch)
            .map(String::as_str)
    }

    pub fn set_watermark(&mut self, owner: &str, repo: &str, branch: &str, sha: &str) {
        self.doc
            .repos
            .entry(slug(owner, repo))
            .or_default()
            .insert(branch.to_string(), sha.to_string());
    }

    pub fn archive_date(&self) -> Option<&str> {
        self.doc.last_archive_date.as_deref()
    }

    pub fn set_archive_date(&mut self, date: &str) {
        self.doc.last_archive_date = Some(date.to_string());
    }
}

fn slug(owner: &str, repo: &str) -> String {
    format!("{}/{}", owner, repo)
}
