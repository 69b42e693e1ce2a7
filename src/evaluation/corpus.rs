//! Labeled study corpus.
//!
//! A corpus is a directory with one JSON file per subject. Files whose name
//! ends in `cg.json` belong to control group participants; files ending in
//! `.old.json` are superseded recordings and always ignored.

use super::EvaluationError;
use crate::capture::types::Acquisition;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// All acquisitions recorded by one study participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub acquisitions: Vec<Acquisition>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    pub subjects: Vec<Subject>,
}

impl Corpus {
    pub fn new(subjects: Vec<Subject>) -> Self {
        Self { subjects }
    }

    /// Load every subject file in `dir`, ordered by file name.
    pub fn load(dir: &Path, skip_control_group: bool) -> Result<Self, EvaluationError> {
        let corpus_error = |reason: String| EvaluationError::Corpus {
            path: dir.to_path_buf(),
            reason,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| corpus_error(e.to_string()))? {
            let path = entry.map_err(|e| corpus_error(e.to_string()))?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".json") || name.ends_with(".old.json") {
                continue;
            }
            if skip_control_group && name.ends_with("cg.json") {
                continue;
            }
            paths.push(path);
        }
        paths.sort();

        let mut subjects = Vec::with_capacity(paths.len());
        for path in paths {
            let content = std::fs::read_to_string(&path).map_err(|e| EvaluationError::Corpus {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            let mut subject: Subject =
                serde_json::from_str(&content).map_err(|e| EvaluationError::Corpus {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;

            let before = subject.acquisitions.len();
            subject.acquisitions.retain(|a| !a.keystrokes.is_empty());
            if subject.acquisitions.len() != before {
                warn!(
                    subject = %subject.id,
                    skipped = before - subject.acquisitions.len(),
                    "Skipping acquisitions without keystrokes"
                );
            }
            subjects.push(subject);
        }

        info!(subjects = subjects.len(), dir = %dir.display(), "Corpus loaded");
        Ok(Self { subjects })
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn acquisition_count(&self) -> usize {
        self.subjects.iter().map(|s| s.acquisitions.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::Keystroke;
    use chrono::Utc;

    fn subject(id: &str) -> Subject {
        let mut acquisition = Acquisition::new(1, 0, Utc::now());
        acquisition.keystrokes.push(Keystroke::default());
        Subject {
            id: id.to_string(),
            acquisitions: vec![acquisition, Acquisition::new(1, 0, Utc::now())],
        }
    }

    #[test]
    fn test_load_skips_control_group() {
        let dir = std::env::temp_dir().join(format!("corpus_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        for name in ["a.json", "bcg.json", "c.old.json", "notes.txt"] {
            let json = serde_json::to_string(&subject(name)).unwrap();
            std::fs::write(dir.join(name), json).unwrap();
        }

        let all = Corpus::load(&dir, false).unwrap();
        assert_eq!(all.len(), 2);
        // the empty acquisition is dropped
        assert_eq!(all.acquisition_count(), 2);

        let without_cg = Corpus::load(&dir, true).unwrap();
        assert_eq!(without_cg.len(), 1);
        assert_eq!(without_cg.subjects[0].id, "a.json");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
