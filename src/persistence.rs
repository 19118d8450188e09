//! Where annotations go once they leave memory

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::highlight::{Highlight, HighlightColor, HighlightId, Note, NoteId};

#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("annotation storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("annotation format: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown highlight {0}")]
    UnknownHighlight(HighlightId),

    #[error("unknown note {0}")]
    UnknownNote(NoteId),
}

/// Everything stored for one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default)]
    pub highlights: Vec<Highlight>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl Annotations {
    pub fn upsert_highlight(&mut self, highlight: &Highlight) {
        match self.highlights.iter_mut().find(|h| h.id == highlight.id) {
            Some(existing) => *existing = highlight.clone(),
            None => self.highlights.push(highlight.clone()),
        }
    }

    pub fn set_highlight_color(
        &mut self,
        id: HighlightId,
        color: HighlightColor,
    ) -> Result<(), AnnotationError> {
        let highlight = self
            .highlights
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or(AnnotationError::UnknownHighlight(id))?;
        highlight.color = color;
        Ok(())
    }

    /// Remove a highlight and the notes linked to it; missing ids are fine
    pub fn remove_highlight(&mut self, id: HighlightId) {
        self.highlights.retain(|h| h.id != id);
        self.notes.retain(|n| n.highlight_id != Some(id));
    }

    pub fn upsert_note(&mut self, note: &Note) {
        match self.notes.iter_mut().find(|n| n.id == note.id) {
            Some(existing) => *existing = note.clone(),
            None => self.notes.push(note.clone()),
        }
    }

    pub fn replace_note(&mut self, note: &Note) -> Result<(), AnnotationError> {
        let existing = self
            .notes
            .iter_mut()
            .find(|n| n.id == note.id)
            .ok_or(AnnotationError::UnknownNote(note.id))?;
        *existing = note.clone();
        Ok(())
    }

    pub fn remove_note(&mut self, id: NoteId) {
        self.notes.retain(|n| n.id != id);
    }
}

/// Durable mirror of one document's highlights and notes.
///
/// Calls are idempotent on id: creating an existing id overwrites it and
/// deleting a missing id succeeds. Deleting a highlight also deletes its notes.
pub trait AnnotationSink {
    fn load(&mut self) -> Result<Annotations, AnnotationError>;
    fn create_highlight(&mut self, highlight: &Highlight) -> Result<(), AnnotationError>;
    fn update_highlight_color(
        &mut self,
        id: HighlightId,
        color: HighlightColor,
    ) -> Result<(), AnnotationError>;
    fn delete_highlight(&mut self, id: HighlightId) -> Result<(), AnnotationError>;
    fn create_note(&mut self, note: &Note) -> Result<(), AnnotationError>;
    fn update_note(&mut self, note: &Note) -> Result<(), AnnotationError>;
    fn delete_note(&mut self, id: NoteId) -> Result<(), AnnotationError>;
}

/// Annotations of a document kept in a YAML file named after its id
pub struct YamlAnnotationFile {
    pub file_path: PathBuf,
    annotations: Annotations,
}

impl YamlAnnotationFile {
    pub fn open(dir: &Path, document_id: &str) -> Result<Self, AnnotationError> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let file_path = dir.join(Self::file_name(document_id));
        let annotations = if file_path.exists() {
            Self::load_from_file(&file_path)?
        } else {
            Annotations::default()
        };
        Ok(Self {
            file_path,
            annotations,
        })
    }

    pub fn file_name(document_id: &str) -> String {
        let digest = md5::compute(document_id.as_bytes());
        format!("annotations_{digest:x}.yaml")
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    fn load_from_file(file_path: &Path) -> Result<Annotations, AnnotationError> {
        let content = fs::read_to_string(file_path)?;
        if content.trim().is_empty() {
            return Ok(Annotations::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    fn save_to_disk(&self) -> Result<(), AnnotationError> {
        let yaml = serde_yaml::to_string(&self.annotations)?;
        fs::write(&self.file_path, yaml)?;
        debug!("Saved annotations to {}", self.file_path.display());
        Ok(())
    }
}

impl AnnotationSink for YamlAnnotationFile {
    fn load(&mut self) -> Result<Annotations, AnnotationError> {
        if self.file_path.exists() {
            self.annotations = Self::load_from_file(&self.file_path)?;
        }
        Ok(self.annotations.clone())
    }

    fn create_highlight(&mut self, highlight: &Highlight) -> Result<(), AnnotationError> {
        self.annotations.upsert_highlight(highlight);
        self.save_to_disk()
    }

    fn update_highlight_color(
        &mut self,
        id: HighlightId,
        color: HighlightColor,
    ) -> Result<(), AnnotationError> {
        self.annotations.set_highlight_color(id, color)?;
        self.save_to_disk()
    }

    fn delete_highlight(&mut self, id: HighlightId) -> Result<(), AnnotationError> {
        self.annotations.remove_highlight(id);
        self.save_to_disk()
    }

    fn create_note(&mut self, note: &Note) -> Result<(), AnnotationError> {
        self.annotations.upsert_note(note);
        self.save_to_disk()
    }

    fn update_note(&mut self, note: &Note) -> Result<(), AnnotationError> {
        self.annotations.replace_note(note)?;
        self.save_to_disk()
    }

    fn delete_note(&mut self, id: NoteId) -> Result<(), AnnotationError> {
        self.annotations.remove_note(id);
        self.save_to_disk()
    }
}
