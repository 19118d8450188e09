use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::engine::ScaleValue;

/// Where a reader left off in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    #[serde(default)]
    pub scroll_offset: f64,
    #[serde(default)]
    pub zoom: Option<ScaleValue>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Per-document scroll offsets and zoom settings
#[derive(Debug, Serialize, Deserialize)]
pub struct ReaderState {
    documents: HashMap<String, DocumentState>,
    #[serde(skip)]
    file_path: Option<String>,
}

impl ReaderState {
    pub fn ephemeral() -> Self {
        Self {
            documents: HashMap::new(),
            file_path: None,
        }
    }

    pub fn with_file(file_path: &str) -> Self {
        Self {
            documents: HashMap::new(),
            file_path: Some(file_path.to_string()),
        }
    }

    pub fn load_or_ephemeral(file_path: Option<&str>) -> Self {
        match file_path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                log::error!("Failed to load reader state from {}: {}", path, e);
                Self::with_file(path)
            }),
            None => Self::ephemeral(),
        }
    }

    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let path = Path::new(file_path);
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let mut state: Self = serde_json::from_str(&content)?;
            state.file_path = Some(file_path.to_string());
            Ok(state)
        } else {
            Ok(Self::with_file(file_path))
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        match &self.file_path {
            Some(path) => {
                let content = serde_json::to_string_pretty(self)?;
                fs::write(path, content)?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn get(&self, document_id: &str) -> Option<&DocumentState> {
        self.documents.get(document_id)
    }

    pub fn scroll_offset(&self, document_id: &str) -> Option<f64> {
        self.get(document_id).map(|state| state.scroll_offset)
    }

    pub fn zoom(&self, document_id: &str) -> Option<ScaleValue> {
        self.get(document_id).and_then(|state| state.zoom)
    }

    pub fn set_scroll_offset(&mut self, document_id: &str, offset: f64) {
        self.entry(document_id).scroll_offset = offset;
        self.save_logged();
    }

    pub fn set_zoom(&mut self, document_id: &str, zoom: ScaleValue) {
        self.entry(document_id).zoom = Some(zoom);
        self.save_logged();
    }

    fn entry(&mut self, document_id: &str) -> &mut DocumentState {
        let state = self
            .documents
            .entry(document_id.to_string())
            .or_insert_with(|| DocumentState {
                scroll_offset: 0.0,
                zoom: None,
                updated_at: chrono::Utc::now(),
            });
        state.updated_at = chrono::Utc::now();
        state
    }

    fn save_logged(&self) {
        if self.file_path.is_some() {
            if let Err(e) = self.save() {
                log::error!("Failed to save reader state: {}", e);
            }
        }
    }
}
