//! Highlights, notes and the store that owns them

use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{ScaledPosition, ScreenPoint, Selection};
use crate::normalize::{Heuristics, normalize_with};
use crate::persistence::{AnnotationError, AnnotationSink, Annotations};

/// Tint of an uncommitted selection, independent of the color it may get
pub const SELECTION_TINT: &str = "rgba(47, 109, 224, 0.15)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    Yellow,
    Red,
    Blue,
    Green,
}

impl HighlightColor {
    /// Colors offered when committing a selection
    pub const PALETTE: [HighlightColor; 3] = [
        HighlightColor::Yellow,
        HighlightColor::Red,
        HighlightColor::Blue,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "Key Point",
            HighlightColor::Red => "Question",
            HighlightColor::Blue => "Reference",
            HighlightColor::Green => "Note",
        }
    }

    pub fn fill(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "rgba(235, 219, 164, 0.5)",
            HighlightColor::Red => "rgba(235, 161, 136, 0.5)",
            HighlightColor::Blue => "rgba(192, 215, 235, 0.5)",
            HighlightColor::Green => "rgba(235, 234, 191, 0.5)",
        }
    }

    pub fn border(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "#EBDBA4",
            HighlightColor::Red => "#EBA188",
            HighlightColor::Blue => "#C0D7EB",
            HighlightColor::Green => "#EBEABF",
        }
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::Red => "red",
            HighlightColor::Blue => "blue",
            HighlightColor::Green => "green",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightId(Uuid);

impl HighlightId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HighlightId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: HighlightId,
    pub color: HighlightColor,
    pub selected_text: String,
    pub position: ScaledPosition,
    pub document_id: String,
    pub created_at: DateTime<Utc>,
}

impl Highlight {
    pub fn page_number(&self) -> usize {
        self.position.page_number()
    }
}

/// An in-progress selection waiting for a color.
///
/// Holds the raw captured geometry; normalization happens when it is drawn
/// or committed.
#[derive(Debug, Clone, PartialEq)]
pub struct GhostHighlight {
    pub position: ScaledPosition,
    pub selected_text: String,
    pub anchor: ScreenPoint,
}

impl From<Selection> for GhostHighlight {
    fn from(selection: Selection) -> Self {
        Self {
            position: selection.position,
            selected_text: selection.text,
            anchor: selection.anchor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockContent {
    Quote {
        highlight_id: HighlightId,
        quoted_text: String,
        page_number: usize,
    },
    Text {
        content: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteBlock {
    pub id: Uuid,
    #[serde(flatten)]
    pub content: BlockContent,
}

impl NoteBlock {
    pub fn quote(highlight: &Highlight) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: BlockContent::Quote {
                highlight_id: highlight.id,
                quoted_text: highlight.selected_text.clone(),
                page_number: highlight.page_number(),
            },
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: BlockContent::Text {
                content: content.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub document_id: String,
    /// `None` for a note on the document as a whole
    pub highlight_id: Option<HighlightId>,
    pub blocks: Vec<NoteBlock>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Concatenated free text of the note
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match &block.content {
                BlockContent::Text { content } => Some(content.as_str()),
                BlockContent::Quote { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A highlight as handed to the engine for drawing
#[derive(Debug, Clone, PartialEq)]
pub enum DrawnHighlight<'a> {
    Ghost {
        position: ScaledPosition,
        ghost: &'a GhostHighlight,
    },
    Committed {
        highlight: &'a Highlight,
        scrolled_to: bool,
    },
}

impl DrawnHighlight<'_> {
    pub fn position(&self) -> &ScaledPosition {
        match self {
            DrawnHighlight::Ghost { position, .. } => position,
            DrawnHighlight::Committed { highlight, .. } => &highlight.position,
        }
    }

    pub fn fill(&self) -> &'static str {
        match self {
            DrawnHighlight::Ghost { .. } => SELECTION_TINT,
            DrawnHighlight::Committed { highlight, .. } => highlight.color.fill(),
        }
    }

    /// Committed highlights get a border in their color; the ghost has none
    pub fn border(&self) -> Option<&'static str> {
        match self {
            DrawnHighlight::Ghost { .. } => None,
            DrawnHighlight::Committed { highlight, .. } => Some(highlight.color.border()),
        }
    }
}

/// In-memory highlights and notes of one document, mirrored to a sink.
///
/// Every mutation is applied here first and then forwarded to the sink;
/// sink failures are logged and never undo the local change.
pub struct HighlightStore {
    document_id: String,
    highlights: Vec<Highlight>,
    notes: Vec<Note>,
    ghost: Option<GhostHighlight>,
    scrolled_to: Option<HighlightId>,
    heuristics: Heuristics,
    sink: Box<dyn AnnotationSink>,
}

impl HighlightStore {
    /// Create a store, hydrating it from the sink.
    ///
    /// A sink that fails to load yields an empty store.
    pub fn open(
        document_id: impl Into<String>,
        mut sink: Box<dyn AnnotationSink>,
        heuristics: Heuristics,
    ) -> Self {
        let document_id = document_id.into();
        let Annotations { highlights, notes } = sink.load().unwrap_or_else(|e| {
            error!("Failed to load annotations for {document_id}: {e}");
            Annotations::default()
        });
        debug!(
            "Loaded {} highlights and {} notes for {document_id}",
            highlights.len(),
            notes.len()
        );

        Self {
            highlights: highlights
                .into_iter()
                .filter(|h| h.document_id == document_id)
                .collect(),
            notes: notes
                .into_iter()
                .filter(|n| n.document_id == document_id)
                .collect(),
            document_id,
            ghost: None,
            scrolled_to: None,
            heuristics,
            sink,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn highlights(&self) -> &[Highlight] {
        &self.highlights
    }

    pub fn highlight(&self, id: HighlightId) -> Option<&Highlight> {
        self.highlights.iter().find(|h| h.id == id)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn notes_for(&self, highlight: HighlightId) -> impl Iterator<Item = &Note> {
        self.notes
            .iter()
            .filter(move |n| n.highlight_id == Some(highlight))
    }

    pub fn ghost(&self) -> Option<&GhostHighlight> {
        self.ghost.as_ref()
    }

    /// Show a new selection as the ghost, replacing any previous one
    pub fn begin_ghost(&mut self, selection: Selection) -> &GhostHighlight {
        self.ghost.insert(GhostHighlight::from(selection))
    }

    /// Drop the ghost; returns whether there was one
    pub fn discard_ghost(&mut self) -> bool {
        self.ghost.take().is_some()
    }

    /// Turn the ghost into a highlight of `color`
    pub fn commit_ghost(&mut self, color: HighlightColor) -> Option<HighlightId> {
        let ghost = self.ghost.take()?;
        let position = normalize_with(&ghost.position, &ghost.selected_text, &self.heuristics);
        let highlight = Highlight {
            id: HighlightId::new(),
            color,
            selected_text: ghost.selected_text,
            position,
            document_id: self.document_id.clone(),
            created_at: Utc::now(),
        };
        let id = highlight.id;

        self.highlights.push(highlight);
        if let Some(highlight) = self.highlights.last() {
            log_failure("create highlight", self.sink.create_highlight(highlight));
        }
        Some(id)
    }

    /// Commit the ghost and attach a note quoting it
    pub fn commit_ghost_with_note(&mut self, color: HighlightColor) -> Option<(HighlightId, NoteId)> {
        let highlight_id = self.commit_ghost(color)?;
        let quote = NoteBlock::quote(self.highlight(highlight_id)?);
        let note_id = self.add_note(Some(highlight_id), vec![quote, NoteBlock::text("")])?;
        Some((highlight_id, note_id))
    }

    /// Recolor a highlight; false for unknown ids and unchanged colors
    pub fn change_color(&mut self, id: HighlightId, color: HighlightColor) -> bool {
        let Some(highlight) = self.highlights.iter_mut().find(|h| h.id == id) else {
            return false;
        };
        if highlight.color == color {
            return false;
        }
        highlight.color = color;
        log_failure("update highlight color", self.sink.update_highlight_color(id, color));
        true
    }

    /// Remove a highlight together with every note linked to it.
    ///
    /// The sink is expected to cascade the note deletion itself.
    pub fn delete_highlight(&mut self, id: HighlightId) -> bool {
        let before = self.highlights.len();
        self.highlights.retain(|h| h.id != id);
        if self.highlights.len() == before {
            return false;
        }

        let notes_before = self.notes.len();
        self.notes.retain(|n| n.highlight_id != Some(id));
        debug!(
            "Deleted highlight {id} and {} linked notes",
            notes_before - self.notes.len()
        );
        if self.scrolled_to == Some(id) {
            self.scrolled_to = None;
        }

        log_failure("delete highlight", self.sink.delete_highlight(id));
        true
    }

    /// Add a note; `None` links it to the document. Unknown highlights are refused.
    pub fn add_note(
        &mut self,
        highlight_id: Option<HighlightId>,
        blocks: Vec<NoteBlock>,
    ) -> Option<NoteId> {
        if let Some(id) = highlight_id {
            self.highlight(id)?;
        }
        let now = Utc::now();
        let note = Note {
            id: NoteId::new(),
            document_id: self.document_id.clone(),
            highlight_id,
            blocks,
            created_at: now,
            updated_at: now,
        };
        let id = note.id;

        self.notes.push(note);
        if let Some(note) = self.notes.last() {
            log_failure("create note", self.sink.create_note(note));
        }
        Some(id)
    }

    /// Replace the free text of a note, keeping its quote blocks
    pub fn update_note_text(&mut self, id: NoteId, content: &str) -> bool {
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            return false;
        };

        let mut has_text = false;
        for block in &mut note.blocks {
            if let BlockContent::Text { content: text } = &mut block.content {
                *text = content.to_string();
                has_text = true;
            }
        }
        if !has_text {
            note.blocks.push(NoteBlock::text(content));
        }
        note.updated_at = Utc::now();

        log_failure("update note", self.sink.update_note(note));
        true
    }

    pub fn delete_note(&mut self, id: NoteId) -> bool {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        if self.notes.len() == before {
            return false;
        }
        log_failure("delete note", self.sink.delete_note(id));
        true
    }

    pub fn scrolled_to(&self) -> Option<HighlightId> {
        self.scrolled_to
    }

    pub fn set_scrolled_to(&mut self, id: Option<HighlightId>) {
        self.scrolled_to = id;
    }

    /// Everything the engine should draw, committed highlights first
    pub fn drawn(&self) -> Vec<DrawnHighlight<'_>> {
        let committed = self.highlights.iter().map(|highlight| DrawnHighlight::Committed {
            highlight,
            scrolled_to: self.scrolled_to == Some(highlight.id),
        });
        let ghost = self.ghost.as_ref().map(|ghost| DrawnHighlight::Ghost {
            position: normalize_with(&ghost.position, &ghost.selected_text, &self.heuristics),
            ghost,
        });
        committed.chain(ghost).collect()
    }
}

fn log_failure(action: &str, result: Result<(), AnnotationError>) {
    if let Err(e) = result {
        error!("Failed to {action}: {e}");
    }
}
