use std::cmp::Ordering;

use crate::highlight::{Highlight, Note};

/// Renders a document's highlights and notes as Markdown, page by page
pub struct HighlightsExporter<'a> {
    document_title: &'a str,
    highlights: &'a [Highlight],
    notes: &'a [Note],
}

impl<'a> HighlightsExporter<'a> {
    pub fn new(document_title: &'a str, highlights: &'a [Highlight], notes: &'a [Note]) -> Self {
        Self {
            document_title,
            highlights,
            notes,
        }
    }

    pub fn generate_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("# {}\n\n", self.document_title));

        // Reading order: page, then top to bottom, then left to right
        let mut sorted: Vec<&Highlight> = self.highlights.iter().collect();
        sorted.sort_by(|a, b| {
            let (ra, rb) = (&a.position.bounding_rect, &b.position.bounding_rect);
            a.page_number()
                .cmp(&b.page_number())
                .then(ra.top.partial_cmp(&rb.top).unwrap_or(Ordering::Equal))
                .then(ra.left.partial_cmp(&rb.left).unwrap_or(Ordering::Equal))
                .then(a.created_at.cmp(&b.created_at))
        });

        let mut last_page: Option<usize> = None;

        for highlight in sorted {
            if last_page != Some(highlight.page_number()) {
                output.push_str(&format!("## Page {}\n\n", highlight.page_number()));
                last_page = Some(highlight.page_number());
            }

            for line in highlight.selected_text.lines() {
                output.push_str("> ");
                output.push_str(line);
                output.push('\n');
            }
            output.push('\n');
            output.push_str(&format!("*{}*\n\n", highlight.color.label()));

            for note in self
                .notes
                .iter()
                .filter(|n| n.highlight_id == Some(highlight.id))
            {
                Self::push_note(note, &mut output);
            }
            output.push_str("---\n\n");
        }

        let general: Vec<&Note> = self
            .notes
            .iter()
            .filter(|n| n.highlight_id.is_none())
            .collect();
        if !general.is_empty() {
            output.push_str("## Notes\n\n");
            for note in general {
                Self::push_note(note, &mut output);
            }
        }

        output
    }

    pub fn generate_filename(document_title: &str) -> String {
        let kebab_title: String = document_title
            .chars()
            .map(|c| {
                if c.is_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");

        if kebab_title.is_empty() {
            "highlights.md".to_string()
        } else {
            format!("{kebab_title}_highlights.md")
        }
    }

    fn push_note(note: &Note, output: &mut String) {
        let text = note.text();
        if text.trim().is_empty() {
            return;
        }
        output.push_str(&text);
        output.push('\n');
        let timestamp = note.updated_at.format("%m-%d-%Y %H:%M");
        output.push_str(&format!("*// {timestamp}*\n\n"));
    }
}
