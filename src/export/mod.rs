pub mod highlights_exporter;

pub use highlights_exporter::HighlightsExporter;
