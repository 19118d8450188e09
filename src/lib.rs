pub mod engine;
pub mod export;
pub mod geometry;
pub mod highlight;
pub mod interaction;
pub mod normalize;
pub mod overlay;
pub mod persistence;
pub mod reader;
pub mod reader_state;
pub mod selection;
pub mod settings;
pub mod viewport;
pub mod zoom;

pub mod test_utils;

// Re-export the session and its most used companions
pub use highlight::{Highlight, HighlightColor, HighlightId, HighlightStore};
pub use reader::{DocumentSession, SessionConfig};
