use std::fs::{self, File};
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use scholia::engine::ScaleValue;
use scholia::export::HighlightsExporter;
use scholia::geometry::ScaledPosition;
use scholia::normalize::normalize_with;
use scholia::persistence::{AnnotationSink, YamlAnnotationFile};
use scholia::reader_state::ReaderState;
use scholia::settings;

#[derive(Parser)]
#[command(name = "scholia")]
#[command(about = "Inspect and repair stored document highlights")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding annotations, overrides the settings file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    #[arg(long, global = true, default_value = "scholia.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Correct column bleed and merged lines in a highlight position
    Normalize {
        /// JSON file with a position, `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// The highlighted text
        #[arg(short, long)]
        text: String,
    },

    /// Print the highlights stored for a document
    List { document_id: String },

    /// Write a document's highlights and notes as Markdown
    Export {
        document_id: String,

        /// Heading of the export, defaults to the document id
        #[arg(long)]
        title: Option<String>,

        /// Output file, defaults to a name derived from the title
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    WriteLogger::init(
        cli.log_level,
        Config::default(),
        File::create(&cli.log_file).context("Failed to create log file")?,
    )?;
    info!("Starting scholia");

    match &cli.config {
        Some(path) => settings::load_settings_from_path(path),
        None => settings::load_settings(),
    }
    debug!("Settings: {:?}", settings::get_settings());

    match cli.command {
        Commands::Normalize { input, text } => normalize_command(&input, &text),
        Commands::List { document_id } => list_command(cli.data_dir, &document_id),
        Commands::Export {
            document_id,
            title,
            output,
        } => export_command(cli.data_dir, &document_id, title, output),
    }
}

fn normalize_command(input: &str, text: &str) -> Result<()> {
    let json = if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read position from stdin")?;
        buffer
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))?
    };

    let position: ScaledPosition =
        serde_json::from_str(&json).context("Failed to parse position JSON")?;
    let normalized = normalize_with(&position, text, &settings::get_heuristics());
    println!("{}", serde_json::to_string_pretty(&normalized)?);
    Ok(())
}

fn open_annotations(data_dir: Option<PathBuf>, document_id: &str) -> Result<YamlAnnotationFile> {
    let dir = match data_dir {
        Some(dir) => dir.join("annotations"),
        None => settings::annotations_dir()?,
    };
    YamlAnnotationFile::open(&dir, document_id)
        .with_context(|| format!("Failed to open annotations of {document_id}"))
}

fn list_command(data_dir: Option<PathBuf>, document_id: &str) -> Result<()> {
    let state_path = match &data_dir {
        Some(dir) => dir.join("reader_state.json"),
        None => settings::reader_state_path()?,
    };
    let mut file = open_annotations(data_dir, document_id)?;
    let annotations = file.load()?;

    let state = ReaderState::load_or_ephemeral(state_path.to_str());
    if let Some(position) = state.get(document_id) {
        let zoom = match position.zoom {
            Some(ScaleValue::Scale(scale)) => format!("{:.0}%", scale * 100.0),
            Some(ScaleValue::PageWidth) | None => "page width".to_string(),
        };
        println!(
            "Last read {} at offset {:.0}px, zoom {zoom}",
            position.updated_at.format("%Y-%m-%d %H:%M"),
            position.scroll_offset
        );
    }

    if annotations.highlights.is_empty() {
        println!("No highlights for {document_id}");
        return Ok(());
    }

    for highlight in &annotations.highlights {
        let notes = annotations
            .notes
            .iter()
            .filter(|n| n.highlight_id == Some(highlight.id))
            .count();
        println!(
            "p.{:<4} {:<10} {:<6} {} ({} notes)",
            highlight.page_number(),
            highlight.color.label(),
            highlight.position.rects.len(),
            highlight.selected_text,
            notes
        );
    }
    Ok(())
}

fn export_command(
    data_dir: Option<PathBuf>,
    document_id: &str,
    title: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut file = open_annotations(data_dir, document_id)?;
    let annotations = file.load()?;
    let title = title.unwrap_or_else(|| document_id.to_string());

    let markdown =
        HighlightsExporter::new(&title, &annotations.highlights, &annotations.notes).generate_markdown();
    let output =
        output.unwrap_or_else(|| PathBuf::from(HighlightsExporter::generate_filename(&title)));
    fs::write(&output, markdown).with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Exported {} highlights to {}", annotations.highlights.len(), output.display());
    println!("{}", output.display());
    Ok(())
}
