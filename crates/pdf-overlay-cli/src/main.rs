//! PDF Overlay CLI - Command line driver for the pdf-overlay session.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_overlay_core::util::ceil_to_pixels;
use pdf_overlay_core::{Matrix, RichTextOverlay, SavedDocument, Session, SessionConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "pdf-overlay")]
#[command(author, version, about = "Inspect, render and edit PDF documents", long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, global = true, env = "PDF_OVERLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show page count and page sizes
    Info {
        /// Input PDF file
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a page to PNG
    Render {
        /// Input PDF file
        input: PathBuf,

        /// Page number (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Pixels per point
        #[arg(short, long, default_value_t = 1.0)]
        scale: f32,

        /// Output PNG file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Place the first page of another PDF on a page, tagged as rich text
    Overlay {
        /// Input PDF file
        input: PathBuf,

        /// Target page number (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// PDF holding the rendered rich text
        #[arg(long)]
        source: PathBuf,

        /// Distance from the left edge, in points
        #[arg(long, default_value_t = 0.0)]
        left: f32,

        /// Vertical position of the overlay's bottom edge, from the top, in points
        #[arg(long, default_value_t = 0.0)]
        bottom: f32,

        /// HTML payload stored on the overlay
        #[arg(long)]
        html: String,

        /// Layout width stored on the overlay (omitted when 0)
        #[arg(long, default_value_t = 0)]
        width: i32,

        /// Output PDF file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Remove objects from the end of a page until at most TARGET remain
    Reduce {
        /// Input PDF file
        input: PathBuf,

        /// Page number (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Number of objects to keep
        #[arg(short, long)]
        target: i32,

        /// Output PDF file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Open and save a document, dropping security restrictions
    Resave {
        /// Input PDF file
        input: PathBuf,

        /// Output PDF file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct DocumentInfo {
    pages: usize,
    sizes: Vec<PageInfo>,
}

#[derive(Debug, Serialize)]
struct PageInfo {
    page: usize,
    width: f32,
    height: f32,
    objects: usize,
}

/// Convert a 1-based CLI page number to the session's 0-based index.
fn page_index(page: u32) -> Result<i32> {
    anyhow::ensure!(page > 0, "Page numbers start at 1");
    i32::try_from(page - 1).context("Page number too large")
}

fn open(config: &SessionConfig, input: &Path) -> Result<Session> {
    info!("Loading PDF: {}", input.display());
    let bytes = std::fs::read(input).context(format!("Failed to read {}", input.display()))?;

    let mut session = Session::with_config(config.clone());
    session
        .open_document(&bytes)
        .context(format!("Failed to load PDF: {}", input.display()))?;

    info!("Document has {} pages", session.page_count());
    Ok(session)
}

fn save(session: &mut Session, output: &Path) -> Result<SavedDocument> {
    let saved = session.save_document().context("Failed to save PDF")?;
    saved
        .write_to(output)
        .context(format!("Failed to write output: {}", output.display()))?;
    Ok(saved)
}

fn info(config: &SessionConfig, input: &Path, json: bool) -> Result<()> {
    let mut session = open(config, input)?;

    let mut sizes = Vec::with_capacity(session.page_count());
    for index in 0..session.page_count() {
        let page_num = i32::try_from(index).context("Too many pages")?;
        let size = session
            .page_size(page_num)
            .context(format!("Failed to load page {}", index + 1))?;
        let objects = session.count_page_objects(page_num)?;
        sizes.push(PageInfo {
            page: index + 1,
            width: size.width,
            height: size.height,
            objects,
        });
    }
    let doc_info = DocumentInfo {
        pages: session.page_count(),
        sizes,
    };

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        if json {
            println!("{}", serde_json::to_string_pretty(&doc_info)?);
        } else {
            println!("Pages: {}", doc_info.pages);
            for page in &doc_info.sizes {
                println!(
                    "  {:>4}: {:.2} x {:.2} pt, {} objects",
                    page.page, page.width, page.height, page.objects
                );
            }
        }
    }

    Ok(())
}

fn render(config: &SessionConfig, input: &Path, page: u32, scale: f32, output: &Path) -> Result<()> {
    anyhow::ensure!(scale > 0.0, "Scale must be positive");
    let page_num = page_index(page)?;
    let mut session = open(config, input)?;

    let size = session
        .page_size(page_num)
        .context(format!("Failed to load page {page}"))?;
    let width = i32::try_from(ceil_to_pixels(size.width * scale)).context("Output too wide")?;
    let height = i32::try_from(ceil_to_pixels(size.height * scale)).context("Output too tall")?;

    let buffer = session
        .render_page(page_num, width, height, &Matrix::scale(scale, scale))
        .context(format!("Failed to render page {page}"))?;
    let png = buffer.encode_png()?;
    session.release_buffer(buffer);

    std::fs::write(output, png).context(format!("Failed to write output: {}", output.display()))?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("Rendered page {} ({}x{}) to: {}", page, width, height, output.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let config = if let Some(config_path) = &args.config {
        SessionConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        SessionConfig::load()
    };

    match args.command {
        Command::Info { input, json } => info(&config, &input, json),
        Command::Render {
            input,
            page,
            scale,
            output,
        } => render(&config, &input, page, scale, &output),
        Command::Overlay {
            input,
            page,
            source,
            left,
            bottom,
            html,
            width,
            output,
        } => {
            let page_num = page_index(page)?;
            let source_bytes =
                std::fs::read(&source).context(format!("Failed to read {}", source.display()))?;
            let mut session = open(&config, &input)?;

            let overlay = RichTextOverlay {
                source: &source_bytes,
                left,
                bottom,
                html: &html,
                width,
            };
            session
                .overlay_rich_text(page_num, &overlay)
                .context(format!("Failed to overlay page {page}"))?;
            let saved = save(&mut session, &output)?;

            // CLI output is intentional
            #[allow(clippy::print_stdout)]
            {
                println!("Overlaid PDF ({} bytes) saved to: {}", saved.len(), output.display());
            }
            Ok(())
        }
        Command::Reduce {
            input,
            page,
            target,
            output,
        } => {
            let page_num = page_index(page)?;
            let mut session = open(&config, &input)?;

            let before = session.count_page_objects(page_num)?;
            session
                .reduce_page_objects(page_num, target)
                .context(format!("Failed to reduce page {page}"))?;
            let after = session.count_page_objects(page_num)?;
            save(&mut session, &output)?;

            // CLI output is intentional
            #[allow(clippy::print_stdout)]
            {
                println!(
                    "Page {}: {} -> {} objects, saved to: {}",
                    page,
                    before,
                    after,
                    output.display()
                );
            }
            Ok(())
        }
        Command::Resave { input, output } => {
            let mut session = open(&config, &input)?;
            let saved = save(&mut session, &output)?;

            // CLI output is intentional
            #[allow(clippy::print_stdout)]
            {
                println!("Saved {} bytes to: {}", saved.len(), output.display());
            }
            Ok(())
        }
    }
}
