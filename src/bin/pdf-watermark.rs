//! PDF Watermark CLI tool
//!
//! A command-line tool for stamping diagonal text watermarks onto PDFs.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::glob;
use lopdf::Document;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pdf_watermark::pdf::{
    apply_watermark, extract_metadata, plan_pages, watermarked_path, FontFile, Logo, StampOptions,
    WatermarkFont,
};
use pdf_watermark::style::{resolve_style, RawStyle};

/// PDF Watermark - Stamp a diagonal text watermark onto every page
#[derive(Parser)]
#[command(name = "pdf-watermark")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Watermark a PDF (writes reportw.pdf next to it)
    pdf-watermark stamp report.pdf --text CONFIDENTIAL

    # Red, more opaque watermark with a footer logo
    pdf-watermark stamp report.pdf -o out.pdf --color \"#C00000\" --opacity 0.5 --logo logo.png

    # Watermark every PDF in a folder
    pdf-watermark stamp \"drafts/*.pdf\" --text DRAFT

    # Draw the watermark in an embedded TrueType font
    pdf-watermark stamp report.pdf --text DRAFT --font DejaVuSans.ttf

    # Show the computed layout without writing anything
    pdf-watermark plan report.pdf --text CONFIDENTIAL")]
struct Cli {
    /// Increase log detail (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Watermark style. Malformed values fall back to defaults instead of failing.
#[derive(Args, Debug, Clone, Default)]
struct StyleArgs {
    /// Watermark text [default: WATERMARK]
    #[arg(long)]
    text: Option<String>,

    /// Text opacity, 0.0-1.0 [default: 0.3]
    #[arg(long)]
    opacity: Option<String>,

    /// Hex color, e.g. "#808080" [default: mid-gray]
    #[arg(long)]
    color: Option<String>,

    /// Requested font size (accepted but not applied; size follows the page diagonal)
    #[arg(long)]
    font_size: Option<String>,

    /// Requested rotation (accepted but not applied; rotation is always 45°)
    #[arg(long, allow_hyphen_values = true)]
    rotation: Option<String>,

    /// Watermark position (only "center" is available)
    #[arg(long)]
    position: Option<String>,

    /// Logo opacity, 0.0-1.0 [default: 1.0]
    #[arg(long)]
    logo_opacity: Option<String>,

    /// TrueType font to draw the watermark with, embedded into the output [default: Helvetica]
    #[arg(long)]
    font: Option<PathBuf>,
}

impl StyleArgs {
    fn to_raw(&self) -> RawStyle {
        RawStyle {
            watermark_text: self.text.clone(),
            opacity: self.opacity.clone(),
            font_size: self.font_size.clone(),
            rotation: self.rotation.clone(),
            color: self.color.clone(),
            position: self.position.clone(),
            logo_opacity: self.logo_opacity.clone(),
        }
    }

    fn load_font(&self) -> Result<WatermarkFont> {
        match self.font.as_deref() {
            Some(path) => {
                let file = FontFile::load(path)
                    .with_context(|| format!("Failed to load font {}", path.display()))?;
                Ok(WatermarkFont::TrueType(file))
            }
            None => Ok(WatermarkFont::Helvetica),
        }
    }

    /// Tell the user about inputs that are accepted but have no effect
    fn warn_ignored(&self) {
        if self.font_size.is_some() {
            warn!("--font-size is ignored: the font size is derived from each page's diagonal");
        }
        if self.rotation.is_some() {
            warn!("--rotation is ignored: the watermark is always rotated 45°");
        }
        if let Some(position) = self.position.as_deref() {
            if !position.trim().eq_ignore_ascii_case("center") {
                warn!("--position '{}' is not available, using center", position);
            }
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add the watermark to one or more PDF files
    Stamp {
        /// Input PDF files. Supports glob patterns like "*.pdf"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output PDF file path (single input only) [default: <input>w.pdf]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Footer logo image (PNG or JPEG)
        #[arg(long)]
        logo: Option<PathBuf>,

        #[command(flatten)]
        style: StyleArgs,

        /// Open the output file after creation
        #[arg(long)]
        open: bool,
    },

    /// Print the computed watermark layout for each page
    Plan {
        /// Input PDF file
        input: PathBuf,

        #[command(flatten)]
        style: StyleArgs,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Stamp { inputs, output, logo, style, open } => {
            cmd_stamp(inputs, output, logo, style, open)
        }
        Commands::Plan { input, style } => cmd_plan(input, style),
        Commands::Info { input } => cmd_info(input),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Log to stderr; RUST_LOG overrides the verbosity flag
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Expand glob patterns in input paths
fn expand_globs(patterns: Vec<String>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for pattern in patterns {
        // Check if pattern contains glob characters
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matched = false;
            for entry in glob(&pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))? {
                match entry {
                    Ok(path) => {
                        paths.push(path);
                        matched = true;
                    }
                    Err(e) => warn!("glob error for {}: {}", pattern, e),
                }
            }
            if !matched {
                bail!("No files matched pattern: {}", pattern);
            }
        } else {
            // No glob characters, treat as literal path
            paths.push(PathBuf::from(pattern));
        }
    }

    // Sort paths for consistent ordering
    paths.sort();
    paths.dedup();

    Ok(paths)
}

/// Open a file with the system default application
fn open_file(path: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(path).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

/// Watermark one or more PDFs
fn cmd_stamp(
    inputs: Vec<String>,
    output: Option<PathBuf>,
    logo: Option<PathBuf>,
    style: StyleArgs,
    open: bool,
) -> Result<()> {
    let inputs = expand_globs(inputs)?;

    if output.is_some() && inputs.len() > 1 {
        bail!("--output can only be used with a single input ({} given)", inputs.len());
    }

    style.warn_ignored();

    let logo = logo
        .as_deref()
        .map(Logo::load)
        .transpose()
        .context("Failed to load logo")?;

    let options = StampOptions {
        style: resolve_style(&style.to_raw()),
        logo,
        font: style.load_font()?,
        ..Default::default()
    };

    for input in &inputs {
        let output_path = output.clone().unwrap_or_else(|| watermarked_path(input));
        info!("Watermarking {}...", input.display());

        let report = apply_watermark(input, &output_path, &options)
            .with_context(|| format!("Failed to watermark {}", input.display()))?;

        info!("Output: {} ({} pages)", output_path.display(), report.pages.len());

        if open {
            open_file(&output_path)?;
        }
    }

    Ok(())
}

/// Print the layout each page would get
fn cmd_plan(input: PathBuf, style: StyleArgs) -> Result<()> {
    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }

    style.warn_ignored();

    let options = StampOptions {
        style: resolve_style(&style.to_raw()),
        font: style.load_font()?,
        ..Default::default()
    };

    let doc = Document::load(&input).with_context(|| format!("Failed to read {}", input.display()))?;

    println!("File: {}", input.display());
    println!("Text: {:?}", options.style.text);
    println!("Font: {}", options.font.name());
    for page in plan_pages(&doc, &options)? {
        let anchor = page.placement.layers[0];
        println!(
            "Page {:>3}: {:>7.1} x {:<7.1} font {:>6.2}pt  rotate {}°  anchor ({:.2}, {:.2})",
            page.page_number,
            page.geometry.width,
            page.geometry.height,
            page.placement.font_size,
            page.placement.rotation_degrees,
            anchor.x,
            anchor.y
        );
    }

    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: PathBuf) -> Result<()> {
    let metadata = extract_metadata(&input)?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);

    if let Some(title) = metadata.title {
        println!("Title: {}", title);
    }
    if let Some(author) = metadata.author {
        println!("Author: {}", author);
    }

    for (i, size) in metadata.page_sizes.iter().enumerate() {
        println!("  Page {}: {:.1} x {:.1} pt", i + 1, size.width, size.height);
    }

    Ok(())
}
