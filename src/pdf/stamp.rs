//! Watermark stamping onto existing PDF pages using lopdf
//!
//! Every page gets the same three-layer diagonal text watermark, sized to
//! that page, and optionally the footer logo. The existing page content is
//! wrapped in `q`/`Q` so any transformation it leaves behind cannot shift
//! the watermark, and the watermark stream is appended after it so it
//! draws on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, info};
use crate::error::{Error, Result};
use crate::layout::{
    DrawInstruction, LayoutEngine, LogoPlacement, PageGeometry, TextDraw, WatermarkPlacement,
};
use crate::pdf::font::{drawable_text, embed_font, win_ansi_code, WatermarkFont};
use crate::pdf::logo::{embed_logo, Logo};
use crate::pdf::metadata::{inherited_attribute, page_geometries};
use crate::style::StyleConfig;

/// Resource name prefixes; a numeric suffix is added on collision
const FONT_RESOURCE: &str = "WmFont";
const STATE_RESOURCE: &str = "WmGS";
const LOGO_RESOURCE: &str = "WmLogo";

/// Options for stamping a PDF
#[derive(Debug, Clone, Default)]
pub struct StampOptions {
    /// Resolved watermark style
    pub style: StyleConfig,
    /// Optional footer logo
    pub logo: Option<Logo>,
    /// Font the text is measured and drawn with
    pub font: WatermarkFont,
    /// Sizing and placement policy
    pub engine: LayoutEngine,
}

/// Watermark layout chosen for one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageStamp {
    /// 1-based page number
    pub page_number: usize,
    pub geometry: PageGeometry,
    pub placement: WatermarkPlacement,
}

/// Summary of a stamping run
#[derive(Debug, Clone, PartialEq)]
pub struct StampReport {
    pub pages: Vec<PageStamp>,
    /// Logo placement shared by every page, if a logo was supplied
    pub logo: Option<LogoPlacement>,
}

/// Add the watermark to every page of a PDF file
///
/// # Example
///
/// ```no_run
/// use pdf_watermark::pdf::{apply_watermark, StampOptions};
/// use pdf_watermark::style::{resolve_style, RawStyle};
/// use std::path::Path;
///
/// let raw = RawStyle {
///     watermark_text: Some("CONFIDENTIAL".to_string()),
///     color: Some("#C00000".to_string()),
///     ..Default::default()
/// };
/// let options = StampOptions {
///     style: resolve_style(&raw),
///     ..Default::default()
/// };
///
/// apply_watermark(Path::new("input.pdf"), Path::new("inputw.pdf"), &options)
///     .expect("Failed to watermark PDF");
/// ```
pub fn apply_watermark(input_path: &Path, output_path: &Path, options: &StampOptions) -> Result<StampReport> {
    if !input_path.exists() {
        return Err(Error::FileNotFound(input_path.to_path_buf()));
    }

    let mut doc = Document::load(input_path)?;
    if doc.get_pages().is_empty() {
        return Err(Error::EmptyPdf(input_path.to_path_buf()));
    }

    let report = stamp_document(&mut doc, options)?;

    doc.compress();
    doc.save(output_path)?;

    info!(
        "Watermarked {} pages: {} -> {}",
        report.pages.len(),
        input_path.display(),
        output_path.display()
    );

    Ok(report)
}

/// Compute the watermark layout of every page without modifying the document
pub fn plan_pages(doc: &Document, options: &StampOptions) -> Result<Vec<PageStamp>> {
    let metrics = options.font.metrics()?;
    let style = drawable_style(&options.style);

    Ok(page_geometries(doc)
        .into_iter()
        .enumerate()
        .map(|(i, (_, geometry))| PageStamp {
            page_number: i + 1,
            geometry,
            placement: options.engine.compute_placement(&geometry, &style, &*metrics),
        })
        .collect())
}

/// Add the watermark to every page of an in-memory document
pub fn stamp_document(doc: &mut Document, options: &StampOptions) -> Result<StampReport> {
    let pages = page_geometries(doc);
    if pages.is_empty() {
        return Err(Error::General("Document has no pages".to_string()));
    }

    // Shared by every page: one metrics source, one font, one logo image,
    // and the q/Q streams that isolate the original content.
    let metrics = options.font.metrics()?;
    let style = drawable_style(&options.style);
    let font_id = embed_font(doc, &options.font)?;
    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let close_id = doc.add_object(Stream::new(Dictionary::new(), b"Q\n".to_vec()));

    let (logo_id, logo_placement) = match &options.logo {
        Some(logo) => {
            let embedded = embed_logo(doc, logo)?;
            let placement = LogoPlacement::footer(embedded.width, embedded.height, options.style.logo_opacity);
            (Some(embedded.id), Some(placement))
        }
        None => (None, None),
    };

    let mut states = GraphicsStates::default();
    let mut stamps = Vec::with_capacity(pages.len());

    for (i, (page_id, geometry)) in pages.into_iter().enumerate() {
        let page_number = i + 1;
        let placement = options.engine.compute_placement(&geometry, &style, &*metrics);
        let instructions = options.engine.instructions(&placement, &style, logo_placement.as_ref());

        // Register everything this page's content refers to
        let mut resources = page_resources(doc, page_id);
        let font_name = insert_resource(doc, &mut resources, "Font", FONT_RESOURCE, font_id);
        let logo_name = logo_id.map(|id| insert_resource(doc, &mut resources, "XObject", LOGO_RESOURCE, id));

        let mut state_names: HashMap<ObjectId, String> = HashMap::new();
        let mut state_ids = Vec::with_capacity(instructions.len());
        for instruction in &instructions {
            let state_id = states.get_or_create(doc, instruction_opacity(instruction));
            if !state_names.contains_key(&state_id) {
                let name = insert_resource(doc, &mut resources, "ExtGState", STATE_RESOURCE, state_id);
                state_names.insert(state_id, name);
            }
            state_ids.push(state_id);
        }

        set_page_resources(doc, page_id, resources)?;

        let mut operations = Vec::new();
        for (instruction, state_id) in instructions.iter().zip(&state_ids) {
            let state_name = &state_names[state_id];
            match instruction {
                DrawInstruction::Text(text) => {
                    operations.extend(text_operations(text, &font_name, state_name));
                }
                DrawInstruction::Image(logo) => {
                    if let Some(ref name) = logo_name {
                        operations.extend(image_operations(logo, name, state_name));
                    }
                }
            }
        }

        let content = Content { operations }.encode()?;
        let watermark_id = doc.add_object(Stream::new(Dictionary::new(), content));
        wrap_page_contents(doc, page_id, open_id, close_id, watermark_id)?;

        debug!(
            "Page {} ({}x{}): font size {:.2}, anchor ({:.2}, {:.2})",
            page_number,
            geometry.width,
            geometry.height,
            placement.font_size,
            placement.layers[0].x,
            placement.layers[0].y
        );

        stamps.push(PageStamp {
            page_number,
            geometry,
            placement,
        });
    }

    Ok(StampReport {
        pages: stamps,
        logo: logo_placement,
    })
}

/// Default output name: the input name with `w` appended to its stem
///
/// `report.pdf` becomes `reportw.pdf`, next to the input.
pub fn watermarked_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file_name = match input.extension() {
        Some(ext) => format!("{}w.{}", stem, ext.to_string_lossy()),
        None => format!("{}w", stem),
    };

    input.with_file_name(file_name)
}

fn instruction_opacity(instruction: &DrawInstruction) -> f64 {
    match instruction {
        DrawInstruction::Text(text) => text.opacity,
        DrawInstruction::Image(logo) => logo.opacity,
    }
}

/// One ExtGState object per distinct opacity, shared across pages
#[derive(Default)]
struct GraphicsStates {
    by_opacity: HashMap<u64, ObjectId>,
}

impl GraphicsStates {
    fn get_or_create(&mut self, doc: &mut Document, opacity: f64) -> ObjectId {
        *self.by_opacity.entry(opacity.to_bits()).or_insert_with(|| {
            let mut state = Dictionary::new();
            state.set("Type", Object::Name(b"ExtGState".to_vec()));
            state.set("ca", Object::Real(opacity as f32));
            state.set("CA", Object::Real(opacity as f32));
            doc.add_object(Object::Dictionary(state))
        })
    }
}

/// The style with its text reduced to what the font encoding can draw,
/// so layout measures the same string that ends up on the page
fn drawable_style(style: &StyleConfig) -> StyleConfig {
    StyleConfig {
        text: drawable_text(&style.text),
        ..style.clone()
    }
}

/// Encode text for a WinAnsi simple font
///
/// Latin-1 characters map to their own byte; anything else becomes `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(|ch| win_ansi_code(ch).unwrap_or(b'?')).collect()
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// `q /GS gs r g b rg BT /F size Tf cos sin -sin cos x y Tm (text) Tj ET Q`
fn text_operations(text: &TextDraw, font_name: &str, state_name: &str) -> Vec<Operation> {
    let (sin, cos) = text.rotation_degrees.to_radians().sin_cos();

    vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(state_name.as_bytes().to_vec())]),
        Operation::new("rg", vec![real(text.color.r), real(text.color.g), real(text.color.b)]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font_name.as_bytes().to_vec()), real(text.font_size)],
        ),
        Operation::new(
            "Tm",
            vec![real(cos), real(sin), real(-sin), real(cos), real(text.x), real(text.y)],
        ),
        Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(&text.text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// `q /GS gs w 0 0 h x y cm /Logo Do Q`
fn image_operations(logo: &LogoPlacement, image_name: &str, state_name: &str) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(state_name.as_bytes().to_vec())]),
        Operation::new(
            "cm",
            vec![
                real(logo.width),
                real(0.0),
                real(0.0),
                real(logo.height),
                real(logo.x),
                real(logo.y),
            ],
        ),
        Operation::new("Do", vec![Object::Name(image_name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

/// A page's own resources, or a copy of the inherited ones
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    }
}

/// Add `id` under `category` with a name not already in use; returns the name
fn insert_resource(doc: &Document, resources: &mut Dictionary, category: &str, base: &str, id: ObjectId) -> String {
    let mut entries = match resources.get(category.as_bytes()) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(ref_id)) => match doc.get_object(*ref_id) {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        },
        _ => Dictionary::new(),
    };

    // Reuse the name if this object is already registered on the page
    let existing = entries.iter().find_map(|(key, value)| match value {
        Object::Reference(r) if *r == id => Some(String::from_utf8_lossy(key).into_owned()),
        _ => None,
    });

    let name = existing.unwrap_or_else(|| {
        let mut candidate = base.to_string();
        let mut suffix = 1;
        while entries.has(candidate.as_bytes()) {
            candidate = format!("{}{}", base, suffix);
            suffix += 1;
        }
        candidate
    });

    entries.set(name.clone(), Object::Reference(id));
    resources.set(category, Object::Dictionary(entries));
    name
}

/// Store the resources directly on the page
///
/// The page gets its own copy so shared or inherited resource
/// dictionaries of other pages are left untouched.
fn set_page_resources(doc: &mut Document, page_id: ObjectId, resources: Dictionary) -> Result<()> {
    let page_obj = doc.get_object_mut(page_id)?;

    if let Object::Dictionary(ref mut page_dict) = page_obj {
        page_dict.set("Resources", Object::Dictionary(resources));
    }

    Ok(())
}

/// Surround the page's content with `q`/`Q` and append the watermark
fn wrap_page_contents(
    doc: &mut Document,
    page_id: ObjectId,
    open_id: ObjectId,
    close_id: ObjectId,
    watermark_id: ObjectId,
) -> Result<()> {
    let existing: Vec<Object> = {
        let page_dict = doc.get_dictionary(page_id)?;
        match page_dict.get(b"Contents") {
            Ok(Object::Reference(content_id)) => match doc.get_object(*content_id) {
                // An indirect array of streams
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*content_id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    };

    let mut contents = Vec::with_capacity(existing.len() + 3);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(close_id));
    contents.push(Object::Reference(watermark_id));

    let page_obj = doc.get_object_mut(page_id)?;
    if let Object::Dictionary(ref mut page_dict) = page_obj {
        page_dict.set("Contents", Object::Array(contents));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;

    #[test]
    fn test_watermarked_path_appends_w() {
        assert_eq!(
            watermarked_path(Path::new("docs/report.pdf")),
            PathBuf::from("docs/reportw.pdf")
        );
        assert_eq!(
            watermarked_path(Path::new("my.final.report.PDF")),
            PathBuf::from("my.final.reportw.PDF")
        );
        assert_eq!(watermarked_path(Path::new("report")), PathBuf::from("reportw"));
    }

    #[test]
    fn test_encode_win_ansi() {
        assert_eq!(encode_win_ansi("A (b)"), b"A (b)".to_vec());
        assert_eq!(encode_win_ansi("café"), vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
    }

    #[test]
    fn test_unencodable_text_is_measured_as_drawn() {
        let style = StyleConfig {
            text: "Δraft".to_string(),
            ..Default::default()
        };
        assert_eq!(drawable_style(&style).text, "?raft");
        assert_eq!(drawable_style(&style).opacity, style.opacity);
    }

    #[test]
    fn test_text_operations_rotate_and_position() {
        let draw = TextDraw {
            text: "DRAFT".to_string(),
            x: 100.0,
            y: 200.0,
            font_size: 48.0,
            rotation_degrees: 45.0,
            color: Color::rgb(1.0, 0.0, 0.0),
            opacity: 0.3,
        };
        let ops = text_operations(&draw, "WmFont", "WmGS");
        let operators: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(operators, ["q", "gs", "rg", "BT", "Tf", "Tm", "Tj", "ET", "Q"]);

        let tm = &ops[5].operands;
        let value = |i: usize| tm[i].as_float().unwrap();
        assert!((value(0) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
        assert!((value(1) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
        assert!((value(2) + std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
        assert_eq!(value(4), 100.0);
        assert_eq!(value(5), 200.0);
    }

    #[test]
    fn test_insert_resource_avoids_name_collisions() {
        let mut doc = Document::with_version("1.5");
        let existing = doc.add_object(Object::Null);
        let ours = doc.add_object(Object::Null);

        let mut fonts = Dictionary::new();
        fonts.set("WmFont", Object::Reference(existing));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let name = insert_resource(&doc, &mut resources, "Font", FONT_RESOURCE, ours);
        assert_eq!(name, "WmFont1");

        // Registering the same object again reuses its name
        let again = insert_resource(&doc, &mut resources, "Font", FONT_RESOURCE, ours);
        assert_eq!(again, "WmFont1");

        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert_eq!(fonts.len(), 2);
    }

    #[test]
    fn test_graphics_states_are_shared_by_opacity() {
        let mut doc = Document::with_version("1.5");
        let mut states = GraphicsStates::default();

        let a = states.get_or_create(&mut doc, 0.3);
        let b = states.get_or_create(&mut doc, 0.3 * 0.8);
        let c = states.get_or_create(&mut doc, 0.3 * 0.8);

        assert_ne!(a, b);
        assert_eq!(b, c);
        let state = doc.get_dictionary(a).unwrap();
        assert!((state.get(b"ca").unwrap().as_float().unwrap() - 0.3).abs() < 1e-6);
    }
}
