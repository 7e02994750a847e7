//! Watermark geometry and placement
//!
//! For each page the engine derives a font size that makes the watermark
//! span a fixed share of the page's usable diagonal, rotates it by a fixed
//! angle, centers it on the page, and emits three slightly offset text
//! layers. The coordinate system has its origin at the bottom-left of the
//! page, in points.

use tracing::trace;

use crate::metrics::TextMetrics;
use crate::style::{Color, StyleConfig};

/// Points per millimeter
const PT_PER_MM: f64 = 72.0 / 25.4;

/// Logo scale relative to its natural pixel size
pub const LOGO_SCALE: f64 = 0.15;

/// Logo distance from the left and bottom page edges, in points
pub const LOGO_MARGIN: f64 = 20.0;

/// Page size in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Create a page size from millimeters
    pub fn from_mm(width_mm: f64, height_mm: f64) -> Self {
        Self::new(width_mm * PT_PER_MM, height_mm * PT_PER_MM)
    }

    /// US Letter size (8.5" × 11")
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    /// A4 size (210mm × 297mm)
    pub fn a4() -> Self {
        Self::from_mm(210.0, 297.0)
    }

    /// Center of the page
    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

/// The part of a page the watermark is sized against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsableArea {
    /// Margin on the left and right edges
    pub margin_x: f64,
    /// Margin on the top and bottom edges
    pub margin_y: f64,
    pub width: f64,
    pub height: f64,
}

impl UsableArea {
    /// Euclidean diagonal of the usable rectangle
    pub fn diagonal(&self) -> f64 {
        (self.width * self.width + self.height * self.height).sqrt()
    }
}

/// One copy of the watermark text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLayer {
    /// Anchor x (bottom-left of the unrotated text)
    pub x: f64,
    /// Anchor y (bottom-left of the unrotated text)
    pub y: f64,
    pub opacity: f64,
}

/// Watermark layout for a single page
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkPlacement {
    pub font_size: f64,
    pub rotation_degrees: f64,
    /// Text width at `font_size`
    pub text_width: f64,
    /// Text height (ascent + descent) at `font_size`
    pub text_height: f64,
    /// Exact anchor first, then the two offset echoes
    pub layers: [TextLayer; 3],
}

/// Footer logo placement, shared by every page of a document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogoPlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub opacity: f64,
}

impl LogoPlacement {
    /// Place a logo in the bottom-left footer
    ///
    /// Both dimensions are scaled by [`LOGO_SCALE`], so the aspect ratio is
    /// kept and large images stay large. The anchor does not depend on the
    /// page size.
    pub fn footer(natural_width: f64, natural_height: f64, opacity: f64) -> Self {
        Self {
            x: LOGO_MARGIN,
            y: LOGO_MARGIN,
            width: natural_width * LOGO_SCALE,
            height: natural_height * LOGO_SCALE,
            opacity,
        }
    }
}

/// A fully specified text draw
#[derive(Debug, Clone, PartialEq)]
pub struct TextDraw {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub rotation_degrees: f64,
    pub color: Color,
    pub opacity: f64,
}

/// A single drawing primitive for the renderer
#[derive(Debug, Clone, PartialEq)]
pub enum DrawInstruction {
    Image(LogoPlacement),
    Text(TextDraw),
}

/// Sizing and placement policy
///
/// The defaults are the documented policy. `rotation_degrees` is the only
/// rotation the engine ever uses; the caller's rotation hint in
/// [`crate::style::LayoutHints`] is not consulted.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEngine {
    /// Margin on each side as a fraction of the page dimension
    pub margin_ratio: f64,
    /// Target text width as a fraction of the usable diagonal
    pub diagonal_coverage: f64,
    /// Font size the search starts from
    pub min_font_size: f64,
    /// Font size the search never exceeds
    pub max_font_size: f64,
    /// Search increment
    pub font_size_step: f64,
    /// Reduction applied to the size the search found
    pub safety_factor: f64,
    /// Text rotation in degrees, counter-clockwise
    pub rotation_degrees: f64,
    /// Offset of the two echo layers from the anchor, on both axes
    pub layer_offset: f64,
    /// Opacity of the echo layers relative to the main layer
    pub echo_opacity_ratio: f64,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self {
            margin_ratio: 0.15,
            diagonal_coverage: 0.7,
            min_font_size: 10.0,
            max_font_size: 500.0,
            font_size_step: 1.0,
            safety_factor: 0.9,
            rotation_degrees: 45.0,
            layer_offset: 0.5,
            echo_opacity_ratio: 0.8,
        }
    }
}

impl LayoutEngine {
    /// Page rectangle minus the margin on every side
    pub fn usable_area(&self, page: &PageGeometry) -> UsableArea {
        let margin_x = page.width * self.margin_ratio;
        let margin_y = page.height * self.margin_ratio;

        UsableArea {
            margin_x,
            margin_y,
            width: page.width - 2.0 * margin_x,
            height: page.height - 2.0 * margin_y,
        }
    }

    /// Width the watermark text should reach before the safety reduction
    pub fn target_width(&self, page: &PageGeometry) -> f64 {
        self.usable_area(page).diagonal() * self.diagonal_coverage
    }

    /// Linear search for the first font size whose width reaches `target_width`
    ///
    /// Stops at `max_font_size` when the target is never reached, which is
    /// always the case for text that measures zero width.
    pub fn search_font_size(&self, text: &str, target_width: f64, metrics: &dyn TextMetrics) -> f64 {
        let mut font_size = self.min_font_size;
        let mut width = 0.0;

        while width < target_width && font_size < self.max_font_size {
            font_size += self.font_size_step;
            width = metrics.text_width(text, font_size);
        }

        font_size
    }

    /// Compute the watermark layout for one page
    pub fn compute_placement(
        &self,
        page: &PageGeometry,
        style: &StyleConfig,
        metrics: &dyn TextMetrics,
    ) -> WatermarkPlacement {
        let target_width = self.target_width(page);
        let searched = self.search_font_size(&style.text, target_width, metrics);

        let font_size = searched * self.safety_factor;
        let extent = metrics.measure(&style.text, font_size);

        let theta = self.rotation_degrees.to_radians();
        let (sin, cos) = theta.sin_cos();

        // The anchor is the bottom-left corner of the unrotated text, so
        // shift it back by the rotated half extents.
        let offset_x = (extent.width / 2.0) * cos + (extent.height / 2.0) * sin;
        let offset_y = (extent.width / 2.0) * sin - (extent.height / 2.0) * cos;

        let (center_x, center_y) = page.center();
        let x = center_x - offset_x;
        let y = center_y - offset_y;

        let echo_opacity = style.opacity * self.echo_opacity_ratio;
        let d = self.layer_offset;

        trace!(
            "Page {}x{}: target width {:.2}, searched size {}, final size {:.2}, anchor ({:.2}, {:.2})",
            page.width, page.height, target_width, searched, font_size, x, y
        );

        WatermarkPlacement {
            font_size,
            rotation_degrees: self.rotation_degrees,
            text_width: extent.width,
            text_height: extent.height,
            layers: [
                TextLayer { x, y, opacity: style.opacity },
                TextLayer { x: x + d, y: y + d, opacity: echo_opacity },
                TextLayer { x: x - d, y: y - d, opacity: echo_opacity },
            ],
        }
    }

    /// Ordered draw instructions for one page: the logo, if any, then the
    /// three text layers
    pub fn plan_page(
        &self,
        page: &PageGeometry,
        style: &StyleConfig,
        metrics: &dyn TextMetrics,
        logo: Option<&LogoPlacement>,
    ) -> Vec<DrawInstruction> {
        let placement = self.compute_placement(page, style, metrics);
        self.instructions(&placement, style, logo)
    }

    /// Turn an already computed placement into draw instructions
    pub fn instructions(
        &self,
        placement: &WatermarkPlacement,
        style: &StyleConfig,
        logo: Option<&LogoPlacement>,
    ) -> Vec<DrawInstruction> {
        let mut instructions = Vec::with_capacity(4);
        if let Some(logo) = logo {
            instructions.push(DrawInstruction::Image(*logo));
        }

        instructions.extend(placement.layers.iter().map(|layer| {
            DrawInstruction::Text(TextDraw {
                text: style.text.clone(),
                x: layer.x,
                y: layer.y,
                font_size: placement.font_size,
                rotation_degrees: placement.rotation_degrees,
                color: style.color,
                opacity: layer.opacity,
            })
        }));

        instructions
    }
}
