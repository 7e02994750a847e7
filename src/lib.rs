//! PDF Watermark Library
//!
//! Stamps a diagonal text watermark, and optionally a footer logo, onto
//! every page of a PDF. This library provides functionality to:
//! - Resolve raw style input (text, opacity, hex color) with safe fallbacks
//! - Size, rotate and center the watermark for each page's dimensions
//! - Measure text with kerned Helvetica metrics or a shaped TrueType font
//! - Draw with the standard Helvetica or an embedded TrueType font
//! - Write the watermark into existing PDF pages
//!
//! # Example
//!
//! ```
//! use pdf_watermark::layout::{LayoutEngine, PageGeometry};
//! use pdf_watermark::metrics::StandardHelvetica;
//! use pdf_watermark::style::{resolve_style, RawStyle};
//!
//! let style = resolve_style(&RawStyle {
//!     watermark_text: Some("CONFIDENTIAL".to_string()),
//!     ..Default::default()
//! });
//!
//! let placement = LayoutEngine::default()
//!     .compute_placement(&PageGeometry::letter(), &style, &StandardHelvetica);
//!
//! assert_eq!(placement.rotation_degrees, 45.0);
//! assert_eq!(placement.layers.len(), 3);
//! ```

pub mod error;
pub mod layout;
pub mod metrics;
pub mod pdf;
pub mod style;

// Re-export commonly used items
pub use error::{Error, Result};
pub use layout::{LayoutEngine, PageGeometry, WatermarkPlacement};
pub use style::{resolve_style, RawStyle, StyleConfig};
