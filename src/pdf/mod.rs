//! PDF manipulation module

pub mod font;
pub mod logo;
pub mod metadata;
pub mod stamp;

// Re-export commonly used items
pub use font::{FontFile, WatermarkFont};
pub use logo::{embed_logo, EmbeddedLogo, Logo, LogoFormat};
pub use metadata::{count_pages, extract_metadata, page_geometries, page_geometry, PdfMetadata};
pub use stamp::{
    apply_watermark, plan_pages, stamp_document, watermarked_path, PageStamp, StampOptions,
    StampReport,
};
