//! PDF page model, enumeration, and rendering.
//!
//! A cached PDF becomes a [`PageList`] through [`PageEnumerator`], whose pages
//! carry virtual `pdf:<file>:<index>` image URLs. [`PageRenderer`] turns one
//! such reference back into JPEG bytes on demand.

mod enumerate;
mod error;
mod page_ref;
mod render;

pub use enumerate::{PageEnumerator, count_pages};
pub use error::PdfError;
pub use page_ref::{PDF_SCHEME, Page, PageList, PageRef, PageRefError, PdfPageRef};
pub use render::{
    DEFAULT_JPEG_QUALITY, DEFAULT_RENDER_SCALE, PDFIUM_LIB_PATH_ENV, PageRenderer,
    PdfiumRasterizer, RENDERED_CONTENT_TYPE, Rasterizer, RenderedPage, encode_jpeg,
    scaled_dimension,
};
