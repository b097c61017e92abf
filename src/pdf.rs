use crate::error::ViewerError;
use crate::viewer::Rotation;
use anyhow::{Context as _, Result, anyhow};
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static PDFIUM_INSTANCE: OnceLock<Result<Pdfium, String>> = OnceLock::new();

/// Parses PDF bytes into a renderable document.
pub trait RenderingEngine {
    fn open_document(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, ViewerError>;
}

pub trait DocumentHandle {
    fn page_count(&self) -> usize;

    /// Renders the zero-based page `index` at `scale` times its natural size.
    fn render_page(
        &self,
        index: usize,
        scale: f32,
        rotation: Rotation,
    ) -> Result<RgbaImage, ViewerError>;
}

pub struct PdfiumEngine {
    pdfium: &'static Pdfium,
}

impl PdfiumEngine {
    /// Binds the pdfium library once per process. Later calls reuse the first outcome.
    pub fn initialize(pdfium_dir: Option<&Path>) -> Result<Self> {
        let dir = pdfium_dir.map(Path::to_path_buf);
        match PDFIUM_INSTANCE.get_or_init(|| init_pdfium(dir).map_err(|err| format!("{err:#}"))) {
            Ok(pdfium) => Ok(Self { pdfium }),
            Err(message) => Err(anyhow!("{message}")),
        }
    }
}

fn init_pdfium(pdfium_dir: Option<PathBuf>) -> Result<Pdfium> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = pdfium_dir {
        candidates.push(dir);
    }
    candidates.push(PathBuf::from("./lib"));
    candidates.push(PathBuf::from("./"));

    for dir in &candidates {
        crate::debug_log!("[pdfium] trying path: {}", dir.display());
        match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)) {
            Ok(bindings) => {
                crate::debug_log!("[pdfium] loaded from {}", dir.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(err) => crate::debug_log!("[pdfium] {} failed: {}", dir.display(), err),
        }
    }

    crate::debug_log!("[pdfium] trying system library");
    let bindings = Pdfium::bind_to_system_library().with_context(|| {
        let tried: Vec<String> = candidates
            .iter()
            .map(|dir| dir.display().to_string())
            .collect();
        format!(
            "pdfium library not found (tried {} and the system library)",
            tried.join(", ")
        )
    })?;
    crate::debug_log!("[pdfium] loaded from system");
    Ok(Pdfium::new(bindings))
}

impl RenderingEngine for PdfiumEngine {
    fn open_document(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, ViewerError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_vec(bytes.to_vec(), None)
            .map_err(|err| ViewerError::OpenFailed(err.to_string()))?;
        let page_count = document.pages().len() as usize;
        crate::debug_log!("[pdf][load] document loaded, pages: {}", page_count);

        Ok(Box::new(PdfiumDocument {
            document,
            page_count,
        }))
    }
}

struct PdfiumDocument {
    document: PdfDocument<'static>,
    page_count: usize,
}

impl DocumentHandle for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn render_page(
        &self,
        index: usize,
        scale: f32,
        rotation: Rotation,
    ) -> Result<RgbaImage, ViewerError> {
        let render_failed = |reason: String| ViewerError::RenderFailed {
            page: index + 1,
            reason,
        };
        if index >= self.page_count || index > u16::MAX as usize {
            return Err(render_failed(format!(
                "page index {index} out of range ({} pages)",
                self.page_count
            )));
        }

        let page = self
            .document
            .pages()
            .get(index as u16)
            .map_err(|err| render_failed(err.to_string()))?;
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .rotate(render_rotation(rotation), true);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|err| render_failed(err.to_string()))?;

        bitmap_to_rgba_image(&bitmap).map_err(|err| render_failed(format!("{err:#}")))
    }
}

fn render_rotation(rotation: Rotation) -> PdfPageRenderRotation {
    match rotation {
        Rotation::R0 => PdfPageRenderRotation::None,
        Rotation::R90 => PdfPageRenderRotation::Degrees90,
        Rotation::R180 => PdfPageRenderRotation::Degrees180,
        Rotation::R270 => PdfPageRenderRotation::Degrees270,
    }
}

#[allow(deprecated)]
fn bitmap_to_rgba_image(bitmap: &PdfBitmap) -> Result<RgbaImage> {
    let width = bitmap.width() as u32;
    let height = bitmap.height() as u32;
    if width == 0 || height == 0 {
        return Err(anyhow!("invalid bitmap size {width}x{height}"));
    }

    let bytes = bitmap.as_rgba_bytes();
    let expected_len = width as usize * height as usize * 4;
    if bytes.len() != expected_len {
        return Err(anyhow!(
            "bitmap length mismatch: {} != {}",
            bytes.len(),
            expected_len
        ));
    }

    RgbaImage::from_raw(width, height, bytes).context("failed to build rgba image")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotations_map_to_render_rotations() {
        assert!(matches!(
            render_rotation(Rotation::R0),
            PdfPageRenderRotation::None
        ));
        assert!(matches!(
            render_rotation(Rotation::R0.next().next().next()),
            PdfPageRenderRotation::Degrees270
        ));
    }
}
