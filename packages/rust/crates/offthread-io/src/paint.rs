//! Default painter: writes each bitmap to its target path as PNG.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::{ImageBuffer, ImageFormat, Rgba};
use offthread_img::{Bitmap, PaintError, PaintTarget, Painter};

/// Paints by encoding PNG files.
///
/// Targets are file paths; relative ones are resolved against `root`.
#[derive(Debug, Clone, Default)]
pub struct PngPainter {
    root: Option<PathBuf>,
}

impl PngPainter {
    /// Painter resolving relative targets against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// File a target resolves to.
    #[must_use]
    pub fn path_for(&self, target: &PaintTarget) -> PathBuf {
        let path = Path::new(target.as_str());
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

fn encode_png(bitmap: &Bitmap) -> Result<Vec<u8>, PaintError> {
    let expected = bitmap.width() as usize * bitmap.height() as usize * 4;
    let image = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(
        bitmap.width(),
        bitmap.height(),
        bitmap.pixels(),
    )
    .ok_or(PaintError::InvalidBitmap {
        len: bitmap.pixels().len(),
        expected,
    })?;
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|error| PaintError::Target {
            target: "png encoder".to_string(),
            reason: error.to_string(),
        })?;
    Ok(bytes)
}

#[async_trait]
impl Painter for PngPainter {
    async fn paint(&self, bitmap: Arc<Bitmap>, target: &PaintTarget) -> Result<(), PaintError> {
        let path = self.path_for(target);
        let target_error = |reason: String| PaintError::Target {
            target: path.display().to_string(),
            reason,
        };

        let png = tokio::task::spawn_blocking(move || encode_png(&bitmap))
            .await
            .map_err(|error| target_error(format!("encode task failed: {error}")))??;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| target_error(error.to_string()))?;
        }
        tokio::fs::write(&path, &png)
            .await
            .map_err(|error| target_error(error.to_string()))?;

        tracing::debug!(path = %path.display(), bytes = png.len(), "painted png");
        Ok(())
    }
}
