//! Scannable code artifacts
//!
//! Artifacts are grouped by local issue date:
//! `<artifact_dir>/<dd-mm-YYYY>/<Name_With_Underscores>_<ID>_qr.<ext>`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use qrcode::render::svg;
use qrcode::QrCode;

use crate::error::{Error, Result};

const STORE: &str = "artifact directory";

pub const ARTIFACT_DATE_FORMAT: &str = "%d-%m-%Y";

/// Filename for a holder's artifact. Spaces and path separators become `_`.
pub fn artifact_file_name(display_name: &str, id: &str, extension: &str) -> String {
    let stem: String = display_name
        .chars()
        .map(|c| if c == ' ' || c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{stem}_{id}_qr.{extension}")
}

/// Full path of an artifact issued on `date`.
pub fn artifact_path(base: &Path, date: NaiveDate, file_name: &str) -> PathBuf {
    base.join(date.format(ARTIFACT_DATE_FORMAT).to_string())
        .join(file_name)
}

/// Produces an image of a payload that a code reader can decode.
pub trait ArtifactRenderer {
    /// File extension of the produced image, without the dot.
    fn extension(&self) -> &'static str;

    /// Render `payload` into a file at `dest`, creating parent directories.
    fn render(&self, payload: &str, dest: &Path) -> Result<()>;
}

/// QR code rendered as an SVG document.
#[derive(Debug, Clone)]
pub struct SvgQrRenderer {
    pub min_size: u32,
    pub dark_color: String,
    pub light_color: String,
}

impl Default for SvgQrRenderer {
    fn default() -> Self {
        Self {
            min_size: 240,
            dark_color: "#000000".to_owned(),
            light_color: "#ffffff".to_owned(),
        }
    }
}

impl SvgQrRenderer {
    pub fn to_svg(&self, payload: &str) -> Result<String> {
        let code = QrCode::new(payload.as_bytes()).map_err(|e| Error::ArtifactRender {
            reason: format!("QR generation failed: {e}"),
        })?;
        Ok(code
            .render::<svg::Color>()
            .min_dimensions(self.min_size, self.min_size)
            .dark_color(svg::Color(&self.dark_color))
            .light_color(svg::Color(&self.light_color))
            .build())
    }
}

impl ArtifactRenderer for SvgQrRenderer {
    fn extension(&self) -> &'static str {
        "svg"
    }

    fn render(&self, payload: &str, dest: &Path) -> Result<()> {
        let document = self.to_svg(payload)?;
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::storage(STORE, parent, e))?;
        }
        fs::write(dest, document).map_err(|e| Error::storage(STORE, dest, e))
    }
}
