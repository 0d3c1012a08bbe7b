//! CLI output formatting.
//!
//! Output leads with the thing being described (a source image, a
//! transformer) on a header line, followed by indented context lines.
//!
//! ## Probe
//!
//! ```text
//! photo.jpg
//!     Type: jpeg (image/jpeg)
//!     Size: 800x600
//!     Bytes: 118.4 KB
//! ```
//!
//! ## Render
//!
//! ```text
//! photo.jpg (jpeg, 800x600) → thumb.webp
//!     Variant: 400x300 webp
//!     Bytes: 12.0 KB
//! ```
//!
//! ## Transformers
//!
//! ```text
//! Transformers
//! 001 rust (priority 0)
//!     Status: enabled
//! 002 imagemagick (priority 10)
//!     Status: disabled
//!     Version: not found
//! ```
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::geometry::Dimensions;
use crate::imaging::{ImageFile, ImageType, TransformerDescriptor};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Human-readable byte count: `512 B`, `12.0 KB`, `3.4 MB`.
fn format_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let value = bytes as f64;
    if value < KB {
        format!("{bytes} B")
    } else if value < KB * KB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{:.1} MB", value / (KB * KB))
    }
}

// ============================================================================
// Probe
// ============================================================================

pub fn format_probe(path: &Path, source: &ImageFile, size: Dimensions) -> Vec<String> {
    let image_type = source.image_type();
    vec![
        file_label(path),
        format!("    Type: {} ({})", image_type, image_type.content_type()),
        format!("    Size: {}", size),
        format!("    Bytes: {}", format_bytes(source.byte_size())),
    ]
}

pub fn print_probe(path: &Path, source: &ImageFile, size: Dimensions) {
    for line in format_probe(path, source, size) {
        println!("{}", line);
    }
}

// ============================================================================
// Render
// ============================================================================

/// Summary of one rendered variant.
pub struct RenderSummary<'a> {
    pub source_path: &'a Path,
    pub source_type: ImageType,
    pub source_size: Dimensions,
    pub output_path: &'a Path,
    pub variant_size: Dimensions,
    pub variant: &'a ImageFile,
}

pub fn format_render(summary: &RenderSummary<'_>) -> Vec<String> {
    vec![
        format!(
            "{} ({}, {}) → {}",
            file_label(summary.source_path),
            summary.source_type,
            summary.source_size,
            file_label(summary.output_path)
        ),
        format!(
            "    Variant: {} {}",
            summary.variant_size,
            summary.variant.image_type()
        ),
        format!("    Bytes: {}", format_bytes(summary.variant.byte_size())),
    ]
}

pub fn print_render(summary: &RenderSummary<'_>) {
    for line in format_render(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Transformers
// ============================================================================

/// List registered transformers in registration order.
///
/// `versions` supplies an optional version line per transformer name; a
/// name mapped to `None` is shown as `not found`.
pub fn format_transformers(
    descriptors: &[TransformerDescriptor],
    versions: &[(&str, Option<String>)],
) -> Vec<String> {
    let mut lines = vec!["Transformers".to_string()];
    for (i, descriptor) in descriptors.iter().enumerate() {
        lines.push(format!(
            "{} {} (priority {})",
            format_index(i + 1),
            descriptor.name,
            descriptor.priority
        ));
        let status = if descriptor.enabled {
            "enabled"
        } else {
            "disabled"
        };
        lines.push(format!("    Status: {}", status));
        if let Some((_, version)) = versions.iter().find(|(name, _)| *name == descriptor.name) {
            lines.push(format!(
                "    Version: {}",
                version.as_deref().unwrap_or("not found")
            ));
        }
    }
    lines
}

pub fn print_transformers(
    descriptors: &[TransformerDescriptor],
    versions: &[(&str, Option<String>)],
) {
    for line in format_transformers(descriptors, versions) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, priority: i32, enabled: bool) -> TransformerDescriptor {
        TransformerDescriptor {
            name: name.to_string(),
            priority,
            enabled,
        }
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(12 * 1024), "12.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 + 400 * 1024), "3.4 MB");
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
    }

    // =========================================================================
    // Command output
    // =========================================================================

    #[test]
    fn probe_output() {
        let source = ImageFile::new(ImageType::Png, vec![0u8; 2048]);
        let lines = format_probe(
            Path::new("/tmp/in/logo.png"),
            &source,
            Dimensions::new(64, 32),
        );
        assert_eq!(
            lines,
            vec![
                "logo.png",
                "    Type: png (image/png)",
                "    Size: 64x32",
                "    Bytes: 2.0 KB",
            ]
        );
    }

    #[test]
    fn render_output() {
        let variant = ImageFile::new(ImageType::Webp, vec![0u8; 100]);
        let lines = format_render(&RenderSummary {
            source_path: Path::new("photo.jpg"),
            source_type: ImageType::Jpeg,
            source_size: Dimensions::new(800, 600),
            output_path: Path::new("out/thumb.webp"),
            variant_size: Dimensions::new(400, 300),
            variant: &variant,
        });
        assert_eq!(lines[0], "photo.jpg (jpeg, 800x600) → thumb.webp");
        assert_eq!(lines[1], "    Variant: 400x300 webp");
        assert_eq!(lines[2], "    Bytes: 100 B");
    }

    #[test]
    fn transformers_output() {
        let descriptors = [descriptor("rust", 0, true), descriptor("imagemagick", 10, false)];
        let versions = [("imagemagick", None)];
        let lines = format_transformers(&descriptors, &versions);
        assert_eq!(
            lines,
            vec![
                "Transformers",
                "001 rust (priority 0)",
                "    Status: enabled",
                "002 imagemagick (priority 10)",
                "    Status: disabled",
                "    Version: not found",
            ]
        );
    }
}
