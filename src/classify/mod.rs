//! Classifier collaborator.
//!
//! # Data Flow
//! ```text
//! payload bytes
//!     → ImageFormat::sniff (reject empty / unknown formats)
//!     → inference (command.rs, external program)
//!     → output index
//!     → LabelStore::lookup (labels.rs)
//!     → Labels { english, localized }
//! ```
//!
//! # Design Decisions
//! - Classification is synchronous; the session handler runs it on the blocking pool
//! - Failure is an explicit `Result`, never a panic the caller has to catch

pub mod command;
pub mod labels;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use command::CommandClassifier;
pub use labels::{LabelStore, LabelStoreError};

/// English and localized name of a predicted class.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Labels {
    #[serde(rename = "en", alias = "en_class")]
    pub english: String,
    #[serde(rename = "ko", alias = "ko_class")]
    pub localized: String,
}

impl Labels {
    pub fn new(english: impl Into<String>, localized: impl Into<String>) -> Self {
        Self {
            english: english.into(),
            localized: localized.into(),
        }
    }
}

/// Errors a classifier may return.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassificationError {
    /// Zero-length payload.
    #[error("image is empty")]
    EmptyImage,

    /// Payload is not a recognised image format.
    #[error("unsupported or undecodable image data")]
    UnsupportedImage,

    /// Model produced an index with no label row.
    #[error("no label for class index {index} ({available} labels loaded)")]
    UnknownIndex { index: usize, available: usize },

    /// Inference itself failed.
    #[error("model error: {0}")]
    Model(String),

    /// The classifier task did not complete (panic or cancellation).
    #[error("classifier aborted: {0}")]
    Aborted(String),
}

/// Maps image bytes to a label pair.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &[u8]) -> Result<Labels, ClassificationError>;
}

impl<F> Classifier for F
where
    F: Fn(&[u8]) -> Result<Labels, ClassificationError> + Send + Sync,
{
    fn classify(&self, image: &[u8]) -> Result<Labels, ClassificationError> {
        self(image)
    }
}

/// Image container formats accepted by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    WebP,
}

impl ImageFormat {
    /// Identify the format from its magic bytes.
    pub fn sniff(bytes: &[u8]) -> Result<Self, ClassificationError> {
        if bytes.is_empty() {
            return Err(ClassificationError::EmptyImage);
        }
        let format = if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            ImageFormat::Jpeg
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            ImageFormat::Png
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            ImageFormat::Gif
        } else if bytes.starts_with(b"BM") && bytes.len() > 14 {
            ImageFormat::Bmp
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            ImageFormat::WebP
        } else {
            return Err(ClassificationError::UnsupportedImage);
        };
        Ok(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_recognises_common_formats() {
        assert_eq!(ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Ok(ImageFormat::Jpeg));
        assert_eq!(
            ImageFormat::sniff(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0]),
            Ok(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::sniff(b"GIF89a...."), Ok(ImageFormat::Gif));
        assert_eq!(ImageFormat::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Ok(ImageFormat::WebP));
        assert_eq!(ImageFormat::sniff(b"BM\x36\0\0\0\0\0\0\0\x36\0\0\0\x28"), Ok(ImageFormat::Bmp));
    }

    #[test]
    fn sniff_rejects_empty_and_unknown() {
        assert_eq!(ImageFormat::sniff(&[]), Err(ClassificationError::EmptyImage));
        assert_eq!(
            ImageFormat::sniff(b"definitely not an image"),
            Err(ClassificationError::UnsupportedImage)
        );
    }

    #[test]
    fn closures_are_classifiers() {
        let classifier =
            |_: &[u8]| -> Result<Labels, ClassificationError> { Ok(Labels::new("rose", "장미")) };
        assert_eq!(classifier.classify(b"x").unwrap().localized, "장미");
    }
}
