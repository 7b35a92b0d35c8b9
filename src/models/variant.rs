//! Variant tags and the key conventions shared by the API and the worker.

use serde::Serialize;
use std::fmt;

/// Prefix applied to every user upload before it is written to the source bucket.
pub const ORIGINAL_PREFIX: &str = "original_";

/// A derived image produced by the transform worker.
///
/// The tag doubles as the first path segment of the variant key, so a variant
/// of `original_cat.png` tagged `Red` lives at `red/original_cat.png`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VariantTag {
    Red,
    Green,
    Blue,
    Bw,
    Inverted,
    SortedHue,
    SortedSaturation,
    SortedBrightness,
}

impl VariantTag {
    /// Variants produced for every record, in upload order.
    pub const CORE: [VariantTag; 5] = [
        VariantTag::Red,
        VariantTag::Green,
        VariantTag::Blue,
        VariantTag::Bw,
        VariantTag::Inverted,
    ];

    /// Variants produced only when the sorted-HSV extension is enabled.
    pub const SORTED_HSV: [VariantTag; 3] = [
        VariantTag::SortedHue,
        VariantTag::SortedSaturation,
        VariantTag::SortedBrightness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Bw => "bw",
            Self::Inverted => "inverted",
            Self::SortedHue => "sortedHue",
            Self::SortedSaturation => "sortedSaturation",
            Self::SortedBrightness => "sortedBrightness",
        }
    }

    /// Key under which this variant of `object_key` is stored.
    pub fn key_for(&self, object_key: &str) -> String {
        format!("{}/{}", self.as_str(), object_key)
    }
}

impl fmt::Display for VariantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key under which a user upload named `filename` is stored.
pub fn original_key(filename: &str) -> String {
    format!("{ORIGINAL_PREFIX}{filename}")
}

/// Best-effort MIME type derived from a key's extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}
