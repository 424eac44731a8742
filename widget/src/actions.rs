use geokit_clipboard::ClipboardError;
use geokit_location::Position;

const MAP_URL_BASE: &str = "https://www.google.com/maps?q=";

/// Text placed on the clipboard by the copy action: `"<lat>, <lon>"`.
#[must_use]
pub fn coordinate_text(position: &Position) -> String {
    format!("{}, {}", position.latitude, position.longitude)
}

/// Map viewer link for `position`: `https://www.google.com/maps?q=<lat>,<lon>`.
#[must_use]
pub fn map_url(position: &Position) -> String {
    format!("{MAP_URL_BASE}{},{}", position.latitude, position.longitude)
}

/// What the copy action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// No position is held, so nothing was written.
    NothingToCopy,
    /// The primary clipboard accepted the text.
    Copied(String),
    /// The primary clipboard failed and the fallback accepted the text.
    CopiedWithFallback(String),
    /// Both clipboards failed; carries the fallback's error.
    Failed(ClipboardError),
}

impl CopyOutcome {
    /// Whether the text reached a clipboard.
    #[must_use]
    pub const fn is_copied(&self) -> bool {
        matches!(self, Self::Copied(_) | Self::CopiedWithFallback(_))
    }
}
