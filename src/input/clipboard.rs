//! Clipboard and drag-and-drop data
//!
//! Backends keep the data they offer in a [`Payload`]. The clipboard tracks
//! the last attached payload so reads of our own selection never round-trip
//! through the display server.

use log::debug;

/// Mime types advertised for text payloads, most specific first
pub const TEXT_MIME_TYPES: [&str; 5] = [
    "text/plain;charset=utf-8",
    "text/plain",
    "UTF8_STRING",
    "STRING",
    "TEXT",
];

/// Mime type used for dropped file lists
pub const URI_LIST_MIME: &str = "text/uri-list";

/// Whether `mime` names a text format we can produce or consume
pub fn is_text_mime(mime: &str) -> bool {
    TEXT_MIME_TYPES.contains(&mime) || mime.starts_with("text/")
}

/// Pick the mime type to request from a list offered by another client
pub fn pick_text_mime(offered: &[String]) -> Option<&str> {
    TEXT_MIME_TYPES
        .iter()
        .find(|preferred| offered.iter().any(|m| m == *preferred))
        .copied()
        .or_else(|| {
            offered
                .iter()
                .map(String::as_str)
                .find(|m| is_text_mime(m))
        })
}

/// Data offered to other clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Mime type the application attached the data with
    pub mime: String,
    pub data: String,
}

impl Payload {
    pub fn new(mime: &str, data: &str) -> Self {
        Self {
            mime: mime.to_string(),
            data: data.to_string(),
        }
    }

    /// Mime types to advertise: the attached type first, then the text types
    pub fn mime_types(&self) -> Vec<String> {
        let mut types = vec![self.mime.clone()];
        if is_text_mime(&self.mime) {
            for mime in TEXT_MIME_TYPES {
                if mime != self.mime {
                    types.push(mime.to_string());
                }
            }
        }
        types
    }

    /// Whether a request for `mime` can be served from this payload
    pub fn serves(&self, mime: &str) -> bool {
        mime == self.mime || (is_text_mime(&self.mime) && is_text_mime(mime))
    }
}

/// Clipboard selection state of one backend
#[derive(Debug, Default)]
pub struct Clipboard {
    /// Payload we offer while we own the selection
    owned: Option<Payload>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// We became the selection owner with `payload`
    pub fn set(&mut self, payload: Payload) {
        debug!("Clipboard set ({} bytes of {})", payload.data.len(), payload.mime);
        self.owned = Some(payload);
    }

    /// Another client took the selection
    pub fn lost(&mut self) -> bool {
        let had = self.owned.take().is_some();
        if had {
            debug!("Clipboard selection lost");
        }
        had
    }

    /// Payload we currently own
    pub fn owned(&self) -> Option<&Payload> {
        self.owned.as_ref()
    }

    /// Our own text, when we own the selection
    pub fn owned_text(&self) -> Option<String> {
        self.owned.as_ref().map(|p| p.data.clone())
    }

    /// Data to send for a request of `mime`
    pub fn serve(&self, mime: &str) -> Option<&str> {
        self.owned
            .as_ref()
            .filter(|p| p.serves(mime))
            .map(|p| p.data.as_str())
    }
}

bitflags::bitflags! {
    /// DnD action flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DndActions: u32 {
        const NONE = 0;
        const COPY = 1;
        const MOVE = 2;
        const ASK = 4;
    }
}

/// Single DnD action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DndAction {
    #[default]
    None,
    Copy,
    Move,
    Ask,
}

/// Pick the action for a drop given what both sides support
pub fn negotiate(source: DndActions, destination: DndActions, preferred: DndAction) -> DndAction {
    let available = source.intersection(destination);
    if available.contains(DndActions::COPY) && preferred == DndAction::Copy {
        DndAction::Copy
    } else if available.contains(DndActions::MOVE) && preferred == DndAction::Move {
        DndAction::Move
    } else if available.contains(DndActions::ASK) && preferred == DndAction::Ask {
        DndAction::Ask
    } else if available.contains(DndActions::COPY) {
        DndAction::Copy
    } else if available.contains(DndActions::MOVE) {
        DndAction::Move
    } else {
        DndAction::None
    }
}

/// Convert a `text/uri-list` body into newline separated local paths
pub fn uri_list_paths(data: &str) -> Vec<String> {
    data.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.strip_prefix("file://").unwrap_or(line).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_mime_types() {
        let payload = Payload::new("text/plain", "hello");
        let types = payload.mime_types();
        assert_eq!(types[0], "text/plain");
        assert_eq!(types.len(), TEXT_MIME_TYPES.len());
        assert!(types.iter().any(|m| m == "UTF8_STRING"));

        let custom = Payload::new("application/x-color", "#ff0000");
        assert_eq!(custom.mime_types(), vec!["application/x-color".to_string()]);
    }

    #[test]
    fn test_payload_serves() {
        let payload = Payload::new("text/plain;charset=utf-8", "hi");
        assert!(payload.serves("UTF8_STRING"));
        assert!(payload.serves("text/plain"));
        assert!(!payload.serves("image/png"));

        let custom = Payload::new("application/x-color", "#fff");
        assert!(custom.serves("application/x-color"));
        assert!(!custom.serves("text/plain"));
    }

    #[test]
    fn test_clipboard_ownership() {
        let mut clipboard = Clipboard::new();
        assert!(clipboard.owned_text().is_none());
        assert!(!clipboard.lost());

        clipboard.set(Payload::new("text/plain", "copied"));
        assert_eq!(clipboard.owned_text().as_deref(), Some("copied"));
        assert_eq!(clipboard.serve("STRING"), Some("copied"));
        assert_eq!(clipboard.serve("image/png"), None);

        assert!(clipboard.lost());
        assert!(clipboard.owned().is_none());
    }

    #[test]
    fn test_pick_text_mime() {
        let offered = vec!["image/png".to_string(), "text/plain".to_string()];
        assert_eq!(pick_text_mime(&offered), Some("text/plain"));

        let offered = vec![
            "text/plain".to_string(),
            "text/plain;charset=utf-8".to_string(),
        ];
        assert_eq!(pick_text_mime(&offered), Some("text/plain;charset=utf-8"));

        let offered = vec!["text/html".to_string()];
        assert_eq!(pick_text_mime(&offered), Some("text/html"));

        let offered = vec!["image/png".to_string()];
        assert_eq!(pick_text_mime(&offered), None);
    }

    #[test]
    fn test_dnd_action_negotiation() {
        let source = DndActions::COPY | DndActions::MOVE;

        assert_eq!(
            negotiate(source, DndActions::COPY | DndActions::MOVE, DndAction::Move),
            DndAction::Move
        );
        assert_eq!(
            negotiate(source, DndActions::COPY, DndAction::Move),
            DndAction::Copy
        );
        assert_eq!(
            negotiate(source, DndActions::ASK, DndAction::Ask),
            DndAction::None
        );
    }

    #[test]
    fn test_uri_list_paths() {
        let body = "# comment\r\nfile:///tmp/a.txt\r\nfile:///home/b.png\r\n";
        assert_eq!(uri_list_paths(body), vec!["/tmp/a.txt", "/home/b.png"]);
    }
}
