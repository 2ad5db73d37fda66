//! Window bookkeeping
//!
//! The table owns the platform-independent state of every window: its id,
//! title, last known size and the frame clock used for the FPS query. The
//! native handles live in the backend, keyed by the same [`WindowId`].

use std::collections::BTreeMap;
use std::time::Instant;

use crate::event::WindowId;

/// Measures the time between consecutive frames of one window
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    /// Create a clock that has not ticked yet
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Advance the clock and return the instantaneous frame rate
    ///
    /// The first tick only starts the clock and returns `0.0`.
    pub fn tick(&mut self) -> f64 {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> f64 {
        let fps = match self.last {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last).as_secs_f64();
                if elapsed > 0.0 {
                    1.0 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.last = Some(now);
        fps
    }
}

/// State kept for a managed window
#[derive(Debug, Clone)]
pub struct WindowRecord {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
    pub decorated: bool,
    /// Window has keyboard focus
    pub focused: bool,
    pub frame_clock: FrameClock,
}

impl WindowRecord {
    /// Create a record for a freshly created window
    pub fn new(title: &str, width: u32, height: u32) -> Self {
        Self {
            title: title.to_string(),
            width,
            height,
            resizable: true,
            decorated: true,
            focused: false,
            frame_clock: FrameClock::new(),
        }
    }
}

/// All windows of one manager
#[derive(Debug)]
pub struct WindowTable {
    windows: BTreeMap<WindowId, WindowRecord>,
    next_id: usize,
    created: usize,
}

impl WindowTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            windows: BTreeMap::new(),
            next_id: 0,
            created: 0,
        }
    }

    /// Id the next [`insert`](Self::insert) will hand out
    pub fn next_id(&self) -> WindowId {
        WindowId(self.next_id)
    }

    /// Store a record under a fresh id
    pub fn insert(&mut self, record: WindowRecord) -> WindowId {
        let id = WindowId(self.next_id);
        self.next_id += 1;
        self.created += 1;
        self.windows.insert(id, record);
        id
    }

    /// Get a window by ID
    pub fn get(&self, id: WindowId) -> Option<&WindowRecord> {
        self.windows.get(&id)
    }

    /// Get a mutable window by ID
    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut WindowRecord> {
        self.windows.get_mut(&id)
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.windows.contains_key(&id)
    }

    /// Remove a window
    pub fn remove(&mut self, id: WindowId) -> Option<WindowRecord> {
        self.windows.remove(&id)
    }

    /// Move keyboard focus to `id`, or clear it
    pub fn set_focused(&mut self, id: Option<WindowId>) {
        for (window_id, record) in self.windows.iter_mut() {
            record.focused = Some(*window_id) == id;
        }
    }

    /// The window holding keyboard focus
    pub fn focused(&self) -> Option<WindowId> {
        self.windows
            .iter()
            .find(|(_, record)| record.focused)
            .map(|(id, _)| *id)
    }

    /// Live window ids in creation order
    pub fn ids(&self) -> Vec<WindowId> {
        self.windows.keys().copied().collect()
    }

    /// Get count of windows
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Whether any window was ever created
    pub fn ever_created(&self) -> bool {
        self.created > 0
    }
}

impl Default for WindowTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_ids_never_reused() {
        let mut table = WindowTable::new();
        let a = table.insert(WindowRecord::new("a", 10, 10));
        let b = table.insert(WindowRecord::new("b", 10, 10));
        assert_ne!(a, b);

        table.remove(a);
        let c = table.insert(WindowRecord::new("c", 10, 10));
        assert_ne!(c, a);
        assert_ne!(c, b);
        assert_eq!(table.ids(), vec![b, c]);
    }

    #[test]
    fn test_ever_created() {
        let mut table = WindowTable::new();
        assert!(!table.ever_created());
        assert!(table.is_empty());

        let id = table.insert(WindowRecord::new("main", 640, 480));
        table.remove(id);
        assert!(table.ever_created());
        assert!(table.is_empty());
        assert!(!table.contains(id));
    }

    #[test]
    fn test_record_defaults() {
        let mut table = WindowTable::new();
        let id = table.insert(WindowRecord::new("main", 640, 480));
        let record = table.get(id).unwrap();
        assert_eq!(record.title, "main");
        assert_eq!((record.width, record.height), (640, 480));
        assert!(record.resizable);
        assert!(record.decorated);

        table.get_mut(id).unwrap().width = 800;
        assert_eq!(table.get(id).unwrap().width, 800);
    }

    #[test]
    fn test_focus() {
        let mut table = WindowTable::new();
        let a = table.insert(WindowRecord::new("a", 1, 1));
        let b = table.insert(WindowRecord::new("b", 1, 1));

        table.set_focused(Some(a));
        assert_eq!(table.focused(), Some(a));
        assert!(!table.get(b).unwrap().focused);

        table.set_focused(Some(b));
        assert_eq!(table.focused(), Some(b));
        assert!(!table.get(a).unwrap().focused);

        table.set_focused(None);
        assert_eq!(table.focused(), None);
    }

    #[test]
    fn test_frame_clock() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        assert_eq!(clock.tick_at(start), 0.0);

        let fps = clock.tick_at(start + Duration::from_millis(20));
        assert!((fps - 50.0).abs() < 1e-6);

        let fps = clock.tick_at(start + Duration::from_millis(30));
        assert!((fps - 100.0).abs() < 1e-6);
    }
}
