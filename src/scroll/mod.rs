//! Scroll region registry and per-visit scroll policy.
//!
//! The manager tracks the document plus any element explicitly registered
//! as a scroll container. Actual offset reads and writes go through the
//! [`ScrollDriver`] capability so the engine never touches a real DOM: the
//! embedding adapter implements the driver against its view layer, and
//! tests use [`MemoryScrollDriver`].
//!
//! Policy, per visit: with `preserve_scroll` false (the default for normal
//! visits) every region is reset to the origin as soon as the new page is
//! applied; with it true, offsets are left untouched and, on history
//! traversal, restored from the matching history entry once the page has
//! settled.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Region id of the document itself; always registered.
pub const DOCUMENT_REGION: &str = "document";

/// One scroll offset pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    /// Vertical offset in pixels.
    pub top: f64,
    /// Horizontal offset in pixels.
    pub left: f64,
}

impl ScrollPosition {
    /// The origin position.
    #[inline]
    #[must_use]
    pub fn origin() -> Self {
        Self::default()
    }
}

/// Capability for reading and writing region offsets.
pub trait ScrollDriver: Send + Sync {
    /// Current offsets of `region`, if it exists.
    fn read(&self, region: &str) -> Option<ScrollPosition>;
    /// Move `region` to `position`.
    fn write(&self, region: &str, position: ScrollPosition);
}

/// In-memory driver; the default, and the one tests observe.
#[derive(Default)]
pub struct MemoryScrollDriver {
    positions: Mutex<HashMap<String, ScrollPosition>>,
}

impl MemoryScrollDriver {
    /// Create an empty driver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScrollDriver for MemoryScrollDriver {
    fn read(&self, region: &str) -> Option<ScrollPosition> {
        self.positions.lock().expect("scroll driver poisoned").get(region).copied()
    }

    fn write(&self, region: &str, position: ScrollPosition) {
        self.positions
            .lock()
            .expect("scroll driver poisoned")
            .insert(region.to_string(), position);
    }
}

/// Registry of scrollable regions plus capture/reset/restore policy.
///
/// Cheap to clone; clones share the registry and driver.
#[derive(Clone)]
pub struct ScrollManager {
    driver: Arc<dyn ScrollDriver>,
    regions: Arc<Mutex<Vec<String>>>,
}

impl ScrollManager {
    /// Create a manager over `driver` with only the document registered.
    #[must_use]
    pub fn new(driver: Arc<dyn ScrollDriver>) -> Self {
        ScrollManager {
            driver,
            regions: Arc::new(Mutex::new(vec![DOCUMENT_REGION.to_string()])),
        }
    }

    /// Register a scroll container. Registering twice is a no-op.
    pub fn register(&self, region: impl Into<String>) {
        let region = region.into();
        let mut regions = self.regions.lock().expect("scroll regions poisoned");
        if !regions.contains(&region) {
            regions.push(region);
        }
    }

    /// Remove a scroll container. The document cannot be removed.
    pub fn deregister(&self, region: &str) {
        if region == DOCUMENT_REGION {
            return;
        }
        let mut regions = self.regions.lock().expect("scroll regions poisoned");
        regions.retain(|r| r != region);
    }

    /// Registered region ids, document first.
    #[must_use]
    pub fn regions(&self) -> Vec<String> {
        self.regions.lock().expect("scroll regions poisoned").clone()
    }

    /// Capture current offsets of every registered region.
    #[must_use]
    pub fn capture(&self) -> HashMap<String, ScrollPosition> {
        self.regions()
            .into_iter()
            .filter_map(|region| {
                self.driver
                    .read(&region)
                    .map(|position| (region, position))
            })
            .collect()
    }

    /// Reset every registered region to the origin.
    pub fn reset_all(&self) {
        for region in self.regions() {
            self.driver.write(&region, ScrollPosition::origin());
        }
    }

    /// Restore previously captured offsets. Regions absent from the
    /// snapshot are left where they are.
    pub fn restore(&self, snapshot: &HashMap<String, ScrollPosition>) {
        for (region, position) in snapshot {
            self.driver.write(region, *position);
        }
    }
}
