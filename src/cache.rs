use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Encoded picture content kept between download and confirmed submission,
/// so a throttled add can be retried without downloading again.
///
/// Every operation takes the same lock; entries are small in number and the
/// map access is O(1).
#[derive(Debug, Default)]
pub struct ContentCache {
    images: Mutex<HashMap<String, String>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // A panicking holder cannot leave the map half-written.
        self.images.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store(&self, key: &str, content: String) {
        self.lock().insert(key.to_string(), content);
    }

    /// `None` means "not fetched yet", never "known to be missing".
    pub fn load(&self, key: &str) -> Option<String> {
        self.lock().get(key).filter(|c| !c.is_empty()).cloned()
    }

    pub fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
