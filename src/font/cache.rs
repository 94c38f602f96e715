use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use tracing::debug;

use super::{FontFace, FontLoader, FontMetrics, FontRequest};
use crate::error::OverlayError;

type Slot = Arc<Mutex<Option<Arc<FontFace>>>>;

/// Process-wide memo of loaded faces keyed by family string.
///
/// A face is loaded (and, for URLs, downloaded) once per family; every size is
/// served from it. Entries are never evicted. Each family has its own slot
/// lock, so concurrent first requests for one family perform a single load
/// while other families resolve in parallel. Failed loads are not remembered.
#[derive(Default)]
pub struct FontCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &self,
        loader: &dyn FontLoader,
        request: &FontRequest<'_>,
        size_px: f32,
    ) -> Result<FontMetrics, OverlayError> {
        let slot = {
            let mut slots = lock(&self.slots);
            slots
                .entry(request.family.trim().to_string())
                .or_default()
                .clone()
        };
        let mut entry = lock(&slot);
        if let Some(face) = entry.as_ref() {
            return Ok(FontMetrics::new(face.clone(), size_px));
        }
        let face = Arc::new(loader.load(request)?);
        debug!("resolved font '{}' as '{}'", request.family, face.family());
        *entry = Some(face.clone());
        Ok(FontMetrics::new(face, size_px))
    }

    /// Number of loaded families. A load still in flight is not counted and
    /// does not block the call.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        slots
            .iter()
            .filter(|slot| match slot.try_lock() {
                Ok(entry) => entry.is_some(),
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().is_some(),
                Err(TryLockError::WouldBlock) => false,
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
