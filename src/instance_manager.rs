//! # OCR Instance Manager Module
//!
//! This module provides a bounded, thread-safe pool of recognition engine
//! instances. Engine initialization is expensive (Tesseract loads its language
//! models on creation), so instances are created lazily and reused.
//!
//! Callers never hold an engine directly: [`OcrInstanceManager::acquire`]
//! returns an [`EngineLease`] that gives the instance back to the pool when it
//! goes out of scope, whether recognition succeeded or failed.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::ocr::TextRecognizer;
use crate::ocr_errors::OcrError;

/// Builds a fresh engine instance
pub type RecognizerFactory =
    Box<dyn Fn() -> Result<Box<dyn TextRecognizer>, OcrError> + Send + Sync>;

struct PoolState {
    idle: Vec<Box<dyn TextRecognizer>>,
    /// Instances alive, idle or leased
    created: usize,
}

/// Thread-safe pool of recognition engine instances
///
/// # Instance Lifecycle
///
/// - Instances are created on demand by the factory, up to `max_instances`
/// - A released instance goes back to the idle list for the next caller
/// - An instance leased by a thread that panics is dropped, not reused
///
/// # Thread Safety
///
/// Uses `parking_lot::Mutex` + `Condvar`. When every instance is leased,
/// `acquire` blocks until one is released or the timeout elapses.
pub struct OcrInstanceManager {
    factory: RecognizerFactory,
    max_instances: usize,
    state: Mutex<PoolState>,
    released: Condvar,
}

impl fmt::Debug for OcrInstanceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("OcrInstanceManager")
            .field("max_instances", &self.max_instances)
            .field("created", &state.created)
            .field("idle", &state.idle.len())
            .finish()
    }
}

impl OcrInstanceManager {
    /// Create a new pool
    ///
    /// No instance is built until the first `acquire`. A `max_instances` of 0
    /// is treated as 1.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use medication_label_ocr::instance_manager::OcrInstanceManager;
    /// use medication_label_ocr::ocr::{MockTextRecognizer, TextRecognizer};
    ///
    /// let manager = OcrInstanceManager::new(2, || {
    ///     Ok(Box::new(MockTextRecognizer::new("Metformin 500mg", 90.0)) as Box<dyn TextRecognizer>)
    /// });
    /// assert_eq!(manager.instance_count(), 0);
    /// ```
    pub fn new<F>(max_instances: usize, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn TextRecognizer>, OcrError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            max_instances: max_instances.max(1),
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                created: 0,
            }),
            released: Condvar::new(),
        }
    }

    /// Pool of Tesseract engines configured from `config`
    #[cfg(feature = "tesseract")]
    pub fn with_tesseract(config: &crate::ocr_config::RecognitionConfig) -> Self {
        let engine_config = config.clone();
        Self::new(config.max_instances, move || {
            let engine = crate::tesseract::TesseractRecognizer::new(&engine_config)?;
            Ok(Box::new(engine) as Box<dyn TextRecognizer>)
        })
    }

    /// Lease an engine instance, waiting up to `timeout` for one to free up
    ///
    /// # Errors
    ///
    /// - `OcrError::EngineUnavailable` if every instance stays leased past the timeout
    /// - Any error returned by the factory when a new instance has to be built
    pub fn acquire(self: &Arc<Self>, timeout: Duration) -> Result<EngineLease, OcrError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            if let Some(engine) = state.idle.pop() {
                debug!(idle = state.idle.len(), "Reusing pooled OCR instance");
                return Ok(self.lease(engine));
            }

            if state.created < self.max_instances {
                state.created += 1;
                let ordinal = state.created;
                drop(state);

                info!(
                    instance = ordinal,
                    max_instances = self.max_instances,
                    "Creating new OCR instance"
                );
                return match (self.factory)() {
                    Ok(engine) => Ok(self.lease(engine)),
                    Err(err) => {
                        self.state.lock().created -= 1;
                        self.released.notify_one();
                        Err(err)
                    }
                };
            }

            if self.released.wait_until(&mut state, deadline).timed_out() {
                if let Some(engine) = state.idle.pop() {
                    return Ok(self.lease(engine));
                }
                warn!(
                    max_instances = self.max_instances,
                    timeout_ms = timeout.as_millis(),
                    "All OCR instances busy"
                );
                return Err(OcrError::EngineUnavailable(format!(
                    "all {} instances busy for {}ms",
                    self.max_instances,
                    timeout.as_millis()
                )));
            }
        }
    }

    fn lease(self: &Arc<Self>, engine: Box<dyn TextRecognizer>) -> EngineLease {
        EngineLease {
            engine: Some(engine),
            manager: Arc::clone(self),
        }
    }

    fn release(&self, engine: Box<dyn TextRecognizer>, discard: bool) {
        {
            let mut state = self.state.lock();
            if discard {
                state.created = state.created.saturating_sub(1);
                warn!("Discarding OCR instance released during a panic");
            } else {
                state.idle.push(engine);
            }
        }
        self.released.notify_one();
    }

    /// Number of instances alive, idle or leased
    pub fn instance_count(&self) -> usize {
        self.state.lock().created
    }

    /// Number of instances waiting in the pool
    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    pub fn max_instances(&self) -> usize {
        self.max_instances
    }

    /// Drop every idle instance (useful for memory cleanup)
    pub fn clear_idle(&self) {
        let mut state = self.state.lock();
        let count = state.idle.len();
        state.idle.clear();
        state.created -= count;
        if count > 0 {
            info!("Cleared {count} idle OCR instances");
        }
    }
}

/// Scoped access to one pooled engine instance
///
/// Dereferences to the engine. Dropping the lease returns the instance to
/// its pool; during a panic the instance is discarded instead.
pub struct EngineLease {
    engine: Option<Box<dyn TextRecognizer>>,
    manager: Arc<OcrInstanceManager>,
}

impl std::fmt::Debug for EngineLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLease")
            .field("engine_present", &self.engine.is_some())
            .finish_non_exhaustive()
    }
}

impl Deref for EngineLease {
    type Target = dyn TextRecognizer;

    fn deref(&self) -> &Self::Target {
        self.engine
            .as_deref()
            .expect("engine is present until the lease is dropped")
    }
}

impl DerefMut for EngineLease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.engine
            .as_deref_mut()
            .expect("engine is present until the lease is dropped")
    }
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            self.manager.release(engine, std::thread::panicking());
        }
    }
}
