/// Lazily-initialized embedder.
///
/// Model loading can take seconds, so it is deferred to the first embed call
/// and performed at most once per `LazyEmbedder`, even when several threads
/// race on first use. A failed load is not cached; the next call tries again.
use std::sync::{Mutex, OnceLock};

use tracing::info;

use super::{Embedder, EmbedderError};

type Loader = dyn Fn() -> Result<Box<dyn Embedder>, EmbedderError> + Send + Sync;

pub struct LazyEmbedder {
    dimensions: usize,
    loader: Box<Loader>,
    inner: OnceLock<Box<dyn Embedder>>,
    init_lock: Mutex<()>,
}

impl LazyEmbedder {
    pub fn new<F>(dimensions: usize, loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Embedder>, EmbedderError> + Send + Sync + 'static,
    {
        Self {
            dimensions,
            loader: Box::new(loader),
            inner: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Return the loaded embedder, loading it on first use.
    pub fn get(&self) -> Result<&dyn Embedder, EmbedderError> {
        if let Some(embedder) = self.inner.get() {
            return Ok(embedder.as_ref());
        }

        let _guard = self
            .init_lock
            .lock()
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("init lock poisoned: {e}")))?;

        // Another thread may have finished loading while we waited
        if let Some(embedder) = self.inner.get() {
            return Ok(embedder.as_ref());
        }

        info!("Loading embedding model...");
        let loaded = (self.loader)()?;
        if loaded.dimensions() != self.dimensions {
            return Err(EmbedderError::DimensionMismatch {
                expected: self.dimensions,
                actual: loaded.dimensions(),
            });
        }
        info!("Embedding model ready ({} dimensions)", self.dimensions);

        Ok(self.inner.get_or_init(|| loaded).as_ref())
    }
}

impl Embedder for LazyEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.get()?.embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        self.get()?.embed_batch(texts)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::mock::MockEmbedder;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn counting_lazy(loads: Arc<AtomicUsize>) -> LazyEmbedder {
        LazyEmbedder::new(32, move || {
            loads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            Ok(Box::new(MockEmbedder::new(32)) as Box<dyn Embedder>)
        })
    }

    #[test]
    fn test_not_loaded_until_first_use() {
        let loads = Arc::new(AtomicUsize::new(0));
        let lazy = counting_lazy(loads.clone());
        assert!(!lazy.is_loaded());
        assert_eq!(lazy.dimensions(), 32);
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        lazy.embed("hello").unwrap();
        lazy.embed_batch(&["a", "b"]).unwrap();
        assert!(lazy.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_use_loads_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let lazy = Arc::new(counting_lazy(loads.clone()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let lazy = lazy.clone();
                thread::spawn(move || lazy.embed(&format!("text {i}")).unwrap())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().len(), 32);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let lazy = LazyEmbedder::new(8, move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(EmbedderError::ModelLoadFailed("not yet".into()))
            } else {
                Ok(Box::new(MockEmbedder::new(8)) as Box<dyn Embedder>)
            }
        });

        assert!(lazy.embed("x").is_err());
        assert!(!lazy.is_loaded());
        assert!(lazy.embed("x").is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dimension_mismatch_on_load() {
        let lazy = LazyEmbedder::new(384, || {
            Ok(Box::new(MockEmbedder::new(16)) as Box<dyn Embedder>)
        });
        assert!(matches!(
            lazy.embed("x"),
            Err(EmbedderError::DimensionMismatch {
                expected: 384,
                actual: 16
            })
        ));
    }
}
