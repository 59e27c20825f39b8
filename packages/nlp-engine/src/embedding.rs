//! Sentence embedding service using llama.cpp
//!
//! Wraps a local GGUF sentence-embedding model (all-MiniLM-L6-v2 class,
//! 384 dimensions). The backend applies the model's sequence pooling (mean
//! pooling for this model family) and the service L2-normalizes the result,
//! so stored vectors have unit norm and cosine similarity reduces to a dot
//! product.
//!
//! Model load is lazy and single-flight: the first `embed` call loads the
//! model while holding the state mutex, all later calls (and concurrent
//! first calls) reuse the loaded state for the process lifetime.

use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, Result};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
#[cfg(feature = "embedding-service")]
use std::sync::OnceLock;

/// Embedding vector dimension for all-MiniLM-L6-v2
pub const EMBEDDING_DIMENSION: usize = 384;

#[cfg(feature = "embedding-service")]
use llama_cpp_2::context::params::LlamaContextParams;
#[cfg(feature = "embedding-service")]
use llama_cpp_2::context::LlamaContext;
#[cfg(feature = "embedding-service")]
use llama_cpp_2::llama_backend::LlamaBackend;
#[cfg(feature = "embedding-service")]
use llama_cpp_2::llama_batch::LlamaBatch;
#[cfg(feature = "embedding-service")]
use llama_cpp_2::model::params::LlamaModelParams;
#[cfg(feature = "embedding-service")]
use llama_cpp_2::model::{AddBos, LlamaModel};

/// Global llama backend singleton.
/// The llama.cpp backend can only be initialized once per process, so a
/// OnceLock ensures thread-safe initialization and lets multiple
/// EmbeddingService instances share the same backend (important for tests
/// running in parallel).
#[cfg(feature = "embedding-service")]
static LLAMA_BACKEND: OnceLock<LlamaBackend> = OnceLock::new();

/// Initialize or get the global llama backend.
#[cfg(feature = "embedding-service")]
fn get_or_init_backend() -> Result<&'static LlamaBackend> {
    if let Some(backend) = LLAMA_BACKEND.get() {
        return Ok(backend);
    }

    match LlamaBackend::init() {
        Ok(backend) => {
            // Another thread may have stored one first; either instance is
            // valid because backend init is idempotent in the C library.
            let _ = LLAMA_BACKEND.set(backend);
            LLAMA_BACKEND.get().ok_or_else(|| {
                EmbeddingError::ModelUnavailable("backend initialization raced".to_string())
            })
        }
        Err(e) => {
            // The C backend may already be initialized from a previous run.
            if let Some(backend) = LLAMA_BACKEND.get() {
                return Ok(backend);
            }
            Err(EmbeddingError::ModelUnavailable(format!(
                "backend init failed: {}",
                e
            )))
        }
    }
}

/// Wrapper to hold model and context together with proper lifetimes.
///
/// ## Safety
/// This struct uses `unsafe` to store a `LlamaContext` with an extended
/// lifetime. This is safe because:
/// 1. The context is only used while the model is alive (owned by this struct)
/// 2. The backend is a global singleton that lives for the entire process
/// 3. Drop order is guaranteed: context drops before model
/// 4. Access is serialized through the Mutex in EmbeddingService
#[cfg(feature = "embedding-service")]
struct ModelState {
    // SAFETY: Field order matters for drop order! Rust drops fields in
    // declaration order, so `context` must be declared BEFORE `model` to
    // drop first.
    /// Persistent context, created lazily on first embedding request and
    /// reused thereafter. Uses a transmuted lifetime (see safety note above).
    context: Option<LlamaContext<'static>>,
    model: LlamaModel,
    /// Current batch size of the context (to check if recreation is required)
    current_batch_size: u32,
    context_size: u32,
    n_threads: i32,
}

#[cfg(feature = "embedding-service")]
impl ModelState {
    fn new(model: LlamaModel, context_size: u32, n_threads: i32) -> Self {
        Self {
            context: None,
            model,
            current_batch_size: 0,
            context_size,
            n_threads,
        }
    }

    /// Get or create a context with sufficient batch size for the given
    /// token count. The context is reused when possible; a larger input
    /// forces recreation with a bigger batch.
    fn get_or_create_context(
        &mut self,
        required_tokens: usize,
    ) -> std::result::Result<&mut LlamaContext<'static>, EmbeddingError> {
        let required_batch_size = std::cmp::max(required_tokens as u32, 512);

        let needs_new_context =
            self.context.is_none() || required_batch_size > self.current_batch_size;

        if needs_new_context {
            if self.context.is_some() {
                tracing::debug!(
                    "Recreating context: current batch_size={}, required={}",
                    self.current_batch_size,
                    required_batch_size
                );
                self.context = None;
            }

            let ctx_params = LlamaContextParams::default()
                .with_n_ctx(std::num::NonZeroU32::new(self.context_size))
                .with_n_batch(required_batch_size)
                .with_n_ubatch(required_batch_size)
                .with_n_threads_batch(self.n_threads)
                .with_embeddings(true);

            let backend = get_or_init_backend()?;
            let ctx = self.model.new_context(backend, ctx_params).map_err(|e| {
                EmbeddingError::ModelUnavailable(format!("context creation failed: {}", e))
            })?;

            // SAFETY: The context lifetime is extended to 'static. This is
            // safe because the context is stored alongside the model it
            // borrows, drop order guarantees the context drops first, and
            // the Mutex in EmbeddingService serializes all access.
            let ctx: LlamaContext<'static> = unsafe { std::mem::transmute(ctx) };
            self.context = Some(ctx);
            self.current_batch_size = required_batch_size;
        }

        Ok(self.context.as_mut().unwrap())
    }
}

// SAFETY: ModelState is wrapped in Mutex<Option<ModelState>> in
// EmbeddingService, so all access is synchronized. The underlying llama.cpp
// resources are not inherently thread-safe; the Mutex provides the required
// synchronization.
#[cfg(feature = "embedding-service")]
unsafe impl Send for ModelState {}
#[cfg(feature = "embedding-service")]
unsafe impl Sync for ModelState {}

/// Sentence embedding service
pub struct EmbeddingService {
    config: EmbeddingConfig,
    /// Model and context state. None until the first embed call loads the
    /// model; the load happens while the lock is held, so concurrent first
    /// calls cannot trigger independent loads.
    #[cfg(feature = "embedding-service")]
    state: Mutex<Option<ModelState>>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingService {
    /// Create a new embedding service with the given configuration.
    ///
    /// This does not load the model; the load is deferred to the first
    /// `embed` call.
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        config.validate().map_err(EmbeddingError::ConfigError)?;

        let cache_capacity = NonZeroUsize::new(config.cache_capacity)
            .ok_or_else(|| EmbeddingError::ConfigError("cache_capacity must be > 0".to_string()))?;

        Ok(Self {
            config,
            #[cfg(feature = "embedding-service")]
            state: Mutex::new(None),
            cache: Mutex::new(LruCache::new(cache_capacity)),
        })
    }

    /// Generate a unit-norm embedding for `text`.
    ///
    /// The first call loads the model (one-time, single-flight); subsequent
    /// calls reuse it. A missing or broken model surfaces as
    /// `ModelUnavailable` -- never a silent zero vector.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "Cannot generate embedding for empty text".to_string(),
            ));
        }

        {
            let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(cached) = cache.get(text) {
                return Ok(cached.clone());
            }
        }

        let embedding = self.embed_uncached(text)?;

        {
            let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
            cache.put(text.to_string(), embedding.clone());
        }

        Ok(embedding)
    }

    /// Warm up the model by generating a dummy embedding.
    ///
    /// Triggers the one-time model load so the first real query is fast.
    pub fn warmup(&self) -> Result<()> {
        tracing::info!("Warming up embedding model...");
        let start = std::time::Instant::now();
        let _ = self.embed("warmup")?;
        tracing::info!("Embedding model warmed up in {:?}", start.elapsed());
        Ok(())
    }

    #[cfg(feature = "embedding-service")]
    fn embed_uncached(&self, text: &str) -> Result<Vec<f32>> {
        let mut state_guard = self.state.lock().unwrap_or_else(|p| p.into_inner());

        // Lazy single-flight load: the lock is held for the whole load, so
        // a concurrent first call waits here instead of loading again.
        if state_guard.is_none() {
            *state_guard = Some(self.load_model()?);
        }
        let state = state_guard
            .as_mut()
            .ok_or_else(|| EmbeddingError::ModelUnavailable("model state empty".to_string()))?;

        let tokens = state
            .model
            .str_to_token(text, AddBos::Always)
            .map_err(|e| EmbeddingError::InvalidInput(format!("tokenization failed: {}", e)))?;

        let ctx = state.get_or_create_context(tokens.len())?;

        let batch_size = std::cmp::max(tokens.len(), 512);
        let mut batch = LlamaBatch::new(batch_size, 1);
        batch.add_sequence(&tokens, 0, false).map_err(|e| {
            EmbeddingError::ModelUnavailable(format!("batch add failed: {}", e))
        })?;

        ctx.clear_kv_cache();
        ctx.encode(&mut batch)
            .map_err(|e| EmbeddingError::ModelUnavailable(format!("encoding failed: {}", e)))?;

        // Sequence-level embedding: the backend pools token representations
        // according to the model's pooling metadata (mean for MiniLM).
        let embedding = ctx.embeddings_seq_ith(0).map_err(|e| {
            EmbeddingError::ModelUnavailable(format!("embedding extraction failed: {}", e))
        })?;

        Ok(Self::normalize(embedding))
    }

    #[cfg(not(feature = "embedding-service"))]
    fn embed_uncached(&self, _text: &str) -> Result<Vec<f32>> {
        Err(EmbeddingError::ModelUnavailable(
            "compiled without the embedding-service feature".to_string(),
        ))
    }

    /// Load the model from disk and validate its native dimension.
    #[cfg(feature = "embedding-service")]
    fn load_model(&self) -> Result<ModelState> {
        tracing::info!("Loading embedding model: {}", self.config.model_name);

        let model_path = self
            .config
            .resolve_model_path()
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?;

        let backend = get_or_init_backend()?;

        let model_params =
            LlamaModelParams::default().with_n_gpu_layers(self.config.n_gpu_layers);

        let model = LlamaModel::load_from_file(backend, &model_path, &model_params)
            .map_err(|e| EmbeddingError::ModelUnavailable(format!("model load failed: {}", e)))?;

        // A model of the wrong dimension would poison every stored vector;
        // refuse to run rather than recover.
        let actual = model.n_embd() as usize;
        if actual != EMBEDDING_DIMENSION {
            return Err(EmbeddingError::DimensionMismatch {
                expected: EMBEDDING_DIMENSION,
                actual,
            });
        }

        tracing::info!(
            "Embedding model loaded from {:?} (dimension {})",
            model_path,
            actual
        );

        Ok(ModelState::new(
            model,
            self.config.context_size,
            self.config.n_threads,
        ))
    }

    /// L2 normalize an embedding vector
    fn normalize(input: &[f32]) -> Vec<f32> {
        let magnitude = input
            .iter()
            .fold(0.0f32, |acc, &val| val.mul_add(val, acc))
            .sqrt();

        if magnitude > 0.0 {
            input.iter().map(|&val| val / magnitude).collect()
        } else {
            input.to_vec()
        }
    }

    /// Convert an embedding vector to F32_BLOB format for storage
    #[must_use]
    pub fn to_blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Convert F32_BLOB format back to an embedding vector
    #[must_use]
    pub fn from_blob(blob: &[u8]) -> Vec<f32> {
        blob.chunks_exact(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect()
    }

    /// Whether the model has been loaded (i.e. embed has run at least once)
    pub fn is_loaded(&self) -> bool {
        #[cfg(feature = "embedding-service")]
        {
            self.state
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .is_some()
        }
        #[cfg(not(feature = "embedding-service"))]
        {
            false
        }
    }

    /// Clear the embedding cache
    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        cache.clear();
    }

    /// Get cache statistics (size, capacity)
    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        (cache.len(), cache.cap().get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_conversion() {
        let embedding = vec![0.1, 0.2, 0.3, -0.4, 1.5];
        let blob = EmbeddingService::to_blob(&embedding);
        let recovered = EmbeddingService::from_blob(&blob);

        assert_eq!(embedding.len(), recovered.len());
        for (original, recovered) in embedding.iter().zip(recovered.iter()) {
            assert!((original - recovered).abs() < 1e-6);
        }
    }

    #[test]
    fn test_blob_length() {
        let embedding = vec![0.5f32; EMBEDDING_DIMENSION];
        let blob = EmbeddingService::to_blob(&embedding);
        assert_eq!(blob.len(), EMBEDDING_DIMENSION * 4);
    }

    #[test]
    fn test_service_creation() {
        let service = EmbeddingService::new(EmbeddingConfig::default());
        assert!(service.is_ok());
        assert!(!service.unwrap().is_loaded());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EmbeddingConfig {
            cache_capacity: 0,
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            EmbeddingService::new(config),
            Err(EmbeddingError::ConfigError(_))
        ));
    }

    #[test]
    fn test_empty_input_rejected() {
        let service = EmbeddingService::new(EmbeddingConfig::default()).unwrap();
        assert!(matches!(
            service.embed(""),
            Err(EmbeddingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_missing_model_is_model_unavailable() {
        // Point at a path that does not exist; the lazy load must surface
        // ModelUnavailable rather than producing a zero vector.
        let config = EmbeddingConfig {
            model_name: "no-such-model".to_string(),
            ..EmbeddingConfig::default()
        };
        let service = EmbeddingService::new(config).unwrap();
        match service.embed("hello") {
            Err(EmbeddingError::ModelUnavailable(_)) => {}
            other => panic!("expected ModelUnavailable, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_cache_stats() {
        let service = EmbeddingService::new(EmbeddingConfig::default()).unwrap();
        let (len, capacity) = service.cache_stats();
        assert_eq!(len, 0);
        assert!(capacity > 0);
    }

    #[test]
    fn test_normalize() {
        let input = vec![3.0, 4.0];
        let normalized = EmbeddingService::normalize(&input);

        // 3^2 + 4^2 = 25, sqrt(25) = 5
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);

        let magnitude: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let input = vec![0.0, 0.0, 0.0];
        let normalized = EmbeddingService::normalize(&input);
        assert!(normalized.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_embedding_dimension() {
        assert_eq!(EMBEDDING_DIMENSION, 384);
    }

    #[cfg(feature = "embedding-service")]
    #[test]
    #[ignore = "Integration test: requires model files. Run with: cargo test -- --ignored"]
    fn test_embed_unit_norm() {
        let service = EmbeddingService::new(EmbeddingConfig::default()).unwrap();
        let embedding = service.embed("Buy milk").unwrap();
        assert_eq!(embedding.len(), EMBEDDING_DIMENSION);

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[cfg(feature = "embedding-service")]
    #[test]
    #[ignore = "Integration test: requires model files. Run with: cargo test -- --ignored"]
    fn test_embed_deterministic_and_cached() {
        let service = EmbeddingService::new(EmbeddingConfig::default()).unwrap();
        let a = service.embed("Buy milk").unwrap();
        let b = service.embed("Buy milk").unwrap();
        assert_eq!(a, b);

        let (len, _) = service.cache_stats();
        assert_eq!(len, 1);
    }
}
