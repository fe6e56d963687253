//! One-off generation dispatch.
//!
//! Non-workflow generation requests run through here: a job row records
//! the request's lifecycle, the content cache is consulted before the
//! generator runs, and the outcome (content or error message) lands back
//! on the job.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::cache::{content_hash, ContentCache};
use crate::error::Result;
use crate::generators::GeneratorRegistry;
use crate::settings::{GenerationSettings, SettingsPatch};
use crate::storage::SqliteStorage;

/// Result of a dispatched generation.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub job_id: i64,
    pub content: String,
    pub meta: Map<String, Value>,
    /// True when the content came from the cache instead of a provider call
    pub from_cache: bool,
}

/// Runs one-off generation requests with job tracking.
pub struct Dispatcher {
    storage: Arc<SqliteStorage>,
    generators: GeneratorRegistry,
    defaults: GenerationSettings,
    cache: ContentCache,
}

impl Dispatcher {
    pub fn new(
        storage: Arc<SqliteStorage>,
        generators: GeneratorRegistry,
        defaults: GenerationSettings,
        cache: ContentCache,
    ) -> Self {
        Self {
            storage,
            generators,
            defaults,
            cache,
        }
    }

    /// Generate content of the given type, recording a job for the request.
    ///
    /// On failure the job is marked failed with the error message and the
    /// error is returned to the caller unchanged.
    pub async fn generate(
        &self,
        content_type: &str,
        prompt: &str,
        overrides: &SettingsPatch,
    ) -> Result<DispatchOutcome> {
        let settings = self.defaults.merged_with(&overrides.sanitized());
        let settings_value = serde_json::to_value(&settings)?;

        let job_id = self
            .storage
            .create_job(content_type, prompt, &settings_value)
            .await?;

        let hash = content_hash(content_type, prompt, &settings);
        if let Some(cached) = self.cache.get(&hash).await? {
            debug!("Cache hit for job {} ({})", job_id, content_type);
            self.storage.complete_job(job_id, &cached.content).await?;
            return Ok(DispatchOutcome {
                job_id,
                content: cached.content,
                meta: cached.meta,
                from_cache: true,
            });
        }

        let output = match self.run_generator(content_type, prompt, &settings).await {
            Ok(output) => output,
            Err(e) => {
                self.storage.fail_job(job_id, &e.to_string()).await?;
                return Err(e);
            }
        };

        self.storage.complete_job(job_id, &output.content).await?;
        self.cache.put(&hash, content_type, &output).await?;

        info!("Job {} completed ({})", job_id, content_type);
        Ok(DispatchOutcome {
            job_id,
            content: output.content,
            meta: output.meta,
            from_cache: false,
        })
    }

    async fn run_generator(
        &self,
        content_type: &str,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<crate::generators::GenerationOutput> {
        let generator = self.generators.get(content_type)?;
        generator.generate(prompt, settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::generators::{GenerationOutput, Generator};
    use crate::storage::JobStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGenerator {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Generator for CountingGenerator {
        fn content_type(&self) -> &str {
            "blog_post"
        }

        async fn generate(
            &self,
            _prompt: &str,
            _settings: &GenerationSettings,
        ) -> Result<GenerationOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GenerationOutput::new("Generated body"))
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        fn content_type(&self) -> &str {
            "blog_post"
        }

        async fn generate(
            &self,
            _prompt: &str,
            _settings: &GenerationSettings,
        ) -> Result<GenerationOutput> {
            Err(Error::RateLimited {
                provider: "openai".to_string(),
                retry_after_secs: 30,
            })
        }
    }

    fn dispatcher_with(
        registry: GeneratorRegistry,
    ) -> (Dispatcher, Arc<SqliteStorage>) {
        let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
        let cache = ContentCache::new(storage.clone(), crate::cache::DEFAULT_TTL_SECS);
        (
            Dispatcher::new(
                storage.clone(),
                registry,
                GenerationSettings::default(),
                cache,
            ),
            storage,
        )
    }

    #[tokio::test]
    async fn test_generate_completes_job() {
        let mut registry = GeneratorRegistry::empty();
        registry.register(Arc::new(CountingGenerator {
            calls: Arc::new(AtomicUsize::new(0)),
        }));
        let (dispatcher, storage) = dispatcher_with(registry);

        let outcome = dispatcher
            .generate("blog_post", "Write about rust", &SettingsPatch::default())
            .await
            .unwrap();

        assert_eq!(outcome.content, "Generated body");
        assert!(!outcome.from_cache);

        let job = storage.get_job(outcome.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.generated_content.as_deref(), Some("Generated body"));
    }

    #[tokio::test]
    async fn test_generate_failure_marks_job_failed() {
        let mut registry = GeneratorRegistry::empty();
        registry.register(Arc::new(FailingGenerator));
        let (dispatcher, storage) = dispatcher_with(registry);

        let err = dispatcher
            .generate("blog_post", "Write", &SettingsPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "RATE_LIMITED");

        let jobs = storage.list_jobs(Some(JobStatus::Failed), 10).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("Rate limit exceeded"));
    }

    #[tokio::test]
    async fn test_generate_unknown_type_marks_job_failed() {
        let (dispatcher, storage) = dispatcher_with(GeneratorRegistry::empty());

        let err = dispatcher
            .generate("mystery", "Write", &SettingsPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_CONTENT_TYPE");

        let jobs = storage.list_jobs(Some(JobStatus::Failed), 10).await.unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_second_identical_request_hits_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = GeneratorRegistry::empty();
        registry.register(Arc::new(CountingGenerator {
            calls: calls.clone(),
        }));
        let (dispatcher, _storage) = dispatcher_with(registry);

        let first = dispatcher
            .generate("blog_post", "Write about rust", &SettingsPatch::default())
            .await
            .unwrap();
        let second = dispatcher
            .generate("blog_post", "Write about rust", &SettingsPatch::default())
            .await
            .unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(second.content, "Generated body");
        // The generator only ran once.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Each request still records its own job.
        assert_ne!(first.job_id, second.job_id);
    }

    #[tokio::test]
    async fn test_different_settings_bypass_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = GeneratorRegistry::empty();
        registry.register(Arc::new(CountingGenerator {
            calls: calls.clone(),
        }));
        let (dispatcher, _storage) = dispatcher_with(registry);

        dispatcher
            .generate("blog_post", "Write", &SettingsPatch::default())
            .await
            .unwrap();
        dispatcher
            .generate(
                "blog_post",
                "Write",
                &SettingsPatch {
                    length: Some(1500),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
