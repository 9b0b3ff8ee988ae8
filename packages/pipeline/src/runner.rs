//! Job runner: acquire -> reduce -> chunk -> extract -> dedup -> store.
//!
//! One `Runner` serves the whole process. Distinct bots may run
//! concurrently; a single bot never overlaps itself. Chunk-level
//! extraction failures are logged and skipped; only acquisition with no
//! fallback or a storage failure terminates a run.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::acquire::PageAcquirer;
use crate::bus::{EventBus, LogLevel};
use crate::chunk::chunk_text;
use crate::config::PipelineConfig;
use crate::dedup::Deduper;
use crate::embedded::{extract_embedded, merge_with_compact};
use crate::error::{PipelineError, Result};
use crate::extract::{extract_chunk, ChatModel, ExtractionModel, MockModel};
use crate::reduce::reduce_to_text;
use crate::traits::{BotStore, ListingStore, PageSource};
use crate::types::{Bot, BotStatus, PageContent, RunOutcome};

/// Drives bot runs end to end.
#[derive(Clone)]
pub struct Runner {
    bots: Arc<dyn BotStore>,
    listings: Arc<dyn ListingStore>,
    source: Arc<dyn PageSource>,
    model: Arc<dyn ExtractionModel>,
    bus: EventBus,
    config: PipelineConfig,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// Build a runner with the production acquirer and the model chosen
    /// by config (mock mode substitutes the synthetic model).
    pub fn new(
        bots: Arc<dyn BotStore>,
        listings: Arc<dyn ListingStore>,
        config: PipelineConfig,
    ) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(PipelineError::Config("model identifier is empty".to_string()));
        }
        if config.chunk_max_bytes == 0 {
            return Err(PipelineError::Config(
                "chunk_max_bytes must be non-zero".to_string(),
            ));
        }

        let source: Arc<dyn PageSource> = Arc::new(
            PageAcquirer::new(&config).map_err(PipelineError::Acquire)?,
        );
        let model: Arc<dyn ExtractionModel> = if config.mock_mode {
            Arc::new(MockModel::new())
        } else {
            Arc::new(ChatModel::new(&config).map_err(PipelineError::Extract)?)
        };
        let bus = EventBus::with_capacity(config.ring_capacity);

        Ok(Self {
            bots,
            listings,
            source,
            model,
            bus,
            config,
        })
    }

    /// Build a runner with explicit page source and model (tests).
    pub fn with_parts(
        bots: Arc<dyn BotStore>,
        listings: Arc<dyn ListingStore>,
        source: Arc<dyn PageSource>,
        model: Arc<dyn ExtractionModel>,
        config: PipelineConfig,
    ) -> Self {
        let bus = EventBus::with_capacity(config.ring_capacity);
        Self {
            bots,
            listings,
            source,
            model,
            bus,
            config,
        }
    }

    /// The bus this runner publishes to (for subscriptions).
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Run one bot to completion.
    ///
    /// Returns `AlreadyRunning` without touching state if a run is in
    /// flight. Any terminal error marks the bot failed before surfacing.
    pub async fn run_bot(&self, id: Uuid) -> Result<RunOutcome> {
        let mut bot = self
            .bots
            .get(id)
            .await?
            .ok_or(PipelineError::BotNotFound { id })?;

        if bot.status == BotStatus::Running {
            return Err(PipelineError::AlreadyRunning { id });
        }

        let started = std::time::Instant::now();
        self.bus.begin_run(bot.id).await;
        bot.mark_running();
        self.bots.update(&bot).await?;

        self.log(&bot, LogLevel::Info, format!("run started for {}", bot.url))
            .await;

        match self.execute(&bot).await {
            Ok(outcome) => {
                let new_records = match outcome {
                    RunOutcome::Completed { new_records } => new_records,
                    RunOutcome::SparseContent => 0,
                };
                bot.mark_completed(new_records);
                self.bots.update(&bot).await?;
                let elapsed = started.elapsed().as_secs_f64();
                self.log(
                    &bot,
                    LogLevel::Info,
                    format!("run completed in {elapsed:.1}s with {new_records} new records"),
                )
                .await;
                info!(bot = %bot.name, new_records, elapsed_s = elapsed, "run completed");
                Ok(outcome)
            }
            Err(e) => {
                bot.mark_failed(e.to_string());
                self.bots.update(&bot).await?;
                self.log(&bot, LogLevel::Error, format!("run failed: {e}"))
                    .await;
                error!(bot = %bot.name, error = %e, "run failed");
                Err(e)
            }
        }
    }

    /// Run every active bot sequentially, isolating failures.
    ///
    /// Bots already mid-run are skipped, not errored. Returns per-bot
    /// outcomes in execution order.
    pub async fn run_all_active(&self) -> Result<Vec<(Uuid, Result<RunOutcome>)>> {
        let bots = self.bots.list_active().await?;
        let mut outcomes = Vec::with_capacity(bots.len());

        for bot in bots {
            if bot.status == BotStatus::Running {
                info!(bot = %bot.name, "skipping bot already mid-run");
                continue;
            }
            let result = self.run_bot(bot.id).await;
            if let Err(e) = &result {
                warn!(bot = %bot.name, error = %e, "bot run failed in batch, continuing");
            }
            outcomes.push((bot.id, result));
        }

        Ok(outcomes)
    }

    /// The pipeline proper, from acquisition to persistence.
    async fn execute(&self, bot: &Bot) -> Result<RunOutcome> {
        let content = self.source.acquire(&bot.url).await?;
        let text = self.prepare_text(bot, content).await;

        // Absolute floor: too little text means an empty or broken page;
        // invoking the model here would only invent records.
        if text.trim().len() < self.config.abort_text_min {
            self.log(
                bot,
                LogLevel::Warning,
                format!(
                    "only {} chars of usable text after escalation, ending run with zero records",
                    text.trim().len()
                ),
            )
            .await;
            return Ok(RunOutcome::SparseContent);
        }

        let chunks = chunk_text(&text, self.config.chunk_max_bytes, self.config.chunk_lookback);
        let total = chunks.len() as u64;
        self.log(
            bot,
            LogLevel::Info,
            format!("{} chars of compact text in {} chunks", text.len(), total),
        )
        .await;

        let mut deduper = Deduper::new();
        let mut new_records: u64 = 0;

        for (index, chunk) in chunks.iter().enumerate() {
            let current = index as u64 + 1;
            self.bus
                .progress(
                    bot.id,
                    &bot.name,
                    current,
                    total,
                    format!("extracting chunk {current}/{total}"),
                )
                .await;

            let listings = match extract_chunk(self.model.as_ref(), chunk).await {
                Ok(listings) => listings,
                Err(e) => {
                    // One bad chunk never kills the run.
                    warn!(bot = %bot.name, chunk = current, error = %e, "chunk extraction failed");
                    self.log(
                        bot,
                        LogLevel::Warning,
                        format!("chunk {current}/{total} failed: {e}"),
                    )
                    .await;
                    continue;
                }
            };

            for listing in deduper.dedup(listings) {
                let key = listing.dedup_key().to_string();
                let exists = self
                    .listings
                    .exists_by_key(bot.id, &key)
                    .await?;
                if exists {
                    continue;
                }
                self.listings.insert(bot.id, &listing).await?;
                new_records += 1;
            }
        }

        self.bus
            .progress(bot.id, &bot.name, total, total, "extraction finished")
            .await;

        Ok(RunOutcome::Completed { new_records })
    }

    /// Reduce the page to compact text, escalating to a headless render
    /// when a large raw page yields suspiciously little.
    async fn prepare_text(&self, bot: &Bot, content: PageContent) -> String {
        let text = self.compact_text(bot, &content).await;

        let suspicious = text.len() < self.config.sparse_compact_min
            && content.html.len() > self.config.sparse_raw_html_min;
        if !suspicious || content.rendered {
            return text;
        }

        self.log(
            bot,
            LogLevel::Info,
            format!(
                "{} chars of text from {} bytes of HTML, escalating to headless render",
                text.len(),
                content.html.len()
            ),
        )
        .await;

        match self.source.render(&bot.url).await {
            Ok(rendered) => {
                let rendered_text = self.compact_text(bot, &rendered).await;
                // Keep whichever acquisition yielded more.
                if rendered_text.len() > text.len() {
                    rendered_text
                } else {
                    text
                }
            }
            Err(e) => {
                // Escalation is best-effort; the plain text stands.
                warn!(bot = %bot.name, error = %e, "sparse-content render failed, keeping plain text");
                text
            }
        }
    }

    /// Compact text for one acquisition: reduced visible text merged
    /// with embedded payloads and any captured API text.
    async fn compact_text(&self, bot: &Bot, content: &PageContent) -> String {
        let compact = reduce_to_text(&content.html);
        let embedded = extract_embedded(&content.html);

        self.log(
            bot,
            LogLevel::Info,
            format!(
                "reduced {} bytes of HTML to {} chars ({} chars embedded)",
                content.html.len(),
                compact.len(),
                embedded.len()
            ),
        )
        .await;

        let mut text = merge_with_compact(&compact, &embedded, self.config.sparse_compact_min);
        if let Some(api_text) = &content.api_text {
            if !api_text.trim().is_empty() {
                text.push_str("\n\n");
                text.push_str(api_text);
            }
        }
        text
    }

    async fn log(&self, bot: &Bot, level: LogLevel, message: String) {
        self.bus.log(bot.id, &bot.name, level, message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::testing::{listing_page_html, sparse_spa_html, FixturePageSource};
    use crate::types::Listing;
    use async_trait::async_trait;

    struct PanickingModel;

    /// Listing store whose inserts always fail, for terminal-error paths.
    struct BrokenListingStore;

    #[async_trait]
    impl ListingStore for BrokenListingStore {
        async fn exists_by_key(&self, _bot_id: Uuid, _key: &str) -> crate::error::Result<bool> {
            Ok(false)
        }

        async fn insert(&self, _bot_id: Uuid, _listing: &Listing) -> crate::error::Result<()> {
            Err(PipelineError::Storage(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "backing store unavailable",
            ))))
        }
    }

    #[async_trait]
    impl ExtractionModel for PanickingModel {
        async fn complete(&self, _prompt: &str) -> crate::error::ExtractResult<String> {
            panic!("model must not be invoked on sparse content");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn test_mock_run_persists_one_record() {
        let store = Arc::new(MemoryStore::new());
        let bot = Bot::new("fixture", "https://example.com/listings");
        let bot_id = bot.id;
        store.add_bot(bot);

        let runner = Runner::with_parts(
            store.clone(),
            store.clone(),
            Arc::new(FixturePageSource::new(listing_page_html())),
            Arc::new(MockModel::new()),
            PipelineConfig::default().with_mock_mode(true),
        );

        let outcome = runner.run_bot(bot_id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed { new_records: 1 });
        assert_eq!(store.listing_count(bot_id), 1);

        let bot = store.get(bot_id).await.unwrap().unwrap();
        assert_eq!(bot.status, BotStatus::Completed);
        assert_eq!(bot.last_run_count, 1);
        assert_eq!(bot.successful_runs, 1);
    }

    #[tokio::test]
    async fn test_rerun_skips_already_stored_records() {
        let store = Arc::new(MemoryStore::new());
        let bot = Bot::new("fixture", "https://example.com/listings");
        let bot_id = bot.id;
        store.add_bot(bot);

        let runner = Runner::with_parts(
            store.clone(),
            store.clone(),
            Arc::new(FixturePageSource::new(listing_page_html())),
            Arc::new(MockModel::new()),
            PipelineConfig::default().with_mock_mode(true),
        );

        runner.run_bot(bot_id).await.unwrap();
        let outcome = runner.run_bot(bot_id).await.unwrap();

        // The mock record is already stored; second run persists nothing.
        assert_eq!(outcome, RunOutcome::Completed { new_records: 0 });
        assert_eq!(store.listing_count(bot_id), 1);
    }

    #[tokio::test]
    async fn test_sparse_page_never_reaches_the_model() {
        let store = Arc::new(MemoryStore::new());
        let bot = Bot::new("sparse", "https://example.com/empty");
        let bot_id = bot.id;
        store.add_bot(bot);

        let runner = Runner::with_parts(
            store.clone(),
            store.clone(),
            Arc::new(FixturePageSource::new("<html><body><p>hi</p></body></html>")),
            Arc::new(PanickingModel),
            PipelineConfig::default(),
        );

        let outcome = runner.run_bot(bot_id).await.unwrap();
        assert_eq!(outcome, RunOutcome::SparseContent);
        assert_eq!(store.listing_count(bot_id), 0);

        // Sparse content is still a successful, counted run.
        let bot = store.get(bot_id).await.unwrap().unwrap();
        assert_eq!(bot.status, BotStatus::Completed);
        assert_eq!(bot.last_run_count, 0);
        assert_eq!(bot.successful_runs, 1);
    }

    #[tokio::test]
    async fn test_running_bot_rejects_overlap() {
        let store = Arc::new(MemoryStore::new());
        let mut bot = Bot::new("busy", "https://example.com/listings");
        bot.mark_running();
        let bot_id = bot.id;
        store.add_bot(bot);

        let runner = Runner::with_parts(
            store.clone(),
            store.clone(),
            Arc::new(FixturePageSource::new("<html></html>")),
            Arc::new(MockModel::new()),
            PipelineConfig::default(),
        );

        let err = runner.run_bot(bot_id).await.unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyRunning { .. }));
    }

    #[tokio::test]
    async fn test_batch_run_skips_inactive_bots() {
        let store = Arc::new(MemoryStore::new());
        let active = Bot::new("active", "https://example.com/a");
        let active_id = active.id;
        store.add_bot(active);
        store.add_bot(Bot::new("inactive", "https://example.com/b").inactive());

        let runner = Runner::with_parts(
            store.clone(),
            store.clone(),
            Arc::new(FixturePageSource::new(listing_page_html())),
            Arc::new(MockModel::new()),
            PipelineConfig::default(),
        );

        let outcomes = runner.run_all_active().await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].0, active_id);
        assert!(outcomes[0].1.is_ok());
    }

    #[tokio::test]
    async fn test_sparse_compact_with_large_html_escalates_once() {
        // Large markup whose visible text is tiny: the relative check
        // fires and the renderer is consulted exactly once.
        let store = Arc::new(MemoryStore::new());
        let bot = Bot::new("spa", "https://example.com/spa");
        let bot_id = bot.id;
        store.add_bot(bot);

        let source = Arc::new(FixturePageSource::new(sparse_spa_html()));
        let runner = Runner::with_parts(
            store.clone(),
            store.clone(),
            source.clone(),
            Arc::new(MockModel::new()),
            PipelineConfig::default(),
        );

        let outcome = runner.run_bot(bot_id).await.unwrap();
        assert_eq!(source.render_calls(), 1);
        // The render returned the same sparse page, so the run ends
        // with zero records rather than inventing any.
        assert_eq!(outcome, RunOutcome::SparseContent);
    }

    #[tokio::test]
    async fn test_storage_failure_marks_run_failed() {
        let store = Arc::new(MemoryStore::new());
        let bot = Bot::new("portal", "https://example.com/listings");
        let bot_id = bot.id;
        store.add_bot(bot);

        let runner = Runner::with_parts(
            store.clone(),
            Arc::new(BrokenListingStore),
            Arc::new(FixturePageSource::new(listing_page_html())),
            Arc::new(MockModel::new()),
            PipelineConfig::default(),
        );

        let err = runner.run_bot(bot_id).await.unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));

        let bot = store.get(bot_id).await.unwrap().unwrap();
        assert_eq!(bot.status, BotStatus::Error);
        assert_eq!(bot.failed_runs, 1);
        assert!(bot.last_error.as_deref().unwrap().contains("storage error"));
    }

    #[tokio::test]
    async fn test_blank_model_identifier_is_a_config_error() {
        let store = Arc::new(MemoryStore::new());
        let err = Runner::new(
            store.clone(),
            store.clone(),
            PipelineConfig::default().with_model("  "),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
