//! End-to-end runs over fixture pages, exercising the staged pipeline
//! and the observer replay protocol together.

use std::sync::Arc;

use pipeline::extract::MockModel;
use pipeline::testing::{listing_page_html, sparse_spa_html, FixturePageSource};
use pipeline::{
    Bot, BotStatus, BotStore, BusMessage, MemoryStore, PipelineConfig, Runner, RunOutcome,
};

#[tokio::test]
async fn client_rendered_page_escalates_then_extracts() {
    let store = Arc::new(MemoryStore::new());
    let bot = Bot::new("spa-portal", "https://example.com/propiedades");
    let bot_id = bot.id;
    store.add_bot(bot);

    // The plain fetch yields a near-empty shell; only the render
    // materializes the listings.
    let source = Arc::new(
        FixturePageSource::new(sparse_spa_html()).with_rendered(listing_page_html()),
    );
    let runner = Runner::with_parts(
        store.clone(),
        store.clone(),
        source.clone(),
        Arc::new(MockModel::new()),
        PipelineConfig::default(),
    );

    let outcome = runner.run_bot(bot_id).await.unwrap();

    assert_eq!(source.render_calls(), 1);
    assert_eq!(outcome, RunOutcome::Completed { new_records: 1 });
    assert_eq!(store.listing_count(bot_id), 1);

    let bot = store.get(bot_id).await.unwrap().unwrap();
    assert_eq!(bot.status, BotStatus::Completed);
    assert_eq!(bot.last_run_count, 1);
}

#[tokio::test]
async fn observer_replay_narrates_a_finished_run() {
    let store = Arc::new(MemoryStore::new());
    let bot = Bot::new("portal", "https://example.com/listings");
    let bot_id = bot.id;
    store.add_bot(bot);

    let runner = Runner::with_parts(
        store.clone(),
        store.clone(),
        Arc::new(FixturePageSource::new(listing_page_html())),
        Arc::new(MockModel::new()),
        PipelineConfig::default(),
    );
    runner.run_bot(bot_id).await.unwrap();

    // A late subscriber still sees the whole transcript.
    let (replay, _rx) = runner.bus().subscribe_bot(bot_id).await;
    let BusMessage::History { events, progress } = replay else {
        panic!("first frame must be the history replay");
    };

    assert!(!events.is_empty());
    assert!(events.first().unwrap().message.contains("run started"));
    assert!(events.last().unwrap().message.contains("run completed"));
    assert!(progress.is_some());
}
