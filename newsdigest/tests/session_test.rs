use anyhow::Result;
use newsdigest::collector::Collector;
use newsdigest::delivery::{ChatSession, SessionState};
use newsdigest::digest::DigestGenerator;
use newsdigest::llm::{LlmProvider, LlmRequest, LlmResponse, UsageMetadata};
use newsdigest::pipeline::DigestPipeline;
use newsdigest::preferences::{ensure_schema, PreferenceDefaults, PreferencesStore};
use newsdigest::scraping::FetchSettings;
use newsdigest::search::{SearchProvider, SearchResult};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct EmptySearch {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl SearchProvider for EmptySearch {
    async fn news(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct CountingLlm {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl LlmProvider for CountingLlm {
    async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LlmResponse {
            content: "digest".to_string(),
            usage: UsageMetadata::default(),
            model: "stub".to_string(),
        })
    }
}

struct Harness {
    session: ChatSession,
    store: Arc<PreferencesStore>,
    search: Arc<EmptySearch>,
    llm: Arc<CountingLlm>,
}

async fn harness(user_id: i64) -> Harness {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    ensure_schema(&pool).await.expect("schema");
    let store = Arc::new(PreferencesStore::new(pool, PreferenceDefaults::default()));

    let search = Arc::new(EmptySearch {
        calls: AtomicUsize::new(0),
    });
    let llm = Arc::new(CountingLlm::default());
    let pipeline = Arc::new(DigestPipeline::new(
        Collector::new(search.clone(), FetchSettings::default(), 5),
        DigestGenerator::new(llm.clone()),
    ));

    Harness {
        session: ChatSession::new(user_id, store.clone(), pipeline),
        store,
        search,
        llm,
    }
}

#[tokio::test]
async fn add_then_text_stores_custom_topic() {
    let mut h = harness(1).await;

    h.session.handle("/add").await.unwrap();
    assert_eq!(h.session.state(), SessionState::AwaitingCustomTopic);

    let reply = h.session.handle("Formula 1").await.unwrap();
    assert_eq!(reply, vec!["✅ Topic «Formula 1» added!".to_string()]);
    assert_eq!(h.session.state(), SessionState::Idle);

    let prefs = h.store.get_or_create(1).await.unwrap();
    assert_eq!(prefs.custom_topics, vec!["Formula 1".to_string()]);

    // Free text outside the add flow is not a topic
    h.session.handle("Tennis").await.unwrap();
    let prefs = h.store.get_or_create(1).await.unwrap();
    assert_eq!(prefs.custom_topics.len(), 1);
}

#[tokio::test]
async fn duplicate_custom_topic_is_rejected() {
    let mut h = harness(2).await;
    h.session.handle("/add").await.unwrap();
    h.session.handle("Formula 1").await.unwrap();

    h.session.handle("/add").await.unwrap();
    let reply = h.session.handle("formula 1").await.unwrap();

    assert_eq!(reply, vec!["⚠️ That topic already exists!".to_string()]);
    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.store.get_or_create(2).await.unwrap().custom_topics.len(), 1);
}

#[tokio::test]
async fn any_command_cancels_pending_add() {
    let mut h = harness(3).await;

    h.session.handle("/add").await.unwrap();
    h.session.handle("/settings").await.unwrap();
    assert_eq!(h.session.state(), SessionState::Idle);

    h.session.handle("/add").await.unwrap();
    h.session.handle("/cancel").await.unwrap();
    assert_eq!(h.session.state(), SessionState::Idle);

    h.session.handle("Formula 1").await.unwrap();
    assert!(h.store.get_or_create(3).await.unwrap().custom_topics.is_empty());
}

#[tokio::test]
async fn news_without_topics_asks_for_topics() {
    let mut h = harness(4).await;

    let reply = h.session.handle("/news").await.unwrap();

    assert_eq!(reply.len(), 1);
    assert!(reply[0].contains("Pick some topics"));
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.llm.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.get_or_create(4).await.unwrap().last_viewed_at, None);
}

#[tokio::test]
async fn news_with_nothing_found_still_records_view() {
    let mut h = harness(5).await;
    h.session.handle("/toggle ai").await.unwrap();
    h.session.handle("/lang en").await.unwrap();

    let reply = h.session.handle("/news").await.unwrap();

    assert!(reply[0].starts_with("⏳"));
    assert!(reply[1].contains("find any news"));
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.llm.calls.load(Ordering::SeqCst), 0);
    assert!(h.store.get_or_create(5).await.unwrap().last_viewed_at.is_some());

    h.session.handle("/reset_history").await.unwrap();
    assert_eq!(h.store.get_or_create(5).await.unwrap().last_viewed_at, None);
}

#[tokio::test]
async fn settings_commands_validate_arguments() {
    let mut h = harness(6).await;

    let reply = h.session.handle("/time 4").await.unwrap();
    assert!(reply[0].starts_with("⚠️"));
    h.session.handle("/time 10").await.unwrap();

    let reply = h.session.handle("/level fluent").await.unwrap();
    assert!(reply[0].starts_with("⚠️"));
    h.session.handle("/level simple").await.unwrap();

    let reply = h.session.handle("/toggle nope").await.unwrap();
    assert!(reply[0].contains("Unknown topic"));

    let prefs = h.store.get_or_create(6).await.unwrap();
    assert_eq!(prefs.reading_time, 10);
    assert_eq!(prefs.language_level.as_str(), "simple");
    assert!(prefs.enabled_topics.is_empty());
}

#[tokio::test]
async fn delete_custom_topic_by_number() {
    let mut h = harness(7).await;
    h.store.add_custom_topic(7, "Rust").await.unwrap().unwrap();
    h.store.add_custom_topic(7, "Go").await.unwrap().unwrap();

    let reply = h.session.handle("/del 1").await.unwrap();
    assert_eq!(reply, vec!["🗑 «Rust» removed".to_string()]);

    let reply = h.session.handle("/del 9").await.unwrap();
    assert!(reply[0].starts_with("⚠️"));

    assert_eq!(
        h.store.get_or_create(7).await.unwrap().custom_topics,
        vec!["Go".to_string()]
    );
}

#[tokio::test]
async fn first_commands_of_new_user_are_stored() {
    let mut h = harness(8).await;

    h.session.handle("/lang en").await.unwrap();
    h.session.handle("/all_on").await.unwrap();
    h.session.handle("/level expert").await.unwrap();

    let prefs = h.store.get(8).await.unwrap().expect("row created");
    assert_eq!(prefs.digest_lang.as_str(), "en");
    assert_eq!(prefs.enabled_topics.len(), 20);
    assert_eq!(prefs.language_level.as_str(), "expert");
}

#[tokio::test]
async fn start_registers_the_user() {
    let mut h = harness(9).await;
    assert!(h.store.get(9).await.unwrap().is_none());

    h.session.handle("/start").await.unwrap();

    assert!(h.store.get(9).await.unwrap().is_some());
}

#[tokio::test]
async fn toggle_reports_storage_failures() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    ensure_schema(&pool).await.expect("schema");
    let store = Arc::new(PreferencesStore::new(pool.clone(), PreferenceDefaults::default()));
    let pipeline = Arc::new(DigestPipeline::new(
        Collector::new(
            Arc::new(EmptySearch {
                calls: AtomicUsize::new(0),
            }),
            FetchSettings::default(),
            5,
        ),
        DigestGenerator::new(Arc::new(CountingLlm::default())),
    ));
    let mut session = ChatSession::new(10, store, pipeline);

    pool.close().await;

    assert!(session.handle("/toggle ai").await.is_err());
    let reply = session.handle("/toggle nope").await.unwrap();
    assert!(reply[0].contains("Unknown topic"));
}
