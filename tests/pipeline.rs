mod common;

use std::sync::Arc;

use httpmock::prelude::*;

use common::{FailingVectorStore, MemoryVectorStore, MockEmbedderFactory};
use docsmith::chunking::ChunkingConfig;
use docsmith::context::StageStatus;
use docsmith::embedding::VectorStoreManager;
use docsmith::errors::IngestError;
use docsmith::parsers::{ParserFactory, ParsingSettings};
use docsmith::repository::{DocumentRepository, DocumentStatus, SqliteRepository};
use docsmith::runner::IngestionRunner;
use docsmith::stages::{CHUNKING, EMBEDDING, PARSING, PERSISTENCE};

fn handbook_html() -> String {
    let mut body = String::from(
        "<html><head><title>Fallback</title></head><body>\
         <h1>Engineering Handbook</h1>\
         <p>How we build, review and ship software.</p>",
    );
    for i in 0..6 {
        body.push_str(&format!("<h2>Practice {i}</h2>"));
        body.push_str(&format!(
            "<p>{}</p>",
            format!("practice {i} guidance sentence. ").repeat(40)
        ));
    }
    body.push_str("</body></html>");
    body
}

fn runner_with(
    repository: Arc<SqliteRepository>,
    store: Arc<dyn docsmith::embedding::VectorStore>,
) -> IngestionRunner {
    IngestionRunner::new(
        repository,
        Arc::new(ParserFactory::new(&ParsingSettings::default())),
        Arc::new(VectorStoreManager::new(store, 100)),
        Arc::new(MockEmbedderFactory::default()),
        ChunkingConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn url_ingestion_end_to_end() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/handbook");
            then.status(200)
                .header("content-type", "text/html")
                .body(handbook_html());
        })
        .await;

    let repository = Arc::new(SqliteRepository::open_in_memory().await.unwrap());
    let store = Arc::new(MemoryVectorStore::default());
    let runner = runner_with(Arc::clone(&repository), store.clone());

    let report = runner
        .process(server.url("/handbook").as_str(), None)
        .await
        .unwrap();
    mock.assert_async().await;

    assert!(report.success, "errors: {:?}", report.errors);
    assert_eq!(report.title.as_deref(), Some("Engineering Handbook"));
    assert!(report.chunk_count > 0);
    for stage in [PARSING, CHUNKING, EMBEDDING, PERSISTENCE] {
        assert_eq!(report.stage_results[stage], StageStatus::Completed);
    }

    let doc = repository
        .get_document(report.document_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Completed);
    assert!(doc.chunk_blob.is_none());
    let markdown = doc.markdown.unwrap();
    assert!(markdown.starts_with("# Engineering Handbook"));
    assert!(markdown.contains("## Practice 3"));

    // The UUID assigned at embedding time is the join key between the vector
    // store and the relational rows.
    let rows = repository
        .chunks_for_document(report.document_id)
        .await
        .unwrap();
    assert_eq!(rows.len(), report.chunk_count);
    let stored = store.entries.lock();
    assert_eq!(stored.len(), rows.len());
    for (row, entry) in rows.iter().zip(stored.iter()) {
        assert_eq!(row.uuid, entry.id);
        assert_eq!(row.text, entry.text);
    }
}

#[tokio::test]
async fn vector_store_outage_fails_the_run_and_keeps_the_chunks() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/handbook");
            then.status(200)
                .header("content-type", "text/html")
                .body(handbook_html());
        })
        .await;

    let repository = Arc::new(SqliteRepository::open_in_memory().await.unwrap());
    let runner = runner_with(Arc::clone(&repository), Arc::new(FailingVectorStore));

    let report = runner
        .process(server.url("/handbook").as_str(), None)
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.stage_results[CHUNKING], StageStatus::Completed);
    assert_eq!(report.stage_results[EMBEDDING], StageStatus::Failed);
    // Persistence depends on embedding, so it was never attempted.
    assert!(!report.stage_results.contains_key(PERSISTENCE));

    let doc = repository
        .get_document(report.document_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert!(doc.status_details.unwrap().contains("embedding"));
    // Chunking output is parked on the document row for a later resume.
    let blob = doc.chunk_blob.expect("chunk payload should be stored");
    assert_eq!(blob.as_array().unwrap().len(), report.chunk_count);
    assert!(
        repository
            .chunks_for_document(report.document_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn resume_after_outage_completes_the_document() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/handbook");
            then.status(200)
                .header("content-type", "text/html")
                .body(handbook_html());
        })
        .await;

    let repository = Arc::new(SqliteRepository::open_in_memory().await.unwrap());
    let failing = runner_with(Arc::clone(&repository), Arc::new(FailingVectorStore));
    let first = failing
        .process(server.url("/handbook").as_str(), None)
        .await
        .unwrap();
    assert!(!first.success);

    // Same document, recovered store.
    let store = Arc::new(MemoryVectorStore::default());
    let recovered = runner_with(Arc::clone(&repository), store.clone());
    let second = recovered.process(first.document_id, None).await.unwrap();

    assert!(second.success, "errors: {:?}", second.errors);
    assert_eq!(second.document_id, first.document_id);

    let doc = repository
        .get_document(first.document_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Completed);
    assert!(doc.chunk_blob.is_none());
    assert_eq!(
        repository
            .chunks_for_document(first.document_id)
            .await
            .unwrap()
            .len(),
        second.chunk_count
    );
    assert_eq!(store.entries.lock().len(), second.chunk_count);
}

#[tokio::test]
async fn resuming_an_unknown_document_is_an_error() {
    let repository = Arc::new(SqliteRepository::open_in_memory().await.unwrap());
    let runner = runner_with(repository, Arc::new(MemoryVectorStore::default()));

    let err = runner.process(999_i64, None).await.unwrap_err();
    assert!(matches!(err, IngestError::DocumentNotFound(999)));
}

#[tokio::test]
async fn unparseable_source_fails_every_downstream_stage() {
    let repository = Arc::new(SqliteRepository::open_in_memory().await.unwrap());
    let runner = runner_with(Arc::clone(&repository), Arc::new(MemoryVectorStore::default()));

    let report = runner.process("notes.docx", None).await.unwrap();
    assert!(!report.success);
    assert_eq!(report.stage_results[PARSING], StageStatus::Failed);
    assert!(!report.stage_results.contains_key(CHUNKING));
    assert_eq!(report.chunk_count, 0);

    let doc = repository
        .get_document(report.document_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert!(doc.status_details.unwrap().contains("no parser available"));
}
