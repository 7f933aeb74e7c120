//! Record store tests against a live PostgreSQL server.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -p drawlink-server -- --ignored`
//! against a scratch database; migrations are applied on connect.

use std::sync::Arc;

use drawlink_core::{
    AttachmentClient, DrawingService, Element, ElementKind, MemoryBlobStore, RecordStore, Scene,
    ServiceConfig, Slug, StoreError, ViewState,
};
use drawlink_server::config::{Config, DatabaseTarget};
use drawlink_server::db::Database;
use uuid::Uuid;

async fn database() -> Database {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a scratch database");
    let config = Config {
        database: DatabaseTarget::Url(url),
        db_max_connections: 4,
        ..Config::default()
    };
    let db = Database::connect(&config).await.unwrap();
    db.migrate().await.unwrap();
    db
}

fn unique_slug(prefix: &str) -> Slug {
    Slug::parse(format!("{}-{}", prefix, Uuid::new_v4().simple())).unwrap()
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn test_create_read_and_exists() {
    let db = database().await;
    let slug = unique_slug("plan");

    assert!(!db.exists(&slug).await.unwrap());
    let created = db.create(&slug, b"\x00sealed\xff", "key-text").await.unwrap();
    assert_eq!(created.version, 1);
    assert_eq!(created.slug, slug);
    assert!(db.exists(&slug).await.unwrap());

    let read = db.read(&slug).await.unwrap();
    assert_eq!(read.id, created.id);
    assert_eq!(read.encrypted_payload, b"\x00sealed\xff");
    assert_eq!(read.encryption_key, "key-text");
    assert_eq!(read.updated_at, created.updated_at);
    assert!(read.last_accessed_at >= created.last_accessed_at);
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn test_duplicate_slug_is_a_conflict() {
    let db = database().await;
    let slug = unique_slug("plan");
    db.create(&slug, b"first", "k1").await.unwrap();

    let err = db.create(&slug, b"second", "k2").await.unwrap_err();
    assert_eq!(err, StoreError::SlugConflict(slug.to_string()));
    assert_eq!(db.read(&slug).await.unwrap().encrypted_payload, b"first");
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn test_concurrent_creates_one_wins() {
    let db = database().await;
    let slug = unique_slug("race");

    let (a, b) = tokio::join!(db.create(&slug, b"a", "k"), db.create(&slug, b"b", "k"));
    assert!(a.is_ok() ^ b.is_ok());
    let loser = a.err().or(b.err());
    assert_eq!(loser, Some(StoreError::SlugConflict(slug.to_string())));
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn test_conditional_update() {
    let db = database().await;
    let slug = unique_slug("plan");
    db.create(&slug, b"v1", "k").await.unwrap();

    let updated = db.update(&slug, b"v2", "k", Some(1)).await.unwrap();
    assert_eq!(updated.version, 2);
    assert!(updated.updated_at >= updated.created_at);

    let err = db.update(&slug, b"v3", "k", Some(1)).await.unwrap_err();
    assert_eq!(
        err,
        StoreError::StaleVersion {
            slug: slug.to_string(),
            expected: 1,
            actual: 2
        }
    );
    assert_eq!(db.read(&slug).await.unwrap().encrypted_payload, b"v2");

    let updated = db.update(&slug, b"v3", "k", None).await.unwrap();
    assert_eq!(updated.version, 3);
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn test_missing_drawing() {
    let db = database().await;
    let slug = unique_slug("nope");

    assert!(matches!(db.read(&slug).await, Err(StoreError::NotFound(_))));
    assert!(matches!(
        db.update(&slug, b"x", "k", None).await,
        Err(StoreError::NotFound(_))
    ));
    // A version check on a missing drawing is not reported as stale
    assert!(matches!(
        db.update(&slug, b"x", "k", Some(1)).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn test_service_round_trip() {
    let records = Arc::new(database().await);
    let service = DrawingService::new(
        records,
        AttachmentClient::new(Arc::new(MemoryBlobStore::new())),
        ServiceConfig::default(),
    );
    let slug = unique_slug("roadmap");
    let scene = Scene::new(
        vec![Element::new("title", ElementKind::Text, 4.0, 8.0).with_text("Q3")],
        ViewState::default(),
    );

    let created = service.create_drawing(&slug, &scene).await.unwrap();
    let loaded = service.load_drawing(&slug).await.unwrap();
    assert_eq!(loaded.scene, scene);
    assert_eq!(loaded.session, created.session());
}
