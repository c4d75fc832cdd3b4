//! Wiring example: SQLite store, HTTP remote, background scheduler.
//!
//! Run with a remote API listening on the configured base URL:
//! `cargo run --example basic_usage`

use std::sync::Arc;

use lesson_sync::{
    ConnectivityMonitor, DurableStore, HttpRemote, Progress, SqlStore, SyncConfig, SyncEngine,
    SyncScheduler,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lesson_sync=debug,info".into()),
        )
        .init();

    let config = SyncConfig {
        api_base_url: "http://127.0.0.1:8080/api".into(),
        database_url: Some("sqlite://lessons.db?mode=rwc".into()),
        media_dir: Some("media".into()),
        sync_interval_secs: 60,
        ..Default::default()
    };

    let database_url = config
        .database_url
        .clone()
        .ok_or("database_url is required")?;
    let store = Arc::new(SqlStore::new(database_url));
    let remote = Arc::new(HttpRemote::new(config.api_base_url.clone()));
    let connectivity = ConnectivityMonitor::new(true);

    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        remote,
        connectivity.clone(),
        config,
    ));
    let scheduler = Arc::new(SyncScheduler::new(engine.clone()));
    let handle = scheduler.spawn();

    // Fetch a lesson for offline use
    match engine.download_lesson(1).await {
        Ok(lesson) => println!("downloaded: {} ({})", lesson.title, lesson.subject),
        Err(e) => println!("download failed: {e}"),
    }

    // Record progress locally; it queues for the next sync pass
    store
        .put_progress(&Progress {
            user_id: "student-1".into(),
            lesson_id: 1,
            progress: 25,
            completed: false,
            last_updated: 0,
        })
        .await?;

    // Push it now rather than waiting for the interval
    if let Some(summary) = scheduler.sync_now().await? {
        println!(
            "synced: pushed={} pulled_lessons={}",
            summary.pushed, summary.pulled_lessons
        );
    } else {
        println!("sync declined (offline or already running)");
    }

    let info = engine.storage_info().await?;
    println!(
        "storage: {} lessons, {} bytes used",
        info.lessons, info.used_bytes
    );

    scheduler.shutdown();
    handle.await?;
    Ok(())
}
