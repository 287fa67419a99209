//! Basic sync example demonstrating the datasync library

use std::error::Error;

use datasync::{
    MemoryBaseline, ProgressChannel, ProgressEvent, SyncConfig, SyncEngine, SyncMode,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("Basic Sync Example");
    println!("==================");

    let temp_dir = tempfile::TempDir::new()?;
    let source_dir = temp_dir.path().join("source");
    let dest_dir = temp_dir.path().join("destination");

    tokio::fs::create_dir_all(source_dir.join("subdir")).await?;
    tokio::fs::write(source_dir.join("file1.txt"), b"This is file 1 content").await?;
    tokio::fs::write(source_dir.join("file2.txt"), b"This is file 2 content").await?;
    tokio::fs::write(source_dir.join("subdir").join("file3.txt"), b"This is file 3 content").await?;

    tokio::fs::create_dir_all(&dest_dir).await?;
    tokio::fs::write(dest_dir.join("stale.txt"), b"Only in destination").await?;

    println!("Source directory: {}", source_dir.display());
    println!("Destination directory: {}", dest_dir.display());
    println!();

    let config = SyncConfig::new(
        source_dir.to_string_lossy(),
        dest_dir.to_string_lossy(),
    );
    let baseline = MemoryBaseline::new();

    // Example 1: Dry run
    println!("Example 1: Dry Run");
    println!("------------------");

    let dry_run = SyncConfig {
        dry_run: true,
        ..config.clone()
    };
    let result = SyncEngine::default().run(&dry_run).await;
    for line in &result.logs {
        println!("  {}", line);
    }
    assert_eq!(result.counts.applied(), 0);
    assert!(!dest_dir.join("file1.txt").exists());
    println!();

    // Example 2: Additive sync with progress
    println!("Example 2: Insert/Update With Progress");
    println!("--------------------------------------");

    let (reporter, mut channel) = ProgressChannel::new();
    let additive = SyncConfig {
        mode: SyncMode::InsertUpdate,
        ..config.clone()
    };
    let engine = SyncEngine::default()
        .with_baseline(baseline.clone())
        .with_progress(reporter);
    let result = engine.run(&additive).await;

    while let Some(event) = channel.try_recv() {
        if let ProgressEvent::OutcomeRecorded { outcome, completed, total, .. } = event {
            println!("  [{}/{}] {} {}: {:?}", completed, total, outcome.action, outcome.key, outcome.status);
        }
    }
    println!("{}", result.message);
    assert!(dest_dir.join("subdir").join("file3.txt").exists());
    assert!(dest_dir.join("stale.txt").exists());
    println!();

    // Example 3: Mirror
    println!("Example 3: Mirror");
    println!("-----------------");

    let engine = SyncEngine::default().with_baseline(baseline.clone());
    let result = engine.run(&config).await;
    println!("{}", result.message);
    println!("Deleted: {}", result.counts.deleted);
    println!("Baseline entries: {}", baseline.len());
    assert!(!dest_dir.join("stale.txt").exists());
    println!();

    // Example 4: Nothing left to do
    println!("Example 4: Second Run");
    println!("---------------------");

    let result = engine.run(&config).await;
    println!("{}", result.message);
    assert_eq!(result.counts.applied(), 0);

    println!();
    println!("All examples completed successfully!");
    Ok(())
}
