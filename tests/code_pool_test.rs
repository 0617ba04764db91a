//! End-to-end tests for the code pool on a durable store

use codepool::error::Result;
use codepool::storage::{CodeStoreEngine, StoreOptions, DEFAULT_POOL_SIZE};
use codepool::text::{parse_codes, render_codes};
use codepool::CodeService;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn open_service(path: &Path) -> Result<CodeService> {
    let engine = CodeStoreEngine::open(path, StoreOptions::for_testing(DEFAULT_POOL_SIZE))?;
    Ok(CodeService::new(Arc::new(engine)))
}

#[tokio::test]
async fn test_take_import_clear_scenario() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let service = open_service(dir.path())?;

    assert_eq!(service.remaining().await?, 10_000);

    let code = service.take().await?.expect("fresh pool has codes");
    assert!(code < 10_000);
    assert_eq!(service.remaining().await?, 9_999);

    // Already issued by the take
    assert_eq!(service.import(&[i64::from(code)]).await?, 0);

    assert_eq!(service.clear().await?, 1);
    assert_eq!(service.remaining().await?, 10_000);
    Ok(())
}

#[tokio::test]
async fn test_exhaustion_and_conservation() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let service = open_service(dir.path())?;
    let mut seen = HashSet::new();

    for i in 0..10_000 {
        let code = service.take().await?.expect("pool not yet exhausted");
        assert!(seen.insert(code), "code {} issued twice", code);

        if i % 1_000 == 0 {
            let remaining = service.remaining().await?;
            let exported = service.export().await?;
            assert_eq!(remaining + exported.len(), 10_000);
        }
    }

    assert_eq!(service.take().await?, None);
    assert_eq!(service.remaining().await?, 0);
    assert_eq!(service.export().await?.len(), 10_000);
    Ok(())
}

#[tokio::test]
async fn test_import_export_round_trip() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let service = open_service(dir.path())?;

    let input = vec![9_000, 17, 17, -4, 10_000, 250, 9_000, 0];
    assert_eq!(service.import(&input).await?, 4);
    assert_eq!(service.export().await?, vec![0, 17, 250, 9_000]);

    // Importing again is a no-op
    assert_eq!(service.import(&input).await?, 0);

    assert_eq!(service.clear().await?, 4);
    assert!(service.export().await?.is_empty());
    assert_eq!(service.remaining().await?, 10_000);
    Ok(())
}

#[tokio::test]
async fn test_backup_restore_through_text() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let service = open_service(dir.path())?;

    for _ in 0..50 {
        service.take().await?;
    }
    let backup = render_codes(&service.export().await?);

    assert_eq!(service.clear().await?, 50);
    assert_eq!(service.import(&parse_codes(&backup)).await?, 50);
    assert_eq!(render_codes(&service.export().await?), backup);
    assert_eq!(service.remaining().await?, 9_950);
    Ok(())
}

#[tokio::test]
async fn test_issued_codes_survive_restart() -> Result<()> {
    let dir = TempDir::new().unwrap();

    let issued = {
        let service = open_service(dir.path())?;
        for _ in 0..100 {
            service.take().await?;
        }
        service.import(&[1, 2, 3]).await?;
        service.export().await?
    };

    let service = open_service(dir.path())?;
    assert_eq!(service.export().await?, issued);
    assert_eq!(service.remaining().await? + issued.len(), 10_000);

    // Codes issued before the restart are never handed out again
    let before: HashSet<_> = issued.into_iter().collect();
    for _ in 0..500 {
        let code = service.take().await?.expect("pool not exhausted");
        assert!(!before.contains(&code));
    }
    Ok(())
}
