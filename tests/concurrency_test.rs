//! Concurrent access to a shared code pool

use codepool::error::Result;
use codepool::storage::{Code, CodeStoreEngine, StoreOptions};
use codepool::CodeService;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tempfile::TempDir;

const TASKS: usize = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_takes_never_repeat() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let engine = CodeStoreEngine::open(dir.path(), StoreOptions::for_testing(2_000))?;
    let service = CodeService::new(Arc::new(engine));

    let mut handles = Vec::new();
    for _ in 0..TASKS {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let mut taken = Vec::new();
            while let Some(code) = service.take().await? {
                taken.push(code);
            }
            Ok::<_, codepool::error::Error>(taken)
        }));
    }

    let mut all = HashSet::new();
    let mut count = 0;
    for handle in handles {
        let taken = handle.await.expect("task panicked")?;
        count += taken.len();
        all.extend(taken);
    }

    assert_eq!(count, 2_000);
    assert_eq!(all.len(), 2_000);
    let mut handed_out: Vec<Code> = all.into_iter().collect();
    handed_out.sort_unstable();
    assert_eq!(service.export().await?, handed_out);
    assert_eq!(service.remaining().await?, 0);
    assert_eq!(service.take().await?, None);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_mutations_interleave_atomically() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let engine = CodeStoreEngine::open(dir.path(), StoreOptions::for_testing(1_000))?;
    let service = CodeService::new(Arc::new(engine.clone()));

    let mut handles = Vec::new();
    for task in 0..TASKS {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            for round in 0..20 {
                match (task + round) % 4 {
                    0 => {
                        service.import(&[(task * 50 + round) as i64]).await?;
                    }
                    1 if round == 10 => {
                        service.clear().await?;
                    }
                    _ => {
                        service.take().await?;
                    }
                }
                assert!(service.export().await?.len() <= 1_000);
            }
            Ok::<_, codepool::error::Error>(())
        }));
    }

    for handle in handles {
        handle.await.expect("task panicked")?;
    }

    // Conservation, checked against the issued flags and the available list
    let exported = service.export().await?;
    assert!(exported.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(exported.len() + service.remaining().await?, 1_000);

    // Without clears, everything the tasks took or imported ends up issued
    let mut handles = Vec::new();
    for task in 0..TASKS {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let mut touched = Vec::new();
            for round in 0..10 {
                if round % 2 == 0 {
                    let code = (500 + task * 10 + round) as Code;
                    service.import(&[i64::from(code)]).await?;
                    touched.push(code);
                } else if let Some(code) = service.take().await? {
                    touched.push(code);
                }
            }
            Ok::<_, codepool::error::Error>(touched)
        }));
    }

    let mut expected: BTreeSet<Code> = exported.into_iter().collect();
    for handle in handles {
        expected.extend(handle.await.expect("task panicked")?);
    }
    let exported = service.export().await?;
    assert_eq!(exported, expected.into_iter().collect::<Vec<_>>());
    assert_eq!(service.remaining().await?, 1_000 - exported.len());

    // And after a restart the journal replays to the same state
    drop(service);
    drop(engine);
    let reopened = CodeStoreEngine::open(dir.path(), StoreOptions::for_testing(1_000))?;
    let service = CodeService::new(Arc::new(reopened));
    assert_eq!(service.export().await?, exported);
    assert_eq!(service.remaining().await?, 1_000 - exported.len());
    Ok(())
}
