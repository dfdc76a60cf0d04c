mod helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use lumara::cache::EmbeddingCache;
use lumara::service::EmbedOptions;
use lumara::Error;

use helpers::{counting_service, embedding_for};

fn memory_cache() -> EmbeddingCache {
    EmbeddingCache::memory_only(64, "counting")
}

#[tokio::test]
async fn concurrent_identical_requests_share_one_computation() {
    let (service, calls) = counting_service(memory_cache(), Duration::from_millis(50));
    let service = Arc::new(service);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            service
                .generate("the same sentence", &EmbedOptions::default())
                .await
        }));
    }

    let mut vectors = Vec::new();
    for task in tasks {
        vectors.push(task.await.unwrap().unwrap());
    }

    assert_eq!(
        calls.single.load(Ordering::SeqCst),
        1,
        "all eight callers must share one model invocation"
    );
    for v in &vectors[1..] {
        assert_eq!(v, &vectors[0]);
    }
}

#[tokio::test]
async fn batch_preserves_input_order() {
    let (service, calls) = counting_service(memory_cache(), Duration::ZERO);

    let texts = ["alpha", "bravo", "charlie", "delta"];
    let vectors = service
        .generate_batch(&texts, &EmbedOptions::default())
        .await
        .unwrap();

    assert_eq!(vectors.len(), texts.len());
    for (text, vector) in texts.iter().zip(&vectors) {
        assert_eq!(vector, &embedding_for(text));
    }
    assert_eq!(calls.batch.load(Ordering::SeqCst), 1);
    assert_eq!(calls.single.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn batch_serves_hits_from_cache() {
    let (service, calls) = counting_service(memory_cache(), Duration::ZERO);

    service
        .generate("bravo", &EmbedOptions::default())
        .await
        .unwrap();

    let texts = ["alpha", "bravo", "charlie"];
    let vectors = service
        .generate_batch(&texts, &EmbedOptions::default())
        .await
        .unwrap();

    // One single call for the warm-up, then one batch for the two misses;
    // order still matches input.
    assert_eq!(calls.single.load(Ordering::SeqCst), 1);
    assert_eq!(calls.batch.load(Ordering::SeqCst), 1);
    assert_eq!(vectors[1], embedding_for("bravo"));
    assert_eq!(vectors[0], embedding_for("alpha"));
    assert_eq!(vectors[2], embedding_for("charlie"));
}

#[tokio::test]
async fn batch_accepts_owned_strings() {
    let (service, calls) = counting_service(memory_cache(), Duration::ZERO);

    // Callers reading texts from files hold Vec<String>, not &strs.
    let texts: Vec<String> = vec!["from a file".into(), "another line".into()];
    let vectors = service
        .generate_batch(&texts, &EmbedOptions::default())
        .await
        .unwrap();

    assert_eq!(vectors[0], embedding_for("from a file"));
    assert_eq!(vectors[1], embedding_for("another line"));
    assert_eq!(calls.batch.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn timeout_rejects_and_leaves_cache_unmodified() {
    let (service, _calls) = counting_service(memory_cache(), Duration::from_millis(500));

    let opts = EmbedOptions {
        timeout: Some(Duration::from_millis(10)),
        ..Default::default()
    };
    let err = service.generate("slow sentence", &opts).await;
    assert!(matches!(err, Err(Error::Timeout(_))));
    assert!(!service.cache().has("slow sentence").await);

    // A later call without a deadline succeeds; the failure was not sticky.
    let vector = service
        .generate("slow sentence", &EmbedOptions::default())
        .await
        .unwrap();
    assert_eq!(vector, embedding_for("slow sentence"));
}

#[tokio::test]
async fn no_cache_option_bypasses_both_tiers() {
    let (service, calls) = counting_service(memory_cache(), Duration::ZERO);

    let opts = EmbedOptions {
        use_cache: false,
        ..Default::default()
    };
    service.generate("raw", &opts).await.unwrap();
    service.generate("raw", &opts).await.unwrap();

    assert_eq!(calls.single.load(Ordering::SeqCst), 2);
    assert!(!service.cache().has("raw").await);
}

#[tokio::test]
async fn whitespace_variants_share_a_cache_entry() {
    let (service, calls) = counting_service(memory_cache(), Duration::ZERO);

    let a = service
        .generate("  padded  ", &EmbedOptions::default())
        .await
        .unwrap();
    let b = service
        .generate("padded", &EmbedOptions::default())
        .await
        .unwrap();

    assert_eq!(a, b);
    assert_eq!(calls.single.load(Ordering::SeqCst), 1);
}
