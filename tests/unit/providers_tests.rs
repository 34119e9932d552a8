/*!
 * Tests for the oracle cache, retry policy and mock backend
 */

use std::sync::Arc;

use docalign::alignment::prompts;
use docalign::app_config::ProviderKind;
use docalign::language::Language;
use docalign::providers::cache::{CachedOracle, ResponseCache};
use docalign::providers::mock::MockOracle;
use docalign::providers::{self, Oracle, OracleRequest, RetryPolicy};

use crate::common;

fn alignment_request(source: &str, target: &str) -> OracleRequest {
    OracleRequest::new(
        prompts::document_system_prompt(Language::English, Language::French),
        prompts::alignment_payload(source, target, None, None),
    )
}

#[tokio::test]
async fn test_cachedOracle_withSameRequest_shouldCallInnerOnce() {
    let mock = Arc::new(MockOracle::working());
    let cached = CachedOracle::new(mock.clone());

    let first = cached.invoke(alignment_request("Hello.", "Bonjour.")).await.unwrap();
    let second = cached.invoke(alignment_request("Hello.", "Bonjour.")).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(mock.request_count(), 1);
    let (hits, misses, _) = cached.cache().stats();
    assert_eq!((hits, misses), (1, 1));
}

#[tokio::test]
async fn test_cachedOracle_withDifferentPayload_shouldMiss() {
    let mock = Arc::new(MockOracle::working());
    let cached = CachedOracle::new(mock.clone());

    cached.invoke(alignment_request("Hello.", "Bonjour.")).await.unwrap();
    cached.invoke(alignment_request("Goodbye.", "Au revoir.")).await.unwrap();

    assert_eq!(mock.request_count(), 2);
    assert_eq!(cached.cache().len(), 2);
}

#[tokio::test]
async fn test_cachedOracle_withFailingInner_shouldNotStoreAnything() {
    let mock = Arc::new(MockOracle::failing());
    let cached = CachedOracle::new(mock.clone());

    assert!(cached.invoke(alignment_request("a", "b")).await.is_err());
    assert!(cached.invoke(alignment_request("a", "b")).await.is_err());
    assert_eq!(mock.request_count(), 2);
    assert!(cached.cache().is_empty());
}

#[tokio::test]
async fn test_cachedOracle_withSharedCache_shouldServeAcrossWrappers() {
    let cache = Arc::new(ResponseCache::new());
    let mock = Arc::new(MockOracle::working());
    let first = CachedOracle::with_cache(mock.clone(), cache.clone());
    let second = CachedOracle::with_cache(mock.clone(), cache.clone());

    first.invoke(alignment_request("One.", "Un.")).await.unwrap();
    second.invoke(alignment_request("One.", "Un.")).await.unwrap();

    assert_eq!(mock.request_count(), 1);
    assert_eq!(second.model(), mock.model());
}

#[tokio::test]
async fn test_workingMock_withSectionDelimiters_shouldKeepThem() {
    let oracle = MockOracle::working();
    let response = oracle
        .invoke(alignment_request(
            "---- Slide 1 ----\nWelcome\n---- Slide 2 ----\nThanks",
            "---- Slide 1 ----\nBienvenue\n---- Slide 2 ----\nMerci",
        ))
        .await
        .unwrap();

    assert_eq!(
        response.text,
        "---- Slide 1 ----\nWelcome ||| Bienvenue\n---- Slide 2 ----\nThanks ||| Merci\n"
    );
}

#[tokio::test]
async fn test_workingMock_withExtraTargetLines_shouldEmitTargetOnlyRows() {
    let oracle = MockOracle::working();
    let response = oracle.invoke(alignment_request("One.", "Un.\nDeux.")).await.unwrap();
    assert_eq!(response.text, "One. ||| Un.\n||| Deux.\n");
}

#[test]
fn test_retryPolicy_backoff_shouldGrowExponentiallyWithBoundedJitter() {
    let policy = RetryPolicy::new(3, 100);
    for _ in 0..20 {
        let first = policy.backoff(1).as_millis();
        let third = policy.backoff(3).as_millis();
        assert!((100..=125).contains(&first), "first backoff {}", first);
        assert!((400..=500).contains(&third), "third backoff {}", third);
    }
}

#[test]
fn test_fromConfig_withLocalProvider_shouldReportConfiguredModel() {
    let dir = common::create_temp_dir().unwrap();
    let mut config = common::test_config(dir.path());
    config.oracle.active_provider_config_mut().model = "qwen2.5-14b".to_string();

    let oracle = providers::from_config(&config).unwrap();
    assert_eq!(oracle.model().provider, ProviderKind::LMStudio);
    assert_eq!(oracle.model().model_id, "qwen2.5-14b");
    assert_eq!(oracle.model().to_string(), "lmstudio:qwen2.5-14b");
}
