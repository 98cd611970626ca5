use crate::core::dispatcher::{Dispatcher, RateLimits, TaskOutcome};
use crate::core::store::ResultStore;
use crate::domain::model::{AttemptFailure, Key, LookupResult, ProviderKind, UnresolvedKey};
use crate::domain::ports::Provider;
use crate::utils::error::{GeoError, Result};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 一個供應商層級：供應商本身、它的憑證與專屬的 dispatcher
#[derive(Clone)]
pub struct ProviderTier {
    provider: Arc<dyn Provider>,
    credential: Option<String>,
    dispatcher: Dispatcher,
}

impl ProviderTier {
    pub fn new(provider: Arc<dyn Provider>, credential: Option<String>, limits: RateLimits) -> Self {
        Self {
            provider,
            credential,
            dispatcher: Dispatcher::new(limits),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

/// `resolve` 的回傳：結果、未解析診斷、因取消而未處理的 key
#[derive(Debug, Default)]
pub struct Resolution {
    pub store: ResultStore,
    pub unresolved: Vec<UnresolvedKey>,
    pub pending: Vec<Key>,
}

impl Resolution {
    pub fn resolved_count(&self) -> usize {
        self.store.resolved_count()
    }
}

enum ChainOutcome {
    Finished(LookupResult, Vec<AttemptFailure>),
    Interrupted,
}

pub struct FallbackResolver {
    tiers: Vec<ProviderTier>,
}

impl FallbackResolver {
    pub fn new(tiers: Vec<ProviderTier>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(GeoError::MissingConfig {
                field: "providers".to_string(),
            });
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[ProviderTier] {
        &self.tiers
    }

    /// 每個 key 依序嘗試供應商，第一個成功者結束該 key 的鏈
    pub async fn resolve(&self, keys: &BTreeSet<Key>, cancel: &CancellationToken) -> Result<Resolution> {
        tracing::info!(
            "🔎 Resolving {} keys through {} provider tiers",
            keys.len(),
            self.tiers.len()
        );

        let chains = keys.iter().map(|key| self.run_chain(key, cancel));
        let outcomes = join_all(chains).await;

        let mut store = ResultStore::new();
        let mut unresolved = Vec::new();
        let mut pending = Vec::new();

        for (key, outcome) in keys.iter().zip(outcomes) {
            match outcome? {
                ChainOutcome::Finished(result, failures) => {
                    if !result.is_resolved() {
                        unresolved.push(UnresolvedKey {
                            key: key.clone(),
                            attempted_providers: result.attempted_providers().to_vec(),
                            failures,
                        });
                    }
                    store.insert(key.clone(), result);
                }
                ChainOutcome::Interrupted => pending.push(key.clone()),
            }
        }

        tracing::info!(
            "✅ Resolved {}/{} keys ({} unresolved, {} not attempted)",
            store.resolved_count(),
            keys.len(),
            unresolved.len(),
            pending.len()
        );

        Ok(Resolution {
            store,
            unresolved,
            pending,
        })
    }

    async fn run_chain(&self, key: &Key, cancel: &CancellationToken) -> Result<ChainOutcome> {
        let mut attempted = Vec::with_capacity(self.tiers.len());
        let mut failures = Vec::new();

        for tier in &self.tiers {
            let provider = tier.provider.clone();
            let credential = tier.credential.as_deref();
            let outcome = tier
                .dispatcher
                .call(|| async move { provider.lookup(key, credential).await }, cancel)
                .await?;

            match outcome {
                TaskOutcome::Completed(hit) => {
                    attempted.push(tier.kind());
                    tracing::debug!("📍 {}: resolved by {}", key, tier.kind());
                    return Ok(ChainOutcome::Finished(
                        LookupResult::resolved(
                            hit.coordinates,
                            tier.kind(),
                            Some(hit.raw_payload),
                            attempted,
                        ),
                        failures,
                    ));
                }
                TaskOutcome::Failed(cause) => {
                    attempted.push(tier.kind());
                    tracing::debug!("↪️ {}: {} gave no result ({})", key, tier.kind(), cause);
                    failures.push(AttemptFailure {
                        provider: tier.kind(),
                        cause,
                    });
                }
                TaskOutcome::NotStarted => return Ok(ChainOutcome::Interrupted),
            }
        }

        tracing::warn!("⚠️ {}: no provider returned coordinates", key);
        Ok(ChainOutcome::Finished(
            LookupResult::unresolved(None, attempted),
            failures,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalize::normalize;
    use crate::domain::model::{Coordinates, ProviderHit};
    use crate::utils::error::ProviderError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProvider {
        kind: ProviderKind,
        answers: HashMap<String, (f64, f64)>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(kind: ProviderKind, answers: &[(&str, (f64, f64))]) -> Arc<Self> {
            Arc::new(Self {
                kind,
                answers: answers
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Provider for FakeProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn lookup(
            &self,
            key: &Key,
            _credential: Option<&str>,
        ) -> std::result::Result<ProviderHit, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answers.get(key.as_str()) {
                Some((lat, lng)) => Ok(ProviderHit {
                    coordinates: Coordinates::new(*lat, *lng).unwrap(),
                    raw_payload: serde_json::json!({ "cep": key.as_str() }),
                }),
                None => Err(ProviderError::NoResult("unknown key".to_string())),
            }
        }
    }

    fn limits() -> RateLimits {
        RateLimits::new(5, 50).unwrap()
    }

    fn keys(raw: &[&str]) -> BTreeSet<Key> {
        raw.iter().map(|r| normalize(r).unwrap()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_secondary_for_unknown_key() {
        let primary = FakeProvider::new(
            ProviderKind::BrasilApi,
            &[("01310100", (-23.561, -46.655)), ("01001000", (-23.550, -46.633))],
        );
        let secondary = FakeProvider::new(ProviderKind::Geocode, &[("99999999", (-3.1, -60.0))]);

        let resolver = FallbackResolver::new(vec![
            ProviderTier::new(primary.clone(), None, limits()),
            ProviderTier::new(secondary.clone(), Some("token".to_string()), limits()),
        ])
        .unwrap();

        let input = keys(&["01310100", "99999999", "1001000"]);
        let resolution = resolver
            .resolve(&input, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resolution.store.len(), 3);
        assert!(resolution.unresolved.is_empty());

        let fallback = resolution.store.get(&normalize("99999999").unwrap()).unwrap();
        assert_eq!(fallback.source_provider(), Some(ProviderKind::Geocode));
        assert_eq!(
            fallback.attempted_providers(),
            &[ProviderKind::BrasilApi, ProviderKind::Geocode]
        );

        let padded = resolution.store.get(&normalize("01001000").unwrap()).unwrap();
        assert_eq!(padded.source_provider(), Some(ProviderKind::BrasilApi));

        assert_eq!(primary.calls.load(Ordering::SeqCst), 3);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_chain_is_recorded_as_unresolved() {
        let primary = FakeProvider::new(ProviderKind::BrasilApi, &[]);
        let tertiary = FakeProvider::new(ProviderKind::Scrape, &[]);
        let resolver = FallbackResolver::new(vec![
            ProviderTier::new(primary, None, limits()),
            ProviderTier::new(tertiary, None, limits()),
        ])
        .unwrap();

        let input = keys(&["12345678"]);
        let resolution = resolver
            .resolve(&input, &CancellationToken::new())
            .await
            .unwrap();

        let entry = resolution.store.get(&normalize("12345678").unwrap()).unwrap();
        assert!(!entry.is_resolved());
        assert_eq!(entry.source_provider(), None);
        assert_eq!(resolution.unresolved.len(), 1);
        assert_eq!(
            resolution.unresolved[0].attempted_providers,
            vec![ProviderKind::BrasilApi, ProviderKind::Scrape]
        );
        assert_eq!(resolution.unresolved[0].failures.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_exactly_one_entry_per_key() {
        let primary = FakeProvider::new(ProviderKind::BrasilApi, &[("00000001", (1.0, 1.0))]);
        let resolver =
            FallbackResolver::new(vec![ProviderTier::new(primary, None, limits())]).unwrap();

        let raw: Vec<String> = (1..=40).map(|i| i.to_string()).collect();
        let input = keys(&raw.iter().map(String::as_str).collect::<Vec<_>>());
        let resolution = resolver
            .resolve(&input, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resolution.store.len(), 40);
        assert!(input.iter().all(|k| resolution.store.get(k).is_some()));
        assert_eq!(resolution.resolved_count(), 1);
        assert_eq!(resolution.unresolved.len(), 39);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_keys_are_pending_not_unresolved() {
        let primary = FakeProvider::new(ProviderKind::BrasilApi, &[]);
        let resolver =
            FallbackResolver::new(vec![ProviderTier::new(primary, None, limits())]).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let input = keys(&["01310100", "01001000"]);
        let resolution = resolver.resolve(&input, &cancel).await.unwrap();

        assert!(resolution.store.is_empty());
        assert_eq!(resolution.pending.len(), 2);
    }

    #[test]
    fn test_requires_at_least_one_tier() {
        assert!(FallbackResolver::new(Vec::new()).is_err());
    }
}
