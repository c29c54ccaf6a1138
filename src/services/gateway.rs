//! Auth gateway
//!
//! Composes the identity resolver with the user directory for login, and
//! with the ledger and counter sync for engagement actions. Validation
//! always runs before the first network or storage call.

use bson::oid::ObjectId;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::db::schemas::ANONYMOUS_PUBLISHER;
use crate::db::Stores;
use crate::services::counters::CounterSync;
use crate::services::directory::UserDirectory;
use crate::services::identity::{IdentityProvider, IdentityResolver};
use crate::services::ledger::EngagementLedger;
use crate::types::{
    EngagementKind, EngagementReceipt, EngagementRecord, EngagementState, Identity, Result,
    SardeneError, StorageError, ValidationError,
};

/// Body returned by a successful login
#[derive(Debug, Serialize)]
pub struct AuthGrant {
    pub identity: Identity,
    pub access_token: String,
    pub token_type: String,
    pub scope: String,
}

/// Parse a path segment as an idea id (24 hex characters)
pub fn parse_idea_id(raw: &str) -> std::result::Result<ObjectId, ValidationError> {
    ObjectId::parse_str(raw).map_err(|_| ValidationError::InvalidIdeaId(raw.to_string()))
}

#[derive(Clone)]
pub struct AuthGateway {
    resolver: IdentityResolver,
    directory: UserDirectory,
    ledger: EngagementLedger,
    counters: CounterSync,
}

impl AuthGateway {
    pub fn new(
        resolver: IdentityResolver,
        directory: UserDirectory,
        ledger: EngagementLedger,
        counters: CounterSync,
    ) -> Self {
        Self {
            resolver,
            directory,
            ledger,
            counters,
        }
    }

    /// Wire a gateway over one set of stores
    pub fn from_stores(
        stores: &Stores,
        provider: Arc<dyn IdentityProvider>,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Self {
        Self::new(
            IdentityResolver::new(provider),
            UserDirectory::new(stores.users.clone(), read_timeout, write_timeout),
            EngagementLedger::new(
                stores.ideas.clone(),
                stores.engagements.clone(),
                write_timeout,
            ),
            CounterSync::new(stores.ideas.clone(), write_timeout),
        )
    }

    /// Exchange an OAuth code and make sure the identity is provisioned.
    ///
    /// Nothing is written when the exchange fails.
    pub async fn login(&self, code: &str) -> Result<AuthGrant> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ValidationError::MalformedBody("code is required".into()).into());
        }

        let (identity, credential, token) = self.resolver.exchange_code(code).await?;
        let provisioning = self.directory.ensure_provisioned(&identity).await?;

        info!(
            user_id = identity.id,
            login = %identity.login,
            ?provisioning,
            "User signed in"
        );

        Ok(AuthGrant {
            identity,
            access_token: credential.into_inner(),
            token_type: token.token_type,
            scope: token.scope,
        })
    }

    /// Resolve the caller from a raw `Authorization` header
    pub async fn authenticate(&self, raw_header: Option<&str>) -> Result<Identity> {
        let credential = self.resolver.validate_bearer_header(raw_header)?;
        Ok(self.resolver.resolve_identity(&credential).await?)
    }

    /// Record an engagement and apply its counter effect as one unit.
    ///
    /// The unit runs on its own task so a dropped request cannot leave the
    /// pair half-applied; this call awaits its outcome.
    pub async fn engage(
        &self,
        raw_header: Option<&str>,
        raw_idea_id: &str,
        kind: EngagementKind,
    ) -> Result<EngagementReceipt> {
        let idea_id = parse_idea_id(raw_idea_id)?;
        let identity = self.authenticate(raw_header).await?;

        let ledger = self.ledger.clone();
        let counters = self.counters.clone();
        let unit = tokio::spawn(async move {
            settle_engagement(&ledger, &counters, identity.id, idea_id, kind).await
        });

        unit.await
            .map_err(|e| SardeneError::Internal(format!("Engagement task failed: {}", e)))?
    }

    /// The caller's engagement records of one kind
    pub async fn engagements_of(
        &self,
        raw_header: Option<&str>,
        kind: EngagementKind,
    ) -> Result<Vec<EngagementRecord>> {
        let identity = self.authenticate(raw_header).await?;
        let records = self.ledger.list_engagements(identity.id).await?;
        Ok(records.into_iter().filter(|r| r.kind == kind).collect())
    }

    /// Login of the caller when a valid bearer is supplied, else the
    /// anonymous publisher name
    pub async fn publisher_for(&self, raw_header: Option<&str>) -> String {
        if raw_header.is_none() {
            return ANONYMOUS_PUBLISHER.to_string();
        }

        match self.authenticate(raw_header).await {
            Ok(identity) => identity.login,
            Err(e) => {
                debug!(error = %e, "Publishing anonymously");
                ANONYMOUS_PUBLISHER.to_string()
            }
        }
    }
}

/// Unengaged -> Engaged -> Settled, or back to Unengaged on a failed effect
async fn settle_engagement(
    ledger: &EngagementLedger,
    counters: &CounterSync,
    user_id: i64,
    idea_id: ObjectId,
    kind: EngagementKind,
) -> Result<EngagementReceipt> {
    let record = ledger.record_engagement(user_id, idea_id, kind).await?;
    let settled = EngagementReceipt {
        record: record.clone(),
        state: EngagementState::Settled,
    };

    match counters.apply_engagement_effect(idea_id, kind).await {
        Ok(()) => Ok(settled),
        Err(SardeneError::Storage(timeout @ StorageError::Timeout(_))) => {
            // The increment may have landed; only undo the record if it did not
            match effect_landed(ledger, counters, idea_id, kind).await {
                Ok(true) => {
                    info!(user_id, idea_id = %idea_id, %kind, "Counter increment landed after its deadline");
                    Ok(settled)
                }
                Ok(false) => {
                    warn!(user_id, idea_id = %idea_id, %kind, "Counter increment timed out, compensating ledger record");
                    ledger.compensate(&record).await?;
                    Err(timeout.into())
                }
                Err(e) => {
                    error!(
                        user_id,
                        idea_id = %idea_id,
                        %kind,
                        state = ?EngagementState::Engaged,
                        error = %e,
                        "Counter outcome unknown, ledger record kept"
                    );
                    Err(timeout.into())
                }
            }
        }
        Err(effect_err) => {
            warn!(
                user_id,
                idea_id = %idea_id,
                %kind,
                error = %effect_err,
                "Counter update failed, compensating ledger record"
            );
            ledger.compensate(&record).await?;
            Err(effect_err)
        }
    }
}

/// Whether the counter already covers every ledger record of `kind` on the
/// idea, this unit's record included
async fn effect_landed(
    ledger: &EngagementLedger,
    counters: &CounterSync,
    idea_id: ObjectId,
    kind: EngagementKind,
) -> std::result::Result<bool, StorageError> {
    let Some(counter) = counters.current_count(idea_id, kind).await? else {
        return Ok(false);
    };
    let recorded = ledger.count_engagements(idea_id, kind).await?;
    Ok(counter >= recorded as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{EngagementDoc, IdeaChanges, IdeaDoc, UserDoc};
    use crate::db::{EngagementStore, IdeaStore, InsertOutcome, MemoryStore, UserStore};
    use crate::services::identity::{ProviderProfile, ProviderToken};
    use crate::types::{AuthError, BearerCredential, ConflictError, NotFoundError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    const IDEA_HEX: &str = "507f1f77bcf86cd799439011";

    // ========================================================================
    // Test doubles
    // ========================================================================

    /// Provider with fixed code -> token and token -> profile tables
    #[derive(Default)]
    struct TableProvider {
        codes: HashMap<String, String>,
        profiles: HashMap<String, ProviderProfile>,
        calls: AtomicUsize,
    }

    impl TableProvider {
        fn with_user(mut self, code: &str, token: &str, id: i64, login: &str) -> Self {
            self.codes.insert(code.into(), token.into());
            self.profiles.insert(
                token.into(),
                ProviderProfile {
                    id,
                    login: Some(login.into()),
                    name: Some(login.to_uppercase()),
                },
            );
            self
        }
    }

    #[async_trait]
    impl IdentityProvider for TableProvider {
        async fn exchange_code(&self, code: &str) -> std::result::Result<ProviderToken, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let access_token = self.codes.get(code).cloned().ok_or(AuthError::InvalidCode)?;
            Ok(ProviderToken {
                access_token,
                token_type: "bearer".into(),
                scope: "read:user".into(),
            })
        }

        async fn fetch_profile(
            &self,
            credential: &BearerCredential,
        ) -> std::result::Result<ProviderProfile, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.profiles
                .get(credential.as_str())
                .cloned()
                .ok_or(AuthError::InvalidIdentity)
        }
    }

    #[derive(Clone, Copy)]
    enum CounterFault {
        Unavailable,
        Vanished,
        /// Never answers and never applies
        Stalled,
        /// Applies, then stalls past the deadline
        LandedLate,
    }

    /// Idea store whose counter increment always fails
    struct FaultyCounters {
        inner: Arc<MemoryStore>,
        fault: CounterFault,
    }

    #[async_trait]
    impl IdeaStore for FaultyCounters {
        async fn insert(&self, idea: IdeaDoc) -> std::result::Result<(), StorageError> {
            IdeaStore::insert(self.inner.as_ref(), idea).await
        }

        async fn find_by_id(
            &self,
            id: ObjectId,
        ) -> std::result::Result<Option<IdeaDoc>, StorageError> {
            self.inner.find_by_id(id).await
        }

        async fn list(&self) -> std::result::Result<Vec<IdeaDoc>, StorageError> {
            self.inner.list().await
        }

        async fn update_fields(
            &self,
            id: ObjectId,
            changes: IdeaChanges,
        ) -> std::result::Result<bool, StorageError> {
            self.inner.update_fields(id, changes).await
        }

        async fn delete(&self, id: ObjectId) -> std::result::Result<bool, StorageError> {
            self.inner.delete(id).await
        }

        async fn increment_counter(
            &self,
            id: ObjectId,
            kind: EngagementKind,
        ) -> std::result::Result<bool, StorageError> {
            match self.fault {
                CounterFault::Unavailable => {
                    Err(StorageError::Unavailable("primary stepped down".into()))
                }
                CounterFault::Vanished => Ok(false),
                CounterFault::Stalled => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(false)
                }
                CounterFault::LandedLate => {
                    let matched = self.inner.increment_counter(id, kind).await?;
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(matched)
                }
            }
        }
    }

    /// Counts every storage call that reaches it
    struct CountingStore {
        inner: Arc<MemoryStore>,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn tick(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl IdeaStore for CountingStore {
        async fn insert(&self, idea: IdeaDoc) -> std::result::Result<(), StorageError> {
            self.tick();
            IdeaStore::insert(self.inner.as_ref(), idea).await
        }

        async fn find_by_id(
            &self,
            id: ObjectId,
        ) -> std::result::Result<Option<IdeaDoc>, StorageError> {
            self.tick();
            self.inner.find_by_id(id).await
        }

        async fn list(&self) -> std::result::Result<Vec<IdeaDoc>, StorageError> {
            self.tick();
            self.inner.list().await
        }

        async fn update_fields(
            &self,
            id: ObjectId,
            changes: IdeaChanges,
        ) -> std::result::Result<bool, StorageError> {
            self.tick();
            self.inner.update_fields(id, changes).await
        }

        async fn delete(&self, id: ObjectId) -> std::result::Result<bool, StorageError> {
            self.tick();
            self.inner.delete(id).await
        }

        async fn increment_counter(
            &self,
            id: ObjectId,
            kind: EngagementKind,
        ) -> std::result::Result<bool, StorageError> {
            self.tick();
            self.inner.increment_counter(id, kind).await
        }
    }

    #[async_trait]
    impl UserStore for CountingStore {
        async fn find_by_github_id(
            &self,
            github_id: i64,
        ) -> std::result::Result<Option<UserDoc>, StorageError> {
            self.tick();
            self.inner.find_by_github_id(github_id).await
        }

        async fn insert(&self, user: UserDoc) -> std::result::Result<InsertOutcome, StorageError> {
            self.tick();
            UserStore::insert(self.inner.as_ref(), user).await
        }
    }

    #[async_trait]
    impl EngagementStore for CountingStore {
        async fn insert(
            &self,
            engagement: EngagementDoc,
        ) -> std::result::Result<InsertOutcome, StorageError> {
            self.tick();
            EngagementStore::insert(self.inner.as_ref(), engagement).await
        }

        async fn remove(
            &self,
            record: &EngagementRecord,
        ) -> std::result::Result<bool, StorageError> {
            self.tick();
            self.inner.remove(record).await
        }

        async fn list_for_user(
            &self,
            user_id: i64,
        ) -> std::result::Result<Vec<EngagementDoc>, StorageError> {
            self.tick();
            self.inner.list_for_user(user_id).await
        }

        async fn count_for_idea(
            &self,
            idea_id: ObjectId,
            kind: EngagementKind,
        ) -> std::result::Result<u64, StorageError> {
            self.tick();
            self.inner.count_for_idea(idea_id, kind).await
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn gateway(stores: &Stores, provider: Arc<TableProvider>) -> AuthGateway {
        AuthGateway::from_stores(
            stores,
            provider,
            Duration::from_secs(10),
            Duration::from_secs(30),
        )
    }

    async fn seed_idea(store: &MemoryStore) -> ObjectId {
        let mut idea = IdeaDoc::new("kettle".into(), "boils".into(), "alice".into());
        idea.id = ObjectId::parse_str(IDEA_HEX).unwrap();
        IdeaStore::insert(store, idea).await.unwrap();
        ObjectId::parse_str(IDEA_HEX).unwrap()
    }

    async fn gazers(store: &MemoryStore, id: ObjectId) -> i64 {
        store.find_by_id(id).await.unwrap().unwrap().gazers
    }

    // ========================================================================
    // Login
    // ========================================================================

    #[tokio::test]
    async fn test_login_provisions_once() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(
            TableProvider::default()
                .with_user("abc123", "gho_1", 1001, "alice")
                .with_user("def456", "gho_2", 1001, "alice"),
        );
        let gateway = gateway(&Stores::memory(store.clone()), provider);

        let grant = gateway.login("abc123").await.unwrap();
        assert_eq!(grant.identity.login, "alice");
        assert_eq!(grant.access_token, "gho_1");

        assert_ok!(gateway.login("def456").await);
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_login_with_invalid_code_creates_no_user() {
        let store = Arc::new(MemoryStore::new());
        let gateway = gateway(
            &Stores::memory(store.clone()),
            Arc::new(TableProvider::default()),
        );

        let err = gateway.login("expired").await.unwrap_err();
        assert!(matches!(err, SardeneError::Auth(AuthError::InvalidCode)));
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn test_login_with_blank_code_never_calls_provider() {
        let provider = Arc::new(TableProvider::default());
        let gateway = gateway(&Stores::memory(Arc::new(MemoryStore::new())), provider.clone());

        let err = gateway.login("   ").await.unwrap_err();
        assert!(matches!(err, SardeneError::Validation(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    // ========================================================================
    // Engagement
    // ========================================================================

    #[tokio::test]
    async fn test_like_twice_counts_once() {
        let store = Arc::new(MemoryStore::new());
        let idea_id = seed_idea(&store).await;
        let provider = Arc::new(TableProvider::default().with_user("c", "gho_a", 1, "alice"));
        let gateway = gateway(&Stores::memory(store.clone()), provider);

        let receipt = gateway
            .engage(Some("Bearer gho_a"), IDEA_HEX, EngagementKind::Like)
            .await
            .unwrap();
        assert_eq!(receipt.state, EngagementState::Settled);
        assert_eq!(gazers(&store, idea_id).await, 1);

        let err = gateway
            .engage(Some("Bearer gho_a"), IDEA_HEX, EngagementKind::Like)
            .await
            .unwrap_err();
        assert!(matches!(err, SardeneError::Conflict(ConflictError::AlreadyEngaged)));
        assert_eq!(gazers(&store, idea_id).await, 1);
        assert_eq!(store.engagement_count(), 1);
    }

    #[tokio::test]
    async fn test_like_and_make_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let idea_id = seed_idea(&store).await;
        let provider = Arc::new(TableProvider::default().with_user("c", "gho_a", 1, "alice"));
        let gateway = gateway(&Stores::memory(store.clone()), provider);

        assert_ok!(gateway.engage(Some("Bearer gho_a"), IDEA_HEX, EngagementKind::Like).await);
        assert_ok!(gateway.engage(Some("Bearer gho_a"), IDEA_HEX, EngagementKind::Make).await);

        let idea = store.find_by_id(idea_id).await.unwrap().unwrap();
        assert_eq!((idea.gazers, idea.makers), (1, 1));

        let made = gateway
            .engagements_of(Some("Bearer gho_a"), EngagementKind::Make)
            .await
            .unwrap();
        assert_eq!(made.len(), 1);
        assert_eq!(made[0].idea_id, idea_id);
    }

    #[tokio::test]
    async fn test_invalid_idea_id_touches_nothing() {
        let counting = Arc::new(CountingStore {
            inner: Arc::new(MemoryStore::new()),
            calls: AtomicUsize::new(0),
        });
        let stores = Stores {
            ideas: counting.clone(),
            users: counting.clone(),
            engagements: counting.clone(),
        };
        let provider = Arc::new(TableProvider::default().with_user("c", "gho_a", 1, "alice"));
        let gateway = gateway(&stores, provider.clone());

        let err = gateway
            .engage(Some("Bearer gho_a"), "not-a-hex-id", EngagementKind::Like)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SardeneError::Validation(ValidationError::InvalidIdeaId(_))
        ));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_header_never_calls_provider() {
        let store = Arc::new(MemoryStore::new());
        seed_idea(&store).await;
        let provider = Arc::new(TableProvider::default());
        let gateway = gateway(&Stores::memory(store), provider.clone());

        for header in [None, Some("gho_a"), Some("Bearer a b"), Some("Bearer ")] {
            let err = gateway
                .engage(header, IDEA_HEX, EngagementKind::Like)
                .await
                .unwrap_err();
            assert!(matches!(err, SardeneError::Auth(AuthError::InvalidHeaderFormat)));
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_idea_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(TableProvider::default().with_user("c", "gho_a", 1, "alice"));
        let gateway = gateway(&Stores::memory(store.clone()), provider);

        let err = gateway
            .engage(Some("Bearer gho_a"), IDEA_HEX, EngagementKind::Like)
            .await
            .unwrap_err();
        assert!(matches!(err, SardeneError::NotFound(NotFoundError::IdeaMissing)));
        assert_eq!(store.engagement_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_counter_update_is_compensated() {
        for fault in [CounterFault::Unavailable, CounterFault::Vanished] {
            let store = Arc::new(MemoryStore::new());
            let idea_id = seed_idea(&store).await;
            let stores = Stores {
                ideas: Arc::new(FaultyCounters {
                    inner: store.clone(),
                    fault,
                }),
                users: store.clone(),
                engagements: store.clone(),
            };
            let provider = Arc::new(TableProvider::default().with_user("c", "gho_a", 1, "alice"));
            let gateway = gateway(&stores, provider);

            let result = gateway
                .engage(Some("Bearer gho_a"), IDEA_HEX, EngagementKind::Like)
                .await;
            assert_err!(&result);

            // No record may outlive its failed effect
            assert_eq!(store.engagement_count(), 0);
            assert_eq!(gazers(&store, idea_id).await, 0);
        }
    }

    fn with_faulty_counters(store: &Arc<MemoryStore>, fault: CounterFault) -> Stores {
        Stores {
            ideas: Arc::new(FaultyCounters {
                inner: store.clone(),
                fault,
            }),
            users: store.clone(),
            engagements: store.clone(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_counter_update_is_compensated() {
        let store = Arc::new(MemoryStore::new());
        let idea_id = seed_idea(&store).await;
        let provider = Arc::new(TableProvider::default().with_user("c", "gho_a", 1, "alice"));
        let gateway = gateway(&with_faulty_counters(&store, CounterFault::Stalled), provider);

        let err = gateway
            .engage(Some("Bearer gho_a"), IDEA_HEX, EngagementKind::Like)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "STORAGE_TIMEOUT");
        assert_eq!(store.engagement_count(), 0);
        assert_eq!(gazers(&store, idea_id).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_counter_update_keeps_record() {
        let store = Arc::new(MemoryStore::new());
        let idea_id = seed_idea(&store).await;
        let provider = Arc::new(TableProvider::default().with_user("c", "gho_a", 1, "alice"));
        let gateway = gateway(&with_faulty_counters(&store, CounterFault::LandedLate), provider);

        let receipt = gateway
            .engage(Some("Bearer gho_a"), IDEA_HEX, EngagementKind::Like)
            .await
            .unwrap();
        assert_eq!(receipt.state, EngagementState::Settled);
        assert_eq!(store.engagement_count(), 1);
        assert_eq!(gazers(&store, idea_id).await, 1);
    }

    /// Ledger store whose first insert lands and then stalls past the deadline
    struct SlowFirstInsert {
        inner: Arc<MemoryStore>,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl EngagementStore for SlowFirstInsert {
        async fn insert(
            &self,
            engagement: EngagementDoc,
        ) -> std::result::Result<InsertOutcome, StorageError> {
            let outcome = EngagementStore::insert(self.inner.as_ref(), engagement).await?;
            if self.inserts.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(outcome)
        }

        async fn remove(
            &self,
            record: &EngagementRecord,
        ) -> std::result::Result<bool, StorageError> {
            self.inner.remove(record).await
        }

        async fn list_for_user(
            &self,
            user_id: i64,
        ) -> std::result::Result<Vec<EngagementDoc>, StorageError> {
            self.inner.list_for_user(user_id).await
        }

        async fn count_for_idea(
            &self,
            idea_id: ObjectId,
            kind: EngagementKind,
        ) -> std::result::Result<u64, StorageError> {
            self.inner.count_for_idea(idea_id, kind).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_ledger_insert_can_be_retried() {
        let store = Arc::new(MemoryStore::new());
        let idea_id = seed_idea(&store).await;
        let stores = Stores {
            ideas: store.clone(),
            users: store.clone(),
            engagements: Arc::new(SlowFirstInsert {
                inner: store.clone(),
                inserts: AtomicUsize::new(0),
            }),
        };
        let provider = Arc::new(TableProvider::default().with_user("c", "gho_a", 1, "alice"));
        let gateway = gateway(&stores, provider);

        let err = gateway
            .engage(Some("Bearer gho_a"), IDEA_HEX, EngagementKind::Like)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "STORAGE_TIMEOUT");
        assert_eq!(store.engagement_count(), 0);
        assert_eq!(gazers(&store, idea_id).await, 0);

        // Nothing left behind, so the retry goes through
        assert_ok!(gateway.engage(Some("Bearer gho_a"), IDEA_HEX, EngagementKind::Like).await);
        assert_eq!(store.engagement_count(), 1);
        assert_eq!(gazers(&store, idea_id).await, 1);
    }

    // ========================================================================
    // Concurrency
    // ========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_users_liking_concurrently() {
        const USERS: i64 = 16;

        let store = Arc::new(MemoryStore::new());
        let idea_id = seed_idea(&store).await;
        let mut provider = TableProvider::default();
        for i in 0..USERS {
            provider = provider.with_user(&format!("c{i}"), &format!("gho_{i}"), i, &format!("user{i}"));
        }
        let gateway = Arc::new(gateway(&Stores::memory(store.clone()), Arc::new(provider)));

        let handles: Vec<_> = (0..USERS)
            .map(|i| {
                let gateway = gateway.clone();
                tokio::spawn(async move {
                    let header = format!("Bearer gho_{i}");
                    gateway
                        .engage(Some(header.as_str()), IDEA_HEX, EngagementKind::Like)
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_ok!(handle.await.unwrap());
        }

        assert_eq!(gazers(&store, idea_id).await, USERS);
        assert_eq!(store.engagement_count(), USERS as usize);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_user_liking_concurrently_wins_once() {
        let store = Arc::new(MemoryStore::new());
        let idea_id = seed_idea(&store).await;
        let provider = Arc::new(TableProvider::default().with_user("c", "gho_a", 1, "alice"));
        let gateway = Arc::new(gateway(&Stores::memory(store.clone()), provider));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gateway = gateway.clone();
                tokio::spawn(async move {
                    gateway
                        .engage(Some("Bearer gho_a"), IDEA_HEX, EngagementKind::Like)
                        .await
                })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(SardeneError::Conflict(ConflictError::AlreadyEngaged)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(gazers(&store, idea_id).await, 1);
        assert_eq!(store.engagement_count(), 1);
    }

    // ========================================================================
    // Publisher
    // ========================================================================

    #[tokio::test]
    async fn test_publisher_falls_back_to_anonymous() {
        let provider = Arc::new(TableProvider::default().with_user("c", "gho_a", 1, "alice"));
        let gateway = gateway(&Stores::memory(Arc::new(MemoryStore::new())), provider);

        assert_eq!(gateway.publisher_for(Some("Bearer gho_a")).await, "alice");
        assert_eq!(gateway.publisher_for(None).await, ANONYMOUS_PUBLISHER);
        assert_eq!(gateway.publisher_for(Some("Bearer unknown")).await, ANONYMOUS_PUBLISHER);
    }
}
