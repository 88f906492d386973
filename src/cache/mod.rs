//! Cache-aside storage for resource snapshots.
//!
//! A [`CacheStore`] is a raw key-value store with per-entry expiry. On top of
//! it, [`ResourceCache`] gives each resource type its own namespace and a
//! typed `get` / `set` / `delete`, where a miss (`Ok(None)`) is distinct
//! from a store failure (`Err`). [`Caches`] bundles one `ResourceCache` per
//! namespace.
//!
//! Entries are never updated in place. A mutation deletes the entry and the
//! next reader repopulates it from the backend.

use std::{fmt, marker::PhantomData, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::{self, StoreGroup},
    core::{GatewayError, GatewayResult},
    metrics,
    model::{
        Applicant, ComplianceRequest, CustomerProfile, Notification, Offer, Order, Post, Review,
        ReviewComment, TwoFactorCode,
    },
};

pub mod etcd;
pub mod memory;

pub use etcd::EtcdStore;
pub use memory::MemoryStore;

/// Raw byte store with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> GatewayResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> GatewayResult<()>;

    async fn delete(&self, key: &str) -> GatewayResult<()>;

    /// Cheap reachability probe.
    async fn ping(&self) -> GatewayResult<()>;
}

/// Key prefix per resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Customer,
    PublicProfile,
    Blog,
    Offers,
    Applicants,
    Orders,
    OrdersList,
    FilteredOrdersList,
    ComplianceRequestsList,
    Reviews,
    ReviewsComments,
    Notifications,
    TwoFactor,
}

impl Namespace {
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Customer => "customer",
            Namespace::PublicProfile => "public_profile",
            Namespace::Blog => "blog",
            Namespace::Offers => "offers",
            Namespace::Applicants => "applicants",
            Namespace::Orders => "orders",
            Namespace::OrdersList => "orders_list",
            Namespace::FilteredOrdersList => "filtered_orders_list",
            Namespace::ComplianceRequestsList => "compliance_requests_list",
            Namespace::Reviews => "reviews",
            Namespace::ReviewsComments => "reviews_comments",
            Namespace::Notifications => "notifications",
            Namespace::TwoFactor => "2FA",
        }
    }

    pub fn group(self) -> StoreGroup {
        match self {
            Namespace::Customer | Namespace::PublicProfile => StoreGroup::Profile,
            Namespace::Blog => StoreGroup::Blog,
            Namespace::Offers | Namespace::Applicants => StoreGroup::Offers,
            Namespace::Orders
            | Namespace::OrdersList
            | Namespace::FilteredOrdersList
            | Namespace::ComplianceRequestsList => StoreGroup::Orders,
            Namespace::Reviews | Namespace::ReviewsComments => StoreGroup::Reviews,
            Namespace::Notifications => StoreGroup::Notifications,
            Namespace::TwoFactor => StoreGroup::TwoFa,
        }
    }

    pub fn key(self, id: impl fmt::Display) -> String {
        format!("{}:{id}", self.prefix())
    }
}

/// Typed view of one namespace.
pub struct ResourceCache<T> {
    namespace: Namespace,
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    fail_open: bool,
    _resource: PhantomData<fn() -> T>,
}

impl<T> ResourceCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(namespace: Namespace, store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            namespace,
            store,
            ttl,
            fail_open: false,
            _resource: PhantomData,
        }
    }

    pub fn fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// `Ok(None)` is a plain miss. Undecodable entries are dropped and
    /// reported as a miss.
    pub async fn get(&self, id: impl fmt::Display) -> GatewayResult<Option<T>> {
        let key = self.namespace.key(id);
        let raw = match self.store.get(&key).await {
            Ok(raw) => raw,
            Err(e) if self.fail_open => {
                log::warn!("cache read of {key} failed, treating as miss: {e}");
                None
            }
            Err(e) => return Err(e),
        };

        let Some(raw) = raw else {
            metrics::record_cache_lookup(self.namespace.prefix(), false);
            return Ok(None);
        };

        match serde_json::from_slice(&raw) {
            Ok(value) => {
                metrics::record_cache_lookup(self.namespace.prefix(), true);
                Ok(Some(value))
            }
            Err(e) => {
                log::warn!("dropping undecodable cache entry {key}: {e}");
                self.store.delete(&key).await?;
                metrics::record_cache_lookup(self.namespace.prefix(), false);
                Ok(None)
            }
        }
    }

    pub async fn set(&self, id: impl fmt::Display, value: &T) -> GatewayResult<()> {
        let key = self.namespace.key(id);
        let raw = serde_json::to_vec(value)
            .map_err(|e| GatewayError::Cache(format!("failed to encode {key}: {e}")))?;

        match self.store.set(&key, raw, self.ttl).await {
            Err(e) if self.fail_open => {
                log::warn!("cache write of {key} skipped: {e}");
                Ok(())
            }
            res => res,
        }
    }

    /// Invalidation always surfaces store errors, whatever the fail-open
    /// setting: a skipped delete would leave a stale entry behind.
    pub async fn delete(&self, id: impl fmt::Display) -> GatewayResult<()> {
        let key = self.namespace.key(id);
        log::debug!("invalidating {key}");
        self.store.delete(&key).await
    }
}

/// One store per [`StoreGroup`].
#[derive(Clone)]
pub struct StoreSet {
    stores: Vec<(StoreGroup, Arc<dyn CacheStore>)>,
}

impl StoreSet {
    pub fn from_config(cfg: &config::Cache) -> Self {
        let stores = StoreGroup::ALL
            .iter()
            .map(|group| {
                let store: Arc<dyn CacheStore> = match cfg.store_for(*group) {
                    config::Store::Memory => Arc::new(MemoryStore::new()),
                    config::Store::Etcd(etcd) => Arc::new(EtcdStore::new(etcd.clone())),
                };
                (*group, store)
            })
            .collect();
        Self { stores }
    }

    /// Every group backed by the same store.
    pub fn shared(store: Arc<dyn CacheStore>) -> Self {
        let stores = StoreGroup::ALL
            .iter()
            .map(|group| (*group, store.clone()))
            .collect();
        Self { stores }
    }

    pub fn get(&self, group: StoreGroup) -> Arc<dyn CacheStore> {
        self.stores
            .iter()
            .find(|(g, _)| *g == group)
            .map(|(_, store)| store.clone())
            .unwrap_or_else(|| Arc::new(MemoryStore::new()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(StoreGroup, Arc<dyn CacheStore>)> {
        self.stores.iter()
    }
}

/// Every resource cache the gateway keeps.
pub struct Caches {
    pub customer: ResourceCache<CustomerProfile>,
    pub public_profile: ResourceCache<CustomerProfile>,
    pub blog: ResourceCache<Vec<Post>>,
    pub offers: ResourceCache<Offer>,
    pub applicants: ResourceCache<Vec<Applicant>>,
    pub orders: ResourceCache<Order>,
    pub orders_list: ResourceCache<Vec<Order>>,
    pub filtered_orders_list: ResourceCache<Vec<Order>>,
    pub compliance_requests_list: ResourceCache<Vec<ComplianceRequest>>,
    pub reviews: ResourceCache<Review>,
    pub reviews_comments: ResourceCache<Vec<ReviewComment>>,
    pub notifications: ResourceCache<Vec<Notification>>,
    pub two_factor: ResourceCache<TwoFactorCode>,
}

impl Caches {
    pub fn new(stores: &StoreSet, ttl: Duration, fail_open: bool) -> Self {
        fn cache<T: Serialize + DeserializeOwned>(
            stores: &StoreSet,
            namespace: Namespace,
            ttl: Duration,
            fail_open: bool,
        ) -> ResourceCache<T> {
            ResourceCache::new(namespace, stores.get(namespace.group()), ttl).fail_open(fail_open)
        }

        Self {
            customer: cache(stores, Namespace::Customer, ttl, fail_open),
            public_profile: cache(stores, Namespace::PublicProfile, ttl, fail_open),
            blog: cache(stores, Namespace::Blog, ttl, fail_open),
            offers: cache(stores, Namespace::Offers, ttl, fail_open),
            applicants: cache(stores, Namespace::Applicants, ttl, fail_open),
            orders: cache(stores, Namespace::Orders, ttl, fail_open),
            orders_list: cache(stores, Namespace::OrdersList, ttl, fail_open),
            filtered_orders_list: cache(stores, Namespace::FilteredOrdersList, ttl, fail_open),
            compliance_requests_list: cache(
                stores,
                Namespace::ComplianceRequestsList,
                ttl,
                fail_open,
            ),
            reviews: cache(stores, Namespace::Reviews, ttl, fail_open),
            reviews_comments: cache(stores, Namespace::ReviewsComments, ttl, fail_open),
            notifications: cache(stores, Namespace::Notifications, ttl, fail_open),
            two_factor: cache(stores, Namespace::TwoFactor, ttl, fail_open),
        }
    }

    pub fn from_config(cfg: &config::Cache) -> (Self, StoreSet) {
        let stores = StoreSet::from_config(cfg);
        let caches = Self::new(&stores, Duration::from_secs(cfg.ttl), cfg.fail_open);
        (caches, stores)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::model::{OrderBasics, Profile, Role};

    fn caches() -> Caches {
        let stores = StoreSet::shared(Arc::new(MemoryStore::new()));
        Caches::new(&stores, Duration::from_secs(300), false)
    }

    struct BrokenStore {
        deletes: AtomicUsize,
    }

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> GatewayResult<Option<Vec<u8>>> {
            Err(GatewayError::Cache("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> GatewayResult<()> {
            Err(GatewayError::Cache("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> GatewayResult<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Err(GatewayError::Cache("connection refused".into()))
        }

        async fn ping(&self) -> GatewayResult<()> {
            Err(GatewayError::Cache("connection refused".into()))
        }
    }

    #[test]
    fn test_key_scheme() {
        assert_eq!(Namespace::Customer.key(7), "customer:7");
        assert_eq!(Namespace::PublicProfile.key(7), "public_profile:7");
        assert_eq!(Namespace::FilteredOrdersList.key(7), "filtered_orders_list:7");
        assert_eq!(
            Namespace::ComplianceRequestsList.key(7),
            "compliance_requests_list:7"
        );
        assert_eq!(Namespace::ReviewsComments.key(7), "reviews_comments:7");
        assert_eq!(Namespace::TwoFactor.key("a@b.c"), "2FA:a@b.c");
    }

    #[tokio::test]
    async fn test_round_trip_per_resource() {
        let caches = caches();

        let profile = CustomerProfile {
            profile: Profile {
                customer_id: 1,
                email: "one@anvil.dev".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        caches.customer.set(1, &profile).await.unwrap();
        assert_eq!(caches.customer.get(1).await.unwrap(), Some(profile.clone()));

        caches.public_profile.set(1, &profile).await.unwrap();
        assert_eq!(caches.public_profile.get(1).await.unwrap(), Some(profile));

        let order = Order {
            order_basics: OrderBasics {
                customer_id: 1,
                applicant_id: 2,
                offer_id: 3,
                order_id: 4,
            },
            ..Default::default()
        };
        caches.orders.set(4, &order).await.unwrap();
        assert_eq!(caches.orders.get(4).await.unwrap(), Some(order.clone()));

        caches
            .filtered_orders_list
            .set(1, &vec![order.clone()])
            .await
            .unwrap();
        assert_eq!(
            caches.filtered_orders_list.get(1).await.unwrap(),
            Some(vec![order])
        );

        caches
            .two_factor
            .set("one@anvil.dev", &TwoFactorCode::new("A1B2C3"))
            .await
            .unwrap();
        assert_eq!(
            caches.two_factor.get("one@anvil.dev").await.unwrap(),
            Some(TwoFactorCode::new("A1B2C3"))
        );
    }

    #[tokio::test]
    async fn test_invalidate_then_miss() {
        let caches = caches();
        let offer = Offer {
            offer_id: 9,
            posted_by: 1,
            ..Default::default()
        };
        caches.offers.set(9, &offer).await.unwrap();
        caches.offers.delete(9).await.unwrap();
        assert_eq!(caches.offers.get(9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_namespaces_do_not_collide() {
        let caches = caches();
        let order = Order::default();
        caches.orders.set(5, &order).await.unwrap();

        assert_eq!(caches.offers.get(5).await.unwrap(), None);
        caches.offers.delete(5).await.unwrap();
        assert_eq!(caches.orders.get(5).await.unwrap(), Some(order));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("orders:1", b"{not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        let cache: ResourceCache<Order> =
            ResourceCache::new(Namespace::Orders, store.clone(), Duration::from_secs(60));

        assert_eq!(cache.get(1).await.unwrap(), None);
        assert_eq!(store.get("orders:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed_by_default() {
        let store = Arc::new(BrokenStore {
            deletes: AtomicUsize::new(0),
        });
        let cache: ResourceCache<Role> =
            ResourceCache::new(Namespace::Customer, store, Duration::from_secs(60));

        assert!(matches!(cache.get(1).await, Err(GatewayError::Cache(_))));
        assert!(cache.set(1, &Role::Admin).await.is_err());
    }

    #[tokio::test]
    async fn test_fail_open_degrades_reads_and_writes_only() {
        let store = Arc::new(BrokenStore {
            deletes: AtomicUsize::new(0),
        });
        let cache: ResourceCache<Role> =
            ResourceCache::new(Namespace::Customer, store.clone(), Duration::from_secs(60))
                .fail_open(true);

        assert_eq!(cache.get(1).await.unwrap(), None);
        cache.set(1, &Role::Admin).await.unwrap();
        assert!(cache.delete(1).await.is_err());
        assert_eq!(store.deletes.load(Ordering::SeqCst), 1);
    }
}
