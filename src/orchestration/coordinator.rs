use std::{fmt, future::Future, sync::Arc, time::Duration};

use serde::{de::DeserializeOwned, Serialize};

use super::{fanout::FanOut, lifecycle::OrderLifecycleController};
use crate::{
    backend::{BackendError, Backends},
    cache::{Caches, ResourceCache, StoreSet},
    core::{GatewayError, GatewayResult},
    model::{CustomerProfile, Profile, Stats},
};

/// Shared state behind every endpoint.
pub struct RequestCoordinator {
    pub backends: Backends,
    pub caches: Arc<Caches>,
    pub lifecycle: OrderLifecycleController,
    stores: StoreSet,
    health_timeout: Duration,
}

enum ProfilePart {
    Profile(Profile),
    OrdersStats(Stats),
    ReviewsStats(Stats),
}

impl RequestCoordinator {
    pub fn new(
        backends: Backends,
        caches: Caches,
        stores: StoreSet,
        health_timeout: Duration,
    ) -> Self {
        let caches = Arc::new(caches);
        let lifecycle = OrderLifecycleController::new(
            backends.orders.clone(),
            backends.offers.clone(),
            backends.notifications.clone(),
            caches.clone(),
        );

        Self {
            backends,
            caches,
            lifecycle,
            stores,
            health_timeout,
        }
    }

    /// Cache-aside read: a hit returns without touching any backend, a miss
    /// runs `fetch` and stores its result.
    pub async fn read_through<T, F, Fut>(
        &self,
        cache: &ResourceCache<T>,
        id: impl fmt::Display,
        fetch: F,
    ) -> GatewayResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        if let Some(value) = cache.get(&id).await? {
            return Ok(value);
        }

        let value = fetch().await?;
        cache.set(&id, &value).await?;
        Ok(value)
    }

    /// Profile plus the orders and reviews statistics, fetched concurrently.
    /// `public` selects the reduced profile other customers may see.
    pub async fn assemble_profile(
        &self,
        customer_id: u64,
        public: bool,
    ) -> GatewayResult<CustomerProfile> {
        let profile = self.backends.profile.clone();
        let orders = self.backends.orders.clone();
        let reviews = self.backends.reviews.clone();

        let parts = FanOut::new("assemble profile")
            .task("get profile", async move {
                let res = if public {
                    profile.get_public_profile(customer_id).await
                } else {
                    profile.get_profile(customer_id).await
                };
                res.map(ProfilePart::Profile).map_err(GatewayError::from)
            })
            .task("get orders stats", async move {
                orders
                    .get_customer_stats(customer_id)
                    .await
                    .map(ProfilePart::OrdersStats)
                    .map_err(GatewayError::from)
            })
            .task("get reviews stats", async move {
                reviews
                    .get_customer_stats(customer_id)
                    .await
                    .map(ProfilePart::ReviewsStats)
                    .map_err(GatewayError::from)
            })
            .join()
            .await?;

        let mut assembled = CustomerProfile::default();
        for part in parts {
            match part {
                ProfilePart::Profile(profile) => assembled.profile = profile,
                ProfilePart::OrdersStats(stats) => assembled.orders_stats = stats,
                ProfilePart::ReviewsStats(stats) => assembled.reviews_stats = stats,
            }
        }
        Ok(assembled)
    }

    /// Probe every backend and cache store concurrently, each bounded by
    /// the health timeout. The error names the first unhealthy service.
    pub async fn check_health(&self) -> GatewayResult<()> {
        let limit = self.health_timeout;
        let mut probes = FanOut::new("health");

        for (service, probe) in self.backends.health_probes() {
            probes = probes.task(service, async move {
                match tokio::time::timeout(limit, probe).await {
                    Ok(res) => res.map_err(GatewayError::from),
                    Err(_) => Err(GatewayError::Backend(BackendError::internal(format!(
                        "no answer within {}s",
                        limit.as_secs()
                    )))),
                }
            });
        }

        for (group, store) in self.stores.iter() {
            let store = store.clone();
            let group = *group;
            probes = probes.task("cache", async move {
                match tokio::time::timeout(limit, store.ping()).await {
                    Ok(res) => res,
                    Err(_) => Err(GatewayError::Cache(format!(
                        "{group:?} store did not answer within {}s",
                        limit.as_secs()
                    ))),
                }
            });
        }

        probes.join().await.map(|_| ())
    }
}
