//! Test doubles shared by the unit tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    backend::{
        AuthClient, BackendError, BackendResult, Backends, BlogClient, ErrorKind,
        NotificationsClient, OffersClient, OrdersClient, ProfileClient, ReviewsClient, RpcChannel,
    },
    cache::{memory::MemoryStore, CacheStore, Caches, StoreSet},
    model::{Identity, Role},
    orchestration::RequestCoordinator,
};

/// Scripted backend. Methods without a script answer `{}`.
#[derive(Default)]
pub struct MockChannel {
    replies: Mutex<HashMap<String, BackendResult<Value>>>,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<HashMap<String, Vec<Value>>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: &str, reply: Value) {
        self.replies
            .lock()
            .unwrap()
            .insert(method.to_string(), Ok(reply));
    }

    pub fn fail(&self, method: &str, kind: ErrorKind, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(method.to_string(), Err(BackendError::new(kind, message)));
    }

    pub fn delay(&self, method: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(method.to_string(), delay);
    }

    pub fn calls(&self, method: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .get(method)
            .map_or(0, Vec::len)
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().values().map(Vec::len).sum()
    }

    pub fn last_request(&self, method: &str) -> Option<Value> {
        self.requests
            .lock()
            .unwrap()
            .get(method)
            .and_then(|requests| requests.last().cloned())
    }
}

#[async_trait]
impl RpcChannel for MockChannel {
    async fn call(&self, method: &str, request: Value) -> BackendResult<Value> {
        self.requests
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push(request);

        let delay = self.delays.lock().unwrap().get(method).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().unwrap().get(method).cloned();
        reply.unwrap_or_else(|| Ok(Value::Object(Default::default())))
    }
}

/// A coordinator over mock backends and in-memory caches.
pub struct Harness {
    pub auth: Arc<MockChannel>,
    pub profile: Arc<MockChannel>,
    pub orders: Arc<MockChannel>,
    pub offers: Arc<MockChannel>,
    pub reviews: Arc<MockChannel>,
    pub blog: Arc<MockChannel>,
    pub notifications: Arc<MockChannel>,
    pub coordinator: Arc<RequestCoordinator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Arc::new(MemoryStore::new()), Duration::from_secs(5))
    }

    pub fn with_health_timeout(timeout: Duration) -> Self {
        Self::build(Arc::new(MemoryStore::new()), timeout)
    }

    fn build(store: Arc<dyn CacheStore>, health_timeout: Duration) -> Self {
        let auth = Arc::new(MockChannel::new());
        let profile = Arc::new(MockChannel::new());
        let orders = Arc::new(MockChannel::new());
        let offers = Arc::new(MockChannel::new());
        let reviews = Arc::new(MockChannel::new());
        let blog = Arc::new(MockChannel::new());
        let notifications = Arc::new(MockChannel::new());

        let backends = Backends {
            auth: AuthClient::new(auth.clone()),
            profile: ProfileClient::new(profile.clone()),
            orders: OrdersClient::new(orders.clone()),
            offers: OffersClient::new(offers.clone()),
            reviews: ReviewsClient::new(reviews.clone()),
            blog: BlogClient::new(blog.clone()),
            notifications: NotificationsClient::new(notifications.clone()),
        };
        let stores = StoreSet::shared(store);
        let caches = Caches::new(&stores, Duration::from_secs(300), false);
        let coordinator = Arc::new(RequestCoordinator::new(
            backends,
            caches,
            stores,
            health_timeout,
        ));

        Self {
            auth,
            profile,
            orders,
            offers,
            reviews,
            blog,
            notifications,
            coordinator,
        }
    }

    /// Calls made to every backend, health probes included.
    pub fn backend_calls(&self) -> usize {
        [
            &self.auth,
            &self.profile,
            &self.orders,
            &self.offers,
            &self.reviews,
            &self.blog,
            &self.notifications,
        ]
        .iter()
        .map(|channel| channel.total_calls())
        .sum()
    }
}

pub fn customer(customer_id: u64) -> Identity {
    Identity {
        customer_id,
        email: format!("customer{customer_id}@example.com"),
        role: Role::Customer,
    }
}

pub fn admin(customer_id: u64) -> Identity {
    Identity {
        customer_id,
        email: format!("admin{customer_id}@example.com"),
        role: Role::Admin,
    }
}
