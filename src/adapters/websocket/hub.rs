//! Connection registry and router.
//!
//! The hub owns two indexes over live clients:
//!
//! ```text
//! tenant rooms                      user channels
//! tenant-a ─┬─ client-1 (u1)        u1 ─┬─ client-1 (tenant-a)
//!           └─ client-2 (u2)            └─ client-3 (tenant-b)
//! tenant-b ─── client-3 (u1)        u2 ─── client-2 (tenant-a)
//! ```
//!
//! Every mutation and every routing decision goes through one event loop
//! fed by a bounded command queue, so the two indexes never disagree.
//! Count queries take a read lock instead of queueing behind traffic.
//!
//! Routing only ever calls [`Client::send`], which never waits, so one slow
//! connection cannot stall delivery to the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::domain::foundation::{ClientId, TenantId, UserId};
use crate::domain::realtime::Message;
use crate::ports::RealtimePublisher;

use super::client::Client;

/// Lifecycle of a hub instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    /// Constructed, event loop not started yet. Commands queue up.
    Created,
    /// Event loop is processing commands.
    Running,
    /// Shutdown signal fired. Further commands are dropped.
    Stopped,
}

impl HubState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => HubState::Created,
            1 => HubState::Running,
            _ => HubState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            HubState::Created => 0,
            HubState::Running => 1,
            HubState::Stopped => 2,
        }
    }
}

enum HubCommand {
    Register(Arc<Client>),
    Unregister(Arc<Client>),
    Broadcast {
        tenant_id: TenantId,
        message: Arc<Message>,
    },
    Direct {
        tenant_id: TenantId,
        user_id: UserId,
        message: Arc<Message>,
    },
}

type ClientSet = HashMap<ClientId, Arc<Client>>;

/// The two membership indexes. Only the event loop writes to them.
#[derive(Default)]
struct Registry {
    tenant_rooms: HashMap<TenantId, ClientSet>,
    user_channels: HashMap<UserId, ClientSet>,
}

impl Registry {
    /// Returns `false` if the client was already registered.
    fn insert(&mut self, client: Arc<Client>) -> bool {
        let fresh = self
            .tenant_rooms
            .entry(client.tenant_id())
            .or_default()
            .insert(client.id(), client.clone())
            .is_none();
        self.user_channels
            .entry(client.user_id())
            .or_default()
            .insert(client.id(), client);
        fresh
    }

    /// Returns `false` if the client was not registered. Empty sets are pruned.
    fn remove(&mut self, client: &Client) -> bool {
        let removed = remove_member(&mut self.tenant_rooms, client.tenant_id(), client.id());
        remove_member(&mut self.user_channels, client.user_id(), client.id());
        removed
    }

    fn tenant_room(&self, tenant_id: TenantId) -> impl Iterator<Item = &Arc<Client>> {
        self.tenant_rooms
            .get(&tenant_id)
            .into_iter()
            .flat_map(|room| room.values())
    }

    fn user_channel(&self, user_id: UserId) -> impl Iterator<Item = &Arc<Client>> {
        self.user_channels
            .get(&user_id)
            .into_iter()
            .flat_map(|channel| channel.values())
    }

    fn total(&self) -> usize {
        self.tenant_rooms.values().map(HashMap::len).sum()
    }

    fn drain(&mut self) -> Vec<Arc<Client>> {
        self.user_channels.clear();
        self.tenant_rooms
            .drain()
            .flat_map(|(_, room)| room.into_values())
            .collect()
    }
}

fn remove_member<K>(index: &mut HashMap<K, ClientSet>, key: K, client_id: ClientId) -> bool
where
    K: std::hash::Hash + Eq,
{
    let Some(set) = index.get_mut(&key) else {
        return false;
    };
    let removed = set.remove(&client_id).is_some();
    if set.is_empty() {
        index.remove(&key);
    }
    removed
}

struct HubInner {
    commands: mpsc::Sender<HubCommand>,
    receiver: Mutex<Option<mpsc::Receiver<HubCommand>>>,
    registry: RwLock<Registry>,
    state: AtomicU8,
    /// Drops recorded by clients that have since been unregistered.
    retired_drops: AtomicU64,
}

/// Handle to the realtime hub. Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    /// Create a hub whose command queue holds `queue_capacity` pending requests.
    pub fn new(queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        Self {
            inner: Arc::new(HubInner {
                commands: tx,
                receiver: Mutex::new(Some(rx)),
                registry: RwLock::new(Registry::default()),
                state: AtomicU8::new(HubState::Created.as_u8()),
                retired_drops: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> HubState {
        HubState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Run the event loop until `shutdown` fires.
    ///
    /// A hub runs at most once; a second call logs and returns immediately.
    /// On shutdown every client still registered is closed.
    pub async fn run(&self, shutdown: CancellationToken) {
        let Some(mut commands) = self.inner.receiver.lock().await.take() else {
            tracing::warn!("Realtime hub already started, ignoring second run");
            return;
        };

        self.set_state(HubState::Running);
        tracing::info!("Realtime hub started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = commands.recv() => match next {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }

        self.set_state(HubState::Stopped);
        commands.close();

        let remaining = self.inner.registry.write().await.drain();
        for client in &remaining {
            self.retire(client);
            client.close();
        }
        tracing::info!(closed_clients = remaining.len(), "Realtime hub stopped");
    }

    /// Add a client to its tenant room and user channel.
    ///
    /// If the hub has stopped the client is closed instead.
    pub async fn register(&self, client: Arc<Client>) {
        let command = HubCommand::Register(client.clone());
        if self.inner.commands.send(command).await.is_err() {
            tracing::debug!(client_id = %client.id(), "Hub stopped, rejecting client");
            client.close();
        }
    }

    /// Remove a client from the registry. Unknown clients are ignored.
    pub async fn unregister(&self, client: Arc<Client>) {
        self.submit(HubCommand::Unregister(client)).await;
    }

    /// Queue `message` for every client currently in the tenant's room.
    ///
    /// Membership is read when the loop processes the request, not when
    /// this is called.
    pub async fn broadcast_to_tenant(&self, tenant_id: TenantId, message: Message) {
        self.submit(HubCommand::Broadcast {
            tenant_id,
            message: Arc::new(message),
        })
        .await;
    }

    /// Queue `message` for the user's connections that belong to `tenant_id`.
    pub async fn send_to_user(&self, tenant_id: TenantId, user_id: UserId, message: Message) {
        self.submit(HubCommand::Direct {
            tenant_id,
            user_id,
            message: Arc::new(message),
        })
        .await;
    }

    pub async fn tenant_client_count(&self, tenant_id: TenantId) -> usize {
        self.inner
            .registry
            .read()
            .await
            .tenant_rooms
            .get(&tenant_id)
            .map_or(0, HashMap::len)
    }

    pub async fn user_client_count(&self, user_id: UserId) -> usize {
        self.inner
            .registry
            .read()
            .await
            .user_channels
            .get(&user_id)
            .map_or(0, HashMap::len)
    }

    pub async fn total_client_count(&self) -> usize {
        self.inner.registry.read().await.total()
    }

    /// Tenants with at least one live connection.
    pub async fn active_tenants(&self) -> Vec<TenantId> {
        self.inner
            .registry
            .read()
            .await
            .tenant_rooms
            .keys()
            .copied()
            .collect()
    }

    /// Messages dropped on full client queues since the hub was created.
    pub async fn dropped_messages(&self) -> u64 {
        let live: u64 = self
            .inner
            .registry
            .read()
            .await
            .tenant_rooms
            .values()
            .flat_map(|room| room.values())
            .map(|client| client.dropped_messages())
            .sum();
        live + self.inner.retired_drops.load(Ordering::Relaxed)
    }

    async fn submit(&self, command: HubCommand) {
        if self.inner.commands.send(command).await.is_err() {
            tracing::trace!("Hub stopped, dropping command");
        }
    }

    async fn handle(&self, command: HubCommand) {
        match command {
            HubCommand::Register(client) => {
                let fresh = self.inner.registry.write().await.insert(client.clone());
                if fresh {
                    tracing::info!(
                        client_id = %client.id(),
                        tenant_id = %client.tenant_id(),
                        user_id = %client.user_id(),
                        "Client registered"
                    );
                }
            }
            HubCommand::Unregister(client) => {
                let removed = self.inner.registry.write().await.remove(&client);
                if removed {
                    self.retire(&client);
                    tracing::info!(
                        client_id = %client.id(),
                        tenant_id = %client.tenant_id(),
                        user_id = %client.user_id(),
                        "Client unregistered"
                    );
                }
            }
            HubCommand::Broadcast { tenant_id, message } => {
                let registry = self.inner.registry.read().await;
                for client in registry.tenant_room(tenant_id) {
                    client.send(message.clone());
                }
            }
            HubCommand::Direct {
                tenant_id,
                user_id,
                message,
            } => {
                let registry = self.inner.registry.read().await;
                for client in registry
                    .user_channel(user_id)
                    .filter(|client| client.tenant_id() == tenant_id)
                {
                    client.send(message.clone());
                }
            }
        }
    }

    fn retire(&self, client: &Client) {
        self.inner
            .retired_drops
            .fetch_add(client.dropped_messages(), Ordering::Relaxed);
    }

    fn set_state(&self, state: HubState) {
        self.inner.state.store(state.as_u8(), Ordering::Release);
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RealtimePublisher for Hub {
    async fn broadcast_to_tenant(&self, tenant_id: TenantId, message: Message) {
        Hub::broadcast_to_tenant(self, tenant_id, message).await
    }

    async fn send_to_user(&self, tenant_id: TenantId, user_id: UserId, message: Message) {
        Hub::send_to_user(self, tenant_id, user_id, message).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{settle, started};
    use super::*;
    use crate::adapters::websocket::client::OutboundQueue;
    use crate::domain::realtime::MessageType;
    use proptest::prelude::*;
    use std::time::Duration;

    fn drain(queue: &mut OutboundQueue) -> Vec<Arc<Message>> {
        let mut out = Vec::new();
        while let Some(message) = queue.try_recv() {
            out.push(message);
        }
        out
    }

    fn note(text: &str) -> Message {
        Message::new(MessageType::NotificationNew, &serde_json::json!({ "title": text })).unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Registry
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn registry_prunes_empty_sets() {
        let mut registry = Registry::default();
        let (client, _queue) = Client::new(TenantId::new(), UserId::new(), 1);

        assert!(registry.insert(client.clone()));
        assert!(registry.remove(&client));

        assert!(registry.tenant_rooms.is_empty());
        assert!(registry.user_channels.is_empty());
    }

    #[test]
    fn registry_duplicate_insert_keeps_one_entry() {
        let mut registry = Registry::default();
        let (client, _queue) = Client::new(TenantId::new(), UserId::new(), 1);

        assert!(registry.insert(client.clone()));
        assert!(!registry.insert(client.clone()));

        assert_eq!(registry.total(), 1);
        assert_eq!(registry.user_channel(client.user_id()).count(), 1);
    }

    #[test]
    fn registry_double_remove_leaves_others_alone() {
        let mut registry = Registry::default();
        let tenant = TenantId::new();
        let user = UserId::new();
        let (a, _qa) = Client::new(tenant, user, 1);
        let (b, _qb) = Client::new(tenant, user, 1);
        registry.insert(a.clone());
        registry.insert(b.clone());

        assert!(registry.remove(&a));
        assert!(!registry.remove(&a));

        assert_eq!(registry.tenant_room(tenant).count(), 1);
        assert_eq!(registry.user_channel(user).count(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register(usize),
        Unregister(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..12usize).prop_map(Op::Register),
            (0..12usize).prop_map(Op::Unregister),
        ]
    }

    proptest! {
        #[test]
        fn every_live_client_is_in_exactly_one_room_and_one_channel(ops in prop::collection::vec(op(), 0..80)) {
            let tenants = [TenantId::new(), TenantId::new(), TenantId::new()];
            let users = [UserId::new(), UserId::new(), UserId::new(), UserId::new()];
            let clients: Vec<Arc<Client>> = (0..12)
                .map(|i| Client::new(tenants[i % 3], users[i % 4], 1).0)
                .collect();

            let mut registry = Registry::default();
            let mut live = std::collections::HashSet::new();

            for op in ops {
                match op {
                    Op::Register(i) => {
                        registry.insert(clients[i].clone());
                        live.insert(i);
                    }
                    Op::Unregister(i) => {
                        registry.remove(&clients[i]);
                        live.remove(&i);
                    }
                }

                prop_assert_eq!(registry.total(), live.len());
                prop_assert!(registry.tenant_rooms.values().all(|room| !room.is_empty()));
                prop_assert!(registry.user_channels.values().all(|channel| !channel.is_empty()));

                for (i, client) in clients.iter().enumerate() {
                    let rooms = registry
                        .tenant_rooms
                        .values()
                        .filter(|room| room.contains_key(&client.id()))
                        .count();
                    let channels = registry
                        .user_channels
                        .values()
                        .filter(|channel| channel.contains_key(&client.id()))
                        .count();
                    let expected = usize::from(live.contains(&i));
                    prop_assert_eq!(rooms, expected);
                    prop_assert_eq!(channels, expected);
                }
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Event loop
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn register_then_unregister_updates_counts() {
        let (hub, _shutdown, _loop) = started();
        let tenant = TenantId::new();
        let user = UserId::new();
        let (client, _queue) = Client::new(tenant, user, 4);

        hub.register(client.clone()).await;
        settle(&hub).await;
        assert_eq!(hub.tenant_client_count(tenant).await, 1);
        assert_eq!(hub.user_client_count(user).await, 1);

        hub.unregister(client.clone()).await;
        hub.unregister(client.clone()).await;
        settle(&hub).await;

        assert_eq!(hub.tenant_client_count(tenant).await, 0);
        assert_eq!(hub.user_client_count(user).await, 0);
        assert!(hub.active_tenants().await.is_empty());
    }

    #[tokio::test]
    async fn broadcast_reaches_only_the_target_tenant() {
        let (hub, _shutdown, _loop) = started();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let (a1, mut qa1) = Client::new(tenant_a, UserId::new(), 4);
        let (a2, mut qa2) = Client::new(tenant_a, UserId::new(), 4);
        let (b1, mut qb1) = Client::new(tenant_b, UserId::new(), 4);
        for client in [&a1, &a2, &b1] {
            hub.register(client.clone()).await;
        }

        hub.broadcast_to_tenant(tenant_a, note("hello")).await;
        settle(&hub).await;

        assert_eq!(drain(&mut qa1).len(), 1);
        assert_eq!(drain(&mut qa2).len(), 1);
        assert!(drain(&mut qb1).is_empty());
    }

    #[tokio::test]
    async fn direct_send_respects_tenant_affinity() {
        let (hub, _shutdown, _loop) = started();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let user = UserId::new();
        let (tab1, mut q1) = Client::new(tenant_a, user, 4);
        let (tab2, mut q2) = Client::new(tenant_a, user, 4);
        let (other_tenant, mut q3) = Client::new(tenant_b, user, 4);
        let (other_user, mut q4) = Client::new(tenant_a, UserId::new(), 4);
        for client in [&tab1, &tab2, &other_tenant, &other_user] {
            hub.register(client.clone()).await;
        }

        hub.send_to_user(tenant_a, user, note("for you")).await;
        settle(&hub).await;

        assert_eq!(drain(&mut q1).len(), 1);
        assert_eq!(drain(&mut q2).len(), 1);
        assert!(drain(&mut q3).is_empty());
        assert!(drain(&mut q4).is_empty());
    }

    #[tokio::test]
    async fn broadcast_uses_membership_at_processing_time() {
        let hub = Hub::new(64);
        let tenant = TenantId::new();
        let (late, mut queue) = Client::new(tenant, UserId::new(), 4);

        // Queued before the loop runs, so the register is processed first.
        hub.register(late.clone()).await;
        hub.broadcast_to_tenant(tenant, note("queued")).await;

        let shutdown = CancellationToken::new();
        tokio::spawn({
            let hub = hub.clone();
            let shutdown = shutdown.clone();
            async move { hub.run(shutdown).await }
        });
        settle(&hub).await;

        assert_eq!(drain(&mut queue).len(), 1);
    }

    #[tokio::test]
    async fn per_client_order_is_preserved() {
        let (hub, _shutdown, _loop) = started();
        let tenant = TenantId::new();
        let user = UserId::new();
        let (client, mut queue) = Client::new(tenant, user, 8);
        hub.register(client.clone()).await;

        hub.broadcast_to_tenant(tenant, note("one")).await;
        hub.send_to_user(tenant, user, note("two")).await;
        hub.broadcast_to_tenant(tenant, note("three")).await;
        settle(&hub).await;

        let titles: Vec<String> = drain(&mut queue)
            .iter()
            .map(|m| m.payload()["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn full_queue_drops_are_counted_hub_wide() {
        let (hub, _shutdown, _loop) = started();
        let tenant = TenantId::new();
        let (client, mut queue) = Client::new(tenant, UserId::new(), 2);
        hub.register(client.clone()).await;

        for i in 0..5 {
            hub.broadcast_to_tenant(tenant, note(&i.to_string())).await;
        }
        settle(&hub).await;

        assert_eq!(drain(&mut queue).len(), 2);
        assert_eq!(client.dropped_messages(), 3);
        assert_eq!(hub.dropped_messages().await, 3);
        assert!(!client.is_closed());

        hub.unregister(client.clone()).await;
        settle(&hub).await;
        assert_eq!(hub.dropped_messages().await, 3);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn lifecycle_moves_created_running_stopped() {
        let hub = Hub::new(8);
        assert_eq!(hub.state(), HubState::Created);

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn({
            let hub = hub.clone();
            let shutdown = shutdown.clone();
            async move { hub.run(shutdown).await }
        });
        settle(&hub).await;
        assert_eq!(hub.state(), HubState::Running);

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(hub.state(), HubState::Stopped);
    }

    #[tokio::test]
    async fn second_run_returns_immediately() {
        let (hub, shutdown, _loop) = started();
        settle(&hub).await;

        tokio::time::timeout(Duration::from_secs(1), hub.run(shutdown.clone()))
            .await
            .expect("second run should not block");

        assert_eq!(hub.state(), HubState::Running);
    }

    #[tokio::test]
    async fn stop_closes_registered_clients_and_rejects_new_ones() {
        let (hub, shutdown, handle) = started();
        let tenant = TenantId::new();
        let (client, _queue) = Client::new(tenant, UserId::new(), 4);
        hub.register(client.clone()).await;
        settle(&hub).await;

        shutdown.cancel();
        handle.await.unwrap();

        assert!(client.is_closed());
        assert_eq!(hub.total_client_count().await, 0);

        let (late, _late_queue) = Client::new(tenant, UserId::new(), 4);
        hub.register(late.clone()).await;
        assert!(late.is_closed());

        // Commands after stop are dropped without panicking.
        hub.broadcast_to_tenant(tenant, note("nobody")).await;
        hub.unregister(late).await;
    }
}
