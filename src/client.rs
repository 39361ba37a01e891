use std::sync::Arc;

use hdcore::net::{HttpClient, TransportFactory};
use hdcore::reconcile::{Applied, Origin, Reconciler};
use hdcore::store::{ChatListStore, ThreadStore};
use hdcore::types::{Conversation, ConversationId, Message, UserId};
use log::{debug, warn};
use tokio::sync::{Mutex, broadcast, watch};

use crate::api::{ApiError, ChatApi};
use crate::channel::{ChannelError, ChannelEvent, ChannelState, EventChannel};
use crate::config::EngineConfig;
use crate::handlers::{FrameRouter, MessageHandler};
use crate::session::SessionContext;
use crate::types::events::EventBus;

/// Everything a thread view needs to render.
#[derive(Debug, Clone)]
pub struct ThreadView {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// The engine facade a rendering layer embeds.
///
/// Owns the chat-list and thread stores, the push channel and the transport
/// client, and keeps the stores consistent against both sources: history
/// fetches initiated by view activation and live frames routed in the
/// background. All store reads go through snapshots; nothing here blocks on
/// the network while a store lock is held.
pub struct Client {
    config: EngineConfig,
    session: SessionContext,
    api: ChatApi,
    channel: Arc<EventChannel>,
    chat_list: Mutex<ChatListStore>,
    thread: Mutex<ThreadStore>,
    router: FrameRouter,
    bus: EventBus,
    routing_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Client {
    pub fn new(
        config: EngineConfig,
        session: SessionContext,
        http_client: Arc<dyn HttpClient>,
        transport_factory: Arc<dyn TransportFactory>,
    ) -> Arc<Self> {
        let api = ChatApi::new(http_client, &config, session.clone());
        let channel = Arc::new(EventChannel::new(transport_factory, session.token()));
        let reconciler = Reconciler::new(session.user_id());

        let mut router = FrameRouter::new();
        router.register(Arc::new(MessageHandler));

        Arc::new(Self {
            config,
            session,
            api,
            channel,
            chat_list: Mutex::new(ChatListStore::new(reconciler.clone())),
            thread: Mutex::new(ThreadStore::new(reconciler)),
            router,
            bus: EventBus::new(),
            routing_task: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn api(&self) -> &ChatApi {
        &self.api
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Observable state of the push channel.
    pub fn channel_state(&self) -> watch::Receiver<ChannelState> {
        self.channel.state()
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Frames the channel dropped as undecodable.
    pub fn malformed_frames(&self) -> u64 {
        self.channel.malformed_frames()
    }

    /// Connects the push channel and starts routing its frames into the
    /// stores. Returns once the background tasks are started, not once the
    /// connection is up; subscribe to the bus for lifecycle events.
    pub async fn connect(self: &Arc<Self>) -> Result<(), ChannelError> {
        // Subscribe before the channel starts so no event can slip past.
        let events = self.channel.subscribe();
        self.channel.connect().await?;
        let client = self.clone();
        let handle = tokio::spawn(async move {
            client.route_events(events).await;
        });
        *self.routing_task.lock().await = Some(handle);
        Ok(())
    }

    async fn route_events(self: Arc<Self>, mut events: broadcast::Receiver<ChannelEvent>) {
        loop {
            match events.recv().await {
                Ok(ChannelEvent::Frame(frame)) => {
                    self.router.dispatch(self.clone(), &frame).await;
                }
                Ok(ChannelEvent::Connected(connected)) => {
                    let _ = self.bus.connected.send(Arc::new(connected.clone()));
                    if connected.resumed {
                        if let Err(e) = self.refresh_active_views().await {
                            warn!(target: "Client", "refresh after reconnect failed: {e}");
                        }
                    }
                }
                Ok(ChannelEvent::Disconnected(disconnected)) => {
                    let _ = self.bus.disconnected.send(Arc::new(disconnected));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Skipped frames are indistinguishable from a gap.
                    warn!(target: "Client", "event routing lagged, {skipped} events skipped");
                    if let Err(e) = self.refresh_active_views().await {
                        warn!(target: "Client", "refresh after lag failed: {e}");
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!(target: "Client", "event routing stopped");
    }

    /// Applies one message frame to both stores and republishes the result.
    pub(crate) async fn apply_message_frame(&self, message: &Message) {
        let applied_thread = {
            let mut thread = self.thread.lock().await;
            thread.apply(message.clone(), Origin::Event)
        };

        let (applied_list, updated) = {
            let mut list = self.chat_list.lock().await;
            let applied = list.apply(message, Origin::Event);
            let updated = (applied == Applied::Inserted)
                .then(|| list.get(message.conversation_id).cloned())
                .flatten();
            (applied, updated)
        };

        if applied_thread == Applied::Inserted || applied_list == Applied::Inserted {
            let _ = self.bus.message.send(Arc::new(message.clone()));
        }
        if let Some(conversation) = updated {
            let _ = self.bus.conversation_updated.send(Arc::new(conversation));
        }
    }

    /// Re-runs the history fetches for whatever views are active after a
    /// delivery gap. The idempotent merge makes the overlap safe.
    async fn refresh_active_views(&self) -> Result<(), ApiError> {
        let list_loaded = { self.chat_list.lock().await.is_loaded() };
        if list_loaded {
            let conversations = self.api.list_conversations().await?;
            self.chat_list.lock().await.load(conversations);
        }

        let bound = { self.thread.lock().await.bound() };
        if let Some(conversation_id) = bound {
            let history = self.api.get_messages(conversation_id).await?;
            let mut thread = self.thread.lock().await;
            // The user may have navigated away while the fetch was in
            // flight; only rebind if the thread is still the same.
            if thread.bound() == Some(conversation_id) {
                thread.bind(conversation_id, history);
            }
        }
        Ok(())
    }

    /// Activates the list view: fetches the conversations and loads the
    /// chat-list store wholesale. Returns the ordered snapshot.
    pub async fn open_chat_list(&self) -> Result<Vec<Conversation>, ApiError> {
        let conversations = self.api.list_conversations().await?;
        let mut list = self.chat_list.lock().await;
        list.load(conversations);
        Ok(list.snapshot())
    }

    /// Activates a thread view: fetches the conversation and its history,
    /// binds the thread store and clears the conversation's unread counter.
    /// Any previous binding is discarded.
    pub async fn open_thread(
        &self,
        conversation_id: ConversationId,
    ) -> Result<ThreadView, ApiError> {
        let conversation = self.api.get_conversation(conversation_id).await?;
        let history = self.api.get_messages(conversation_id).await?;

        let messages = {
            let mut thread = self.thread.lock().await;
            thread.bind(conversation_id, history);
            thread.snapshot()
        };
        self.chat_list
            .lock()
            .await
            .set_active_thread(Some(conversation_id));

        Ok(ThreadView {
            conversation,
            messages,
        })
    }

    /// Leaves the thread view. The binding is released; frames that arrive
    /// for it afterwards are silently dropped by the store.
    pub async fn close_thread(&self) {
        self.thread.lock().await.release();
        self.chat_list.lock().await.set_active_thread(None);
    }

    /// Opens (or finds) the direct conversation with another user.
    pub async fn open_direct(&self, user_id: UserId) -> Result<ConversationId, ApiError> {
        self.api.open_direct(user_id).await
    }

    /// Creates a group conversation with the given members.
    pub async fn create_group(
        &self,
        name: &str,
        user_ids: &[UserId],
    ) -> Result<ConversationId, ApiError> {
        self.api.create_group(name, user_ids).await
    }

    /// Current ordered chat list for rendering.
    pub async fn chat_list_snapshot(&self) -> Vec<Conversation> {
        self.chat_list.lock().await.snapshot()
    }

    /// Current conversation in the thread view, if one is bound.
    pub async fn thread_conversation(&self) -> Option<ConversationId> {
        self.thread.lock().await.bound()
    }

    /// Current ordered thread messages for rendering; empty when no thread
    /// is bound.
    pub async fn thread_snapshot(&self) -> Vec<Message> {
        self.thread.lock().await.snapshot()
    }

    /// Tears down the session scope: closes the channel (no frames are
    /// delivered once this returns) and releases both stores.
    pub async fn close(&self) {
        self.channel.close().await;
        if let Some(handle) = self.routing_task.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
        self.thread.lock().await.release();
        self.chat_list.lock().await.release();
    }
}
