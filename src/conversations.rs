//! One-to-one conversations with derived ids and live message delivery.

use crate::database::models::{ConversationRecord, MessageRecord};
use crate::database::repositories::{ConversationRepository, MessageRepository};
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::profiles::{resolve_identities, AuthorIdentity};
use crate::realtime::{conversation_topic, EventEnvelope, EventPayload, FanoutRouter};
use crate::utils::{canonical_pair_key, now_utc_iso};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_MESSAGE_LIMIT: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: String,
}

impl From<MessageRecord> for MessageView {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            conversation_id: record.conversation_id,
            sender_id: record.sender_id,
            content: record.content,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationView {
    pub id: String,
    pub counterpart: AuthorIdentity,
    pub last_message: Option<MessageView>,
    pub created_at: String,
}

#[derive(Clone)]
pub struct ConversationService {
    database: Database,
    router: FanoutRouter,
    /// Sequences insert and publish so live delivery matches created_at order.
    send_lock: Arc<tokio::sync::Mutex<()>>,
}

impl ConversationService {
    pub fn new(database: Database, router: FanoutRouter) -> Self {
        Self {
            database,
            router,
            send_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Conversation ids are a hash of the sorted participant pair, so both
    /// participants derive the same id without coordinating.
    pub fn derive_conversation_id(a: &str, b: &str) -> String {
        let pair = canonical_pair_key(a, b);
        let digest = blake3::hash(format!("cura-conversation-v1:{pair}").as_bytes());
        hex_prefix(digest.as_bytes(), 16)
    }

    /// Finds or creates the conversation for a pair. Concurrent resolves
    /// converge on the same row because the id is derived and the insert
    /// ignores duplicates.
    pub fn resolve(&self, user_a: &str, user_b: &str) -> CoreResult<ConversationRecord> {
        if user_a == user_b {
            return Err(CoreError::validation(
                "a conversation needs two distinct participants",
            ));
        }
        let id = Self::derive_conversation_id(user_a, user_b);
        self.database.with_repositories(|repos| {
            repos.conversations().insert_ignore(&ConversationRecord {
                id: id.clone(),
                participant1_id: user_a.to_string(),
                participant2_id: user_b.to_string(),
                pair_key: canonical_pair_key(user_a, user_b),
                created_at: now_utc_iso(),
            })?;
            repos
                .conversations()
                .get(&id)?
                .ok_or_else(|| CoreError::internal("conversation vanished after insert"))
        })
    }

    /// Persists a message and publishes it to the conversation topic. Only
    /// participants can send.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> CoreResult<MessageView> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CoreError::validation("message must not be empty"));
        }
        // Held across insert and publish; without it two concurrent sends
        // could publish in the opposite order to their timestamps.
        let _ordering = self.send_lock.lock().await;
        let record = self.database.with_repositories(|repos| {
            let conversation = repos.conversations().get(conversation_id)?.ok_or_else(|| {
                CoreError::not_found(format!("conversation {conversation_id} not found"))
            })?;
            if conversation.participant1_id != sender_id
                && conversation.participant2_id != sender_id
            {
                return Err(CoreError::validation(
                    "sender is not a participant in this conversation",
                ));
            }
            let record = MessageRecord {
                id: Uuid::new_v4().to_string(),
                conversation_id: conversation_id.to_string(),
                sender_id: sender_id.to_string(),
                content: content.to_string(),
                created_at: now_utc_iso(),
            };
            repos.messages().create(&record)?;
            Ok(record)
        })?;

        let view = MessageView::from(record);
        self.router
            .publish(EventEnvelope::new(
                conversation_topic(conversation_id),
                EventPayload::MessageCreated(view.clone()),
            ))
            .await;
        Ok(view)
    }

    /// Message history, oldest first.
    pub fn messages(&self, conversation_id: &str, limit: usize) -> CoreResult<Vec<MessageView>> {
        self.database.read_with_retry(|repos| {
            if repos.conversations().get(conversation_id)?.is_none() {
                return Err(CoreError::not_found(format!(
                    "conversation {conversation_id} not found"
                )));
            }
            let records = repos.messages().list_for_conversation(conversation_id, limit)?;
            Ok(records.into_iter().map(MessageView::from).collect())
        })
    }

    /// Conversations for a user with the counterpart's identity and the most
    /// recent message, sorted most recently active first.
    pub fn conversations_of(&self, user_id: &str) -> CoreResult<Vec<ConversationView>> {
        self.database.read_with_retry(|repos| {
            let records = repos.conversations().list_for(user_id)?;
            let counterpart_ids: Vec<&str> = records
                .iter()
                .map(|record| counterpart(record, user_id))
                .collect();
            let identities = resolve_identities(&repos, counterpart_ids.iter().copied())?;

            let mut views = Vec::with_capacity(records.len());
            for record in &records {
                let other = counterpart(record, user_id);
                let last_message = repos
                    .messages()
                    .last_for_conversation(&record.id)?
                    .map(MessageView::from);
                views.push(ConversationView {
                    id: record.id.clone(),
                    counterpart: identities
                        .get(other)
                        .cloned()
                        .unwrap_or_else(|| AuthorIdentity::placeholder(other)),
                    last_message,
                    created_at: record.created_at.clone(),
                });
            }
            views.sort_by(|a, b| {
                let a_key = a.last_message.as_ref().map(|m| m.created_at.as_str());
                let b_key = b.last_message.as_ref().map(|m| m.created_at.as_str());
                b_key.cmp(&a_key)
            });
            Ok(views)
        })
    }

    pub async fn subscribe(&self, conversation_id: &str) -> CoreResult<crate::realtime::Subscription> {
        self.database.read_with_retry(|repos| {
            if repos.conversations().get(conversation_id)?.is_none() {
                return Err(CoreError::not_found(format!(
                    "conversation {conversation_id} not found"
                )));
            }
            Ok(())
        })?;
        Ok(self.router.subscribe(&conversation_topic(conversation_id)).await)
    }
}

fn counterpart<'a>(record: &'a ConversationRecord, user_id: &str) -> &'a str {
    if record.participant1_id == user_id {
        &record.participant2_id
    } else {
        &record.participant1_id
    }
}

fn hex_prefix(bytes: &[u8], take: usize) -> String {
    bytes
        .iter()
        .take(take)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ConversationService {
        let database = Database::open_in_memory().expect("db");
        ConversationService::new(database, FanoutRouter::new())
    }

    #[test]
    fn derived_id_is_order_insensitive() {
        let forward = ConversationService::derive_conversation_id("alice", "bob");
        let reverse = ConversationService::derive_conversation_id("bob", "alice");
        assert_eq!(forward, reverse);
        assert_eq!(forward.len(), 32);

        let other = ConversationService::derive_conversation_id("alice", "carol");
        assert_ne!(forward, other);
    }

    #[test]
    fn resolve_converges_for_both_directions() {
        let conversations = service();
        let first = conversations.resolve("alice", "bob").unwrap();
        let second = conversations.resolve("bob", "alice").unwrap();
        assert_eq!(first.id, second.id);

        let listed = conversations.conversations_of("alice").unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_resolves_yield_one_conversation() {
        let conversations = service();
        let from_alice = conversations.clone();
        let from_bob = conversations.clone();

        let (first, second) = tokio::join!(
            tokio::task::spawn_blocking(move || from_alice.resolve("alice", "bob")),
            tokio::task::spawn_blocking(move || from_bob.resolve("bob", "alice")),
        );
        let first = first.unwrap().unwrap();
        let second = second.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(conversations.conversations_of("alice").unwrap().len(), 1);
    }

    #[test]
    fn resolve_rejects_self_conversation() {
        let conversations = service();
        let err = conversations.resolve("alice", "alice").unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn send_requires_participant() {
        let conversations = service();
        let conversation = conversations.resolve("alice", "bob").unwrap();

        let err = conversations
            .send_message(&conversation.id, "mallory", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let err = conversations
            .send_message("missing", "alice", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn messages_are_listed_oldest_first() {
        let conversations = service();
        let conversation = conversations.resolve("alice", "bob").unwrap();

        conversations
            .send_message(&conversation.id, "alice", "one")
            .await
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        conversations
            .send_message(&conversation.id, "bob", "two")
            .await
            .unwrap();

        let history = conversations
            .messages(&conversation.id, DEFAULT_MESSAGE_LIMIT)
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "one");
        assert_eq!(history[1].content, "two");
    }

    #[tokio::test]
    async fn subscriber_receives_messages_in_order() {
        let conversations = service();
        let conversation = conversations.resolve("alice", "bob").unwrap();
        let mut sub = conversations.subscribe(&conversation.id).await.unwrap();

        for n in 0..3 {
            conversations
                .send_message(&conversation.id, "alice", &format!("msg {n}"))
                .await
                .unwrap();
        }

        for n in 0..3 {
            let envelope = sub.recv().await.expect("event");
            match envelope.payload {
                EventPayload::MessageCreated(view) => {
                    assert_eq!(view.content, format!("msg {n}"));
                }
                other => panic!("unexpected payload: {other:?}"),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sends_deliver_in_timestamp_order() {
        let conversations = service();
        let conversation = conversations.resolve("alice", "bob").unwrap();
        let mut sub = conversations.subscribe(&conversation.id).await.unwrap();

        let from_alice = conversations.clone();
        let from_bob = conversations.clone();
        let alice_conv = conversation.id.clone();
        let bob_conv = conversation.id.clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move {
                for n in 0..10 {
                    from_alice
                        .send_message(&alice_conv, "alice", &format!("a{n}"))
                        .await
                        .unwrap();
                }
            }),
            tokio::spawn(async move {
                for n in 0..10 {
                    from_bob
                        .send_message(&bob_conv, "bob", &format!("b{n}"))
                        .await
                        .unwrap();
                }
            }),
        );
        a.unwrap();
        b.unwrap();

        let mut previous = String::new();
        for _ in 0..20 {
            let envelope = sub.recv().await.expect("event");
            match envelope.payload {
                EventPayload::MessageCreated(view) => {
                    assert!(view.created_at >= previous, "{} < {previous}", view.created_at);
                    previous = view.created_at;
                }
                other => panic!("unexpected payload: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn conversation_list_carries_last_message() {
        let conversations = service();
        let with_bob = conversations.resolve("alice", "bob").unwrap();
        let with_carol = conversations.resolve("alice", "carol").unwrap();

        conversations
            .send_message(&with_bob.id, "alice", "early")
            .await
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        conversations
            .send_message(&with_carol.id, "alice", "late")
            .await
            .unwrap();

        let listed = conversations.conversations_of("alice").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, with_carol.id);
        assert_eq!(
            listed[0].last_message.as_ref().map(|m| m.content.as_str()),
            Some("late")
        );
        assert_eq!(listed[1].id, with_bob.id);
    }
}
