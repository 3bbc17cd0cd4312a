use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{MemberType, MemberTypeId, Post, Profile, Subscription, User};

/// Bulk read access to the backing store.
///
/// Every method takes the full set of keys of one batch and returns the matching rows in any
/// order; rows for unknown keys are simply absent. The batch functions in
/// [`registry`](crate::registry) line the rows back up with the requested keys.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError>;

    async fn posts_by_author_ids(&self, author_ids: &[Uuid]) -> Result<Vec<Post>, StoreError>;

    async fn profiles_by_user_ids(&self, user_ids: &[Uuid]) -> Result<Vec<Profile>, StoreError>;

    async fn member_types_by_ids(
        &self,
        ids: &[MemberTypeId],
    ) -> Result<Vec<MemberType>, StoreError>;

    /// Authors followed by the given users, each paired with the id of the subscriber.
    async fn subscribed_to_by_subscriber_ids(
        &self,
        subscriber_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, User)>, StoreError>;

    /// Followers of the given authors, each paired with the id of the author.
    async fn subscribers_by_author_ids(
        &self,
        author_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, User)>, StoreError>;
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
    profiles: Vec<Profile>,
    member_types: Vec<MemberType>,
    subscriptions: Vec<Subscription>,
}

impl Tables {
    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn require_user(&self, id: Uuid) -> Result<&User, StoreError> {
        self.user(id)
            .ok_or_else(|| StoreError::MissingReference { entity: "user", id: id.to_string() })
    }
}

/// An in-process [`DataStore`], with the writes the API's mutations need.
///
/// Rows are returned in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the two standard member types.
    pub fn with_default_member_types() -> Self {
        let tables = Tables {
            member_types: vec![
                MemberType { id: MemberTypeId::Basic, discount: 2.3, posts_limit_per_month: 20 },
                MemberType {
                    id: MemberTypeId::Business,
                    discount: 7.7,
                    posts_limit_per_month: 100,
                },
            ],
            ..Default::default()
        };
        Self { tables: RwLock::new(tables), unavailable: AtomicBool::new(false) }
    }

    /// While set, every read fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_owned()));
        }
        Ok(())
    }

    pub async fn users(&self) -> Result<Vec<User>, StoreError> {
        self.check_available()?;
        Ok(self.tables.read().await.users.clone())
    }

    pub async fn create_user(&self, name: impl Into<String>, balance: f64) -> User {
        let user = User { id: Uuid::new_v4(), name: name.into(), balance };
        self.tables.write().await.users.push(user.clone());
        tracing::debug!(id = %user.id, "created user");
        user
    }

    /// Removes a user along with their posts, profile and subscriptions in either direction.
    pub async fn delete_user(&self, id: Uuid) -> bool {
        let mut tables = self.tables.write().await;
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        if tables.users.len() == before {
            return false;
        }
        tables.posts.retain(|p| p.author_id != id);
        tables.profiles.retain(|p| p.user_id != id);
        tables.subscriptions.retain(|s| s.subscriber_id != id && s.author_id != id);
        tracing::debug!(%id, "deleted user");
        true
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Post, StoreError> {
        let mut tables = self.tables.write().await;
        tables.require_user(author_id)?;
        let post =
            Post { id: Uuid::new_v4(), title: title.into(), content: content.into(), author_id };
        tables.posts.push(post.clone());
        Ok(post)
    }

    pub async fn delete_post(&self, id: Uuid) -> bool {
        let mut tables = self.tables.write().await;
        let before = tables.posts.len();
        tables.posts.retain(|p| p.id != id);
        tables.posts.len() != before
    }

    /// A user has at most one profile.
    pub async fn create_profile(
        &self,
        user_id: Uuid,
        member_type_id: MemberTypeId,
        is_male: bool,
        year_of_birth: i32,
    ) -> Result<Profile, StoreError> {
        let mut tables = self.tables.write().await;
        tables.require_user(user_id)?;
        if !tables.member_types.iter().any(|m| m.id == member_type_id) {
            return Err(StoreError::MissingReference {
                entity: "member type",
                id: member_type_id.to_string(),
            });
        }
        if tables.profiles.iter().any(|p| p.user_id == user_id) {
            return Err(StoreError::Conflict { entity: "profile for user", id: user_id.to_string() });
        }
        let profile =
            Profile { id: Uuid::new_v4(), is_male, year_of_birth, user_id, member_type_id };
        tables.profiles.push(profile.clone());
        Ok(profile)
    }

    pub async fn delete_profile(&self, id: Uuid) -> bool {
        let mut tables = self.tables.write().await;
        let before = tables.profiles.len();
        tables.profiles.retain(|p| p.id != id);
        tables.profiles.len() != before
    }

    pub async fn upsert_member_type(&self, member_type: MemberType) {
        let mut tables = self.tables.write().await;
        match tables.member_types.iter().position(|m| m.id == member_type.id) {
            Some(i) => tables.member_types[i] = member_type,
            None => tables.member_types.push(member_type),
        }
    }

    /// Makes `subscriber_id` follow `author_id`. Subscribing twice is a no-op.
    pub async fn subscribe(&self, subscriber_id: Uuid, author_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.require_user(subscriber_id)?;
        tables.require_user(author_id)?;
        let subscription = Subscription { subscriber_id, author_id };
        if !tables.subscriptions.contains(&subscription) {
            tables.subscriptions.push(subscription);
        }
        Ok(())
    }

    pub async fn unsubscribe(&self, subscriber_id: Uuid, author_id: Uuid) -> bool {
        let mut tables = self.tables.write().await;
        let before = tables.subscriptions.len();
        tables.subscriptions.retain(|s| *s != Subscription { subscriber_id, author_id });
        tables.subscriptions.len() != before
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.users.iter().filter(|u| ids.contains(&u.id)).cloned().collect())
    }

    async fn posts_by_author_ids(&self, author_ids: &[Uuid]) -> Result<Vec<Post>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.posts.iter().filter(|p| author_ids.contains(&p.author_id)).cloned().collect())
    }

    async fn profiles_by_user_ids(&self, user_ids: &[Uuid]) -> Result<Vec<Profile>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.profiles.iter().filter(|p| user_ids.contains(&p.user_id)).cloned().collect())
    }

    async fn member_types_by_ids(
        &self,
        ids: &[MemberTypeId],
    ) -> Result<Vec<MemberType>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.member_types.iter().filter(|m| ids.contains(&m.id)).cloned().collect())
    }

    async fn subscribed_to_by_subscriber_ids(
        &self,
        subscriber_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, User)>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .subscriptions
            .iter()
            .filter(|s| subscriber_ids.contains(&s.subscriber_id))
            .filter_map(|s| tables.user(s.author_id).map(|u| (s.subscriber_id, u.clone())))
            .collect())
    }

    async fn subscribers_by_author_ids(
        &self,
        author_ids: &[Uuid],
    ) -> Result<Vec<(Uuid, User)>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .subscriptions
            .iter()
            .filter(|s| author_ids.contains(&s.author_id))
            .filter_map(|s| tables.user(s.subscriber_id).map(|u| (s.author_id, u.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delete_user_cascades() {
        let store = MemoryStore::with_default_member_types();
        let alice = store.create_user("alice", 10.0).await;
        let bob = store.create_user("bob", 5.0).await;
        store.create_post(alice.id, "hello", "world").await.unwrap();
        store.create_profile(alice.id, MemberTypeId::Basic, false, 1990).await.unwrap();
        store.subscribe(bob.id, alice.id).await.unwrap();

        assert!(store.delete_user(alice.id).await);
        assert!(store.posts_by_author_ids(&[alice.id]).await.unwrap().is_empty());
        assert!(store.profiles_by_user_ids(&[alice.id]).await.unwrap().is_empty());
        assert!(store.subscribed_to_by_subscriber_ids(&[bob.id]).await.unwrap().is_empty());
        assert!(!store.delete_user(alice.id).await);
    }

    #[tokio::test]
    async fn writes_check_references() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice", 0.0).await;
        let ghost = Uuid::new_v4();

        assert!(matches!(
            store.create_post(ghost, "t", "c").await,
            Err(StoreError::MissingReference { entity: "user", .. })
        ));
        // No member types have been seeded.
        assert!(matches!(
            store.create_profile(alice.id, MemberTypeId::Basic, true, 2000).await,
            Err(StoreError::MissingReference { entity: "member type", .. })
        ));
        assert!(store.subscribe(alice.id, ghost).await.is_err());
    }

    #[tokio::test]
    async fn one_profile_per_user() {
        let store = MemoryStore::with_default_member_types();
        let alice = store.create_user("alice", 0.0).await;
        store.create_profile(alice.id, MemberTypeId::Basic, true, 2000).await.unwrap();
        assert!(matches!(
            store.create_profile(alice.id, MemberTypeId::Business, true, 2000).await,
            Err(StoreError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn subscriptions_are_idempotent_and_directional() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice", 0.0).await;
        let bob = store.create_user("bob", 0.0).await;
        store.subscribe(bob.id, alice.id).await.unwrap();
        store.subscribe(bob.id, alice.id).await.unwrap();

        let followed = store.subscribed_to_by_subscriber_ids(&[bob.id]).await.unwrap();
        assert_eq!(followed, vec![(bob.id, alice.clone())]);
        let followers = store.subscribers_by_author_ids(&[alice.id]).await.unwrap();
        assert_eq!(followers, vec![(alice.id, bob.clone())]);
        assert!(store.subscribed_to_by_subscriber_ids(&[alice.id]).await.unwrap().is_empty());

        assert!(store.unsubscribe(bob.id, alice.id).await);
        assert!(!store.unsubscribe(bob.id, alice.id).await);
    }

    #[tokio::test]
    async fn offline_store_rejects_reads() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.users_by_ids(&[Uuid::nil()]).await, Err(StoreError::Unavailable(_))));
        store.set_unavailable(false);
        assert!(store.users_by_ids(&[Uuid::nil()]).await.unwrap().is_empty());
    }
}
