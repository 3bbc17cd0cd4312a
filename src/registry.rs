//! Per-request loader bundle handed to the GraphQL resolvers.
//!
//! Resolvers for relation fields go through [`Loaders`] instead of calling the [`DataStore`]
//! directly, so that sibling fields resolved in the same tick share one store query.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    batch_function::{BatchFunction, BatchResult, KeyResult},
    config::LoaderConfig,
    loader::Loader,
    model::{MemberType, MemberTypeId, Post, Profile, User},
    store::DataStore,
};

/// Shared handle to the store, used as the context of every batch function below.
pub type StoreContext = Arc<dyn DataStore>;

/// The loaders used while resolving one request. Build a new bundle for every request with
/// [`create_loaders`]; cached values must never leak from one caller's request into another's.
pub struct Loaders {
    pub users: Loader<Uuid, User>,
    pub posts_by_author: Loader<Uuid, Vec<Post>>,
    pub profiles_by_user: Loader<Uuid, Profile>,
    pub member_types: Loader<MemberTypeId, MemberType>,
    /// Authors the keyed user subscribed to.
    pub subscribed_to: Loader<Uuid, Vec<User>>,
    /// Users subscribed to the keyed author.
    pub subscribers: Loader<Uuid, Vec<User>>,
}

impl Loaders {
    /// Must be called from within a tokio runtime.
    pub fn new(store: StoreContext, config: &LoaderConfig) -> Self {
        let named = |relation: &str| relation_config(config, relation);

        Self {
            users: Loader::with_config(UsersById, store.clone(), named("users")),
            posts_by_author: Loader::with_config(
                PostsByAuthor,
                store.clone(),
                named("posts_by_author"),
            ),
            profiles_by_user: Loader::with_config(
                ProfileByUser,
                store.clone(),
                named("profiles_by_user"),
            ),
            member_types: Loader::with_config(
                MemberTypesById,
                store.clone(),
                named("member_types"),
            ),
            subscribed_to: Loader::with_config(
                SubscribedToBySubscriber,
                store.clone(),
                named("subscribed_to"),
            ),
            subscribers: Loader::with_config(SubscribersByAuthor, store, named("subscribers")),
        }
    }

    /// Seeds the user-keyed loaders from a list query that already returned these users, so that
    /// resolving `user(id)` for them later needs no extra fetch.
    pub fn prime_users(&self, users: &[User]) {
        self.users.prime_many(users.iter().map(|u| (u.id, u.clone())).collect());
    }

    /// Drops everything cached about a user after a mutation touched them.
    ///
    /// Other users' subscription lists may contain this user too, so both subscription loaders
    /// are emptied entirely.
    pub fn forget_user(&self, id: Uuid) {
        self.users.clear(id);
        self.posts_by_author.clear(id);
        self.profiles_by_user.clear(id);
        self.subscribed_to.clear_all();
        self.subscribers.clear_all();
    }
}

/// Config for one relation's loader. A caller-supplied name becomes a prefix of the relation name.
fn relation_config(config: &LoaderConfig, relation: &str) -> LoaderConfig {
    let mut config = config.clone();
    config.name = Some(match config.name.take() {
        Some(prefix) => format!("{}.{}", prefix, relation),
        None => relation.to_owned(),
    });
    config
}

/// Builds a fresh [`Loaders`] bundle for one inbound request.
pub fn create_loaders(store: StoreContext, config: &LoaderConfig) -> Loaders {
    Loaders::new(store, config)
}

/// Lines up rows keyed by `K` with the requested keys. Keys without a row resolve to `None`.
fn one_per_key<K, V>(keys: &[K], rows: impl IntoIterator<Item = (K, V)>) -> Vec<KeyResult<V>>
where
    K: Eq + Hash,
{
    let mut by_key = rows.into_iter().collect::<HashMap<_, _>>();
    keys.iter().map(|k| Ok(by_key.remove(k))).collect()
}

/// Groups rows under the requested keys. Keys without rows resolve to an empty list.
fn many_per_key<K, V>(keys: &[K], rows: impl IntoIterator<Item = (K, V)>) -> Vec<KeyResult<Vec<V>>>
where
    K: Eq + Hash,
{
    let mut by_key: HashMap<K, Vec<V>> = HashMap::new();
    for (key, row) in rows {
        by_key.entry(key).or_default().push(row);
    }
    keys.iter().map(|k| Ok(Some(by_key.remove(k).unwrap_or_default()))).collect()
}

pub struct UsersById;

#[async_trait]
impl BatchFunction<Uuid, User> for UsersById {
    type Context = StoreContext;

    async fn load(keys: &[Uuid], store: &StoreContext) -> BatchResult<User> {
        let users = store.users_by_ids(keys).await?;
        Ok(one_per_key(keys, users.into_iter().map(|u| (u.id, u))))
    }
}

pub struct PostsByAuthor;

#[async_trait]
impl BatchFunction<Uuid, Vec<Post>> for PostsByAuthor {
    type Context = StoreContext;

    async fn load(keys: &[Uuid], store: &StoreContext) -> BatchResult<Vec<Post>> {
        let posts = store.posts_by_author_ids(keys).await?;
        Ok(many_per_key(keys, posts.into_iter().map(|p| (p.author_id, p))))
    }
}

pub struct ProfileByUser;

#[async_trait]
impl BatchFunction<Uuid, Profile> for ProfileByUser {
    type Context = StoreContext;

    async fn load(keys: &[Uuid], store: &StoreContext) -> BatchResult<Profile> {
        let profiles = store.profiles_by_user_ids(keys).await?;
        Ok(one_per_key(keys, profiles.into_iter().map(|p| (p.user_id, p))))
    }
}

pub struct MemberTypesById;

#[async_trait]
impl BatchFunction<MemberTypeId, MemberType> for MemberTypesById {
    type Context = StoreContext;

    async fn load(keys: &[MemberTypeId], store: &StoreContext) -> BatchResult<MemberType> {
        let member_types = store.member_types_by_ids(keys).await?;
        Ok(one_per_key(keys, member_types.into_iter().map(|m| (m.id, m))))
    }
}

pub struct SubscribedToBySubscriber;

#[async_trait]
impl BatchFunction<Uuid, Vec<User>> for SubscribedToBySubscriber {
    type Context = StoreContext;

    async fn load(keys: &[Uuid], store: &StoreContext) -> BatchResult<Vec<User>> {
        Ok(many_per_key(keys, store.subscribed_to_by_subscriber_ids(keys).await?))
    }
}

pub struct SubscribersByAuthor;

#[async_trait]
impl BatchFunction<Uuid, Vec<User>> for SubscribersByAuthor {
    type Context = StoreContext;

    async fn load(keys: &[Uuid], store: &StoreContext) -> BatchResult<Vec<User>> {
        Ok(many_per_key(keys, store.subscribers_by_author_ids(keys).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_names_keep_caller_prefix() {
        let plain = relation_config(&LoaderConfig::default(), "users");
        assert_eq!(plain.name.as_deref(), Some("users"));

        let prefixed = relation_config(&LoaderConfig::default().name("request-42"), "posts_by_author");
        assert_eq!(prefixed.name.as_deref(), Some("request-42.posts_by_author"));
    }

    #[test]
    fn one_per_key_follows_key_order() {
        let rows = vec![(3, "c"), (1, "a")];
        let values = one_per_key(&[1, 2, 3], rows)
            .into_iter()
            .map(|r| r.unwrap())
            .collect::<Vec<_>>();
        assert_eq!(values, vec![Some("a"), None, Some("c")]);
    }

    #[test]
    fn many_per_key_groups_and_fills_empty() {
        let rows = vec![(1, "a1"), (2, "b1"), (1, "a2")];
        let values = many_per_key(&[2, 3, 1], rows)
            .into_iter()
            .map(|r| r.unwrap())
            .collect::<Vec<_>>();
        assert_eq!(values, vec![Some(vec!["b1"]), Some(vec![]), Some(vec!["a1", "a2"])]);
    }
}
