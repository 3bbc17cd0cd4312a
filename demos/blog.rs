use std::sync::Arc;
use std::time::Duration;

use dataload_social::model::MemberTypeId;
use dataload_social::{create_loaders, LoaderConfig, MemoryStore, StoreError};
use futures::future;

// Resolves `users { name posts { title } profile { memberType { discount } } }` the way a
// GraphQL executor would: the list first, then every nested field of every user concurrently.
#[tokio::main]
async fn main() -> Result<(), StoreError> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let store = Arc::new(MemoryStore::with_default_member_types());
    let ada = store.create_user("ada", 120.0).await;
    let grace = store.create_user("grace", 80.0).await;
    store.create_post(ada.id, "Notes on the engine", "...").await?;
    store.create_post(grace.id, "Compilers", "...").await?;
    store.create_profile(grace.id, MemberTypeId::Business, false, 1906).await?;
    store.subscribe(grace.id, ada.id).await?;

    // One bundle per inbound request. The resolvers below may run on any worker thread, so the
    // batch window is held open a little longer than the default.
    let config = LoaderConfig::default().delay(Duration::from_millis(3));
    let loaders = create_loaders(store.clone(), &config);
    let users = store.users().await?;
    loaders.prime_users(&users);

    let loaders = &loaders;
    let resolved = future::join_all(users.iter().map(|user| async move {
        let (posts, profile) = future::join(
            loaders.posts_by_author.load(user.id),
            loaders.profiles_by_user.load(user.id),
        )
        .await;
        let member_type = match profile {
            Ok(Some(ref profile)) => loaders.member_types.load(profile.member_type_id).await,
            _ => Ok(None),
        };
        (user, posts, member_type)
    }))
    .await;

    for (user, posts, member_type) in resolved {
        let titles = posts
            .ok()
            .flatten()
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.title)
            .collect::<Vec<_>>();
        let discount = member_type.ok().flatten().map(|m| m.discount);
        println!("{}: posts {:?}, discount {:?}", user.name, titles, discount);
    }
    Ok(())
}
