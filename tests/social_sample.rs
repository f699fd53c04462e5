//! Sample Application Test
//!
//! A small social feed built from key templates: user records in hashes,
//! follower sets, per-user timelines and a global leaderboard.

mod common;

use common::memory_container;
use redis_objects::{
    Container, DtoHash, Item, KeyTemplate, List, Order, Proxy, RedisKey, Set, SortedSet,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq)]
struct User {
    id: i64,
    name: String,
}

redis_objects::hash_dto!(User { id, name });

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Post {
    id: i64,
    author: i64,
    message: String,
}

redis_objects::json_codec!(Post);

struct Feed {
    container: Container,
    users: KeyTemplate<DtoHash<User>>,
    followers: KeyTemplate<Set<i64>>,
    timelines: KeyTemplate<List<Post>>,
    next_post: std::sync::Arc<Item<i64>>,
    popularity: std::sync::Arc<SortedSet<i64>>,
}

impl Feed {
    fn new(container: Container) -> Self {
        Feed {
            users: container.key_template("user:{0}"),
            followers: container.key_template("user:{0}:followers"),
            timelines: container.key_template("user:{0}:timeline"),
            next_post: container.get_key("next_post_id"),
            popularity: container.get_key("popularity"),
            container,
        }
    }

    async fn register(&self, id: i64, name: &str) {
        let user = User { id, name: name.into() };
        self.users.get_key1(id).unwrap().from_dto(&user).await.unwrap();
    }

    async fn follow(&self, follower: i64, followed: i64) {
        let tx = self.container.create_transaction();
        let set = self.followers.get_key1(followed).unwrap();
        let added = set.with_tx(&tx).add(&follower);
        let score = self.popularity.with_tx(&tx).increment_score(&followed, 1.0);
        assert!(tx.execute().await.unwrap());
        assert!(added.await.unwrap());
        score.await.unwrap();
    }

    /// Fans a new post out to the author's followers in one batch.
    async fn publish(&self, author: i64, message: &str) -> Post {
        let id = self.next_post.increment(1).await.unwrap();
        let post = Post {
            id,
            author,
            message: message.into(),
        };
        let followers = self.followers.get_key1(author).unwrap().members().await.unwrap();
        let batch = self.container.create_batch();
        let pushes: Vec<_> = followers
            .iter()
            .map(|f| {
                let timeline = self.timelines.get_key1(f).unwrap();
                batch.enqueue(&*timeline, |t| t.push_front(&post))
            })
            .collect();
        batch.execute().await.unwrap();
        for push in pushes {
            push.await.unwrap();
        }
        post
    }
}

#[tokio::test]
async fn test_social_feed() {
    let (container, store) = memory_container("social");
    let feed = Feed::new(container.clone());

    feed.register(1, "ada").await;
    feed.register(2, "grace").await;
    feed.register(3, "linus").await;
    feed.follow(2, 1).await;
    feed.follow(3, 1).await;
    feed.follow(1, 3).await;

    let hello = feed.publish(1, "hello").await;
    let again = feed.publish(1, "again").await;

    let grace_timeline = feed.timelines.get_key1(2).unwrap();
    assert_eq!(grace_timeline.to_vec().await.unwrap(), vec![again.clone(), hello.clone()]);
    assert_eq!(feed.timelines.get_key1(1).unwrap().len().await.unwrap(), 0);

    let most_followed = feed.popularity.range(0, 0, Order::Descending).await.unwrap();
    assert_eq!(most_followed, vec![1]);

    let ada = feed.users.get_key1(1).unwrap().to_dto().await.unwrap();
    assert_eq!(ada, User { id: 1, name: "ada".into() });

    // the same template argument yields the tracked instance
    assert!(std::sync::Arc::ptr_eq(
        &feed.timelines.get_key1(2).unwrap(),
        &grace_timeline
    ));
    assert!(container.key_exists("user:2:timeline", true).await.unwrap());
    assert!(!container.key_exists("user:2:timeline", false).await.unwrap());

    assert!(container.delete_tracked_keys().await.unwrap() > 0);
    assert_eq!(container.tracked_count(), 0);
    assert!(store.is_empty());
}
