mod common;

use common::*;
use inkpot::error::ApiError;
use inkpot::services::relationships;

#[tokio::test]
async fn follow_creates_edge_and_counters() {
    let pool = test_pool().await;
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;

    let response = relationships::follow_user(&pool, alice, bob)
        .await
        .expect("follow");
    assert_eq!(response.message, "You successfully followed user 'bob'.");

    assert!(relationships::follows(&pool, alice, bob).await.expect("edge check"));
    assert_eq!(follow_counters(&pool, alice).await, (1, 0));
    assert_eq!(follow_counters(&pool, bob).await, (0, 1));

    let following = relationships::following_of(&pool, alice).await.expect("following");
    assert_eq!(following.len(), 1);
    assert_eq!(following[0].username, "bob");

    let followers = relationships::followers_of(&pool, bob).await.expect("followers");
    assert_eq!(followers.len(), 1);
    assert_eq!(followers[0].username, "alice");
}

#[tokio::test]
async fn duplicate_follow_conflicts_and_counters_hold() {
    let pool = test_pool().await;
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;

    relationships::follow_user(&pool, alice, bob)
        .await
        .expect("first follow");
    let err = relationships::follow_user(&pool, alice, bob)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(err.to_string(), "Already following this user.");

    // The failed attempt must not move anything.
    assert_eq!(follow_counters(&pool, alice).await, (1, 0));
    assert_eq!(follow_counters(&pool, bob).await, (0, 1));
    let following = relationships::following_of(&pool, alice).await.expect("following");
    assert_eq!(following.len(), 1);
}

#[tokio::test]
async fn self_follow_and_self_unfollow_are_rejected() {
    let pool = test_pool().await;
    let alice = seed_user(&pool, "alice").await;

    let err = relationships::follow_user(&pool, alice, alice).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation(_)));
    assert_eq!(err.to_string(), "You cannot follow yourself.");

    let err = relationships::unfollow_user(&pool, alice, alice).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation(_)));
    assert_eq!(err.to_string(), "You cannot unfollow yourself.");

    assert_eq!(follow_counters(&pool, alice).await, (0, 0));
}

#[tokio::test]
async fn follow_missing_user_is_not_found() {
    let pool = test_pool().await;
    let alice = seed_user(&pool, "alice").await;

    let err = relationships::follow_user(&pool, alice, 404).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    assert_eq!(err.to_string(), "User not found.");
}

#[tokio::test]
async fn unfollow_reverses_follow() {
    let pool = test_pool().await;
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;

    relationships::follow_user(&pool, alice, bob).await.expect("follow");
    let response = relationships::unfollow_user(&pool, alice, bob)
        .await
        .expect("unfollow");
    assert_eq!(response.message, "You successfully unfollowed the user.");

    assert!(!relationships::follows(&pool, alice, bob).await.expect("edge check"));
    assert_eq!(follow_counters(&pool, alice).await, (0, 0));
    assert_eq!(follow_counters(&pool, bob).await, (0, 0));
    assert!(relationships::following_of(&pool, alice).await.expect("following").is_empty());
    assert!(relationships::followers_of(&pool, bob).await.expect("followers").is_empty());
}

#[tokio::test]
async fn unfollow_without_edge_is_not_found() {
    let pool = test_pool().await;
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;

    let err = relationships::unfollow_user(&pool, alice, bob).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    assert_eq!(err.to_string(), "You are not following this user.");
    assert_eq!(follow_counters(&pool, alice).await, (0, 0));
}

#[tokio::test]
async fn follow_back_requires_inbound_edge() {
    let pool = test_pool().await;
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;

    let err = relationships::follow_back(&pool, bob, alice).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation(_)));
    assert_eq!(err.to_string(), "This user is not following you.");

    relationships::follow_user(&pool, alice, bob).await.expect("follow");
    let response = relationships::follow_back(&pool, bob, alice)
        .await
        .expect("follow back");
    assert_eq!(response.message, "You successfully followed back user 'alice'.");

    // The pair is now mutual.
    assert!(relationships::follows(&pool, alice, bob).await.expect("a->b"));
    assert!(relationships::follows(&pool, bob, alice).await.expect("b->a"));
    assert_eq!(follow_counters(&pool, alice).await, (1, 1));
    assert_eq!(follow_counters(&pool, bob).await, (1, 1));
}

#[tokio::test]
async fn follow_back_twice_conflicts() {
    let pool = test_pool().await;
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;

    relationships::follow_user(&pool, alice, bob).await.expect("follow");
    relationships::follow_back(&pool, bob, alice).await.expect("follow back");

    let err = relationships::follow_back(&pool, bob, alice).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(err.to_string(), "You are already following this user.");
    assert_eq!(follow_counters(&pool, bob).await, (1, 1));
}

#[tokio::test]
async fn counters_always_match_edge_cardinality() {
    let pool = test_pool().await;
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;
    let carol = seed_user(&pool, "carol").await;

    relationships::follow_user(&pool, carol, alice).await.expect("c->a");
    relationships::follow_user(&pool, carol, bob).await.expect("c->b");
    relationships::follow_user(&pool, alice, bob).await.expect("a->b");
    relationships::unfollow_user(&pool, carol, alice).await.expect("undo c->a");

    for user in [alice, bob, carol] {
        let (following_count, followers_count) = follow_counters(&pool, user).await;
        let following = relationships::following_of(&pool, user).await.expect("following");
        let followers = relationships::followers_of(&pool, user).await.expect("followers");
        assert_eq!(following_count, following.len() as i64);
        assert_eq!(followers_count, followers.len() as i64);
    }
}

#[tokio::test]
async fn listings_order_newest_edge_first() {
    let pool = test_pool().await;
    let alice = seed_user(&pool, "alice").await;
    let bob = seed_user(&pool, "bob").await;
    let carol = seed_user(&pool, "carol").await;

    relationships::follow_user(&pool, alice, bob).await.expect("a->b");
    relationships::follow_user(&pool, alice, carol).await.expect("a->c");

    let following = relationships::following_of(&pool, alice).await.expect("following");
    let usernames: Vec<&str> = following.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(usernames, ["carol", "bob"]);
}
