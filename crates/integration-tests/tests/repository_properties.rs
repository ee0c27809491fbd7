//! Repository properties against a real SQLite file
//!
//! Round trips, not-found semantics, search, pagination metadata, cascades
//! and constraint translation.

mod common;

use std::sync::Arc;

use blogstore_core::domain::{
    CommentFilter, CommentPatch, NewComment, Pagination, PostFilter, PostOrder, PostPatch,
};
use blogstore_core::error::AppError;
use blogstore_core::mapper::{record_to_wire, wire_to_record};
use blogstore_core::port::{CommentRepository, PostRepository};
use common::{manual_clock, new_post, store, store_with_clock};

fn first_page(size: u32) -> Pagination {
    Pagination::new(1, size).unwrap()
}

#[tokio::test]
async fn test_insert_then_find_round_trip() {
    let (store, _db) = store(4).await;
    let posts = store.posts();

    let created = posts
        .insert(&new_post("Hello SQLite", &["Rust", "sql", "rust"]))
        .await
        .unwrap();
    assert_eq!(created.version, 1);
    assert_eq!(created.likes_count, 0);
    assert_eq!(created.tags, vec!["rust", "sql"]);

    let found = posts.find_by_id(created.id).await.unwrap();
    assert_eq!(found, created);

    // Wire form survives a round trip unchanged
    let wire = record_to_wire(&found).unwrap();
    assert_eq!(wire["id"], serde_json::json!(found.id.to_string()));
    let back: blogstore_core::domain::Post = wire_to_record(&wire).unwrap();
    assert_eq!(back, found);
}

#[tokio::test]
async fn test_delete_twice_reports_not_found() {
    let (store, _db) = store(4).await;
    let posts = store.posts();
    let post = posts.insert(&new_post("Short lived", &[])).await.unwrap();

    posts.delete(post.id).await.unwrap();
    let err = posts.delete(post.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = posts.find_by_id(post.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_empty_listing() {
    let (store, _db) = store(2).await;

    let page = store
        .posts()
        .find_all(&PostFilter::all(), first_page(10))
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 0);
    assert_eq!(page.last_page, 1);
    assert!(!page.has_next);
    assert!(!page.has_prev);
}

#[tokio::test]
async fn test_search_by_title_and_tags() {
    let (store, _db) = store(4).await;
    let posts = store.posts();

    posts.insert(&new_post("Async Rust in practice", &["rust", "async"])).await.unwrap();
    posts.insert(&new_post("Rust pools", &["rust", "db"])).await.unwrap();
    posts.insert(&new_post("Gardening notes", &["plants"])).await.unwrap();
    posts.insert(&new_post("100% coverage", &["testing"])).await.unwrap();

    let by_title = posts
        .find_all(&PostFilter::parse("rust"), first_page(10))
        .await
        .unwrap();
    assert_eq!(by_title.total_count, 2);

    let by_tags = posts
        .find_all(&PostFilter::parse("#rust #DB"), first_page(10))
        .await
        .unwrap();
    assert_eq!(by_tags.total_count, 1);
    assert_eq!(by_tags.items[0].title, "Rust pools");

    let both = posts
        .find_all(&PostFilter::parse("async #rust"), first_page(10))
        .await
        .unwrap();
    assert_eq!(both.total_count, 1);
    assert_eq!(both.items[0].title, "Async Rust in practice");

    // LIKE wildcards in the query are literal
    let literal = posts
        .find_all(&PostFilter::parse("100%"), first_page(10))
        .await
        .unwrap();
    assert_eq!(literal.total_count, 1);

    let none = posts
        .find_all(&PostFilter::parse("#missing"), first_page(10))
        .await
        .unwrap();
    assert!(none.items.is_empty());
}

#[tokio::test]
async fn test_title_search_folds_non_ascii_case() {
    let (store, _db) = store(2).await;
    let posts = store.posts();
    let post = posts.insert(&new_post("Über Rust", &[])).await.unwrap();
    posts.insert(&new_post("Unrelated", &[])).await.unwrap();

    for query in ["Über", "über", "ÜBER", "RUST"] {
        let page = posts
            .find_all(&PostFilter::parse(query), first_page(10))
            .await
            .unwrap();
        assert_eq!(page.total_count, 1, "{query}");
        assert_eq!(page.items[0].id, post.id);
    }

    // The search key follows the title through updates
    let patch = PostPatch {
        title: "Ärger mit Lifetimes".to_string(),
        text: "x".to_string(),
        tags: Vec::new(),
        expected_version: None,
    };
    posts.update(post.id, &patch).await.unwrap();
    let page = posts
        .find_all(&PostFilter::parse("ärger"), first_page(10))
        .await
        .unwrap();
    assert_eq!(page.total_count, 1);
    let stale = posts
        .find_all(&PostFilter::parse("über"), first_page(10))
        .await
        .unwrap();
    assert_eq!(stale.total_count, 0);
}

#[tokio::test]
async fn test_pagination_and_ordering() {
    let clock = manual_clock();
    let (store, _db) = store_with_clock(4, clock.clone()).await;
    let posts = store.posts();

    for i in 1..=5 {
        posts.insert(&new_post(&format!("Post {}", i), &[])).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
    }

    let page = posts
        .find_all(&PostFilter::all(), Pagination::new(2, 2).unwrap())
        .await
        .unwrap();
    assert_eq!(page.total_count, 5);
    assert_eq!(page.last_page, 3);
    assert!(page.has_prev);
    assert!(page.has_next);
    // Newest first: 5, 4 | 3, 2 | 1
    let titles: Vec<_> = page.items.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Post 3", "Post 2"]);

    let oldest = posts
        .find_all(
            &PostFilter::all().ordered_by(PostOrder::Oldest),
            first_page(1),
        )
        .await
        .unwrap();
    assert_eq!(oldest.items[0].title, "Post 1");

    let beyond = posts
        .find_all(&PostFilter::all(), Pagination::new(9, 2).unwrap())
        .await
        .unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total_count, 5);
}

#[tokio::test]
async fn test_versioned_update_and_conflict() {
    let (store, _db) = store(4).await;
    let posts = store.posts();
    let post = posts.insert(&new_post("Draft", &["a"])).await.unwrap();

    let patch = PostPatch {
        title: "Final".to_string(),
        text: "Done".to_string(),
        tags: vec!["b".to_string()],
        expected_version: Some(post.version),
    };
    let updated = posts.update(post.id, &patch).await.unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.tags, vec!["b"]);

    // Same expected version again is stale
    let err = posts.update(post.id, &patch).await.unwrap_err();
    assert!(matches!(err, AppError::OptimisticConflict(_)));

    let err = posts.update(post.id + 100, &patch).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_likes_accumulate() {
    let (store, _db) = store(4).await;
    let posts = Arc::new(store.posts());
    let post = posts.insert(&new_post("Popular", &[])).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let posts = posts.clone();
        handles.push(tokio::spawn(async move { posts.add_like(post.id).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(posts.find_by_id(post.id).await.unwrap().likes_count, 10);
}

#[tokio::test]
async fn test_comments_cascade_with_post() {
    let (store, _db) = store(4).await;
    let posts = store.posts();
    let comments = store.comments();

    let post = posts.insert(&new_post("With comments", &["x"])).await.unwrap();
    let comment = comments
        .insert(&NewComment {
            post_id: post.id,
            text: "nice".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(posts.find_by_id(post.id).await.unwrap().comments_count, 1);

    posts.delete(post.id).await.unwrap();

    let err = comments.find_by_id(comment.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let page = comments
        .find_all(CommentFilter::for_post(post.id), first_page(10))
        .await
        .unwrap();
    assert_eq!(page.total_count, 0);
}

#[tokio::test]
async fn test_comment_for_missing_post_is_constraint_violation() {
    let (store, _db) = store(2).await;

    let err = store
        .comments()
        .insert(&NewComment {
            post_id: 4242,
            text: "orphan".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ConstraintViolation(_)));
}

#[tokio::test]
async fn test_comment_listing_and_update() {
    let clock = manual_clock();
    let (store, _db) = store_with_clock(4, clock.clone()).await;
    let post = store.posts().insert(&new_post("Thread", &[])).await.unwrap();
    let comments = store.comments();

    for text in ["first", "second", "third"] {
        comments
            .insert(&NewComment {
                post_id: post.id,
                text: text.to_string(),
            })
            .await
            .unwrap();
        clock.advance(chrono::Duration::seconds(1));
    }

    let page = comments
        .find_all(CommentFilter::for_post(post.id), first_page(2))
        .await
        .unwrap();
    assert_eq!(page.total_count, 3);
    assert_eq!(page.items[0].text, "first");
    assert!(page.has_next);

    let target = page.items[1].clone();
    let updated = comments
        .update(
            target.id,
            &CommentPatch {
                text: "second, edited".to_string(),
                expected_version: Some(1),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.version, 2);
    assert!(updated.updated_at > target.updated_at);

    let err = comments
        .update(
            target.id,
            &CommentPatch {
                text: "stale".to_string(),
                expected_version: Some(1),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OptimisticConflict(_)));
}
