//! Annotation dispatch queue: eligibility, leasing, ordering, concurrency.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Duration as ChronoDuration;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use ultitracker_core::annotation::{AnnotationPayload, AnnotationType, BoundingBox, OrderPolicy};
use ultitracker_db::models::lease::{LeaseRequest, LeaseState};
use ultitracker_db::repositories::{AnnotationQueueRepo, AnnotationRepo};
use ultitracker_db::DbConfig;

use common::{init, label_camera, seed_game, seed_image, seed_ready_game, t0};

const LEASE: Duration = Duration::from_secs(10);

fn request(
    game_ids: &[&str],
    annotation_type: AnnotationType,
    order: OrderPolicy,
    batch_size: u32,
) -> LeaseRequest {
    LeaseRequest::new(
        game_ids.iter().map(|g| g.to_string()).collect(),
        annotation_type,
        order,
        batch_size,
        LEASE,
    )
    .unwrap()
}

fn ids(images: &[ultitracker_db::models::lease::LeasedImage]) -> Vec<&str> {
    images.iter().map(|i| i.img_id.as_str()).collect()
}

fn one_box() -> AnnotationPayload {
    AnnotationPayload::PlayerBboxes(vec![BoundingBox {
        x1: 10.0,
        y1: 20.0,
        x2: 30.0,
        y2: 60.0,
        player_id: None,
    }])
}

// ---------------------------------------------------------------------------
// Ordering and batching
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = false)]
async fn test_sequential_returns_lowest_frames_in_order(pool: PgPool) {
    init(&pool).await;
    seed_ready_game(&pool, "g1", &[("C", 3), ("A", 1), ("B", 2)]).await;

    let req = request(&["g1"], AnnotationType::PlayerBbox, OrderPolicy::Sequential, 2);
    let leased = AnnotationQueueRepo::lease_next(&pool, &req, t0()).await.unwrap();

    assert_eq!(ids(&leased), vec!["A", "B"]);
    assert_eq!(leased[0].frame_number, Some(1));
    assert_eq!(leased[0].raw_path, "s3://frames/g1/A.jpg");
    for image in &leased {
        assert_eq!(image.lease_expires_at, t0() + ChronoDuration::seconds(10));
    }
}

#[sqlx::test(migrations = false)]
async fn test_batch_larger_than_pool_returns_what_is_left(pool: PgPool) {
    init(&pool).await;
    seed_ready_game(&pool, "g1", &[("A", 1), ("B", 2)]).await;

    let req = request(&["g1"], AnnotationType::FieldLines, OrderPolicy::Random, 5);
    let leased = AnnotationQueueRepo::lease_next(&pool, &req, t0()).await.unwrap();
    let got: HashSet<&str> = ids(&leased).into_iter().collect();
    assert_eq!(got, HashSet::from(["A", "B"]));

    let again = AnnotationQueueRepo::lease_next(&pool, &req, t0()).await.unwrap();
    assert!(again.is_empty());
}

#[sqlx::test(migrations = false)]
async fn test_empty_game_list_leases_nothing(pool: PgPool) {
    init(&pool).await;
    seed_ready_game(&pool, "g1", &[("A", 1)]).await;

    let req = request(&[], AnnotationType::PlayerBbox, OrderPolicy::Sequential, 1);
    let leased = AnnotationQueueRepo::lease_next(&pool, &req, t0()).await.unwrap();
    assert!(leased.is_empty());
    assert_eq!(common::count(&pool, "annotation_transaction WHERE action = 'sent'").await, 0);
}

#[sqlx::test(migrations = false)]
async fn test_lease_writes_one_sent_row_per_image(pool: PgPool) {
    init(&pool).await;
    seed_ready_game(&pool, "g1", &[("A", 1), ("B", 2), ("C", 3)]).await;

    let req = request(&["g1"], AnnotationType::PlayerBbox, OrderPolicy::Sequential, 2);
    AnnotationQueueRepo::lease_next(&pool, &req, t0()).await.unwrap();

    let log = AnnotationRepo::transactions_for_image(&pool, "A").await.unwrap();
    let sent: Vec<_> = log.iter().filter(|t| t.action == "sent").collect();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].table_ref, "player_bbox");
    assert_eq!(sent[0].timestamp, t0());

    let log_c = AnnotationRepo::transactions_for_image(&pool, "C").await.unwrap();
    assert!(log_c.iter().all(|t| t.action != "sent"));
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = false)]
async fn test_submitted_image_is_never_leased_again(pool: PgPool) {
    init(&pool).await;
    seed_ready_game(&pool, "g1", &[("A", 1)]).await;

    AnnotationRepo::submit(&pool, "A", &one_box(), t0()).await.unwrap().unwrap();

    let req = request(&["g1"], AnnotationType::PlayerBbox, OrderPolicy::Sequential, 1);
    for later in [0, 11, 3600, 86_400 * 30] {
        let now = t0() + ChronoDuration::seconds(later);
        let leased = AnnotationQueueRepo::lease_next(&pool, &req, now).await.unwrap();
        assert!(leased.is_empty(), "submitted image re-leased at +{later}s");
    }

    let state =
        AnnotationQueueRepo::lease_state(&pool, "A", AnnotationType::PlayerBbox, LEASE, t0())
            .await
            .unwrap();
    assert_eq!(state, LeaseState::Submitted);
}

#[sqlx::test(migrations = false)]
async fn test_lease_blocks_until_it_lapses(pool: PgPool) {
    init(&pool).await;
    seed_ready_game(&pool, "g1", &[("A", 1)]).await;
    let req = request(&["g1"], AnnotationType::PlayerBbox, OrderPolicy::Sequential, 1);

    let first = AnnotationQueueRepo::lease_next(&pool, &req, t0()).await.unwrap();
    assert_eq!(ids(&first), vec!["A"]);

    let during = t0() + ChronoDuration::seconds(9);
    assert!(AnnotationQueueRepo::lease_next(&pool, &req, during).await.unwrap().is_empty());
    assert_eq!(
        AnnotationQueueRepo::lease_state(&pool, "A", AnnotationType::PlayerBbox, LEASE, during)
            .await
            .unwrap(),
        LeaseState::Leased {
            until: t0() + ChronoDuration::seconds(10)
        }
    );

    // The lease is over at exactly t0 + lease.
    let lapsed = t0() + ChronoDuration::seconds(10);
    assert_eq!(
        AnnotationQueueRepo::lease_state(&pool, "A", AnnotationType::PlayerBbox, LEASE, lapsed)
            .await
            .unwrap(),
        LeaseState::Available
    );
    let second = AnnotationQueueRepo::lease_next(&pool, &req, lapsed).await.unwrap();
    assert_eq!(ids(&second), vec!["A"]);
    assert_eq!(second[0].lease_expires_at, t0() + ChronoDuration::seconds(20));

    let after = t0() + ChronoDuration::seconds(11);
    assert!(AnnotationQueueRepo::lease_next(&pool, &req, after).await.unwrap().is_empty());
}

#[sqlx::test(migrations = false)]
async fn test_dispatch_in_named_schema(
    pool_options: PgPoolOptions,
    connect_options: PgConnectOptions,
) {
    let config = DbConfig {
        database_url: None,
        host: "localhost".to_string(),
        port: 5432,
        username: "postgres".to_string(),
        password: String::new(),
        database: "ultitracker".to_string(),
        schema: "annotations_dispatch".to_string(),
        max_connections: 2,
        connect_retries: 1,
        connect_backoff: Duration::from_millis(10),
    };
    let pool = pool_options
        .connect_with(config.scope_to_schema(connect_options).unwrap())
        .await
        .unwrap();
    ultitracker_db::schema::initialize(&pool, &config.schema).await.unwrap();
    seed_ready_game(&pool, "g1", &[("B", 2), ("A", 1)]).await;

    let req = request(&["g1"], AnnotationType::PlayerBbox, OrderPolicy::Sequential, 2);
    let leased = AnnotationQueueRepo::lease_next(&pool, &req, t0()).await.unwrap();
    assert_eq!(ids(&leased), vec!["A", "B"]);

    let sent: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM annotations_dispatch.annotation_transaction WHERE action = 'sent'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(sent, 2);

    let public_is_empty: bool =
        sqlx::query_scalar("SELECT to_regclass('public.annotation_transaction') IS NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(public_is_empty);

    pool.close().await;
}

#[sqlx::test(migrations = false)]
async fn test_leases_are_per_annotation_type(pool: PgPool) {
    init(&pool).await;
    seed_ready_game(&pool, "g1", &[("A", 1)]).await;

    let bbox = request(&["g1"], AnnotationType::PlayerBbox, OrderPolicy::Sequential, 1);
    let lines = request(&["g1"], AnnotationType::FieldLines, OrderPolicy::Sequential, 1);

    assert_eq!(ids(&AnnotationQueueRepo::lease_next(&pool, &bbox, t0()).await.unwrap()), vec!["A"]);
    assert_eq!(ids(&AnnotationQueueRepo::lease_next(&pool, &lines, t0()).await.unwrap()), vec!["A"]);
}

#[sqlx::test(migrations = false)]
async fn test_game_filter_excludes_other_games(pool: PgPool) {
    init(&pool).await;
    seed_ready_game(&pool, "g1", &[("A", 1)]).await;
    seed_ready_game(&pool, "g2", &[("X", 1), ("Y", 2)]).await;

    let req = request(&["g1"], AnnotationType::PlayerBbox, OrderPolicy::Random, 10);
    let leased = AnnotationQueueRepo::lease_next(&pool, &req, t0()).await.unwrap();
    assert_eq!(ids(&leased), vec!["A"]);

    let unknown = request(&["g9"], AnnotationType::PlayerBbox, OrderPolicy::Random, 10);
    assert!(AnnotationQueueRepo::lease_next(&pool, &unknown, t0()).await.unwrap().is_empty());
}

#[sqlx::test(migrations = false)]
async fn test_geometric_types_require_valid_camera_angle(pool: PgPool) {
    init(&pool).await;
    seed_game(&pool, "g1").await;
    seed_image(&pool, "unlabelled", "g1", 1).await;
    seed_image(&pool, "invalid", "g1", 2).await;
    seed_image(&pool, "valid", "g1", 3).await;
    label_camera(&pool, "invalid", false).await;
    label_camera(&pool, "valid", true).await;

    for ty in [AnnotationType::PlayerBbox, AnnotationType::FieldLines] {
        let req = request(&["g1"], ty, OrderPolicy::Sequential, 10);
        let leased = AnnotationQueueRepo::lease_next(&pool, &req, t0()).await.unwrap();
        assert_eq!(ids(&leased), vec!["valid"], "camera gate for {ty}");
    }
}

#[sqlx::test(migrations = false)]
async fn test_camera_angle_dispatch_is_not_gated(pool: PgPool) {
    init(&pool).await;
    seed_game(&pool, "g1").await;
    seed_image(&pool, "A", "g1", 1).await;
    seed_image(&pool, "B", "g1", 2).await;

    let req = request(&["g1"], AnnotationType::CameraAngle, OrderPolicy::Sequential, 10);
    let leased = AnnotationQueueRepo::lease_next(&pool, &req, t0()).await.unwrap();
    assert_eq!(ids(&leased), vec!["A", "B"]);
}

#[sqlx::test(migrations = false)]
async fn test_lease_state_of_untouched_image_is_available(pool: PgPool) {
    init(&pool).await;
    seed_ready_game(&pool, "g1", &[("A", 1)]).await;

    let state =
        AnnotationQueueRepo::lease_state(&pool, "A", AnnotationType::FieldLines, LEASE, t0())
            .await
            .unwrap();
    assert_matches!(state, LeaseState::Available);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = false)]
async fn test_concurrent_callers_never_share_the_last_image(pool: PgPool) {
    init(&pool).await;
    seed_ready_game(&pool, "g1", &[("A", 1)]).await;
    let req = request(&["g1"], AnnotationType::PlayerBbox, OrderPolicy::Random, 1);

    let (first, second) = tokio::join!(
        AnnotationQueueRepo::lease_next(&pool, &req, t0()),
        AnnotationQueueRepo::lease_next(&pool, &req, t0()),
    );
    let total = first.unwrap().len() + second.unwrap().len();
    assert_eq!(total, 1);
}

#[sqlx::test(migrations = false)]
async fn test_many_concurrent_callers_lease_each_image_once(pool: PgPool) {
    init(&pool).await;
    let frames: Vec<(String, i32)> = (1..=5).map(|i| (format!("img-{i}"), i)).collect();
    let frame_refs: Vec<(&str, i32)> = frames.iter().map(|(id, f)| (id.as_str(), *f)).collect();
    seed_ready_game(&pool, "g1", &frame_refs).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                let req = request(&["g1"], AnnotationType::PlayerBbox, OrderPolicy::Random, 1);
                AnnotationQueueRepo::lease_next(&pool, &req, t0()).await.unwrap()
            })
        })
        .collect();

    let mut leased = Vec::new();
    for handle in futures::future::join_all(handles).await {
        leased.extend(handle.unwrap().into_iter().map(|i| i.img_id));
    }

    let unique: HashSet<&String> = leased.iter().collect();
    assert_eq!(leased.len(), 5, "every image leased exactly once");
    assert_eq!(unique.len(), 5);
}
