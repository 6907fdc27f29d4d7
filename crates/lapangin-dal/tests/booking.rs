mod common;

use common::{add_user, add_venue, init_db};
use lapangin_dal::{
    Caller, Error,
    error::booking_write_error,
    booking::{BookedRange, BookingRepository, ChangeBooking, CreateBooking},
};
use rand::{Rng as _, SeedableRng as _, rngs::StdRng};
use time::{Date, Duration, macros::date};
use uuid::Uuid;

const TODAY: Date = date!(2025 - 05 - 20);

fn booking(venue_id: Uuid, start_date: Date, end_date: Date) -> CreateBooking {
    CreateBooking {
        venue_id,
        start_date,
        end_date,
    }
}

fn assert_no_overlap(ranges: &[BookedRange]) {
    for (i, a) in ranges.iter().enumerate() {
        for b in &ranges[i + 1..] {
            assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
        }
    }
}

#[tokio::test]
async fn test_shared_boundary_day_conflicts() {
    let pool = init_db().await;
    let u1 = add_user(&pool, "user1", "user").await;
    let u2 = add_user(&pool, "user2", "user").await;
    let venue = add_venue(&pool, "Gelora", None).await;
    let repo = BookingRepository::new(pool.clone());

    let first = repo
        .create(
            u1,
            booking(venue.id, date!(2025 - 06 - 01), date!(2025 - 06 - 03)),
            TODAY,
        )
        .await
        .unwrap();
    assert_eq!(first.user_id, u1);
    assert_eq!(first.start_date, date!(2025 - 06 - 01));

    let res = repo
        .create(
            u2,
            booking(venue.id, date!(2025 - 06 - 03), date!(2025 - 06 - 05)),
            TODAY,
        )
        .await;
    assert!(matches!(res, Err(Error::DateConflict { .. })), "{res:?}");

    let second = repo
        .create(
            u2,
            booking(venue.id, date!(2025 - 06 - 04), date!(2025 - 06 - 05)),
            TODAY,
        )
        .await
        .unwrap();
    assert_eq!(second.end_date, date!(2025 - 06 - 05));

    let ranges = repo.booked_ranges(venue.id, TODAY).await.unwrap();
    assert_eq!(
        ranges,
        vec![
            BookedRange {
                from: date!(2025 - 06 - 01),
                to: date!(2025 - 06 - 03)
            },
            BookedRange {
                from: date!(2025 - 06 - 04),
                to: date!(2025 - 06 - 05)
            },
        ]
    );
}

#[tokio::test]
async fn test_create_validation() {
    let pool = init_db().await;
    let user = add_user(&pool, "user1", "user").await;
    let venue = add_venue(&pool, "Gelora", None).await;
    let repo = BookingRepository::new(pool.clone());

    let res = repo
        .create(user, booking(venue.id, TODAY - Duration::days(1), TODAY), TODAY)
        .await;
    assert!(matches!(res, Err(Error::InvalidInput(_))));

    let res = repo
        .create(
            user,
            booking(venue.id, TODAY + Duration::days(3), TODAY + Duration::days(2)),
            TODAY,
        )
        .await;
    assert!(matches!(res, Err(Error::InvalidInput(_))));

    let res = repo
        .create(user, booking(Uuid::new_v4(), TODAY, TODAY), TODAY)
        .await;
    assert!(matches!(res, Err(Error::RecordNotFound(_))));

    // single day booking starting today is fine
    let single = repo
        .create(user, booking(venue.id, TODAY, TODAY), TODAY)
        .await
        .unwrap();
    assert_eq!(single.start_date, single.end_date);
    let res = repo
        .create(user, booking(venue.id, TODAY, TODAY), TODAY)
        .await;
    assert!(matches!(res, Err(Error::DateConflict { .. })));
}

#[tokio::test]
async fn test_booked_ranges() {
    let pool = init_db().await;
    let user = add_user(&pool, "user1", "user").await;
    let venue = add_venue(&pool, "Gelora", None).await;
    let repo = BookingRepository::new(pool.clone());

    for (start, end) in [(1, 2), (5, 8), (10, 10)] {
        repo.create(
            user,
            booking(
                venue.id,
                TODAY + Duration::days(start),
                TODAY + Duration::days(end),
            ),
            TODAY,
        )
        .await
        .unwrap();
    }

    assert_eq!(repo.booked_ranges(venue.id, TODAY).await.unwrap().len(), 3);
    // range ending on as_of is still relevant
    let later = repo
        .booked_ranges(venue.id, TODAY + Duration::days(8))
        .await
        .unwrap();
    assert_eq!(later.len(), 2);
    assert_eq!(later[0].to, TODAY + Duration::days(8));
    assert!(
        repo.booked_ranges(venue.id, TODAY + Duration::days(11))
            .await
            .unwrap()
            .is_empty()
    );

    let res = repo.booked_ranges(Uuid::new_v4(), TODAY).await;
    assert!(matches!(res, Err(Error::RecordNotFound(_))));
}

#[tokio::test]
async fn test_modify_started_booking() {
    let pool = init_db().await;
    let user = add_user(&pool, "user1", "user").await;
    let venue = add_venue(&pool, "Gelora", None).await;
    let repo = BookingRepository::new(pool.clone());

    let created = repo
        .create(
            user,
            booking(venue.id, date!(2025 - 06 - 02), date!(2025 - 06 - 04)),
            TODAY,
        )
        .await
        .unwrap();

    // start date was yesterday
    let today = date!(2025 - 06 - 03);
    let res = repo
        .modify(
            Caller::user(user),
            created.id,
            ChangeBooking {
                start_date: date!(2025 - 06 - 10),
                end_date: date!(2025 - 06 - 11),
            },
            today,
        )
        .await;
    assert!(matches!(res, Err(Error::PastBooking)), "{res:?}");

    let res = repo.cancel(Caller::new(user, true), created.id, today).await;
    assert!(matches!(res, Err(Error::PastBooking)));

    let stored = repo.get(created.id).await.unwrap();
    assert_eq!(stored.start_date, date!(2025 - 06 - 02));
    assert_eq!(stored.end_date, date!(2025 - 06 - 04));
}

#[tokio::test]
async fn test_other_user_cannot_cancel() {
    let pool = init_db().await;
    let owner = add_user(&pool, "owner", "user").await;
    let other = add_user(&pool, "other", "user").await;
    let admin = add_user(&pool, "admin", "admin").await;
    let venue = add_venue(&pool, "Gelora", None).await;
    let repo = BookingRepository::new(pool.clone());

    let created = repo
        .create(
            owner,
            booking(venue.id, TODAY + Duration::days(5), TODAY + Duration::days(6)),
            TODAY,
        )
        .await
        .unwrap();

    let res = repo.cancel(Caller::user(other), created.id, TODAY).await;
    assert!(matches!(res, Err(Error::Forbidden(_))));
    let res = repo
        .modify(
            Caller::user(other),
            created.id,
            ChangeBooking {
                start_date: TODAY + Duration::days(7),
                end_date: TODAY + Duration::days(7),
            },
            TODAY,
        )
        .await;
    assert!(matches!(res, Err(Error::Forbidden(_))));
    assert_eq!(repo.get(created.id).await.unwrap().id, created.id);

    repo.cancel(Caller::new(admin, true), created.id, TODAY)
        .await
        .unwrap();
    assert!(matches!(
        repo.get(created.id).await,
        Err(Error::RecordNotFound(_))
    ));
    assert!(matches!(
        repo.cancel(Caller::user(owner), created.id, TODAY).await,
        Err(Error::RecordNotFound(_))
    ));
}

#[tokio::test]
async fn test_modify_excludes_itself() {
    let pool = init_db().await;
    let user = add_user(&pool, "user1", "user").await;
    let venue = add_venue(&pool, "Gelora", None).await;
    let repo = BookingRepository::new(pool.clone());

    let a = repo
        .create(
            user,
            booking(venue.id, TODAY + Duration::days(1), TODAY + Duration::days(3)),
            TODAY,
        )
        .await
        .unwrap();
    repo.create(
        user,
        booking(venue.id, TODAY + Duration::days(6), TODAY + Duration::days(8)),
        TODAY,
    )
    .await
    .unwrap();

    // overlapping only its own old range
    let moved = repo
        .modify(
            Caller::user(user),
            a.id,
            ChangeBooking {
                start_date: TODAY + Duration::days(2),
                end_date: TODAY + Duration::days(5),
            },
            TODAY,
        )
        .await
        .unwrap();
    assert_eq!(moved.id, a.id);
    assert_eq!(moved.created, a.created);
    assert_eq!(moved.end_date, TODAY + Duration::days(5));

    let res = repo
        .modify(
            Caller::user(user),
            a.id,
            ChangeBooking {
                start_date: TODAY + Duration::days(4),
                end_date: TODAY + Duration::days(6),
            },
            TODAY,
        )
        .await;
    assert!(matches!(res, Err(Error::DateConflict { .. })));
    assert_eq!(
        repo.get(a.id).await.unwrap().start_date,
        TODAY + Duration::days(2)
    );
}

#[tokio::test]
async fn test_user_bookings() {
    let pool = init_db().await;
    let user = add_user(&pool, "user1", "user").await;
    let other = add_user(&pool, "user2", "user").await;
    let v1 = add_venue(&pool, "Gelora", None).await;
    let v2 = add_venue(&pool, "Jakabaring", None).await;
    let repo = BookingRepository::new(pool.clone());

    repo.create(
        user,
        booking(v1.id, TODAY + Duration::days(1), TODAY + Duration::days(2)),
        TODAY,
    )
    .await
    .unwrap();
    repo.create(
        user,
        booking(v2.id, TODAY + Duration::days(10), TODAY + Duration::days(12)),
        TODAY,
    )
    .await
    .unwrap();
    repo.create(
        other,
        booking(v2.id, TODAY + Duration::days(3), TODAY + Duration::days(3)),
        TODAY,
    )
    .await
    .unwrap();

    let mine = repo
        .list_for_user(user, TODAY + Duration::days(5))
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].venue_name, "Jakabaring");
    assert!(mine[0].can_modify);
    assert_eq!(mine[1].venue_name, "Gelora");
    assert!(!mine[1].can_modify);
}

#[tokio::test]
async fn test_random_operations_keep_ranges_disjoint() {
    let pool = init_db().await;
    let users = [
        add_user(&pool, "user1", "user").await,
        add_user(&pool, "user2", "user").await,
        add_user(&pool, "user3", "user").await,
    ];
    let venue = add_venue(&pool, "Gelora", None).await;
    let repo = BookingRepository::new(pool.clone());
    let mut rng = StdRng::seed_from_u64(20250520);
    let mut ids: Vec<(i64, i64)> = Vec::new();

    for _ in 0..200 {
        let start = TODAY + Duration::days(rng.random_range(0..60));
        let end = start + Duration::days(rng.random_range(0..5));
        let user = users[rng.random_range(0..users.len())];
        let existing = repo.booked_ranges(venue.id, TODAY).await.unwrap();
        let wanted = BookedRange {
            from: start,
            to: end,
        };

        match rng.random_range(0..4) {
            0 | 1 => {
                let expect_conflict = existing.iter().any(|r| r.overlaps(&wanted));
                match repo.create(user, booking(venue.id, start, end), TODAY).await {
                    Ok(b) => {
                        assert!(!expect_conflict);
                        ids.push((b.id, user));
                    }
                    Err(Error::DateConflict { .. }) => assert!(expect_conflict),
                    Err(e) => panic!("Unexpected error {e}"),
                }
            }
            2 if !ids.is_empty() => {
                let (id, owner) = ids[rng.random_range(0..ids.len())];
                let res = repo
                    .modify(
                        Caller::user(owner),
                        id,
                        ChangeBooking {
                            start_date: start,
                            end_date: end,
                        },
                        TODAY,
                    )
                    .await;
                assert!(
                    matches!(res, Ok(_) | Err(Error::DateConflict { .. })),
                    "{res:?}"
                );
            }
            3 if !ids.is_empty() => {
                let (id, owner) = ids.swap_remove(rng.random_range(0..ids.len()));
                repo.cancel(Caller::user(owner), id, TODAY).await.unwrap();
            }
            _ => {}
        }
        assert_no_overlap(&repo.booked_ranges(venue.id, TODAY).await.unwrap());
    }
}

#[tokio::test]
async fn test_overlap_trigger_backstop() {
    let pool = init_db().await;
    let user = add_user(&pool, "user1", "user").await;
    let venue = add_venue(&pool, "Gelora", None).await;
    let repo = BookingRepository::new(pool.clone());
    repo.create(
        user,
        booking(venue.id, date!(2025 - 06 - 01), date!(2025 - 06 - 03)),
        TODAY,
    )
    .await
    .unwrap();

    // bypassing the repository must still be rejected by the schema
    let res = sqlx::query(
        "INSERT INTO booking (venue_id, user_id, start_date, end_date) VALUES (?, ?, ?, ?)",
    )
    .bind(venue.id)
    .bind(user)
    .bind(date!(2025 - 06 - 03))
    .bind(date!(2025 - 06 - 04))
    .execute(&pool)
    .await;
    let err = res.unwrap_err();
    assert!(err.to_string().contains("booking_overlap"), "{err}");
    let mapped = booking_write_error(err, date!(2025 - 06 - 03), date!(2025 - 06 - 04));
    assert!(
        matches!(
            mapped,
            Error::DateConflict { from, to }
                if from == date!(2025 - 06 - 03) && to == date!(2025 - 06 - 04)
        ),
        "{mapped:?}"
    );

    // an update moving another booking onto the taken days hits the same trigger
    let other = repo
        .create(
            user,
            booking(venue.id, date!(2025 - 06 - 10), date!(2025 - 06 - 12)),
            TODAY,
        )
        .await
        .unwrap();
    let err = sqlx::query("UPDATE booking SET start_date = ? WHERE id = ?")
        .bind(date!(2025 - 06 - 02))
        .bind(other.id)
        .execute(&pool)
        .await
        .unwrap_err();
    let mapped = booking_write_error(err, date!(2025 - 06 - 02), date!(2025 - 06 - 12));
    assert!(matches!(mapped, Error::DateConflict { .. }), "{mapped:?}");
}

#[tokio::test]
async fn test_concurrent_bookings_only_one_wins() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}/bookings.db", dir.path().display());
    let pool = lapangin_dal::new_pool(&url).await.unwrap();
    lapangin_dal::migrate(&pool).await.unwrap();
    let venue_id = add_venue(&pool, "Gelora", None).await.id;
    let mut users = Vec::new();
    for i in 0..8 {
        users.push(add_user(&pool, &format!("racer{i}"), "user").await);
    }

    let attempts = users.iter().enumerate().map(|(i, user_id)| {
        let repo = BookingRepository::new(pool.clone());
        // every range shares day 10 with all the others
        let start = TODAY + Duration::days(3 + i as i64);
        let end = TODAY + Duration::days(10);
        async move { repo.create(*user_id, booking(venue_id, start, end), TODAY).await }
    });
    let results = futures::future::join_all(attempts).await;

    let won = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(won, 1);
    for result in results.into_iter().filter(|r| r.is_err()) {
        assert!(matches!(result, Err(Error::DateConflict { .. })), "{result:?}");
    }
    let ranges = BookingRepository::new(pool)
        .booked_ranges(venue_id, TODAY)
        .await
        .unwrap();
    assert_eq!(ranges.len(), 1);
}
