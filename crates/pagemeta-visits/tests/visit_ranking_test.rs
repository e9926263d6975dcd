//! Visit tracking end to end over the in-memory visit store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use pagemeta_core::{SortOrder, TimePeriod, VisitConfig, VisitQuery, VisitRecord, VisitRepository};
use pagemeta_db::MemoryVisitRepository;
use pagemeta_visits::{VisitBuffer, VisitTracker};

async fn seeded() -> (Arc<MemoryVisitRepository>, VisitTracker) {
    let repo = Arc::new(MemoryVisitRepository::new());
    let now = Utc::now();
    repo.merge(vec![
        VisitRecord::new("/demo/blog/old", now - Duration::days(20), 50).unwrap(),
        VisitRecord::new("/demo/blog/week", now - Duration::days(3), 7).unwrap(),
        VisitRecord::new("/demo/blog/today", now - Duration::hours(2), 3).unwrap(),
        VisitRecord::new("/other/blog/today", now - Duration::hours(1), 9).unwrap(),
    ])
    .await
    .unwrap();
    let tracker = VisitTracker::new(repo.clone(), VisitConfig::default());
    (repo, tracker)
}

#[tokio::test]
async fn test_time_periods_restrict_summed_hits() {
    let (_repo, tracker) = seeded().await;
    let section = |period| {
        VisitQuery::new("10")
            .section("/demo/")
            .time_period(period)
    };

    let day = tracker
        .get_top_visited_blog_posts(&section(TimePeriod::Day))
        .await
        .unwrap();
    assert_eq!(day, vec!["/demo/blog/today"]);

    let week = tracker
        .get_top_visited_blog_posts(&section(TimePeriod::Week))
        .await
        .unwrap();
    assert_eq!(week, vec!["/demo/blog/week", "/demo/blog/today"]);

    let all = tracker
        .get_top_visited_blog_posts(&section(TimePeriod::AllTime))
        .await
        .unwrap();
    assert_eq!(
        all,
        vec!["/demo/blog/old", "/demo/blog/week", "/demo/blog/today"]
    );
}

#[tokio::test]
async fn test_ascending_order_and_tie_break_by_recent_hit() {
    let (repo, tracker) = seeded().await;
    let now = Utc::now();
    repo.merge(vec![VisitRecord::new("/demo/blog/tie", now - Duration::minutes(5), 3).unwrap()])
        .await
        .unwrap();

    let asc = tracker
        .top_visited(
            &VisitQuery::new("2")
                .section("/demo/")
                .sort_order(SortOrder::Asc),
        )
        .await
        .unwrap();
    let ranked: Vec<_> = asc.iter().map(|t| (t.pagepath.as_str(), t.hit_count)).collect();
    assert_eq!(ranked, vec![("/demo/blog/tie", 3), ("/demo/blog/today", 3)]);
}

#[tokio::test]
async fn test_tracked_hits_merge_into_existing_counts() {
    let (_repo, tracker) = seeded().await;
    for _ in 0..4 {
        tracker.track_blog_post("/demo/blog/today").unwrap();
    }
    tracker.flush().await.unwrap();

    let totals = tracker
        .top_visited(&VisitQuery::new("1").time_period(TimePeriod::Day))
        .await
        .unwrap();
    assert_eq!(totals[0].pagepath, "/other/blog/today");

    let demo = tracker
        .top_visited(
            &VisitQuery::new("1")
                .section("/demo/")
                .time_period(TimePeriod::Day),
        )
        .await
        .unwrap();
    assert_eq!(demo[0].hit_count, 7);
}

#[tokio::test]
async fn test_shared_buffer_between_trackers() {
    let repo = Arc::new(MemoryVisitRepository::new());
    let buffer = Arc::new(VisitBuffer::new());
    let front = VisitTracker::new(repo.clone(), VisitConfig::default()).with_buffer(buffer.clone());
    let back = VisitTracker::new(repo, VisitConfig::default()).with_buffer(buffer.clone());

    front.track_blog_post("/blog/shared").unwrap();
    front.track_blog_post("/blog/shared").unwrap();
    let stats = back.flush().await.unwrap();

    assert_eq!(stats.hits, 2);
    assert_eq!(buffer.pending_hits(), 0);
}

#[tokio::test]
async fn test_limit_above_ui_maximum_is_honored() {
    let repo = Arc::new(MemoryVisitRepository::new());
    let now = Utc::now();
    let records: Vec<_> = (0..12)
        .map(|i| VisitRecord::new(format!("/blog/post-{:02}", i), now, i + 1).unwrap())
        .collect();
    repo.merge(records).await.unwrap();
    let tracker = VisitTracker::new(repo, VisitConfig::default());

    let wide = tracker
        .get_top_visited_blog_posts(&VisitQuery::new("12"))
        .await
        .unwrap();
    assert_eq!(wide.len(), 12);

    let fallback = tracker
        .get_top_visited_blog_posts(&VisitQuery::new("many"))
        .await
        .unwrap();
    assert_eq!(fallback.len(), 5);
    assert_eq!(fallback[0], "/blog/post-11");
}
