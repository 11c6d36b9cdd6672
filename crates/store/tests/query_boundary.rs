//! Integration tests for the web-facing query boundary.

use chrono::{Duration, Utc};

use tickwatch_store::queries::{
    create_asset, list_recent_alerts, list_recent_samples, since_from_window, summarize,
};
use tickwatch_store::{QueryError, Store};

#[tokio::test]
async fn summary_over_empty_window_has_no_aggregates() {
    let store = Store::in_memory().await.unwrap();
    create_asset(&store, "BTC", None).await.unwrap();

    let summary = summarize(&store, "BTC", Utc::now() - Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(summary.points, 0);
    assert!(summary.first.is_none());
    assert!(summary.avg.is_none());
}

#[tokio::test]
async fn summary_computes_stats_over_window() {
    let store = Store::in_memory().await.unwrap();
    let asset = store.upsert_asset("BTC").await.unwrap();
    let now = Utc::now();

    store.insert_sample(asset.id, now - Duration::hours(2), 100.0).await.unwrap();
    store.insert_sample(asset.id, now - Duration::hours(1), 110.0).await.unwrap();
    store.insert_sample(asset.id, now - Duration::minutes(10), 105.0).await.unwrap();

    let summary = summarize(&store, "BTC", now - Duration::hours(3)).await.unwrap();
    assert_eq!(summary.points, 3);
    assert_eq!(summary.first, Some(100.0));
    assert_eq!(summary.last, Some(105.0));
    assert_eq!(summary.min, Some(100.0));
    assert_eq!(summary.max, Some(110.0));
    assert!((summary.avg.unwrap() - (100.0 + 110.0 + 105.0) / 3.0).abs() < 1e-6);

    // Narrow the window to the last half hour: only the newest point.
    let since = since_from_window("30", now).unwrap();
    let summary = summarize(&store, "BTC", since).await.unwrap();
    assert_eq!(summary.points, 1);
    assert_eq!(summary.first, Some(105.0));
    assert_eq!(summary.last, Some(105.0));
}

#[tokio::test]
async fn malformed_window_is_a_distinct_error() {
    let err = since_from_window("bad-window", Utc::now()).unwrap_err();
    assert!(matches!(err, QueryError::Window(_)));
}

#[tokio::test]
async fn unknown_symbol_is_not_found_at_the_boundary() {
    let store = Store::in_memory().await.unwrap();

    let err = list_recent_samples(&store, "XRP", None).await.unwrap_err();
    assert!(matches!(err, QueryError::AssetNotFound(ref s) if s == "XRP"));

    let err = summarize(&store, "xrp", Utc::now()).await.unwrap_err();
    assert!(matches!(err, QueryError::AssetNotFound(ref s) if s == "XRP"));

    let err = list_recent_alerts(&store, "XRP", 10).await.unwrap_err();
    assert!(matches!(err, QueryError::AssetNotFound(_)));
}

#[tokio::test]
async fn create_asset_reports_conflict_distinctly() {
    let store = Store::in_memory().await.unwrap();

    let asset = create_asset(&store, "btc", Some("Bitcoin")).await.unwrap();
    assert_eq!(asset.symbol, "BTC");
    assert_eq!(asset.name.as_deref(), Some("Bitcoin"));

    let err = create_asset(&store, "BTC", None).await.unwrap_err();
    assert!(matches!(err, QueryError::Conflict(ref s) if s == "BTC"));
}

#[tokio::test]
async fn recent_samples_honor_since_bound() {
    let store = Store::in_memory().await.unwrap();
    let asset = store.upsert_asset("ETH").await.unwrap();
    let now = Utc::now();

    store.insert_sample(asset.id, now - Duration::hours(3), 90.0).await.unwrap();
    store.insert_sample(asset.id, now - Duration::minutes(20), 95.0).await.unwrap();

    let all = list_recent_samples(&store, "ETH", None).await.unwrap();
    assert_eq!(all.len(), 2);

    let bounded = list_recent_samples(&store, "ETH", Some(now - Duration::hours(1)))
        .await
        .unwrap();
    assert_eq!(bounded.len(), 1);
    assert_eq!(bounded[0].price, 95.0);
}
