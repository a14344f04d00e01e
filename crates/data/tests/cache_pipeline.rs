use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tradechat_core::config::DataConfig;
use tradechat_data::{CacheConfig, CacheManager, LoadOrigin, Operation, TradeRecord};

fn write_log(path: &Path, lines: &[&str], age: Duration) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = File::create(path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    drop(file);
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() - age)
        .unwrap();
}

#[test]
fn test_cache_lives_inside_source_tree_without_being_ingested() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    write_log(
        &data.join("2025-01-01.txt"),
        &[
            r#"{"timestamp": "2025-01-01 09:00:00", "player": "Ann", "operation": "WTS", "main_item": "iron lump", "price_s": "1s"}"#,
            r#"{"timestamp": "2025-01-01 09:05:00", "player": "Ben", "operation": "WTB", "main_item": "iron lump", "price_s": 80}"#,
        ],
        Duration::from_secs(600),
    );

    let config = DataConfig {
        cache_dir: data.clone(),
        ..DataConfig::default()
    };
    let manager = CacheManager::new(CacheConfig::from(&config));

    let built = manager.load(&data, false).unwrap();
    assert_eq!(built.origin, LoadOrigin::Rebuilt);
    assert_eq!(built.table.len(), 2);

    // The blob artifact shares the stem and must not be mistaken for a log.
    fs::write(manager.blob_path(), "{}").unwrap();

    let reloaded = manager.load(&data, false).unwrap();
    assert_eq!(reloaded.origin, LoadOrigin::Cached);
    assert_eq!(reloaded.table, built.table);

    let prices: Vec<u64> = reloaded.table.iter().map(|r| r.price_minor).collect();
    assert_eq!(prices, vec![10_000, 8_000]);
    let ops: Vec<Operation> = reloaded.table.iter().map(|r| r.operation).collect();
    assert_eq!(ops, vec![Operation::SellOffer, Operation::BuyOffer]);
}

#[test]
fn test_new_log_file_invalidates_snapshot() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    write_log(
        &logs.join("a.jsonl"),
        &[r#"{"item": "rope", "operation": "WTS", "price": "3c"}"#],
        Duration::from_secs(600),
    );
    let manager = CacheManager::new(CacheConfig::new(dir.path().join("cache"), "snapshot"));
    manager.load_or_build(&logs, false).unwrap();

    write_log(
        &logs.join("nested/b.jsonl"),
        &[r#"{"item": "nail", "operation": "WTB", "price": "1c"}"#],
        Duration::ZERO,
    );
    File::options()
        .write(true)
        .open(logs.join("nested/b.jsonl"))
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(600))
        .unwrap();

    let load = manager.load(&logs, false).unwrap();

    assert_eq!(load.origin, LoadOrigin::Rebuilt);
    let items: Vec<_> = load.table.iter().filter_map(TradeRecord::item_name).collect();
    assert_eq!(items, vec!["rope", "nail"]);
}

#[test]
fn test_cached_snapshot_matches_fresh_build_exactly() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    write_log(
        &logs.join("chat.txt"),
        &[
            r#"{"timestamp": "2025-01-01 10:00:00.123456", "operation": "WTS", "item": "rope", "price": "5c", "description": "braided"}"#,
            r#"{"timestamp": "2025-01-01 10:00:00.123789", "operation": "WTS", "main_item": "rope", "item": "rope", "price_s": "6c"}"#,
        ],
        Duration::from_secs(600),
    );
    let manager = CacheManager::new(CacheConfig::new(dir.path().join("cache"), "trade_data_cache"));

    let built = manager.load(&logs, false).unwrap();
    let cached = manager.load(&logs, false).unwrap();

    assert_eq!(built.origin, LoadOrigin::Rebuilt);
    assert_eq!(cached.origin, LoadOrigin::Cached);
    assert_eq!(cached.table, built.table);
    assert!(cached.table.records()[0].timestamp < cached.table.records()[1].timestamp);
}
