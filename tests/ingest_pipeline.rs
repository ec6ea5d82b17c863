use maimai_playlog::config::Config;
use maimai_playlog::pipeline::Ingestor;
use maimai_playlog::store::Store;
use std::fs;
use std::path::Path;

const IMG: &str = "https://maimaidx-eng.com/maimai-mobile/img";

fn block(title: Option<&str>, date: &str, pct: (&str, &str), idx: Option<&str>) -> String {
    let title = title.unwrap_or("");
    let form = match idx {
        Some(idx) => format!(r#"<form><input type="hidden" name="idx" value="{idx}"/></form>"#),
        None => String::new(),
    };
    format!(
        r#"<div class="p_10 t_l f_0 v_b">
  <img src="{IMG}/diff_master.png" class="playlog_diff v_b"/>
  <div class="sub_title"><span class="v_b">{date}</span></div>
  <div class="basic_block m_5 p_5 p_l_10 f_13 break"><img src="{IMG}/playlog/clear.png" class="w_80"/>{title}</div>
  <div class="playlog_achievement_txt t_r">{}<span class="f_20">.{}%</span></div>
  <img src="{IMG}/playlog/sss.png?ver=1.40" class="playlog_scorerank"/>
  <img src="{IMG}/playlog/fc.png"/>
  <img src="{IMG}/playlog/fs_dummy.png"/>
  {form}
</div>
"#,
        pct.0, pct.1
    )
}

fn page(blocks: &[String]) -> String {
    format!(
        "<html><body>{}<div class=\"f_0\">nav</div><footer>(c)</footer></body></html>",
        blocks.concat()
    )
}

fn ingestor(store: &Path) -> Ingestor {
    let config = Config {
        store_path: store.to_path_buf(),
        ..Default::default()
    };
    Ingestor::new(&config)
}

#[test]
fn test_ingest_creates_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("db.json");
    let markup = page(&[
        block(Some("Song A"), "2024/01/01 10:00", ("100", "5000"), Some("1001")),
        block(None, "2024/01/01 10:05", ("99", "0000"), Some("1002")),
        block(Some("Song B"), "2024/01/01 10:10", ("97", "1234"), None),
    ]);

    let report = ingestor(&path).ingest(&markup).unwrap();
    assert_eq!(report.parsed, 2);
    assert_eq!(report.untitled, 1);
    assert_eq!(report.added.len(), 2);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.total_fetches, 1);
    assert_eq!(report.stats.total, 2);
    assert_eq!(report.stats.full_combos, 2);
    assert_eq!(report.stats.full_syncs, 0);

    let store = Store::load(&path);
    assert_eq!(store.len(), 2);
    assert!(store.contains("track_1001"));
    assert!(store.records[1].id.starts_with("combo_"));
    assert!(store.last_updated.is_some());
}

#[test]
fn test_reingest_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let markup = page(&[block(Some("Song A"), "2024/01/01 10:00", ("100", "5000"), Some("1001"))]);
    let ingestor = ingestor(&path);

    let first = ingestor.ingest(&markup).unwrap();
    assert_eq!(first.added.len(), 1);
    let second = ingestor.ingest(&markup).unwrap();
    assert_eq!(second.added.len(), 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(second.total_records, 1);
    assert_eq!(second.total_fetches, 2);

    let store = Store::load(&path);
    assert_eq!(store.len(), 1);
    assert_eq!(store.total_fetches, 2);
}

#[test]
fn test_same_chart_different_date_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let ingestor = ingestor(&path);

    ingestor
        .ingest(&page(&[block(Some("Song A"), "2024/01/01 10:00", ("100", "0000"), None)]))
        .unwrap();
    let report = ingestor
        .ingest(&page(&[block(Some("Song A"), "2024/01/02 10:00", ("100", "0000"), None)]))
        .unwrap();
    assert_eq!(report.added.len(), 1);
    assert_eq!(report.total_records, 2);
}

#[test]
fn test_empty_page_still_counts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");

    let report = ingestor(&path).ingest("<html><body>maintenance</body></html>").unwrap();
    assert_eq!(report.parsed, 0);
    assert_eq!(report.total_records, 0);
    assert_eq!(report.total_fetches, 1);
    assert!(path.exists());
}

#[test]
fn test_corrupt_store_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    fs::write(&path, "{ not json").unwrap();

    let markup = page(&[block(Some("Song A"), "2024/01/01 10:00", ("100", "5000"), Some("7"))]);
    let report = ingestor(&path).ingest(&markup).unwrap();
    assert_eq!(report.added.len(), 1);
    assert_eq!(report.total_fetches, 1);

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["records"][0]["_id"], "track_7");
    assert_eq!(json["recordIndex"]["track_7"], true);
}

#[test]
fn test_save_failure_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    // The store path is an existing directory, so the rename cannot land.
    let path = dir.path().join("db.json");
    fs::create_dir(&path).unwrap();
    fs::write(path.join("keep"), "x").unwrap();

    let markup = page(&[block(Some("Song A"), "2024/01/01 10:00", ("100", "5000"), Some("1"))]);
    assert!(ingestor(&path).ingest(&markup).is_err());
}
