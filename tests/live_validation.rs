use std::{env, sync::Once};

use geoscan::{
    config,
    elasticsearch::{ElasticsearchClient, ExtentFilter, default_schema},
    pipeline::ExtractionPipeline,
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() {
    INIT.call_once(|| {
        set_default_env("ELASTICSEARCH_URL", "http://127.0.0.1:9200");
        set_default_env("ELASTICSEARCH_INDEX", "geoscan-live");
        set_default_env("BULK_THRESHOLD", "2");
        config::init_config().expect("live configuration");
    });
}

#[tokio::test]
#[ignore = "Requires live Elasticsearch"]
async fn live_scan_and_search_roundtrip() {
    init_config_once();
    let config = config::get_config();

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("sample.na");
    let sample = [
        "14 1001",
        "DOE, JANE",
        "GEOSCAN LIVE TEST",
        "LIVE SOURCE",
        "LIVE MISSION",
        "1 1",
        "2010 4 19 2010 4 19",
        "0",
        "Time (seconds since midnight)",
        "2",
        "1 1",
        "-9999 -9999",
        "Latitude (degrees)",
        "Longitude (degrees)",
        "36000 51.5 -1.25",
        "36060 51.7 -1.05",
    ];
    std::fs::write(&path, sample.join("\n") + "\n").expect("write sample");

    let pipeline = ExtractionPipeline::from_config(config).expect("pipeline");
    pipeline
        .bootstrap(&default_schema())
        .await
        .expect("index bootstrap should succeed or find the index");
    let stats = pipeline.run(vec![path.clone()]).await;
    assert_eq!(stats.indexed, 1, "live scan should index the sample: {stats:?}");

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    let client = ElasticsearchClient::from_config().expect("client");
    let filter = ExtentFilter::parse("t=[2010-04-19] x=[-2,0] y=[51,52]").expect("filter");
    let paths = client
        .search_paths(&config.elasticsearch_index, filter.to_query(), 50)
        .await
        .expect("search");
    assert!(
        paths.iter().any(|found| found.ends_with("sample.na")),
        "sample should be searchable: {paths:?}"
    );
}
