use std::path::{Path, PathBuf};
use std::sync::Arc;

use geoscan::{
    elasticsearch::{ElasticsearchClient, IndexCreation, default_schema},
    geo::ShapeHint,
    handlers::{ExtractionError, FormatHandler, HandlerRegistry, RawGeospatial, RawMetadata},
    indexing::{BootstrapError, BulkIndexWriter},
    metrics::ScanStatistics,
    pipeline::{ExecutionMode, ExtractionPipeline},
    record::{canonical_path, document_id},
    selection::{HandlerSelector, RuleSet, RuleSpec},
};
use httpmock::{
    Method::{POST, PUT},
    MockServer,
};
use serde_json::json;

const INDEX: &str = "ceda-di";

/// Flight-track reader used to drive the pipeline without real scientific files.
struct FlightTrack;

impl FormatHandler for FlightTrack {
    fn id(&self) -> &str {
        "flight-track"
    }

    fn extract(&self, path: &Path) -> Result<RawMetadata, ExtractionError> {
        let text = std::fs::read_to_string(path).map_err(|source| ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut lats = Vec::new();
        let mut lons = Vec::new();
        for line in text.lines() {
            let Some((lat, lon)) = line.split_once(',') else {
                return Err(ExtractionError::Malformed {
                    path: path.to_path_buf(),
                    format: "flight-track",
                    reason: format!("bad line `{line}`"),
                });
            };
            lats.push(lat.trim().parse().unwrap_or(f64::NAN));
            lons.push(lon.trim().parse().unwrap_or(f64::NAN));
        }
        let mut raw = RawMetadata::with_format("Flight track");
        raw.geospatial = Some(RawGeospatial::new(lats, lons, ShapeHint::Track));
        Ok(raw)
    }
}

fn selector() -> HandlerSelector {
    let mut registry = HandlerRegistry::builtin();
    registry.register(Arc::new(FlightTrack));
    let rules = RuleSet::from_specs(
        &[RuleSpec {
            pattern: r"\.trk$".into(),
            handler: "flight-track".into(),
            priority: 10,
        }],
        &registry,
    )
    .expect("rules");
    HandlerSelector::new(registry, rules)
}

fn pipeline(server: &MockServer, threshold: usize) -> ExtractionPipeline {
    let client = ElasticsearchClient::new(&server.base_url(), None).expect("client");
    let writer = BulkIndexWriter::new(Arc::new(client), INDEX, threshold);
    ExtractionPipeline::new(selector(), writer, "file")
}

fn track_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "50.1, -3.2\n50.4, -2.9\n50.9, -2.1\n").expect("write track");
    path
}

#[tokio::test]
async fn unresolvable_file_counts_as_property_error() {
    let server = MockServer::start_async().await;
    let bulk = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/{INDEX}/_bulk"));
            then.status(200).json_body(json!({ "took": 3, "errors": false, "items": [] }));
        })
        .await;

    let dir = tempfile::tempdir().expect("temp dir");
    let files = vec![
        track_file(dir.path(), "b512.trk"),
        track_file(dir.path(), "b513.trk"),
        dir.path().join("vanished.trk"),
    ];

    let stats = pipeline(&server, 100).run(files).await;
    assert_eq!(
        stats,
        ScanStatistics {
            indexed: 2,
            property_errors: 1,
            index_errors: 0,
            total: 3
        }
    );
    bulk.assert_hits_async(1).await;
}

#[tokio::test]
async fn corrupt_netcdf_header_counts_as_property_error() {
    let server = MockServer::start_async().await;
    let bulk = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/{INDEX}/_bulk"));
            then.status(200).json_body(json!({ "took": 2, "errors": false, "items": [] }));
        })
        .await;

    let dir = tempfile::tempdir().expect("temp dir");
    let corrupt = dir.path().join("a_corrupt.nc");
    let mut header = b"CDF\x05".to_vec();
    header.extend(0u64.to_be_bytes());
    header.extend(0x0Au32.to_be_bytes());
    header.extend(1u64.to_be_bytes());
    header.extend((1u64 << 60).to_be_bytes());
    std::fs::write(&corrupt, &header).expect("write corrupt file");
    let files = vec![corrupt, track_file(dir.path(), "b_leg.trk")];

    let stats = pipeline(&server, 100)
        .with_mode(ExecutionMode::Sequential)
        .run(files)
        .await;
    assert_eq!(
        stats,
        ScanStatistics {
            indexed: 1,
            property_errors: 1,
            index_errors: 0,
            total: 2
        }
    );
    bulk.assert_hits_async(1).await;
}

#[tokio::test]
async fn rejected_batch_is_counted_and_scan_continues() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().expect("temp dir");
    let files: Vec<PathBuf> = ["a.trk", "b.trk", "c.trk", "d.trk", "e.trk"]
        .iter()
        .map(|name| track_file(dir.path(), name))
        .collect();
    let first_id = document_id(&canonical_path(&files[0]));
    let third_id = document_id(&canonical_path(&files[2]));
    let fifth_id = document_id(&canonical_path(&files[4]));

    let rejected = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/{INDEX}/_bulk")).body_contains(first_id.as_str());
            then.status(200).json_body(json!({
                "took": 4,
                "errors": true,
                "items": [{ "index": {
                    "status": 400,
                    "error": {
                        "type": "mapper_parsing_exception",
                        "reason": "failed to parse field [spatial]"
                    }
                } }]
            }));
        })
        .await;
    let accepted = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/{INDEX}/_bulk")).body_contains(third_id.as_str());
            then.status(200).json_body(json!({ "took": 2, "errors": false, "items": [] }));
        })
        .await;
    let drained = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/{INDEX}/_bulk")).body_contains(fifth_id.as_str());
            then.status(200).json_body(json!({ "took": 1, "errors": false, "items": [] }));
        })
        .await;

    let stats = pipeline(&server, 2)
        .with_mode(ExecutionMode::Sequential)
        .run(files)
        .await;

    assert_eq!(stats.total, 5);
    assert_eq!(stats.index_errors, 2);
    assert_eq!(stats.indexed, 3);
    assert_eq!(stats.property_errors, 0);
    rejected.assert_hits_async(1).await;
    accepted.assert_hits_async(1).await;
    drained.assert_hits_async(1).await;
}

#[tokio::test]
async fn pool_mode_indexes_every_file() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/{INDEX}/_bulk"));
            then.status(200).json_body(json!({ "took": 1, "errors": false, "items": [] }));
        })
        .await;

    let dir = tempfile::tempdir().expect("temp dir");
    let files: Vec<PathBuf> = (0..12)
        .map(|n| track_file(dir.path(), &format!("leg{n:02}.trk")))
        .collect();

    let stats = pipeline(&server, 5)
        .with_mode(ExecutionMode::Pool { workers: 4 })
        .run(files)
        .await;
    assert_eq!(stats.indexed, 12);
    assert_eq!(stats.unaccounted(), 0);
}

#[tokio::test]
async fn bootstrap_accepts_existing_index() {
    let server = MockServer::start_async().await;
    let create = server
        .mock_async(|when, then| {
            when.method(PUT).path(format!("/{INDEX}"));
            then.status(400).json_body(json!({
                "error": {
                    "type": "resource_already_exists_exception",
                    "reason": "index [ceda-di/abc] already exists"
                },
                "status": 400
            }));
        })
        .await;

    let outcome = pipeline(&server, 10)
        .bootstrap(&default_schema())
        .await
        .expect("existing index is fine");
    assert_eq!(outcome, IndexCreation::AlreadyExists);
    create.assert_async().await;
}

#[tokio::test]
async fn bootstrap_failure_is_fatal() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path(format!("/{INDEX}"));
            then.status(500).body("cluster unavailable");
        })
        .await;

    let err = pipeline(&server, 10)
        .bootstrap(&default_schema())
        .await
        .expect_err("server error");
    assert!(matches!(err, BootstrapError::CreateIndex { ref index, .. } if index == INDEX));
}
