//! History file -> version store

mod common;

use common::*;
use geomhist_core::features::ingestion::from_elements;
use geomhist_core::storage::{FeatureKind, InMemoryVersionStore, SqliteVersionStore, VersionStore};
use geomhist_core::{FeatureHeader, HistoryError, HistoryIngestor, IngestConfig, LogElement, OsmXmlSource};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tempfile::TempDir;

fn ingest_into<S: VersionStore>(xml: &str, store: &S) -> geomhist_core::Result<geomhist_core::IngestReport> {
    HistoryIngestor::default().run(OsmXmlSource::new(xml.as_bytes()), store)
}

#[test]
fn test_history_file_into_sqlite() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("history.sqlite");

    let xml = OshBuilder::new()
        .node(1, 1, 10, 60.0, 24.0)
        .node(1, 2, 20, 60.1, 24.0)
        .deleted_node(1, 3, 30)
        .node(2, 1, 10, 60.2, 24.1)
        .way(100, 1, 40)
        .nd(1)
        .nd(2)
        .tag("highway", "footway")
        .way(100, 2, 50)
        .nd(2)
        .nd(1)
        .relation(500, 1, 60)
        .member("way", 100)
        .tag("type", "multipolygon")
        .build();

    {
        let store = SqliteVersionStore::open(&db).unwrap();
        let report = ingest_into(&xml, &store).unwrap();
        assert_eq!(report.versions_written, 7);
        assert_eq!(report.duplicates_discarded, 0);
        assert_eq!(report.warning_count, 0);
    }

    let store = SqliteVersionStore::open(&db).unwrap();
    let node_history = store.versions_of(1).unwrap();
    let versions: Vec<i64> = node_history.iter().map(|v| v.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
    assert_eq!(node_history[0].editor_name.as_deref(), Some("mapper"));
    assert_eq!(node_history[0].changeset_id, Some(10));
    assert_eq!(node_history[1].lat, Some(60.1));
    assert_eq!(node_history[2].visible, Some(false));
    assert_eq!(node_history[2].lat, None);
    assert_eq!(node_history[2].changeset_id, None);

    let way_history = store.versions_of(100).unwrap();
    assert_eq!(way_history[0].member_refs, Some(vec![1, 2]));
    assert_eq!(way_history[1].member_refs, Some(vec![2, 1]));
    assert!(way_history[1].extra_tags.is_none());

    let relation = &store.versions_of(500).unwrap()[0];
    assert_eq!(relation.kind, FeatureKind::Relation);
    assert_eq!(relation.member_refs, Some(vec![100]));

    let sequence_ids: Vec<i64> = [1, 2, 100, 500]
        .iter()
        .flat_map(|id| store.versions_of(*id).unwrap())
        .map(|v| v.sequence_id)
        .collect();
    assert_eq!(sequence_ids, vec![1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn test_closing_representation_yields_one_version() {
    let xml = OshBuilder::new()
        .way(100, 1, 10)
        .nd(1)
        .nd(2)
        .empty_way(100, 1, 10)
        .build();

    let store = InMemoryVersionStore::new();
    let report = ingest_into(&xml, &store).unwrap();

    assert_eq!(report.versions_written, 1);
    assert_eq!(report.duplicates_discarded, 1);
    let history = store.versions_of(100).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].member_refs, Some(vec![1, 2]));
}

#[test]
fn test_malformed_element_fails_run_with_position() {
    let xml = OshBuilder::new()
        .node(1, 1, 10, 60.0, 24.0)
        .raw(r#"  <node id="2" version="x" timestamp="2012-01-01T00:00:10Z" uid="1"/>"#)
        .node(3, 1, 10, 60.0, 24.0)
        .build();

    let store = InMemoryVersionStore::new();
    let err = ingest_into(&xml, &store).unwrap_err();
    match &err {
        HistoryError::MalformedElement { position, element, .. } => {
            // <osm>, node 1, node 2
            assert_eq!(position.element, 3);
            assert_eq!(element, "node");
        }
        other => panic!("expected malformed element, got {:?}", other),
    }
    assert!(!store.contains(3).unwrap());
}

#[test]
fn test_timestamp_regression_is_warned_not_fatal() {
    let xml = OshBuilder::new()
        .node(1, 1, 20, 60.0, 24.0)
        .node(1, 2, 10, 60.0, 24.0)
        .build();

    let store = InMemoryVersionStore::new();
    let report = ingest_into(&xml, &store).unwrap();
    assert_eq!(report.versions_written, 2);
    assert_eq!(report.warning_count, 1);
    assert_eq!(report.integrity_warnings.len(), 1);
}

#[test]
fn test_second_run_continues_sequence_ids() {
    let store = InMemoryVersionStore::new();
    ingest_into(&OshBuilder::new().node(1, 1, 10, 60.0, 24.0).build(), &store).unwrap();

    let next = store.stats().unwrap().next_sequence_id();
    let ingestor = HistoryIngestor::new(IngestConfig::default().first_sequence_id(next));
    let xml = OshBuilder::new().node(2, 1, 10, 60.0, 24.0).build();
    ingestor.run(OsmXmlSource::new(xml.as_bytes()), &store).unwrap();

    assert_eq!(store.versions_of(2).unwrap()[0].sequence_id, 2);
    assert_eq!(store.stats().unwrap().max_sequence_id, Some(2));
}

#[test]
fn test_rerunning_into_same_store_is_rejected() {
    let xml = OshBuilder::new().node(1, 1, 10, 60.0, 24.0).build();
    let store = InMemoryVersionStore::new();
    ingest_into(&xml, &store).unwrap();

    let err = ingest_into(&xml, &store).unwrap_err();
    assert!(matches!(err, HistoryError::Storage(ref e) if e.is_duplicate()));
}

fn header(id: i64, version: i64) -> LogElement {
    LogElement::Feature(FeatureHeader::new(id, FeatureKind::Way, version, ts(version * 100)))
}

proptest! {
    /// Any grouped log, with arbitrary header re-presentations, stores each
    /// (feature, version) once and in version order.
    #[test]
    fn prop_versions_unique_and_ordered(
        features in prop::collection::vec((1i64..5, prop::collection::vec(any::<bool>(), 1..6)), 1..12),
    ) {
        let mut elements = Vec::new();
        let mut expected = 0usize;
        for (idx, (versions, repeats)) in features.iter().enumerate() {
            let id = idx as i64 + 1;
            for version in 1..=*versions {
                expected += 1;
                elements.push(header(id, version));
                elements.push(LogElement::member(id * 1000 + version));
                if repeats[(version as usize) % repeats.len()] {
                    elements.push(header(id, version));
                }
            }
        }

        let store = InMemoryVersionStore::new();
        let report = HistoryIngestor::new(IngestConfig::default().batch_size(3))
            .run(from_elements(elements), &store)
            .unwrap();
        prop_assert_eq!(report.versions_written as usize, expected);

        for feature_id in store.feature_ids().unwrap() {
            let history = store.versions_of(feature_id).unwrap();
            prop_assert!(history.windows(2).all(|w| w[0].version < w[1].version));
            for version in &history {
                prop_assert_eq!(
                    version.member_refs.clone(),
                    Some(vec![feature_id * 1000 + version.version])
                );
            }
        }
    }
}
