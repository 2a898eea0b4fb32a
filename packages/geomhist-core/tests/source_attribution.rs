//! Changeset dump + history file -> reported data sources

mod common;

use common::*;
use geomhist_core::storage::{ChangesetStore, SqliteVersionStore};
use geomhist_core::{
    ChangesetSource, HistoryIngestor, IngestConfig, OsmChangesetSource, OsmXmlSource, SourceAttributor,
    SourceSummary,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const CHANGESETS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="test">
  <changeset id="10" created_at="2012-01-01T00:00:00Z" closed_at="2012-01-01T00:10:00Z" open="false" user="mapper" uid="1" num_changes="3" comments_count="0">
    <tag k="source" v="survey"/>
    <tag k="created_by" v="JOSM"/>
  </changeset>
  <changeset id="20" created_at="2012-01-01T01:00:00Z" open="false" user="mapper" uid="1" min_lat="60.0" min_lon="24.0" max_lat="60.2" max_lon="24.1" num_changes="2" comments_count="1">
    <tag k="comment" v="realign"/>
    <discussion>
      <comment uid="2" user="reviewer" date="2012-01-02T00:00:00Z">
        <text>looks fine</text>
      </comment>
    </discussion>
  </changeset>
</osm>
"#;

fn history() -> String {
    OshBuilder::new()
        .node(1, 1, 10, 60.0, 24.0)
        .node(1, 2, 20, 60.1, 24.0)
        .node(2, 1, 10, 60.2, 24.1)
        .way(100, 1, 40)
        .nd(1)
        .nd(2)
        .relation(500, 3, 60)
        .member("way", 100)
        .deleted_node(3, 2, 70)
        .build()
}

#[test]
fn test_changeset_dump_and_history_into_sqlite() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("history.sqlite");

    {
        let store = SqliteVersionStore::open(&db).unwrap();
        let ingestor = HistoryIngestor::default();
        ingestor.run(OsmXmlSource::new(history().as_bytes()), &store).unwrap();
        let report = ingestor
            .import_changesets(OsmChangesetSource::new(CHANGESETS.as_bytes()), &store)
            .unwrap();
        assert_eq!(report.changesets_written, 2);
        assert_eq!(report.with_source, 1);
    }

    let store = SqliteVersionStore::open(&db).unwrap();
    assert_eq!(store.changeset_count().unwrap(), 2);
    let realign = store.changeset(20).unwrap().unwrap();
    assert_eq!(realign.comments_count, Some(1));
    assert_eq!(realign.tag("comment"), Some("realign"));
    assert!(realign.bbox.is_some());

    let attributor = SourceAttributor::new(&store);

    let node_history: Vec<ChangesetSource> = attributor
        .history(1)
        .unwrap()
        .into_iter()
        .map(|a| a.source)
        .collect();
    assert_eq!(
        node_history,
        vec![
            ChangesetSource::Reported {
                source: "survey".to_string()
            },
            ChangesetSource::NotReported,
        ]
    );

    // Relation v3 was uploaded in changeset 30, which the dump does not hold
    let relation = attributor.latest(500).unwrap().unwrap();
    assert_eq!(relation.changeset_id, Some(30));
    assert_eq!(relation.source, ChangesetSource::ChangesetUnknown);

    let deleted = attributor.latest(3).unwrap().unwrap();
    assert_eq!(deleted.source, ChangesetSource::NoChangeset);
}

#[test]
fn test_summary_of_latest_versions() {
    let store = memory_store(Vec::new());
    let ingestor = HistoryIngestor::new(IngestConfig::default().batch_size(4));
    ingestor.run(OsmXmlSource::new(history().as_bytes()), &store).unwrap();
    ingestor
        .import_changesets(OsmChangesetSource::new(CHANGESETS.as_bytes()), &store)
        .unwrap();

    let attributions = SourceAttributor::new(&store)
        .latest_many([1, 2, 3, 100, 500, 9999])
        .unwrap();
    let summary = SourceSummary::from_attributions(&attributions);

    assert_eq!(summary.total, 5);
    assert_eq!(summary.ranked(), vec![("survey", 2)]);
    assert_eq!(summary.not_reported, 1);
    assert_eq!(summary.changeset_unknown, 1);
    assert_eq!(summary.no_changeset, 1);
}

#[test]
fn test_reimporting_a_changeset_fails() {
    let store = memory_store(Vec::new());
    let ingestor = HistoryIngestor::default();
    ingestor
        .import_changesets(OsmChangesetSource::new(CHANGESETS.as_bytes()), &store)
        .unwrap();

    let err = ingestor
        .import_changesets(OsmChangesetSource::new(CHANGESETS.as_bytes()), &store)
        .unwrap_err();
    assert!(err.to_string().contains("Changeset 10 is already stored"), "{}", err);
    assert_eq!(store.changeset_count().unwrap(), 2);
}
