//! `.osh` document builder

use std::fmt::Write as _;

use geomhist_core::storage::FeatureId;

/// Builds OSM history XML one element at a time
#[derive(Debug, Default)]
pub struct OshBuilder {
    body: String,
    open: Option<&'static str>,
}

impl OshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<node .../>` with a position, timestamp as seconds of 2012-01-01
    pub fn node(mut self, id: FeatureId, version: i64, sec: u32, lat: f64, lon: f64) -> Self {
        self.close();
        let _ = writeln!(
            self.body,
            r#"  <node id="{}" version="{}" timestamp="{}" uid="1" user="mapper" changeset="{}" visible="true" lat="{}" lon="{}"/>"#,
            id,
            version,
            timestamp(sec),
            version * 10,
            lat,
            lon
        );
        self
    }

    /// `<node .../>` without position (deleted)
    pub fn deleted_node(mut self, id: FeatureId, version: i64, sec: u32) -> Self {
        self.close();
        let _ = writeln!(
            self.body,
            r#"  <node id="{}" version="{}" timestamp="{}" uid="1" visible="false"/>"#,
            id,
            version,
            timestamp(sec)
        );
        self
    }

    /// Open `<way>`; following `nd`/`tag` calls become its children
    pub fn way(self, id: FeatureId, version: i64, sec: u32) -> Self {
        self.open_element("way", id, version, sec)
    }

    /// Open `<relation>`
    pub fn relation(self, id: FeatureId, version: i64, sec: u32) -> Self {
        self.open_element("relation", id, version, sec)
    }

    /// Repeat a way header as an empty sibling element
    pub fn empty_way(mut self, id: FeatureId, version: i64, sec: u32) -> Self {
        self.close();
        let _ = writeln!(
            self.body,
            r#"  <way id="{}" version="{}" timestamp="{}" uid="1"/>"#,
            id,
            version,
            timestamp(sec)
        );
        self
    }

    pub fn nd(mut self, reference: FeatureId) -> Self {
        let _ = writeln!(self.body, r#"    <nd ref="{}"/>"#, reference);
        self
    }

    pub fn member(mut self, member_type: &str, reference: FeatureId) -> Self {
        let _ = writeln!(
            self.body,
            r#"    <member type="{}" ref="{}" role=""/>"#,
            member_type, reference
        );
        self
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        let _ = writeln!(self.body, r#"    <tag k="{}" v="{}"/>"#, key, value);
        self
    }

    /// Raw XML line, inserted as is
    pub fn raw(mut self, line: &str) -> Self {
        self.close();
        self.body.push_str(line);
        self.body.push('\n');
        self
    }

    pub fn build(mut self) -> String {
        self.close();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<osm version=\"0.6\" generator=\"test\">\n{}</osm>\n",
            self.body
        )
    }

    fn open_element(mut self, name: &'static str, id: FeatureId, version: i64, sec: u32) -> Self {
        self.close();
        let _ = writeln!(
            self.body,
            r#"  <{} id="{}" version="{}" timestamp="{}" uid="1" user="mapper" changeset="{}" visible="true">"#,
            name,
            id,
            version,
            timestamp(sec),
            version * 10
        );
        self.open = Some(name);
        self
    }

    fn close(&mut self) {
        if let Some(name) = self.open.take() {
            let _ = writeln!(self.body, "  </{}>", name);
        }
    }
}

/// RFC 3339 timestamp `sec` seconds into 2012-01-01
pub fn timestamp(sec: u32) -> String {
    format!(
        "2012-01-01T{:02}:{:02}:{:02}Z",
        sec / 3600,
        (sec / 60) % 60,
        sec % 60
    )
}
