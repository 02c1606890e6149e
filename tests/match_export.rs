//! Integration tests for region matching and feature export.

use std::fs;
use std::path::Path;

use geocorpus_core::{
    ExportOptions, ExportState, FeatureExporter, GeoPlaceMatcher, IndexDocument, IndexStore,
    PipelineContext, RecordField, SmoothingOptions, TantivyStore, UserWhitelist,
    default_regions, region_matches,
};
use tempfile::TempDir;

fn doc(id: u64, user_id: u64, text: &str) -> IndexDocument {
    IndexDocument {
        id,
        user_id,
        text: text.to_string(),
        lang: "en".to_string(),
        ..IndexDocument::default()
    }
}

fn at(mut doc: IndexDocument, longitude: f64, latitude: f64) -> IndexDocument {
    doc.longitude = Some(longitude);
    doc.latitude = Some(latitude);
    doc
}

fn placed(mut doc: IndexDocument, place: &str) -> IndexDocument {
    doc.place = Some(place.to_string());
    doc
}

fn store_with(path: &Path, docs: &[IndexDocument]) -> TantivyStore {
    let mut store = TantivyStore::open(path).unwrap();
    for doc in docs {
        store.append(doc).unwrap();
    }
    store.commit().unwrap();
    store
}

fn lines(dir: &Path, name: &str) -> Vec<String> {
    fs::read_to_string(dir.join(name))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn geotag_or_place_name_selects_pittsburgh() {
    let dir = TempDir::new().unwrap();
    let docs = [
        at(doc(1, 10, "inside the box"), -79.98, 40.45),
        placed(at(doc(2, 11, "named but far"), -70.0, 30.0), "Pittsburgh, PA"),
        placed(at(doc(3, 12, "both"), -79.97, 40.44), "Pittsburgh, PA"),
        placed(at(doc(4, 13, "elsewhere"), -87.65, 41.85), "Chicago, IL"),
        doc(5, 14, "nowhere"),
    ];
    let store = store_with(dir.path(), &docs);
    let regions = default_regions();
    let pittsburgh = regions.iter().find(|r| r.name == "Pittsburgh, PA").unwrap();

    let matcher = GeoPlaceMatcher::new(regions.clone());
    let hits = matcher.match_region(&store, pittsburgh, None).unwrap();
    let ids: Vec<u64> = hits.docs.iter().map(|m| m.doc.id).collect();
    assert_eq!(ids, [1, 2, 3]);
    assert_eq!(hits.total_hits, 3);
    assert_eq!(hits.duplicates, 0);

    for doc in &docs {
        assert_eq!(region_matches(pittsburgh, doc), ids.contains(&doc.id), "doc {}", doc.id);
    }
}

#[test]
fn alias_place_names_match_their_region() {
    let dir = TempDir::new().unwrap();
    let store = store_with(dir.path(), &[placed(doc(1, 1, "bridge"), "Manhattan, NY")]);
    let matcher = GeoPlaceMatcher::new(default_regions());
    let hits = matcher.match_all(&store, None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].region.name, "Brooklyn, NY");
}

#[test]
fn whitelisted_author_is_counted_in_one_region_only() {
    let dir = TempDir::new().unwrap();
    let store = store_with(
        dir.path(),
        &[
            placed(doc(1, 7, "deep dish"), "Chicago, IL"),
            placed(doc(2, 7, "pierogies"), "Pittsburgh, PA"),
            placed(doc(3, 8, "yinz"), "Pittsburgh, PA"),
            placed(doc(4, 9, "not listed"), "Pittsburgh, PA"),
        ],
    );
    let mut whitelist: UserWhitelist = [7, 8].into_iter().collect();
    let matcher = GeoPlaceMatcher::new(default_regions());
    let hits = matcher.match_all(&store, Some(&mut whitelist)).unwrap();

    let per_region: Vec<(&str, Vec<u64>)> = hits
        .iter()
        .map(|h| (h.region.name.as_str(), h.docs.iter().map(|m| m.doc.id).collect()))
        .collect();
    assert_eq!(
        per_region,
        [("Chicago, IL", vec![1]), ("Pittsburgh, PA", vec![3])]
    );
    assert_eq!(hits[1].skipped_users, 2);
    assert_eq!(whitelist.consumed(), &[7, 8]);
    assert_eq!(whitelist.remaining(), 0);
}

#[test]
fn shared_term_gets_one_id_and_document_frequency_two() {
    let index = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let store = store_with(
        index.path(),
        &[
            placed(doc(1, 1, "I love yinz"), "Pittsburgh, PA"),
            placed(doc(2, 2, "love love\nthe inclines"), "Pittsburgh, PA"),
            placed(doc(3, 3, "deep dish"), "Chicago, IL"),
        ],
    );
    let ctx = PipelineContext::new(store);
    let options = ExportOptions::new(out.path()).with_text_fields(vec![RecordField::Text]);
    let exporter = FeatureExporter::new(GeoPlaceMatcher::new(default_regions()), options);
    let mut state = ExportState::new();
    let summary = exporter.run(&ctx, &mut state).unwrap();
    assert_eq!(summary.documents, 3);
    assert_eq!(summary.regions, 2);

    let love = state.dictionary.get(RecordField::Text, "love").unwrap();
    assert_eq!(state.doc_freq.get(&love), Some(&2));

    let gold = lines(out.path(), "gold_standard");
    assert_eq!(gold, ["Chicago, IL", "Pittsburgh, PA", "Pittsburgh, PA"]);
    for name in ["docVectorsTF", "docVectorsBinary", "rawText", "userID"] {
        assert_eq!(lines(out.path(), name).len(), gold.len(), "{name}");
    }
    assert_eq!(lines(out.path(), "rawText")[2], "love love the inclines");
    assert_eq!(lines(out.path(), "userID"), ["3", "1", "2"]);

    let tf = lines(out.path(), "docVectorsTF");
    assert!(tf[2].split(' ').any(|entry| entry == format!("{love}:2")));
    for line in &tf {
        let ids: Vec<&str> = line.split(' ').map(|e| e.split(':').next().unwrap()).collect();
        let mut unique = ids.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), ids.len(), "{line}");
    }
    assert!(
        lines(out.path(), "docVectorsBinary")
            .iter()
            .all(|line| line.split(' ').all(|e| e.ends_with(":1")))
    );

    let dict = lines(out.path(), "dict");
    let mut sorted = dict.clone();
    sorted.sort();
    assert_eq!(dict, sorted);
    assert!(dict.contains(&format!("text:love {love}")));
    assert!(lines(out.path(), "df").contains(&format!("{love}:2")));
    assert!(!out.path().join("docVectorsSmoothingBinary_0").exists());
}

#[test]
fn url_and_location_features_share_the_dictionary() {
    let index = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let mut first = placed(doc(1, 1, "game day"), "Pittsburgh, PA");
    first.user_url = Some("https://www.steelers.com/schedule".into());
    first.user_location = Some("Pittsburgh,\nPA".into());
    let mut second = placed(doc(2, 2, "game over"), "Pittsburgh, PA");
    second.outlink_domain = Some("http://steelers.com/a https://news.example.org/b".into());
    let store = store_with(index.path(), &[first, second]);

    let ctx = PipelineContext::new(store);
    let exporter = FeatureExporter::new(
        GeoPlaceMatcher::new(default_regions()),
        ExportOptions::new(out.path()).with_text_fields(vec![RecordField::Text]),
    );
    let mut state = ExportState::new();
    exporter.run(&ctx, &mut state).unwrap();

    let dict = &state.dictionary;
    assert!(dict.get(RecordField::UserUrl, "steelers.com").is_some());
    assert!(dict.get(RecordField::OutlinkDomain, "steelers.com").is_some());
    assert!(dict.get(RecordField::OutlinkDomain, "news.example.org").is_some());
    assert!(dict.get(RecordField::UserLocation, "Pittsburgh, PA").is_some());
    let game = dict.get(RecordField::Text, "game").unwrap();
    assert_eq!(state.doc_freq.get(&game), Some(&2));
}

#[test]
fn smoothing_expands_with_target_leaning_timeline_terms() {
    let index = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let mut with_history = placed(doc(2, 2, "love steelers"), "Pittsburgh, PA");
    with_history.timeline = Some("yinz deep pierogies @bob".into());
    let store = store_with(
        index.path(),
        &[
            placed(doc(3, 3, "deep dish"), "Chicago, IL"),
            placed(doc(1, 1, "love yinz"), "Pittsburgh, PA"),
            with_history,
        ],
    );

    let mut smoothing = SmoothingOptions::for_region("Pittsburgh");
    smoothing.discounts = vec![1.0, 0.5];
    let options = ExportOptions::new(out.path())
        .with_text_fields(vec![RecordField::Text])
        .with_smoothing(smoothing);
    let ctx = PipelineContext::new(store);
    let exporter = FeatureExporter::new(GeoPlaceMatcher::new(default_regions()), options);
    let mut state = ExportState::new();
    let summary = exporter.run(&ctx, &mut state).unwrap();
    assert_eq!(summary.expanded_documents, 1);

    let id = |term: &str| state.dictionary.get(RecordField::Text, term).unwrap();
    let (love, steelers, yinz) = (id("love"), id("steelers"), id("yinz"));
    assert_eq!(
        lines(out.path(), "docVectorsSmoothingBinary_0")[2],
        format!("{love}:1 {steelers}:1 {yinz}:1.0")
    );
    assert_eq!(
        lines(out.path(), "docVectorsSmoothingBinary_1")[2],
        format!("{love}:1 {steelers}:1 {yinz}:0.5")
    );
    assert_eq!(
        lines(out.path(), "docVectorsBinary")[2],
        format!("{love}:1 {steelers}:1")
    );
    assert!(state.dictionary.get(RecordField::Text, "pierogies").is_none());
    assert_eq!(state.doc_freq.get(&yinz), Some(&1));
}
