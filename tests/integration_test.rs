// Integration tests for NextSpin
use nextspin::prelude::*;
use std::io::Write;

const DATASET: &str = "\
artist,title,release_id,genre,style,label,year,lowest_price,want_count,have_count,num_for_sale,shelf
Miles Davis,Kind of Blue,1001,Jazz,Modal,Columbia,1959,20,10,2,14,A1
John Coltrane,Blue Train,1002,Jazz,Hard Bop,Blue Note,1957,35,30,60,40,A2
Art Blakey,Moanin',1003,Jazz,Hard Bop,Blue Note,1959,28,25,70,,A3
Black Sabbath,Paranoid,1004,Rock,Heavy Metal,Vertigo,1970,15,5,90,80,B1
Black Sabbath,Master of Reality,1005,Rock,Heavy Metal,Vertigo,1971,,40,10,,B2
Nick Drake,Pink Moon,,Folk,,Island,1972,40,900,100,3,C1
";

fn write_dataset(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("records.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(DATASET.as_bytes()).unwrap();
    path
}

fn snapshot(store: RecordStore) -> Snapshot {
    Snapshot::build(store, &FeatureEncoder::default(), Metric::Cosine)
}

#[test]
fn test_dataset_to_crate() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dataset(&dir);
    let dataset = Dataset::load(&path).unwrap();
    assert_eq!(dataset.store().len(), 6);

    let snapshot = snapshot(dataset.into_store());
    let records: Vec<&Record> = snapshot.store().iter().collect();
    let builder = CrateBuilder::from_params(3, 1.0, None).unwrap();
    let report = builder.build(&records, &Ranking::Score(ScoreKind::Value));

    assert_eq!(report.status, CrateStatus::Ranked);
    assert_eq!(report.picks.len(), 3);
    // Pink Moon: 900 / 101 / 41 beats everything else on value
    assert_eq!(report.picks[0].record.title, "Pink Moon");
    for pair in report.picks.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert_eq!(report.summary.count, 3);
}

#[test]
fn test_similar_prefers_shared_tags() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = snapshot(Dataset::load(write_dataset(&dir)).unwrap().into_store());

    let key = IdentityKey::new("John Coltrane", "Blue Train");
    let neighbors = snapshot.similar(&key, 2).unwrap();
    assert_eq!(neighbors.len(), 2);
    assert!(neighbors.iter().all(|n| n.key != key));
    assert_eq!(neighbors[0].key, IdentityKey::new("Art Blakey", "Moanin'"));

    let unknown = snapshot.similar(&IdentityKey::new("Nobody", "Nothing"), 2);
    assert!(matches!(unknown, Err(Error::UnknownRecord(_))));
}

#[test]
fn test_taste_profile() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = snapshot(Dataset::load(write_dataset(&dir)).unwrap().into_store());
    let neighbors = snapshot.taste(4).unwrap();
    assert_eq!(neighbors.len(), 4);
    for pair in neighbors.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn test_value_score_with_unknown_price() {
    let record = Record::new("Aphex Twin", "Selected Ambient Works")
        .with_numeric(NumericAttr::WantCount, 10.0)
        .with_numeric(NumericAttr::HaveCount, 2.0);
    let scores = ScoringEngine::default().score(&record, None);
    assert!((scores.value_score - (10.0 / 3.0) * (1.0 / 31.0)).abs() < 1e-9);
    assert!((scores.value_score - 0.1075).abs() < 1e-4);
}

#[test]
fn test_empty_population_is_insufficient_data() {
    let store = RecordStore::new();
    let snapshot = snapshot(store);
    let records: Vec<&Record> = snapshot.store().iter().collect();
    let report = CrateBuilder::default().build(&records, &Ranking::default());
    assert_eq!(report.status, CrateStatus::InsufficientData);
    assert!(report.picks.is_empty());
    assert!(report.fallback.is_empty());
    assert!(snapshot.taste(5).unwrap().is_empty());
}

#[test]
fn test_single_record_population() {
    let store: RecordStore = std::iter::once(
        Record::new("Can", "Tago Mago")
            .with_numeric(NumericAttr::Year, 1971.0)
            .with_tags(CategoricalAttr::Genre, ["Rock"]),
    )
    .collect();
    let snapshot = snapshot(store);
    let key = IdentityKey::new("Can", "Tago Mago");
    let vector = snapshot.encoding().vector(&key).unwrap();
    assert!(vector.as_slice().iter().all(|v| v.is_finite()));
    assert_eq!(*vector.as_slice().last().unwrap(), 0.0);
    assert!(snapshot.similar(&key, 5).unwrap().is_empty());
}

#[test]
fn test_fused_lookups_then_scores() {
    let mut store = RecordStore::new();
    let resolver = FusionResolver::new();
    let outcome = resolver.ingest(
        &mut store,
        &[
            SourceResponse::new(SourceTier::Release)
                .with_identity("Miles Davis", "Kind of Blue")
                .with_numeric(NumericAttr::WantCount, 10.0),
            SourceResponse::new(SourceTier::Release)
                .with_identity("Miles Davis", "Kind of Blue")
                .with_numeric(NumericAttr::LowestPrice, 20.0),
        ],
    );
    assert_eq!(outcome, FusionOutcome::Updated);

    let record = store.get(&IdentityKey::new("Miles Davis", "Kind of Blue")).unwrap();
    assert_eq!(record.numeric(NumericAttr::LowestPrice), Some(20.0));
    assert_eq!(record.numeric(NumericAttr::WantCount), Some(10.0));

    // have unknown: default 1 in the value score
    let scores = ScoringEngine::default().score(record, None);
    assert!((scores.value_score - (10.0 / 2.0) * (1.0 / 21.0)).abs() < 1e-9);
}

#[test]
fn test_enrich_save_reload_keeps_extra_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dataset(&dir);
    let mut dataset = Dataset::load(&path).unwrap();

    let outcome = FusionResolver::new().ingest(
        dataset.store_mut(),
        &[SourceResponse::new(SourceTier::Release)
            .with_identity("Nick Drake", "Pink Moon")
            .with_release_id(2001)
            .with_tags(CategoricalAttr::Style, ["Acoustic"])],
    );
    assert_eq!(outcome, FusionOutcome::Updated);

    let out = dir.path().join("enriched.csv");
    dataset.save(&out).unwrap();
    let reloaded = Dataset::load(&out).unwrap();
    let key = IdentityKey::new("Nick Drake", "Pink Moon");
    let record = reloaded.store().get(&key).unwrap();
    assert_eq!(record.release_id, Some(2001));
    assert!(record.tags(CategoricalAttr::Style).contains("Acoustic"));
    assert_eq!(reloaded.extra(&key, "shelf"), Some("C1"));
}

#[test]
fn test_snapshot_swap_keeps_readers_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let store = Dataset::load(write_dataset(&dir)).unwrap().into_store();
    let cell = SnapshotCell::new(snapshot(store.clone()));
    let before = cell.load();

    let mut grown = store;
    grown.upsert(Record::new("Neu!", "Neu!").with_tags(CategoricalAttr::Genre, ["Rock"]));
    let after = cell.rebuild(grown, &FeatureEncoder::default(), Metric::Cosine);

    assert_eq!(before.store().len(), 6);
    assert_eq!(after.store().len(), 7);
    assert_eq!(cell.load().generation(), after.generation());
    assert!(after.generation() > before.generation());
}
