//! End-to-end runs of the full pipeline against fixture databases.

use engine::{run, ClassificationScope, FailureReason, RunConfig};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PREFIX: &str = "demo_";

const MARRIAGE_GRAMMAR: &str = "[LABELS:]\r\n\
    [RL=00001][L=ENGLISH]Principal[L=FRENCH]Principal\r\n\
    [RL=00002][L=ENGLISH]Witness[L=FRENCH]Témoin\r\n\
    [:LABELS]\r\n\
    [L=ENGLISH][R=00001][P] married <[D]>\r\n";

const MAPPING: &str = r#"{
    "events": {"MARR": {"tmg_name": "Marriage"}, "BURI": "Burial", "Acte": "Deed"},
    "roles": {"ACHETEUR": {"eng": "Buyer", "fra": "Acheteur"}}
}"#;

/// One third-party and one self reference, both "Buyer".
const BUYERS: &str = "0 HEAD\n\
    1 CHAR ANSI\n\
    0 @I1@ INDI\n\
    1 REFN 101\n\
    1 MARR\n\
    2 DATE 12 MAY 1750\n\
    2 _SHAR @I2@\n\
    3 ROLE Buyer\n\
    3 NOTE paid the notary\n\
    2 _SHAR @I1@\n\
    3 ROLE Buyer\n\
    0 @I2@ INDI\n\
    1 REFN 102\n\
    0 @I3@ INDI\n\
    1 REFN 103\n\
    0 TRLR\n";

struct Fixture {
    _dir: TempDir,
    db: PathBuf,
    config: RunConfig,
}

fn write_jsonl(path: &Path, rows: &Value) {
    let mut out = String::new();
    for row in rows.as_array().unwrap() {
        out.push_str(&serde_json::to_string(row).unwrap());
        out.push('\n');
    }
    std::fs::write(path, out).unwrap();
}

fn read_jsonl(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn fixture(interchange: &str, event_types: Value, events: Value, witnesses: Value) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db");
    std::fs::create_dir(&db).unwrap();

    write_jsonl(
        &db.join(format!("{PREFIX}person.jsonl")),
        &json!([
            {"id": 1, "reference": "101", "dataset": 2, "LASTEDIT": "2024-01-01"},
            {"id": 2, "reference": 102, "dataset": 2},
            {"id": 3, "reference": "103", "dataset": 2},
        ]),
    );
    write_jsonl(&db.join(format!("{PREFIX}event_type.jsonl")), &event_types);
    write_jsonl(&db.join(format!("{PREFIX}event.jsonl")), &events);
    write_jsonl(&db.join(format!("{PREFIX}witness.jsonl")), &witnesses);

    let ged = dir.path().join("export.ged");
    std::fs::write(&ged, interchange).unwrap();
    let mapping = dir.path().join("mapping.json");
    std::fs::write(&mapping, MAPPING).unwrap();

    let config = RunConfig::new(ged, mapping, &db);
    Fixture {
        _dir: dir,
        db,
        config,
    }
}

fn marriage_fixture(interchange: &str, stored_date: &str, witnesses: Value) -> Fixture {
    fixture(
        interchange,
        json!([
            {"id": 7, "name": "Marriage", "grammar": MARRIAGE_GRAMMAR, "SENTENCE": "keep me"},
            {"id": 8, "name": "Burial", "grammar": ""},
        ]),
        json!([
            {"id": 50, "event_type": 7, "date": stored_date, "principal1": 1, "principal2": 0},
        ]),
        witnesses,
    )
}

impl Fixture {
    fn witnesses(&self) -> Vec<Value> {
        read_jsonl(&self.db.join(format!("{PREFIX}witness.jsonl")))
    }

    fn event_types(&self) -> Vec<Value> {
        read_jsonl(&self.db.join(format!("{PREFIX}event_type.jsonl")))
    }
}

#[test]
fn third_party_and_self_reference_get_both_variants() {
    let fx = marriage_fixture(BUYERS, "117500512", json!([]));
    let report = run(&fx.config).unwrap();

    assert_eq!(report.prefix, PREFIX);
    assert_eq!(report.tally.injected_normal, 1);
    assert_eq!(report.tally.injected_principal, 1);
    assert_eq!(report.tally.errors, 0);
    assert_eq!(report.schema.codes_created, 2);
    assert_eq!(report.schema.types_modified, 1);

    let types = fx.event_types();
    let grammar = types[0]["grammar"].as_str().unwrap();
    assert!(grammar.contains("[RL=00003][L=ENGLISH]Buyer[L=FRENCH]Buyer\r\n"));
    assert!(grammar.contains("[RL=00004][L=ENGLISH]Principal Buyer[L=FRENCH]Principal Buyer\r\n"));
    assert!(grammar.ends_with("[P] married <[D]>\r\n"));
    assert_eq!(types[0]["witness_capable"], true);
    assert_eq!(types[0]["principal_capable"], true);
    assert_eq!(types[0]["SENTENCE"], "keep me");
    assert_eq!(types[1]["grammar"], "");

    let rows = fx.witnesses();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["person"], 2);
    assert_eq!(rows[0]["role"], "00003");
    assert_eq!(rows[0]["primary"], false);
    assert_eq!(rows[0]["note"], "paid the notary");
    assert_eq!(rows[0]["dataset"], 2);
    assert_eq!(rows[1]["person"], 1);
    assert_eq!(rows[1]["role"], "00004");
    assert_eq!(rows[1]["primary"], true);
    assert!(!fx.db.join(format!("{PREFIX}.lock")).exists());
}

#[test]
fn family_marriage_with_spouse_as_witness_gets_both_variants() {
    let interchange = "0 @I1@ INDI\n\
        1 REFN 101\n\
        0 @I2@ INDI\n\
        1 REFN 102\n\
        0 @I3@ INDI\n\
        1 REFN 103\n\
        0 @F1@ FAM\n\
        1 HUSB @I1@\n\
        1 WIFE @I3@\n\
        1 MARR\n\
        2 DATE 12 MAY 1750\n\
        2 _SHAR @I2@\n\
        3 ROLE Buyer\n\
        2 _SHAR @I1@\n\
        3 ROLE Buyer\n";
    let fx = marriage_fixture(interchange, "117500512", json!([]));
    let report = run(&fx.config).unwrap();

    assert_eq!(report.tally.injected_normal, 1);
    assert_eq!(report.tally.injected_principal, 1);
    assert_eq!(report.tally.fallbacks, 0);
    assert_eq!(report.schema.codes_created, 2);

    let types = fx.event_types();
    assert_eq!(types[0]["principal_capable"], true);
    assert!(types[0]["grammar"]
        .as_str()
        .unwrap()
        .contains("[RL=00004][L=ENGLISH]Principal Buyer"));

    let rows = fx.witnesses();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["person"], 2);
    assert_eq!(rows[0]["role"], "00003");
    assert_eq!(rows[0]["primary"], false);
    assert_eq!(rows[1]["person"], 1);
    assert_eq!(rows[1]["role"], "00004");
    assert_eq!(rows[1]["primary"], true);
    assert_eq!(rows[1]["note"], "");
}

#[test]
fn malformed_grammar_is_preserved_and_witnesses_fall_back() {
    let broken = "[LABELS:]\r\n\
        [RL=00002][L=ENGLISH]Witness\r\n\
        [RL=00005][L=ENGLISH]Seller\r\n\
        [RL=x][L=ENGLISH]Broken\r\n\
        [:LABELS]\r\n\
        [L=ENGLISH][R=00001][P] married <[D]>\r\n";
    let fx = fixture(
        BUYERS,
        json!([{"id": 7, "name": "Marriage", "grammar": broken}]),
        json!([{"id": 50, "event_type": 7, "date": "117500512", "principal1": 1, "principal2": 0}]),
        json!([]),
    );
    let report = run(&fx.config).unwrap();

    assert_eq!(report.schema.malformed_grammars, 1);
    assert_eq!(report.schema.codes_created, 0);
    assert_eq!(fx.event_types()[0]["grammar"], broken);
    assert_eq!(report.tally.fallbacks, 2);
    let rows = fx.witnesses();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["role"] == "00002"));
    assert_eq!(rows[0]["note"], "[Buyer] paid the notary");
}

#[test]
fn rerun_is_idempotent() {
    let fx = marriage_fixture(BUYERS, "117500512", json!([]));
    run(&fx.config).unwrap();
    let types_after_first = fx.event_types();

    let report = run(&fx.config).unwrap();
    assert_eq!(report.tally.injected(), 0);
    assert_eq!(report.tally.skipped_duplicate, 2);
    assert_eq!(report.schema.types_modified, 0);
    assert_eq!(fx.witnesses().len(), 2);
    assert_eq!(fx.event_types(), types_after_first);
}

#[test]
fn missing_codes_fall_back_to_default_with_bracketed_label() {
    // I3 is the second participant of the deed, so the reference is a self
    // reference, but "Notary" was only ever used by third parties in the scan
    // and the deed grammar has no witness role to fall back on.
    let interchange = "0 @I1@ INDI\n\
        1 REFN 101\n\
        1 EVEN\n\
        2 TYPE Acte\n\
        2 _SHAR @I3@\n\
        3 ROLE Notary\n\
        3 NOTE drew up the act\n\
        0 @I3@ INDI\n\
        1 REFN 103\n";
    let fx = fixture(
        interchange,
        json!([{"id": 9, "name": "Deed", "grammar": ""}]),
        json!([{"id": 60, "event_type": 9, "date": "0", "principal1": 1, "principal2": 3}]),
        json!([]),
    );
    let report = run(&fx.config).unwrap();

    assert_eq!(report.tally.injected_principal, 1);
    assert_eq!(report.tally.fallbacks, 1);
    let rows = fx.witnesses();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["role"], "00002");
    assert_eq!(rows[0]["primary"], true);
    assert_eq!(rows[0]["note"], "[Notary] drew up the act");
}

#[test]
fn year_mismatch_is_an_error() {
    let fx = marriage_fixture(BUYERS, "117510512", json!([]));
    let report = run(&fx.config).unwrap();

    assert_eq!(report.tally.injected(), 0);
    assert_eq!(report.tally.errors, 2);
    assert_eq!(report.tally.failures_for(FailureReason::NoMatchingEvent), 2);
    assert!(fx.witnesses().is_empty());
}

#[test]
fn sequence_continues_from_existing_rows() {
    let fx = marriage_fixture(
        BUYERS,
        "117500512",
        json!([
            {"event": 50, "person": 3, "dataset": 2, "sequence": 5, "role": 2, "primary": false, "note": ""},
            {"event": 51, "person": 3, "dataset": 2, "sequence": 9, "role": 2, "primary": false, "note": ""},
        ]),
    );
    run(&fx.config).unwrap();

    let rows = fx.witnesses();
    assert_eq!(rows.len(), 4);
    // Stored integer role codes are kept as written.
    assert_eq!(rows[0]["role"], 2);
    assert_eq!(rows[2]["sequence"], 6);
    assert_eq!(rows[3]["sequence"], 7);
}

#[test]
fn simulation_writes_nothing() {
    let mut fx = marriage_fixture(BUYERS, "117500512", json!([]));
    fx.config.simulate = true;
    let before = fx.event_types();

    let report = run(&fx.config).unwrap();
    assert!(report.simulated);
    assert_eq!(report.tally.injected(), 2);
    assert_eq!(report.schema.codes_created, 2);
    assert!(fx.witnesses().is_empty());
    assert_eq!(fx.event_types(), before);
}

#[test]
fn held_lock_is_fatal() {
    let fx = marriage_fixture(BUYERS, "117500512", json!([]));
    std::fs::write(fx.db.join(format!("{PREFIX}.lock")), "4242\n").unwrap();

    let err = run(&fx.config).unwrap_err();
    assert!(format!("{err:#}").contains("locked"));
    assert!(fx.witnesses().is_empty());
}

#[test]
fn missing_mapping_is_fatal() {
    let mut fx = marriage_fixture(BUYERS, "117500512", json!([]));
    fx.config.mapping = fx.db.join("absent.json");
    let err = run(&fx.config).unwrap_err();
    assert!(format!("{err:#}").contains("mapping"));
}

#[test]
fn per_event_type_scope_allocates_only_local_variants() {
    let interchange = "0 @I1@ INDI\n\
        1 REFN 101\n\
        1 MARR\n\
        2 _SHAR @I1@\n\
        3 ROLE Buyer\n\
        1 BURI\n\
        2 _SHAR @I2@\n\
        3 ROLE Buyer\n\
        0 @I2@ INDI\n\
        1 REFN 102\n";
    let mut fx = marriage_fixture(interchange, "117500512", json!([]));
    fx.config.scope = ClassificationScope::PerEventType;
    let report = run(&fx.config).unwrap();

    // Marriage: Principal Buyer only. Burial: Buyer only.
    assert_eq!(report.schema.codes_created, 2);
    let types = fx.event_types();
    let marriage = types[0]["grammar"].as_str().unwrap();
    assert!(marriage.contains("[RL=00003][L=ENGLISH]Principal Buyer"));
    assert!(!marriage.contains("]Buyer["));
    assert_eq!(
        types[1]["grammar"],
        "[LABELS:]\r\n[RL=00001][L=ENGLISH]Buyer[L=FRENCH]Buyer\r\n[:LABELS]"
    );
    assert_eq!(types[1]["principal_capable"], false);
}
