//! End-to-end checks: segments of a circuit are evaluated, collected into a project, saved,
//! reloaded and exported, both through the library and through the `cable-calc` binary.

use std::process::Command;

use cable_calc::engine::{Compliance, Engine, Status};
use cable_calc::export;
use cable_calc::i18n::Language;
use cable_calc::installation::Installation;
use cable_calc::project::{Project, Row};
use cable_calc::tables::Tables;

fn segment(tables: &Tables, from: &str, to: &str, power: f64, area: f64) -> Installation {
    Installation {
        circuit: "K1".into(),
        from: from.into(),
        to: to.into(),
        power,
        demand_factor: 1.0,
        cos_phi: 0.9,
        length: 40.0,
        area: Some(area),
        drop_key: "A: other 5%".into(),
        ..Installation::with_table_defaults(tables)
    }
}

#[test]
fn chained_segments_accumulate_voltage_drop() {
    let tables = Tables::embedded().unwrap();
    let engine = Engine::new(&tables);
    let mut project = Project::default();

    let feeder = segment(&tables, "TS", "RO1", 40_000.0, 25.0);
    let upstream = project.upstream_drop(&feeder);
    assert_eq!(upstream, 0.0);
    let first = engine.evaluate(&feeder, upstream).unwrap();
    assert_eq!(first.by_current, Status::Ok);
    project.add(Row::new(&feeder, &first, Language::En));

    let branch = segment(&tables, "RO1", "M1", 10_000.0, 4.0);
    let upstream = project.upstream_drop(&branch);
    // the stored cell is rounded to two decimals
    assert!((upstream - first.drop).abs() < 0.005 + 1e-9);
    let second = engine.evaluate(&branch, upstream).unwrap();
    assert!((second.total_drop - upstream - second.drop).abs() < 1e-12);
    project.add(Row::new(&branch, &second, Language::En));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("k1.json");
    project.save(&path).unwrap();
    let reloaded = Project::load(&path).unwrap();
    assert_eq!(reloaded.table, project.table);

    let xlsx = dir.path().join("k1.xlsx");
    export::write_workbook(&reloaded, Language::Sr, jiff::civil::date(2025, 1, 31), &xlsx)
        .unwrap();
    assert!(std::fs::metadata(&xlsx).unwrap().len() > 0);
}

#[test]
fn undersized_cable_is_flagged_with_remedies() {
    let tables = Tables::embedded().unwrap();
    let inst = segment(&tables, "RO1", "M2", 30_000.0, 4.0);
    let eval = Engine::new(&tables).evaluate(&inst, 0.0).unwrap();
    assert_eq!(eval.by_current, Status::Fail);
    assert_eq!(eval.compliance, Compliance::Fail);
    assert!(!eval.recommendations.is_empty());
    let row = Row::new(&inst, &eval, Language::Ru);
    assert_eq!(row.by_current, "NE");
    assert_eq!(row.compliance, "НЕ СООТВ.");
}

fn cable_calc() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_cable-calc"));
    command.env_remove("CABLE_CALC_TABLES").env_remove("CABLE_CALC_LANG");
    command
}

const FEEDER: &[&str] = &[
    "--circuit", "K1", "--from", "TS", "--to", "RO1", "-P", "20000", "-K", "1", "--cos-phi",
    "0,9", "-L", "30", "-A", "10", "--breaker", "40", "--drop-limit", "A: other 5%",
];

#[test]
fn calc_prints_jsonl_and_adds_rows() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("project.json");
    let out = cable_calc()
        .args(["-l", "en", "calc"])
        .args(FEEDER)
        .arg("--project")
        .arg(&project)
        .args(["--add", "-f", "jsonl"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let record: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(record["evaluation"]["compliance"], "ok");
    assert_eq!(record["evaluation"]["by_current"], "OK");
    assert_eq!(record["row"], 1);

    let saved = Project::load(&project).unwrap();
    assert_eq!(saved.table.len(), 1);
    assert_eq!(saved.form.unwrap().circuit, "K1");

    let out = cable_calc()
        .args(["project", "show"])
        .arg(&project)
        .args(["-f", "csv"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let csv = String::from_utf8(out.stdout).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.starts_with("#,"));

    let xlsx = dir.path().join("report.xlsx");
    let out = cable_calc()
        .args(["project", "export"])
        .arg(&project)
        .arg("--xlsx")
        .arg(&xlsx)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(xlsx.exists());

    let out = cable_calc()
        .args(["project", "remove"])
        .arg(&project)
        .arg("1")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(Project::load(&project).unwrap().is_empty());
}

#[test]
fn select_finds_cable_and_breaker() {
    let out = cable_calc()
        .args(["select", "-P", "20000", "-K", "1", "--cos-phi", "0.9", "-L", "30"])
        .args(["--drop-limit", "A: other 5%", "-f", "jsonl"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let record: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(record["outcome"], "found");
    assert_eq!(record["area"], 6.0);
    assert_eq!(record["breaker"], "40");
}

#[test]
fn stored_selection_is_recalculated_from_the_project() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("project.json");
    let out = cable_calc()
        .args(["select", "--circuit", "K1", "--from", "TS", "--to", "RO1"])
        .args(["-P", "20000", "-K", "1", "--cos-phi", "0.9", "-L", "30"])
        .args(["--drop-limit", "A: other 5%", "--project"])
        .arg(&project)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = cable_calc()
        .args(["calc", "--project"])
        .arg(&project)
        .args(["--from-form", "--add", "-f", "jsonl"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let record: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(record["installation"]["area"], 6.0);
    assert_eq!(record["installation"]["breaker"], 40.0);
    assert_eq!(record["installation"]["circuit"], "K1");
    assert_eq!(record["evaluation"]["protection"], "OK");
    assert_eq!(record["evaluation"]["compliance"], "ok");

    let out = cable_calc()
        .args(["calc", "--project"])
        .arg(&project)
        .args(["--from-row", "1", "--breaker", "50", "-f", "jsonl"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let record: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(record["installation"]["area"], 6.0);
    assert_eq!(record["installation"]["length"], 30.0);
    assert_eq!(record["installation"]["breaker"], 50.0);
    assert_eq!(record["evaluation"]["protection"], "NE");
    assert!(record.get("row").is_none());
}

#[test]
fn errors_print_their_causes_and_exit_with_one() {
    let out = cable_calc()
        .args(["calc", "-P", "1000", "-K", "1", "--cos-phi", "1.5", "-L", "10", "-A", "2.5"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("error: installation parameters are invalid"), "{stderr}");
    assert!(stderr.contains("  because: cos φ must be within (0, 1], got 1.5"), "{stderr}");

    let out = cable_calc().args(["calc", "-P", "1000", "-K", "1", "-L", "10"]).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("`--cos-phi` is required"), "{stderr}");

    let dir = tempfile::tempdir().unwrap();
    let out = cable_calc()
        .args(["calc", "--from-form", "--project"])
        .arg(dir.path().join("fresh.json"))
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("has no saved form"), "{stderr}");

    let out = cable_calc()
        .args(["project", "export"])
        .arg(dir.path().join("missing.json"))
        .arg("--xlsx")
        .arg(dir.path().join("out.xlsx"))
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn tables_can_be_filtered() {
    let out = cable_calc().args(["tables", "grouping", "-f", "csv"]).output().unwrap();
    assert!(out.status.success());
    let csv = String::from_utf8(out.stdout).unwrap();
    assert!(csv.lines().skip(1).all(|line| line.starts_with("grouping,")));
    assert!(csv.contains("grouping,12,0.45"));
}
