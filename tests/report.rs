use fftbench::report::{sink_for_path, ReportHeader, ResultRecord, Status, CSV_COLUMNS};
use fftbench::{Configuration, Extent, Phase, Placement, Precision, TransformKind};

fn records() -> Vec<ResultRecord> {
    let config = Configuration::new(
        TransformKind::ComplexToComplex,
        Placement::OutOfPlace,
        Precision::Double,
        Extent::new(vec![64, 64]).unwrap(),
    );
    let mut ok = ResultRecord::new("rustfft", &config, Phase::Upload, Status::Ok);
    ok.duration_ns = 420;
    let mut skipped = ResultRecord::new("rustfft", &config, Phase::Setup, Status::Skipped);
    skipped.message = Some("insufficient device memory".into());
    vec![ok, skipped]
}

fn write_all(path: &std::path::Path) {
    let mut sink = sink_for_path(Some(path)).unwrap();
    sink.begin(&ReportHeader::now("rustfft", "CPU", "wall")).unwrap();
    for r in records() {
        sink.record(&r).unwrap();
    }
    sink.finish().unwrap();
}

#[test]
fn csv_file_has_header_and_one_line_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");
    write_all(&path);
    let text = std::fs::read_to_string(&path).unwrap();
    let body: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(body[0], CSV_COLUMNS.join(","));
    assert_eq!(body.len(), 3);
    assert!(body[1].starts_with("rustfft,Complex,Outplace,double,64x64,2,0,false,upload,420,ok,"));
    assert!(body[2].ends_with("setup,0,skipped,insufficient device memory"));
}

#[test]
fn jsonl_file_round_trips_through_serde() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.jsonl");
    write_all(&path);
    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    let head: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
    assert_eq!(head["header"]["title"], "rustfft");
    let rows: Vec<serde_json::Value> = lines.map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["phase"], "upload");
    assert_eq!(rows[1]["status"], "skipped");
}

#[test]
fn single_precision_has_one_label_in_every_format() {
    let config = Configuration::new(
        TransformKind::RealToComplex,
        Placement::InPlace,
        Precision::Single,
        Extent::new(vec![32]).unwrap(),
    );
    let record = ResultRecord::new("rustfft", &config, Phase::Download, Status::Ok);
    let dir = tempfile::tempdir().unwrap();
    let mut texts = Vec::new();
    for name in ["out.csv", "out.jsonl"] {
        let path = dir.path().join(name);
        let mut sink = sink_for_path(Some(path.as_path())).unwrap();
        sink.begin(&ReportHeader::now("rustfft", "CPU", "wall")).unwrap();
        sink.record(&record).unwrap();
        sink.finish().unwrap();
        drop(sink);
        texts.push(std::fs::read_to_string(&path).unwrap());
    }
    assert!(texts[0].contains(",Inplace,float,32,"));
    let row: serde_json::Value = serde_json::from_str(texts[1].lines().last().unwrap()).unwrap();
    assert_eq!(row["precision"], Precision::Single.label());
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    assert!(sink_for_path(Some(dir.path().join("out.xlsx").as_path())).is_err());
}

#[cfg(feature = "sqlite-report")]
#[test]
fn sqlite_file_keeps_runs_and_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.db");
    write_all(&path);
    write_all(&path);
    let conn = rusqlite::Connection::open(&path).unwrap();
    let runs: i64 = conn
        .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))
        .unwrap();
    let results: i64 = conn
        .query_row("SELECT COUNT(*) FROM results WHERE run_id = 2", [], |row| row.get(0))
        .unwrap();
    assert_eq!((runs, results), (2, 2));
}
