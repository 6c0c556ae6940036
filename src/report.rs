//! Result records and the sinks that persist them.

use core::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::adapter::Phase;
use crate::error::{BenchError, Result};
use crate::layout::{Configuration, Extent, Placement, Precision, TransformKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Skipped,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Ok => "ok",
            Status::Skipped => "skipped",
            Status::Failed => "failed",
        })
    }
}

/// One timed phase (or one skip/failure) of one configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub backend: String,
    pub kind: TransformKind,
    pub placement: Placement,
    pub precision: Precision,
    pub extents: Extent,
    pub run: usize,
    pub warmup: bool,
    pub phase: Phase,
    pub duration_ns: u64,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResultRecord {
    pub fn new(backend: &str, configuration: &Configuration, phase: Phase, status: Status) -> Self {
        Self {
            backend: backend.to_string(),
            kind: configuration.kind,
            placement: configuration.placement,
            precision: configuration.precision,
            extents: configuration.extents.clone(),
            run: 0,
            warmup: false,
            phase,
            duration_ns: 0,
            status,
            message: None,
        }
    }
}

/// Written once before the first record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportHeader {
    pub title: String,
    pub device_description: String,
    pub timer: String,
    pub started: String,
}

impl ReportHeader {
    pub fn now(title: &str, device_description: &str, timer: &str) -> Self {
        Self {
            title: title.to_string(),
            device_description: device_description.to_string(),
            timer: timer.to_string(),
            started: chrono::Utc::now().to_rfc3339(),
        }
    }
}

pub trait ReportSink {
    fn begin(&mut self, header: &ReportHeader) -> Result<()>;
    fn record(&mut self, record: &ResultRecord) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub header: Option<ReportHeader>,
    pub records: Vec<ResultRecord>,
    pub finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(&self, status: Status) -> impl Iterator<Item = &ResultRecord> {
        self.records.iter().filter(move |r| r.status == status)
    }
}

impl ReportSink for MemorySink {
    fn begin(&mut self, header: &ReportHeader) -> Result<()> {
        self.header = Some(header.clone());
        Ok(())
    }

    fn record(&mut self, record: &ResultRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

pub const CSV_COLUMNS: [&str; 12] = [
    "backend",
    "kind",
    "placement",
    "precision",
    "extents",
    "rank",
    "run",
    "warmup",
    "phase",
    "duration_ns",
    "status",
    "message",
];

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Comma separated values with a `#` comment preamble.
pub struct CsvSink<W: Write> {
    out: W,
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for CsvSink<W> {
    fn begin(&mut self, header: &ReportHeader) -> Result<()> {
        writeln!(self.out, "# {}", header.title)?;
        writeln!(self.out, "# {}", header.device_description)?;
        writeln!(self.out, "# timer: {}", header.timer)?;
        writeln!(self.out, "# started: {}", header.started)?;
        writeln!(self.out, "{}", CSV_COLUMNS.join(","))?;
        Ok(())
    }

    fn record(&mut self, r: &ResultRecord) -> Result<()> {
        let fields = [
            csv_field(&r.backend),
            r.kind.to_string(),
            r.placement.to_string(),
            r.precision.label().to_string(),
            r.extents.to_string(),
            r.extents.rank().to_string(),
            r.run.to_string(),
            r.warmup.to_string(),
            r.phase.to_string(),
            r.duration_ns.to_string(),
            r.status.to_string(),
            csv_field(r.message.as_deref().unwrap_or("")),
        ];
        writeln!(self.out, "{}", fields.join(","))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// One JSON object per line; the first line carries the header.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[derive(Serialize)]
struct HeaderLine<'a> {
    header: &'a ReportHeader,
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn begin(&mut self, header: &ReportHeader) -> Result<()> {
        serde_json::to_writer(&mut self.out, &HeaderLine { header })?;
        writeln!(self.out)?;
        Ok(())
    }

    fn record(&mut self, record: &ResultRecord) -> Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(feature = "sqlite-report")]
pub use sqlite::SqliteSink;

#[cfg(feature = "sqlite-report")]
mod sqlite {
    use std::path::Path;

    use rusqlite::{params, Connection};

    use super::{ReportHeader, ReportSink, ResultRecord};
    use crate::error::Result;

    const SCHEMA: &str = "
        CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            device TEXT NOT NULL,
            timer TEXT NOT NULL,
            started TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS results (
            run_id INTEGER NOT NULL REFERENCES runs(id),
            backend TEXT NOT NULL,
            kind TEXT NOT NULL,
            placement TEXT NOT NULL,
            precision TEXT NOT NULL,
            extents TEXT NOT NULL,
            trial INTEGER NOT NULL,
            warmup INTEGER NOT NULL,
            phase TEXT NOT NULL,
            duration_ns INTEGER NOT NULL,
            status TEXT NOT NULL,
            message TEXT
        );";

    /// Appends to a `results` table, one `runs` row per suite.
    pub struct SqliteSink {
        conn: Connection,
        run_id: i64,
    }

    impl SqliteSink {
        pub fn open(path: &Path) -> Result<Self> {
            let conn = Connection::open(path)?;
            conn.execute_batch(SCHEMA)?;
            Ok(Self { conn, run_id: 0 })
        }

        pub fn open_in_memory() -> Result<Self> {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(SCHEMA)?;
            Ok(Self { conn, run_id: 0 })
        }

        pub fn connection(&self) -> &Connection {
            &self.conn
        }
    }

    impl ReportSink for SqliteSink {
        fn begin(&mut self, header: &ReportHeader) -> Result<()> {
            self.conn.execute_batch("BEGIN")?;
            self.conn.execute(
                "INSERT INTO runs (title, device, timer, started) VALUES (?1, ?2, ?3, ?4)",
                params![
                    header.title,
                    header.device_description,
                    header.timer,
                    header.started
                ],
            )?;
            self.run_id = self.conn.last_insert_rowid();
            Ok(())
        }

        fn record(&mut self, r: &ResultRecord) -> Result<()> {
            self.conn.execute(
                "INSERT INTO results VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    self.run_id,
                    r.backend,
                    r.kind.to_string(),
                    r.placement.to_string(),
                    r.precision.label(),
                    r.extents.to_string(),
                    r.run as i64,
                    r.warmup,
                    r.phase.to_string(),
                    i64::try_from(r.duration_ns).unwrap_or(i64::MAX),
                    r.status.to_string(),
                    r.message
                ],
            )?;
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            if !self.conn.is_autocommit() {
                self.conn.execute_batch("COMMIT")?;
            }
            Ok(())
        }
    }
}

/// Opens a sink chosen by file extension; `None` writes CSV to stdout.
pub fn sink_for_path(path: Option<&Path>) -> Result<Box<dyn ReportSink>> {
    let Some(path) = path else {
        return Ok(Box::new(CsvSink::new(std::io::stdout())));
    };
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" | "" => Ok(Box::new(CsvSink::new(BufWriter::new(File::create(path)?)))),
        "jsonl" | "json" => Ok(Box::new(JsonLinesSink::new(BufWriter::new(
            File::create(path)?,
        )))),
        #[cfg(feature = "sqlite-report")]
        "db" | "sqlite" | "sqlite3" => Ok(Box::new(SqliteSink::open(path)?)),
        other => Err(BenchError::Config(format!(
            "no report sink for .{other} files"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(message: Option<&str>) -> ResultRecord {
        let config = Configuration::new(
            TransformKind::RealToComplex,
            Placement::InPlace,
            Precision::Single,
            Extent::new(vec![32, 32]).unwrap(),
        );
        let mut r = ResultRecord::new("rustfft", &config, Phase::ExecuteForward, Status::Ok);
        r.run = 2;
        r.duration_ns = 1500;
        r.message = message.map(str::to_string);
        r
    }

    fn header() -> ReportHeader {
        ReportHeader {
            title: "rustfft".into(),
            device_description: "CPU, 8 threads".into(),
            timer: "wall".into(),
            started: "2024-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn csv_quotes_awkward_fields() {
        let mut sink = CsvSink::new(Vec::new());
        sink.begin(&header()).unwrap();
        sink.record(&record(Some("plan failed, \"twice\""))).unwrap();
        sink.finish().unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# rustfft");
        assert_eq!(lines[4], CSV_COLUMNS.join(","));
        assert_eq!(
            lines[5],
            "rustfft,Real,Inplace,float,32x32,2,2,false,execute_forward,1500,ok,\"plan failed, \"\"twice\"\"\""
        );
    }

    #[test]
    fn json_lines_are_parseable() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.begin(&header()).unwrap();
        sink.record(&record(None)).unwrap();
        sink.finish().unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let mut lines = text.lines();
        let head: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(head["header"]["timer"], "wall");
        let rec: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(rec["kind"], "real");
        assert_eq!(rec["placement"], "inplace");
        assert_eq!(rec["extents"], serde_json::json!([32, 32]));
        assert_eq!(rec["phase"], "execute_forward");
        assert!(rec.get("message").is_none());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = std::env::temp_dir().join("fftbench-report.xyz");
        assert!(matches!(
            sink_for_path(Some(&dir)),
            Err(BenchError::Config(_))
        ));
    }

    #[cfg(feature = "sqlite-report")]
    #[test]
    fn sqlite_stores_rows() {
        let mut sink = SqliteSink::open_in_memory().unwrap();
        sink.begin(&header()).unwrap();
        sink.record(&record(None)).unwrap();
        sink.record(&record(Some("x"))).unwrap();
        sink.finish().unwrap();
        let count: i64 = sink
            .connection()
            .query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
