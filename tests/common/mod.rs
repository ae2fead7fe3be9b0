#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use round_analytics::{
    record::{PassStatus, Record},
    source::RawTable,
};
use tempfile::{TempDir, tempdir};

/// Header row of a round export with the default labels.
pub const HEADER: [&str; 9] = [
    "No.", "시험과목", "이메일", "합격여부", "총점", "등급(Lv.)", "학과", "학년", "학번",
];

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }

    /// Writes a round export with the default header and the given data rows.
    pub fn write_round(&self, name: &str, rows: &[&str]) -> PathBuf {
        self.write(name, &round_csv(rows))
    }
}

pub fn round_csv(rows: &[&str]) -> String {
    let mut text = HEADER.join(",");
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

/// Parses comma-separated data rows under the default header.
pub fn round_table(rows: &[&str]) -> RawTable {
    let rows = rows
        .iter()
        .map(|row| row.split(',').collect::<Vec<_>>())
        .collect::<Vec<_>>();
    RawTable::from_text_rows(&HEADER, &rows)
}

pub fn record(department: &str, year: &str, level: &str, score: f64, pass: bool) -> Record {
    Record {
        round: 1,
        sequence: 1,
        subject: "Python".to_string(),
        email: format!("{department}-{year}-{level}@example.com"),
        pass_fail: if pass {
            PassStatus::pass("합격")
        } else {
            PassStatus::fail("불합격")
        },
        score,
        level: level.to_string(),
        department: department.to_string(),
        year: year.to_string(),
        student_number: "20240001".to_string(),
    }
}
