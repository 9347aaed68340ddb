// 📥 CSV import - bulk course creation
//
// Format: header row `courseName,semester`, one course per line.
// Every row goes through `CourseManager::create_course`; a row that fails
// (bad semester, name clash) is reported and skipped, the rest still land.

use crate::manager::CourseManager;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CourseRecord {
    #[serde(rename = "courseName")]
    pub course_name: String,
    pub semester: String,
}

/// A row that could not be imported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    /// 1-based line in the file, header included
    pub line: usize,
    pub course_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub rejected: Vec<RejectedRow>,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.created + self.rejected.len()
    }
}

pub fn import_courses(manager: &CourseManager<'_>, csv_path: &Path) -> Result<ImportSummary> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open file: {}", csv_path.display()))?;

    let summary = import_from_reader(manager, file)
        .with_context(|| format!("Failed to import {}", csv_path.display()))?;

    info!(
        "Imported {} of {} courses from {}",
        summary.created,
        summary.total(),
        csv_path.display()
    );
    Ok(summary)
}

pub fn import_from_reader<R: Read>(manager: &CourseManager<'_>, input: R) -> Result<ImportSummary> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut summary = ImportSummary::default();

    for (index, result) in reader.deserialize::<CourseRecord>().enumerate() {
        // +2: 1-based and the header row
        let line = index + 2;
        let record = result.with_context(|| format!("Failed to parse CSV line {}", line))?;

        match manager.create_course(&record.course_name, &record.semester) {
            Ok(_) => summary.created += 1,
            Err(err) => {
                warn!("Line {}: {:?} rejected: {}", line, record.course_name, err);
                summary.rejected.push(RejectedRow {
                    line,
                    course_name: record.course_name,
                    reason: err.to_string(),
                });
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::registry::Registry;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_import_reports_rejected_rows() {
        let conn = StoreConfig::in_memory().open().unwrap();
        let registry = Registry::builtin();
        let manager = CourseManager::new(&conn, &registry);

        let csv = "courseName,semester\n\
                   Compilers,ws24/25\n\
                   Databases, SS 2025 \n\
                   Networks,fall 2024\n\
                   Compilers,ss25\n";

        let summary = import_from_reader(&manager, csv.as_bytes()).unwrap();
        assert_eq!(summary.created, 2);
        assert_eq!(
            summary.rejected.iter().map(|r| r.line).collect::<Vec<_>>(),
            vec![4, 5]
        );
        assert_eq!(registry.count(&conn, "Course").unwrap(), 2);
    }

    #[test]
    fn test_import_from_file() {
        let conn = StoreConfig::in_memory().open().unwrap();
        let registry = Registry::builtin();
        let manager = CourseManager::new(&conn, &registry);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "courseName,semester").unwrap();
        writeln!(file, "Algorithms,Summer 24").unwrap();

        let summary = import_courses(&manager, file.path()).unwrap();
        assert_eq!(summary, ImportSummary { created: 1, rejected: vec![] });
    }

    #[test]
    fn test_import_missing_file_has_context() {
        let conn = StoreConfig::in_memory().open().unwrap();
        let manager = CourseManager::new(&conn, Registry::global());

        let err = import_courses(&manager, Path::new("/nonexistent/courses.csv")).unwrap_err();
        assert!(err.to_string().contains("Failed to open file"));
    }
}
