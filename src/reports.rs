use serde::Serialize;

use crate::error::ApiError;

/// ReportName
///
/// Reports that can be downloaded as CSV from GET /export_report/{name}.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportName {
    LowGradeStudents,
}

impl ReportName {
    pub const ALL: [ReportName; 1] = [ReportName::LowGradeStudents];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportName::LowGradeStudents => "low_grade_students",
        }
    }

    pub fn parse(name: &str) -> Option<ReportName> {
        Self::ALL.into_iter().find(|report| report.as_str() == name)
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.as_str())
    }
}

/// to_csv
///
/// Serializes report rows with a header line derived from the row's field names.
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<Vec<u8>, ApiError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ApiError::Internal(format!("Failed to write report row: {}", e)))?;
    }
    writer
        .into_inner()
        .map_err(|e| ApiError::Internal(format!("Failed to finish report: {}", e)))
}
