//! Ingestion of structured line-item worksheets.
//!
//! Extraction itself happens remotely; what arrives here is the service's
//! already-structured CSV export of a proposal's line items. The importer
//! builds a `ProposalRecord` from it, running the auto-calculator over each
//! row so partially-specified rows arrive complete.

mod parser;

use std::io::Read;
use std::path::Path;

use crate::workflows::comparison::autocalc;
use crate::workflows::comparison::domain::{ProposalRecord, SourceKind};
use crate::workflows::comparison::format::format_currency;

#[derive(Debug)]
pub enum WorksheetImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Empty { filename: String },
}

impl std::fmt::Display for WorksheetImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorksheetImportError::Io(err) => write!(f, "failed to read worksheet: {}", err),
            WorksheetImportError::Csv(err) => write!(f, "invalid worksheet data: {}", err),
            WorksheetImportError::Empty { filename } => {
                write!(f, "worksheet '{}' contains no line items", filename)
            }
        }
    }
}

impl std::error::Error for WorksheetImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorksheetImportError::Io(err) => Some(err),
            WorksheetImportError::Csv(err) => Some(err),
            WorksheetImportError::Empty { .. } => None,
        }
    }
}

impl From<std::io::Error> for WorksheetImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for WorksheetImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub struct WorksheetImporter;

impl WorksheetImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ProposalRecord, WorksheetImportError> {
        let filename = path
            .as_ref()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "worksheet.csv".to_string());
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, &filename)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        filename: &str,
    ) -> Result<ProposalRecord, WorksheetImportError> {
        let mut items = parser::parse_rows(reader)?;
        if items.is_empty() {
            return Err(WorksheetImportError::Empty {
                filename: filename.to_string(),
            });
        }

        let mut derived_rows = 0usize;
        for item in &mut items {
            if autocalc::complete_line_item(item).is_some() {
                derived_rows += 1;
            }
        }

        let kind = SourceKind::from_filename(filename).unwrap_or(SourceKind::Xlsx);
        let mut record = ProposalRecord::new(filename, kind);
        record.company = company_from_filename(filename);
        record.line_items = items;
        if let Some(total) = record.effective_total() {
            record.total = Some(total);
            record.total_raw = format_currency(total);
        }
        if derived_rows > 0 {
            record
                .notes
                .push(format!("{derived_rows} row(s) completed by auto-calculation"));
        }

        Ok(record)
    }
}

/// Guess a company name from a worksheet filename: the stem with separators
/// turned into spaces, e.g. `acme_corp-proposal.csv` -> "Acme Corp Proposal".
fn company_from_filename(filename: &str) -> Option<String> {
    let stem = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);
    let words: Vec<String> = stem
        .split(|ch: char| ch == '_' || ch == '-' || ch == ' ')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::comparison::domain::{CostCategory, MoneyField};
    use std::io::Cursor;

    const SAMPLE: &str = "\
Description,Category,Amount,Quantity,Unit Price,Confidence
Senior Engineer,Labor,\"$120,000.00\",,,0.95
Workstations,Material,,10,\"$2,500.00\",0.9
Travel to site,Travel,\"$8,000.00\",4,,1.0
";

    #[test]
    fn import_builds_record_with_auto_completed_rows() {
        let record =
            WorksheetImporter::from_reader(Cursor::new(SAMPLE), "acme_corp.xlsx").expect("import");

        assert_eq!(record.company.as_deref(), Some("Acme Corp"));
        assert_eq!(record.line_items.len(), 3);

        let workstations = &record.line_items[1];
        assert_eq!(workstations.category, Some(CostCategory::Material));
        assert_eq!(workstations.amount, Some(25_000.0));
        assert_eq!(workstations.derived, Some(MoneyField::Amount));

        let travel = &record.line_items[2];
        assert_eq!(travel.unit_price, Some(2_000.0));
        assert_eq!(travel.derived, Some(MoneyField::UnitPrice));

        // 120k + derived 25k + 8k
        assert_eq!(record.total, Some(153_000.0));
        assert!(record.notes.iter().any(|note| note.contains("2 row(s)")));
    }

    #[test]
    fn import_rejects_empty_worksheets() {
        let error = WorksheetImporter::from_reader(
            Cursor::new("Description,Amount\n"),
            "empty.csv",
        )
        .expect_err("no rows");
        match error {
            WorksheetImportError::Empty { filename } => assert_eq!(filename, "empty.csv"),
            other => panic!("expected empty-worksheet error, got {other:?}"),
        }
    }

    #[test]
    fn import_skips_blank_descriptions_and_unknown_categories() {
        let csv = "\
Description,Category,Amount
,Labor,100
Custom tooling,Bespoke,\"$1,000\"
";
        let record =
            WorksheetImporter::from_reader(Cursor::new(csv), "bid.csv").expect("import");
        assert_eq!(record.line_items.len(), 1);
        assert_eq!(record.line_items[0].category, None);
        assert_eq!(record.line_items[0].amount, Some(1000.0));
    }

    #[test]
    fn from_path_propagates_io_errors() {
        let error = WorksheetImporter::from_path("./does-not-exist.csv").expect_err("io error");
        match error {
            WorksheetImportError::Io(_) => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
