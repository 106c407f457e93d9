//! Spreadsheet input for `import`.

use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};

#[derive(Debug, thiserror::Error)]
pub enum WorkbookError {
    #[error("failed to open workbook {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: calamine::Error,
    },
    #[error("workbook {path} has no worksheets")]
    Empty { path: String },
    #[error("failed to read worksheet {sheet}: {source}")]
    Sheet {
        sheet: String,
        #[source]
        source: calamine::Error,
    },
}

/// Reads every row of `sheet` (or the first worksheet) as trimmed optional cells.
pub fn read_rows(
    path: &Path,
    sheet: Option<&str>,
) -> Result<Vec<Vec<Option<String>>>, WorkbookError> {
    let display = path.display().to_string();
    let mut workbook = open_workbook_auto(path).map_err(|source| WorkbookError::Open {
        path: display.clone(),
        source,
    })?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(WorkbookError::Empty { path: display })?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|source| WorkbookError::Sheet {
            sheet: sheet_name.clone(),
            source,
        })?;

    Ok(range_rows(&range))
}

/// Rows are reported from the top-left corner of the sheet, so column offsets
/// stay absolute even when the used range starts further in.
pub fn range_rows(range: &Range<Data>) -> Vec<Vec<Option<String>>> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };
    let leading = vec![None; start_col as usize];
    let mut rows: Vec<Vec<Option<String>>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = leading.clone();
        cells.extend(row.iter().map(cell_text));
        rows.push(cells);
    }
    rows
}

pub fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(value) | Data::DateTimeIso(value) | Data::DurationIso(value) => {
            value.trim().to_string()
        }
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{}", *value as i64)
        }
        Data::Float(value) => value.to_string(),
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        Data::DateTime(value) => value.as_f64().to_string(),
    };
    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_floats_drop_fraction() {
        assert_eq!(cell_text(&Data::Float(10.0)).as_deref(), Some("10"));
        assert_eq!(cell_text(&Data::Float(2.5)).as_deref(), Some("2.5"));
        assert_eq!(cell_text(&Data::Int(7)).as_deref(), Some("7"));
    }

    #[test]
    fn blank_strings_are_empty_cells() {
        assert_eq!(cell_text(&Data::String("   ".to_string())), None);
        assert_eq!(cell_text(&Data::Empty), None);
        assert_eq!(
            cell_text(&Data::String(" Haddad ".to_string())).as_deref(),
            Some("Haddad")
        );
    }

    #[test]
    fn offset_range_keeps_absolute_columns() {
        let mut range = Range::new((1, 1), (2, 2));
        range.set_value((1, 1), Data::String("ID".to_string()));
        range.set_value((2, 1), Data::Float(10.0));
        range.set_value((2, 2), Data::String("Haddad".to_string()));

        let rows = range_rows(&range);

        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_empty());
        assert_eq!(
            rows[2],
            vec![None, Some("10".to_string()), Some("Haddad".to_string())]
        );
    }
}
