// 📄 Sheet access - roster reads and status writes
// Writes go out as one batch; when the batch call fails every cell is retried
// on its own with a pause in between, and whatever still fails is reported by name.

use crate::column::{a1_reference, Column};
use crate::error::{Result, TallyError};
use crate::message::AttendanceRecord;
use crate::roster::Roster;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Pause between single-cell writes after a failed batch
pub const DEFAULT_WRITE_PACING: Duration = Duration::from_millis(200);

// ============================================================================
// TRAITS
// ============================================================================

/// Reads one column of names
pub trait RosterSource: Send + Sync {
    /// Cells from `start_row` (0-based) down to the last non-empty row
    fn read_column(&self, sheet: &str, column: Column, start_row: usize) -> Result<Vec<String>>;
}

/// One status cell to write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellWrite {
    pub name: String,
    pub row: usize,
    pub column: Column,
    pub value: String,
}

impl From<&AttendanceRecord> for CellWrite {
    fn from(record: &AttendanceRecord) -> Self {
        CellWrite {
            name: record.name.clone(),
            row: record.roster_row,
            column: Column::from_index(record.column),
            value: record.status.symbol().to_string(),
        }
    }
}

pub trait SheetWriter: Send + Sync {
    /// Write every cell in one call; returns cells written
    fn write_batch(&self, sheet: &str, cells: &[CellWrite]) -> Result<usize>;

    fn write_cell(&self, sheet: &str, cell: &CellWrite) -> Result<()>;
}

/// A spreadsheet that can both supply the roster and take status writes
pub trait Sheet: RosterSource + SheetWriter {}

impl<T: RosterSource + SheetWriter> Sheet for T {}

/// Load the roster from a name column. An empty column aborts the run.
pub fn load_roster<S: RosterSource + ?Sized>(
    source: &S,
    sheet: &str,
    column: Column,
    start_row: usize,
) -> Result<Roster> {
    let cells = source.read_column(sheet, column, start_row)?;
    let roster = Roster::from_column(&cells, start_row);
    if roster.is_empty() {
        return Err(TallyError::NoRoster {
            source_name: format!("sheet {}", a1_reference(sheet, start_row, column)),
        });
    }
    debug!(sheet, column = %column, names = roster.len(), "roster loaded");
    Ok(roster)
}

// ============================================================================
// BATCH WITH SERIAL FALLBACK
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReport {
    pub written: usize,

    /// Names whose cell was not written
    pub failed: Vec<String>,

    /// True when the batch call failed and cells went out one by one
    pub fell_back: bool,
}

impl WriteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Write `records`, falling back to paced single-cell writes if the batch fails.
///
/// Never returns an error: cells that could not be written are listed in the report.
pub fn apply_updates<W: SheetWriter + ?Sized>(
    writer: &W,
    sheet: &str,
    records: &[AttendanceRecord],
    pacing: Duration,
) -> WriteReport {
    if records.is_empty() {
        return WriteReport::default();
    }

    let cells: Vec<CellWrite> = records.iter().map(CellWrite::from).collect();

    match writer.write_batch(sheet, &cells) {
        Ok(written) => {
            info!(sheet, written, "batch update complete");
            return WriteReport {
                written,
                failed: Vec::new(),
                fell_back: false,
            };
        }
        Err(e) => warn!(sheet, error = %e, cells = cells.len(), "batch update failed, writing cells one by one"),
    }

    let mut report = WriteReport {
        fell_back: true,
        ..WriteReport::default()
    };

    for (i, cell) in cells.iter().enumerate() {
        if i > 0 && !pacing.is_zero() {
            std::thread::sleep(pacing);
        }
        match writer.write_cell(sheet, cell) {
            Ok(()) => report.written += 1,
            Err(e) => {
                warn!(
                    cell = %a1_reference(sheet, cell.row, cell.column),
                    name = %cell.name,
                    error = %e,
                    "cell write failed"
                );
                report.failed.push(cell.name.clone());
            }
        }
    }

    info!(
        sheet,
        written = report.written,
        failed = report.failed.len(),
        "serial update complete"
    );
    report
}

// ============================================================================
// CSV WORKBOOK (offline sheet)
// ============================================================================

/// A directory of CSV files, one per sheet (`<dir>/<sheet>.csv`).
/// Rows and columns are 0-based; missing cells read as empty.
#[derive(Debug, Clone)]
pub struct CsvWorkbook {
    dir: PathBuf,
}

type Grid = Vec<Vec<String>>;

impl CsvWorkbook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CsvWorkbook { dir: dir.into() }
    }

    pub fn sheet_path(&self, sheet: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", sheet))
    }

    pub fn read_grid(&self, sheet: &str) -> Result<Grid> {
        let path = self.sheet_path(sheet);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;

        let mut grid = Vec::new();
        for record in rdr.records() {
            let record = record?;
            grid.push(record.iter().map(str::to_string).collect());
        }
        Ok(grid)
    }

    pub fn write_grid(&self, sheet: &str, grid: &Grid) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(Vec::new());
        for row in grid {
            wtr.write_record(row)?;
        }
        let data = wtr
            .into_inner()
            .map_err(|e| TallyError::Io(std::io::Error::other(e.to_string())))?;
        atomic_write(&self.sheet_path(sheet), &data)
    }

    /// Cell value, empty when outside the grid
    pub fn cell(&self, sheet: &str, row: usize, column: Column) -> Result<String> {
        let grid = self.read_grid(sheet)?;
        Ok(grid
            .get(row)
            .and_then(|r| r.get(column.index()))
            .cloned()
            .unwrap_or_default())
    }
}

fn set_cell(grid: &mut Grid, row: usize, column: usize, value: &str) {
    if grid.len() <= row {
        grid.resize(row + 1, Vec::new());
    }
    let cells = &mut grid[row];
    if cells.len() <= column {
        cells.resize(column + 1, String::new());
    }
    cells[column] = value.to_string();
}

/// Write through a temp file in the same directory, then rename over `path`
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl RosterSource for CsvWorkbook {
    fn read_column(&self, sheet: &str, column: Column, start_row: usize) -> Result<Vec<String>> {
        let grid = self.read_grid(sheet)?;
        let mut cells: Vec<String> = grid
            .iter()
            .skip(start_row)
            .map(|r| r.get(column.index()).cloned().unwrap_or_default())
            .collect();

        while cells.last().is_some_and(|c| c.trim().is_empty()) {
            cells.pop();
        }
        Ok(cells)
    }
}

impl SheetWriter for CsvWorkbook {
    fn write_batch(&self, sheet: &str, cells: &[CellWrite]) -> Result<usize> {
        let mut grid = self.read_grid(sheet)?;
        for cell in cells {
            set_cell(&mut grid, cell.row, cell.column.index(), &cell.value);
        }
        self.write_grid(sheet, &grid)?;
        Ok(cells.len())
    }

    fn write_cell(&self, sheet: &str, cell: &CellWrite) -> Result<()> {
        let mut grid = self.read_grid(sheet)?;
        set_cell(&mut grid, cell.row, cell.column.index(), &cell.value);
        self.write_grid(sheet, &grid)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Batch always fails; single writes fail for the listed names
    struct FlakyWriter {
        reject: HashSet<String>,
        written: Mutex<Vec<CellWrite>>,
    }

    impl FlakyWriter {
        fn new(reject: &[&str]) -> Self {
            FlakyWriter {
                reject: reject.iter().map(|s| s.to_string()).collect(),
                written: Mutex::new(Vec::new()),
            }
        }
    }

    impl SheetWriter for FlakyWriter {
        fn write_batch(&self, _sheet: &str, _cells: &[CellWrite]) -> Result<usize> {
            Err(TallyError::Io(std::io::Error::other("quota exceeded")))
        }

        fn write_cell(&self, _sheet: &str, cell: &CellWrite) -> Result<()> {
            if self.reject.contains(&cell.name) {
                return Err(TallyError::Io(std::io::Error::other("rejected")));
            }
            self.written.lock().unwrap().push(cell.clone());
            Ok(())
        }
    }

    fn create_test_records() -> Vec<AttendanceRecord> {
        vec![
            AttendanceRecord::present("Kim", 3, 10),
            AttendanceRecord::absent("Lee", 4, 10),
            AttendanceRecord::absent("Park", 5, 10),
        ]
    }

    fn create_test_workbook(dir: &Path) -> CsvWorkbook {
        let book = CsvWorkbook::new(dir);
        let grid: Grid = vec![
            vec!["No".into(), "Name".into()],
            vec!["1".into(), "Kim".into()],
            vec!["2".into(), " Lee ".into()],
            vec!["3".into(), "".into()],
            vec!["4".into(), "Park".into()],
        ];
        book.write_grid("roster", &grid).unwrap();
        book
    }

    #[test]
    fn test_cell_write_from_record() {
        let cell = CellWrite::from(&AttendanceRecord::absent("Lee", 4, 10));
        assert_eq!(cell.value, "X");
        assert_eq!(cell.column.letters(), "K");
        assert_eq!(cell.row, 4);
    }

    #[test]
    fn test_fallback_reports_failed_names() {
        let writer = FlakyWriter::new(&["Lee"]);
        let report = apply_updates(&writer, "Sheet1", &create_test_records(), Duration::ZERO);

        assert!(report.fell_back);
        assert_eq!(report.written, 2);
        assert_eq!(report.failed, vec!["Lee".to_string()]);
        assert!(!report.is_complete());
        assert_eq!(writer.written.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_batch_success() {
        let dir = tempfile::tempdir().unwrap();
        let book = create_test_workbook(dir.path());

        let report = apply_updates(&book, "roster", &create_test_records(), Duration::ZERO);
        assert_eq!(report, WriteReport { written: 3, failed: vec![], fell_back: false });

        assert_eq!(book.cell("roster", 3, Column::from_index(10)).unwrap(), "O");
        assert_eq!(book.cell("roster", 5, Column::from_index(10)).unwrap(), "X");
        assert_eq!(book.cell("roster", 0, Column::from_index(10)).unwrap(), "");
    }

    #[test]
    fn test_empty_update_is_a_no_op() {
        let writer = FlakyWriter::new(&[]);
        assert_eq!(apply_updates(&writer, "Sheet1", &[], Duration::ZERO), WriteReport::default());
    }

    #[test]
    fn test_load_roster_from_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let book = create_test_workbook(dir.path());

        let roster = load_roster(&book, "roster", Column::from_index(1), 1).unwrap();
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.row_of("Kim"), Some(1));
        assert_eq!(roster.row_of("Lee"), Some(2));
        assert_eq!(roster.row_of("Park"), Some(4));
    }

    #[test]
    fn test_missing_sheet_is_no_roster() {
        let dir = tempfile::tempdir().unwrap();
        let book = CsvWorkbook::new(dir.path());
        let err = load_roster(&book, "nowhere", Column::from_index(1), 1).unwrap_err();
        assert!(matches!(err, TallyError::NoRoster { .. }));
    }
}
