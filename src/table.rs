use crate::datekey::DateKey;

/// One attendance cell. Blank cells stay a distinct state instead of the
/// workbook's mix of "P"/"A"/empty strings; the Total never lives in a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkState {
    Present,
    Absent,
    Empty,
}

impl MarkState {
    /// Single-letter form used in replies and the exported sheet.
    pub fn code(self) -> &'static str {
        match self {
            MarkState::Present => "P",
            MarkState::Absent => "A",
            MarkState::Empty => "",
        }
    }
}

/// Directory view of one roster row.
#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub name: String,
    pub roll_number: i64,
    pub row_position: usize,
}

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub roll_number: i64,
    pub name: String,
    /// One cell per date column, same order as `Table::columns`.
    pub cells: Vec<MarkState>,
    pub total: i64,
}

/// The in-memory register grid: one row per student, one column per date key
/// in first-use order, and a per-row Total that is always rendered after the
/// last date column. Invariants: roll numbers unique across rows, date keys
/// unique across columns, total == count of Present cells in the row.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<StudentRow>,
}

impl Table {
    pub fn find_row(&self, roll_number: i64) -> Option<usize> {
        self.rows.iter().position(|r| r.roll_number == roll_number)
    }

    pub fn student_record(&self, row: usize) -> StudentRecord {
        let r = &self.rows[row];
        StudentRecord {
            name: r.name.clone(),
            roll_number: r.roll_number,
            row_position: row,
        }
    }

    /// Column position for a date key, creating the column on first use.
    /// New columns go after every existing date column, i.e. immediately
    /// before the Total; first-use order is kept even when it is not
    /// calendar order.
    pub fn resolve_column(&mut self, key: &DateKey) -> (usize, bool) {
        let canonical = key.key();
        if let Some(pos) = self.columns.iter().position(|c| *c == canonical) {
            return (pos, false);
        }
        self.columns.push(canonical);
        for row in &mut self.rows {
            row.cells.push(MarkState::Empty);
        }
        (self.columns.len() - 1, true)
    }

    pub fn cell(&self, row: usize, col: usize) -> MarkState {
        self.rows[row].cells[col]
    }

    pub fn set_cell(&mut self, row: usize, col: usize, state: MarkState) {
        self.rows[row].cells[col] = state;
    }

    /// Total = Present count across the row's date columns.
    pub fn recompute_total(&mut self, row: usize) {
        let n = self.rows[row]
            .cells
            .iter()
            .filter(|c| **c == MarkState::Present)
            .count();
        self.rows[row].total = n as i64;
    }

    /// Appends a roster row with blank cells for every existing column.
    /// Caller checks `find_row` first; roll numbers must stay unique.
    pub fn add_student(&mut self, roll_number: i64, name: &str) -> usize {
        self.rows.push(StudentRow {
            roll_number,
            name: name.to_string(),
            cells: vec![MarkState::Empty; self.columns.len()],
            total: 0,
        });
        self.rows.len() - 1
    }

    pub fn student_names(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.name.as_str()).collect()
    }
}
