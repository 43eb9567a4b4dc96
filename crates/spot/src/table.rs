//! Tables.
//!
//! [`SpotAbstractTableElement`] describes a table by three locators (header
//! cells, rows, cells within a row) and builds every query on top of them.
//! Nothing is cached: headers and rows are read from the page on each call,
//! so a table that re-renders between two calls is always seen fresh.

use crate::element::WebElementWrapper;
use crate::locator::By;
use crate::result::{SpotError, SpotResult};

/// Generic table made of header cells, rows and cells.
///
/// Implementors provide the wrapper and the locators; all queries are
/// provided. Row indexes are 0-based positions among the matched rows.
pub trait SpotAbstractTableElement {
    /// Table element
    fn wrapper(&self) -> &WebElementWrapper;

    /// Header cells, relative to the table
    fn header_locator(&self) -> By;

    /// Body rows, relative to the table
    fn row_locator(&self) -> By;

    /// Cells, relative to a row
    fn cell_locator(&self) -> By;

    /// Header texts
    fn headers(&self) -> SpotResult<Vec<String>> {
        self.wrapper()
            .find_elements(&self.header_locator())?
            .iter()
            .map(WebElementWrapper::text)
            .collect()
    }

    /// Position of the column titled `name`.
    ///
    /// An exact match wins; otherwise the first case-insensitive match.
    fn column_index(&self, name: &str) -> SpotResult<usize> {
        let headers = self.headers()?;
        headers
            .iter()
            .position(|h| h == name)
            .or_else(|| headers.iter().position(|h| h.eq_ignore_ascii_case(name)))
            .ok_or_else(|| SpotError::ColumnNotFound {
                name: name.to_string(),
                headers,
            })
    }

    /// Body rows
    fn rows(&self) -> SpotResult<Vec<WebElementWrapper>> {
        self.wrapper().find_elements(&self.row_locator())
    }

    /// Number of body rows
    fn row_count(&self) -> SpotResult<usize> {
        Ok(self.rows()?.len())
    }

    /// Whether the table has no body row
    fn is_empty(&self) -> SpotResult<bool> {
        Ok(self.row_count()? == 0)
    }

    /// Row at `row`
    fn row(&self, row: usize) -> SpotResult<WebElementWrapper> {
        let rows = self.rows()?;
        let count = rows.len();
        rows.into_iter()
            .nth(row)
            .ok_or_else(|| SpotError::ElementNotFound {
                locator: format!("{} (row {row} of {count})", self.row_locator()),
            })
    }

    /// Cells of the row at `row`
    fn row_cells(&self, row: usize) -> SpotResult<Vec<WebElementWrapper>> {
        self.row(row)?.find_elements(&self.cell_locator())
    }

    /// Cell at `row` in the column titled `column`
    fn cell(&self, row: usize, column: &str) -> SpotResult<WebElementWrapper> {
        let index = self.column_index(column)?;
        self.row_cells(row)?
            .into_iter()
            .nth(index)
            .ok_or_else(|| SpotError::ElementNotFound {
                locator: format!("{} (row {row}, column '{column}')", self.cell_locator()),
            })
    }

    /// Text of the cell at `row` in the column titled `column`
    fn cell_text(&self, row: usize, column: &str) -> SpotResult<String> {
        self.cell(row, column)?.text()
    }

    /// Texts of one column, one entry per row (empty for short rows)
    fn column_values(&self, column: &str) -> SpotResult<Vec<String>> {
        let index = self.column_index(column)?;
        let cell_locator = self.cell_locator();
        self.rows()?
            .iter()
            .map(|row| match row.find_elements(&cell_locator)?.get(index) {
                Some(cell) => cell.text(),
                None => Ok(String::new()),
            })
            .collect()
    }

    /// Texts of the cells of one row
    fn row_texts(&self, row: usize) -> SpotResult<Vec<String>> {
        self.row_cells(row)?
            .iter()
            .map(WebElementWrapper::text)
            .collect()
    }

    /// Texts of every cell, row by row
    fn contents(&self) -> SpotResult<Vec<Vec<String>>> {
        let cell_locator = self.cell_locator();
        self.rows()?
            .iter()
            .map(|row| {
                row.find_elements(&cell_locator)?
                    .iter()
                    .map(WebElementWrapper::text)
                    .collect()
            })
            .collect()
    }

    /// First row whose `column` cell shows `value`
    fn find_row(&self, column: &str, value: &str) -> SpotResult<Option<usize>> {
        Ok(self.column_values(column)?.iter().position(|v| v == value))
    }

    /// First row matching every `(column, value)` pair
    fn find_row_matching(&self, criteria: &[(&str, &str)]) -> SpotResult<Option<usize>> {
        let mut columns = Vec::with_capacity(criteria.len());
        for (column, value) in criteria {
            columns.push((self.column_index(column)?, *value));
        }
        for (position, texts) in self.contents()?.iter().enumerate() {
            let matches = columns
                .iter()
                .all(|(index, value)| texts.get(*index).is_some_and(|text| text == value));
            if matches {
                return Ok(Some(position));
            }
        }
        Ok(None)
    }

    /// Wait until the table has at least `min_rows` rows; returns the count
    fn wait_for_rows(&self, min_rows: usize, timeout_ms: Option<u64>) -> SpotResult<usize> {
        let description = format!("at least {min_rows} row(s) of {}", self.row_locator());
        self.wrapper()
            .browser()
            .waiter_for(timeout_ms)
            .until(&description, || {
                let count = self.row_count()?;
                Ok((count >= min_rows).then_some(count))
            })
    }
}

/// Plain HTML table (`th`/`td`).
///
/// The header row is read from `thead`, or is the first row holding only
/// `th` cells when there is no `thead`.
#[derive(Debug, Clone)]
pub struct SpotTableElement {
    wrapper: WebElementWrapper,
    header: By,
    row: By,
    cell: By,
}

impl SpotTableElement {
    /// Wrap a `<table>` with the default locators
    #[must_use]
    pub fn new(wrapper: WebElementWrapper) -> Self {
        Self {
            wrapper,
            header: By::xpath("./thead/tr/th | ./tr[th and not(td)]/th | ./tbody/tr[th and not(td)]/th"),
            row: By::xpath("./tbody/tr[td] | ./tr[td]"),
            cell: By::xpath("./td"),
        }
    }

    /// Override the header cell locator
    #[must_use]
    pub fn with_header_locator(mut self, header: By) -> Self {
        self.header = header;
        self
    }

    /// Override the row locator
    #[must_use]
    pub fn with_row_locator(mut self, row: By) -> Self {
        self.row = row;
        self
    }

    /// Override the cell locator
    #[must_use]
    pub fn with_cell_locator(mut self, cell: By) -> Self {
        self.cell = cell;
        self
    }
}

impl SpotAbstractTableElement for SpotTableElement {
    fn wrapper(&self) -> &WebElementWrapper {
        &self.wrapper
    }

    fn header_locator(&self) -> By {
        self.header.clone()
    }

    fn row_locator(&self) -> By {
        self.row.clone()
    }

    fn cell_locator(&self) -> By {
        self.cell.clone()
    }
}
