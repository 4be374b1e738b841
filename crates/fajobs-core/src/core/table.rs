//! Fixed-width text tables.
//!
//! A [`Table`] keeps every row it has been given, but it can also be used in a
//! streaming fashion: [`Table::header_lines`] and the line returned by
//! [`Table::add_row`] can be written to an output sink as soon as they are produced,
//! which is how the job queue prints its live status table.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    header: String,
    width: usize,
    align: Alignment,
}

impl TableColumn {
    /// Creates a column; the width is widened to fit the header if needed.
    pub fn new(header: impl Into<String>, width: usize) -> Self {
        let header = header.into();
        let width = width.max(header.chars().count()).max(1);
        Self {
            header,
            width,
            align: Alignment::Left,
        }
    }

    pub fn align(mut self, align: Alignment) -> Self {
        self.align = align;
        self
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn format(&self, value: &str) -> String {
        let width = self.width;
        match self.align {
            Alignment::Left => format!("{:<width$}", value),
            Alignment::Right => format!("{:>width$}", value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStyle {
    pub spacing: usize,
    pub header_rule: Option<char>,
    pub border: Option<char>,
}

impl TableStyle {
    /// No outer borders, one space between columns, a rule under the header.
    pub const CONDENSED: TableStyle = TableStyle {
        spacing: 1,
        header_rule: Some('-'),
        border: None,
    };
}

#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<TableColumn>,
    style: TableStyle,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<TableColumn>, style: TableStyle) -> Self {
        Self {
            columns,
            style,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Lines that open the table: top border, headers and header rule.
    pub fn header_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(c) = self.style.border {
            lines.push(self.rule(c));
        }
        let headers: Vec<String> = self.columns.iter().map(|c| c.header.clone()).collect();
        lines.push(self.format_row(&headers));
        if let Some(c) = self.style.header_rule {
            lines.push(self.rule(c));
        }
        lines
    }

    /// Lines that close the table, if the style has a bottom border.
    pub fn footer_lines(&self) -> Vec<String> {
        self.style.border.map(|c| self.rule(c)).into_iter().collect()
    }

    /// Stores the row and returns its formatted line.
    ///
    /// Missing trailing cells are rendered empty; surplus cells are ignored.
    pub fn add_row(&mut self, row: Vec<String>) -> String {
        let line = self.format_row(&row);
        self.rows.push(row);
        line
    }

    pub fn format_row(&self, row: &[String]) -> String {
        let cells: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| col.format(row.get(i).map(String::as_str).unwrap_or("")))
            .collect();
        cells
            .join(&" ".repeat(self.style.spacing))
            .trim_end()
            .to_string()
    }

    fn rule(&self, c: char) -> String {
        self.columns
            .iter()
            .map(|col| c.to_string().repeat(col.width))
            .collect::<Vec<_>>()
            .join(&" ".repeat(self.style.spacing))
    }
}
