// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Scrollable grid state: cursor, offset and viewport math plus column width
//! balancing. Nothing here knows about records or terminals.

/// Cells reserved between and around columns.
pub const COLUMN_PADDING: usize = 1;
pub const MIN_COLUMN_WIDTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableWidget {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    cursor: usize,
    offset: usize,
    viewport: usize,
    width: usize,
    height: i32,
}

/// The rows visible for the current offset, padded to the viewport height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePage {
    pub rows: Vec<Vec<String>>,
    pub selected: Option<usize>,
}

impl TableWidget {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|header| (*header).to_owned()).collect(),
            rows: Vec::new(),
            cursor: 1,
            offset: 0,
            viewport: 0,
            width: 0,
            height: 0,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn viewport(&self) -> usize {
        self.viewport
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Zero-based index of the row under the cursor, if any row exists.
    pub fn selected_index(&self) -> Option<usize> {
        if self.rows.is_empty() {
            None
        } else {
            Some(self.cursor - 1)
        }
    }

    pub fn set_rows(&mut self, rows: Vec<Vec<String>>) {
        self.rows = rows;
        self.clamp();
    }

    pub fn resize(&mut self, width: usize, height: i32) {
        self.width = width;
        self.height = height;
        self.viewport = usize::try_from(height.max(0)).unwrap_or(0);
        self.clamp();
    }

    pub fn move_up(&mut self, step: usize) {
        if self.cursor <= 1 {
            return;
        }
        self.cursor = self.cursor.saturating_sub(step).max(1);
        if self.cursor <= self.offset {
            self.offset = self.cursor - 1;
        }
    }

    pub fn move_down(&mut self, step: usize) {
        let total = self.rows.len();
        if self.cursor >= total {
            return;
        }
        self.cursor = self.cursor.saturating_add(step).min(total);
        if self.cursor > self.offset + self.viewport {
            self.offset = self.cursor - self.viewport;
        }
    }

    pub fn move_top(&mut self) {
        self.cursor = 1;
        self.offset = 0;
    }

    pub fn move_bottom(&mut self) {
        let total = self.rows.len();
        if total == 0 {
            return;
        }
        self.move_down(total - self.cursor);
    }

    pub fn page_up(&mut self) {
        self.move_up(self.viewport.max(1));
    }

    pub fn page_down(&mut self) {
        self.move_down(self.viewport.max(1));
    }

    /// Put the cursor on a zero-based row index, scrolling it into view.
    pub fn select_index(&mut self, index: usize) {
        if index >= self.rows.len() {
            return;
        }
        self.cursor = index + 1;
        self.clamp();
    }

    pub fn page(&self) -> TablePage {
        let columns = self.headers.len();
        let end = (self.offset + self.viewport).min(self.rows.len());
        let start = self.offset.min(end);
        let mut rows: Vec<Vec<String>> = self.rows[start..end].to_vec();
        while rows.len() < self.viewport {
            rows.push(vec![String::new(); columns]);
        }

        let selected = if self.rows.is_empty() || self.cursor <= self.offset {
            None
        } else {
            Some(self.cursor - 1 - self.offset).filter(|index| *index < self.viewport)
        };
        TablePage { rows, selected }
    }

    pub fn column_widths(&self) -> Vec<usize> {
        let columns = self.headers.len();
        let padding = COLUMN_PADDING * columns;
        let available = self.width.saturating_sub(padding);

        let page = self.page();
        let natural = (0..columns)
            .map(|column| {
                let header = self.headers[column].chars().count();
                page.rows
                    .iter()
                    .filter_map(|row| row.get(column))
                    .map(|cell| cell.chars().count())
                    .fold(header, usize::max)
            })
            .collect::<Vec<_>>();

        balance_column_widths(&natural, available, MIN_COLUMN_WIDTH)
    }

    fn clamp(&mut self) {
        let total = self.rows.len();
        self.cursor = self.cursor.clamp(1, total.max(1));
        if self.cursor > self.offset + self.viewport {
            self.offset = self.cursor - self.viewport;
        }
        if self.cursor <= self.offset {
            self.offset = self.cursor - 1;
        }
        self.offset = self.offset.min(total.saturating_sub(self.viewport));
    }
}

/// Grow or shrink `natural` widths one cell at a time, round-robin, until they
/// sum to `available`. Every column falls back to `minimum` when even that
/// does not fit.
pub fn balance_column_widths(natural: &[usize], available: usize, minimum: usize) -> Vec<usize> {
    let columns = natural.len();
    if columns == 0 {
        return Vec::new();
    }
    if available < minimum * columns {
        return vec![minimum; columns];
    }

    let mut widths = natural
        .iter()
        .map(|width| (*width).max(minimum))
        .collect::<Vec<_>>();
    let total: usize = widths.iter().sum();

    if total < available {
        let mut remaining = available - total;
        let mut column = 0;
        while remaining > 0 {
            widths[column % columns] += 1;
            remaining -= 1;
            column += 1;
        }
    } else {
        let mut excess = total - available;
        let mut column = 0;
        while excess > 0 {
            let index = column % columns;
            if widths[index] > minimum {
                widths[index] -= 1;
                excess -= 1;
            }
            column += 1;
        }
    }
    widths
}
