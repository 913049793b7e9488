//! Positions text and rules on A4 pages.
//!
//! Coordinates are millimetres from the bottom-left corner, as PDF expects.
//! Nothing here touches a PDF library, so layouts can be checked in tests.

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
pub const MARGIN: f32 = 15.0;

const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const TOP: f32 = PAGE_HEIGHT - MARGIN;
const BOTTOM: f32 = MARGIN + 10.0;
const PT_TO_MM: f32 = 0.3528;
/// Average Helvetica glyph width as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.5;

pub const BODY_SIZE: f32 = 10.0;
const ROW_HEIGHT: f32 = 6.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Text {
        x: f32,
        y: f32,
        size: f32,
        bold: bool,
        text: String,
    },
    Rule {
        x1: f32,
        x2: f32,
        y: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    pub title: &'a str,
    /// Share of the content width.
    pub width: f32,
    pub align: Align,
}

impl<'a> Column<'a> {
    pub fn left(title: &'a str, width: f32) -> Self {
        Self {
            title,
            width,
            align: Align::Left,
        }
    }

    pub fn right(title: &'a str, width: f32) -> Self {
        Self {
            title,
            width,
            align: Align::Right,
        }
    }
}

/// Approximate rendered width of `text` in millimetres.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * GLYPH_WIDTH * PT_TO_MM
}

/// Cuts `text` so it fits in `width` millimetres, marking the cut with "..".
pub fn fit(text: &str, width: f32, size: f32) -> String {
    if text_width(text, size) <= width {
        return text.to_string();
    }
    let max_chars = (width / (size * GLYPH_WIDTH * PT_TO_MM)) as usize;
    let kept: String = text.chars().take(max_chars.saturating_sub(2)).collect();
    format!("{kept}..")
}

#[derive(Debug)]
pub struct Layout {
    pub title: String,
    pages: Vec<Vec<Op>>,
    y: f32,
}

impl Layout {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            pages: vec![Vec::new()],
            y: TOP,
        }
    }

    pub fn pages(&self) -> &[Vec<Op>] {
        &self.pages
    }

    pub fn cursor(&self) -> f32 {
        self.y
    }

    fn push(&mut self, op: Op) {
        if let Some(page) = self.pages.last_mut() {
            page.push(op);
        }
    }

    fn text(&mut self, x: f32, size: f32, bold: bool, text: &str) {
        let y = self.y;
        self.push(Op::Text {
            x,
            y,
            size,
            bold,
            text: text.to_string(),
        });
    }

    fn right_text(&mut self, right_edge: f32, size: f32, bold: bool, text: &str) {
        let x = right_edge - text_width(text, size);
        self.text(x, size, bold, text);
    }

    pub fn page_break(&mut self) {
        self.pages.push(Vec::new());
        self.y = TOP;
    }

    /// Starts a new page unless `height` more millimetres fit on this one.
    pub fn ensure_space(&mut self, height: f32) -> bool {
        if self.y - height < BOTTOM {
            self.page_break();
            true
        } else {
            false
        }
    }

    pub fn space(&mut self, height: f32) {
        self.y -= height;
    }

    pub fn heading(&mut self, text: &str, size: f32) {
        let height = size * PT_TO_MM + 3.0;
        self.ensure_space(height);
        self.y -= size * PT_TO_MM;
        self.text(MARGIN, size, true, text);
        self.y -= 3.0;
    }

    /// Heading on the left with a reference (number, date) on the right.
    pub fn title_bar(&mut self, title: &str, reference: &str) {
        let size = 16.0;
        self.ensure_space(size * PT_TO_MM + 6.0);
        self.y -= size * PT_TO_MM;
        self.text(MARGIN, size, true, title);
        self.right_text(PAGE_WIDTH - MARGIN, BODY_SIZE, true, reference);
        self.y -= 3.0;
        self.rule();
        self.y -= 3.0;
    }

    pub fn line(&mut self, text: &str) {
        self.ensure_space(ROW_HEIGHT);
        self.y -= ROW_HEIGHT - 1.5;
        let fitted = fit(text, CONTENT_WIDTH, BODY_SIZE);
        self.text(MARGIN, BODY_SIZE, false, &fitted);
        self.y -= 1.5;
    }

    pub fn rule(&mut self) {
        let y = self.y;
        self.push(Op::Rule {
            x1: MARGIN,
            x2: PAGE_WIDTH - MARGIN,
            y,
        });
    }

    /// Label/value pairs in a two-column block. Empty values are skipped.
    pub fn key_values(&mut self, pairs: &[(&str, String)]) {
        let label_width = CONTENT_WIDTH * 0.3;
        for (label, value) in pairs.iter().filter(|(_, v)| !v.is_empty()) {
            self.ensure_space(ROW_HEIGHT);
            self.y -= ROW_HEIGHT - 1.5;
            self.text(MARGIN, BODY_SIZE, true, label);
            let fitted = fit(value, CONTENT_WIDTH - label_width, BODY_SIZE);
            self.text(MARGIN + label_width, BODY_SIZE, false, &fitted);
            self.y -= 1.5;
        }
    }

    /// A table whose header repeats at the top of every page it spills onto.
    pub fn table(&mut self, columns: &[Column], rows: &[Vec<String>]) {
        let total: f32 = columns.iter().map(|c| c.width).sum();
        let widths: Vec<f32> = columns
            .iter()
            .map(|c| CONTENT_WIDTH * c.width / total)
            .collect();

        self.ensure_space(ROW_HEIGHT * 2.0);
        self.table_header(columns, &widths);
        for row in rows {
            if self.ensure_space(ROW_HEIGHT) {
                self.table_header(columns, &widths);
            }
            self.y -= ROW_HEIGHT - 1.5;
            self.table_row(columns, &widths, row, false);
            self.y -= 1.5;
        }
        self.rule();
        self.y -= 2.0;
    }

    fn table_header(&mut self, columns: &[Column], widths: &[f32]) {
        self.y -= ROW_HEIGHT - 1.5;
        let titles: Vec<String> = columns.iter().map(|c| c.title.to_string()).collect();
        self.table_row(columns, widths, &titles, true);
        self.y -= 1.5;
        self.rule();
    }

    fn table_row(&mut self, columns: &[Column], widths: &[f32], cells: &[String], bold: bool) {
        let mut x = MARGIN;
        for ((column, width), cell) in columns.iter().zip(widths).zip(cells) {
            let fitted = fit(cell, width - 2.0, BODY_SIZE);
            match column.align {
                Align::Left => self.text(x, BODY_SIZE, bold, &fitted),
                Align::Right => self.right_text(x + width - 1.0, BODY_SIZE, bold, &fitted),
            }
            x += width;
        }
    }

    /// Right-aligned label/amount lines under a table. The last line is bold.
    pub fn totals(&mut self, lines: &[(&str, String)]) {
        let right = PAGE_WIDTH - MARGIN;
        let label_edge = right - 40.0;
        for (i, (label, amount)) in lines.iter().enumerate() {
            let bold = i + 1 == lines.len();
            self.ensure_space(ROW_HEIGHT);
            self.y -= ROW_HEIGHT - 1.5;
            self.right_text(label_edge, BODY_SIZE, bold, label);
            self.right_text(right, BODY_SIZE, bold, amount);
            self.y -= 1.5;
        }
    }
}

/// Formats an amount with Indian digit grouping: `12,34,567.50`.
pub fn format_amount(value: f64) -> String {
    let negative = value < 0.0;
    let fixed = format!("{:.2}", value.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::new();
    let digits: Vec<char> = whole.chars().collect();
    let head = digits.len().saturating_sub(3);
    for (i, c) in digits[..head].iter().enumerate() {
        if i > 0 && (head - i) % 2 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }
    if head > 0 {
        grouped.push(',');
    }
    grouped.extend(&digits[head..]);

    format!("{}{grouped}.{fraction}", if negative { "-" } else { "" })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(layout: &Layout) -> Vec<String> {
        layout
            .pages()
            .iter()
            .flatten()
            .filter_map(|op| match op {
                Op::Text { text, .. } => Some(text.clone()),
                Op::Rule { .. } => None,
            })
            .collect()
    }

    #[test]
    fn amounts_use_indian_grouping() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(999.5), "999.50");
        assert_eq!(format_amount(1000.0), "1,000.00");
        assert_eq!(format_amount(123456.0), "1,23,456.00");
        assert_eq!(format_amount(12345678.9), "1,23,45,678.90");
        assert_eq!(format_amount(-2500.0), "-2,500.00");
    }

    #[test]
    fn long_text_is_cut_to_width() {
        let long = "A".repeat(200);
        let fitted = fit(&long, 50.0, BODY_SIZE);
        assert!(fitted.ends_with(".."));
        assert!(text_width(&fitted, BODY_SIZE) <= 50.0);
        assert_eq!(fit("Goa", 50.0, BODY_SIZE), "Goa");
    }

    #[test]
    fn cursor_moves_down_the_page() {
        let mut layout = Layout::new("Receipt");
        let start = layout.cursor();
        layout.heading("Travel Desk", 14.0);
        layout.key_values(&[("Client", "Ravi".into()), ("Phone", String::new())]);
        assert!(layout.cursor() < start);
        let all = texts(&layout);
        assert!(all.contains(&"Client".to_string()));
        assert!(!all.contains(&"Phone".to_string()));
    }

    #[test]
    fn long_tables_repeat_header_on_new_page() {
        let mut layout = Layout::new("Invoice");
        let columns = [Column::left("Description", 3.0), Column::right("Amount", 1.0)];
        let rows: Vec<Vec<String>> = (0..80)
            .map(|i| vec![format!("Line {i}"), format_amount(100.0)])
            .collect();
        layout.table(&columns, &rows);

        assert!(layout.pages().len() >= 2);
        for page in layout.pages() {
            assert!(page
                .iter()
                .any(|op| matches!(op, Op::Text { text, bold: true, .. } if text == "Description")));
            for op in page {
                if let Op::Text { y, .. } = op {
                    assert!(*y >= BOTTOM - ROW_HEIGHT && *y <= PAGE_HEIGHT);
                }
            }
        }
        assert_eq!(texts(&layout).iter().filter(|t| t.starts_with("Line ")).count(), 80);
    }

    #[test]
    fn right_aligned_cells_end_at_column_edge() {
        let mut layout = Layout::new("t");
        layout.table(&[Column::right("Amount", 1.0)], &[vec!["1,000.00".into()]]);
        let edge = PAGE_WIDTH - MARGIN - 1.0;
        let op = layout.pages()[0]
            .iter()
            .find(|op| matches!(op, Op::Text { text, .. } if text == "1,000.00"));
        match op {
            Some(Op::Text { x, text, size, .. }) => {
                assert!((x + text_width(text, *size) - edge).abs() < 0.01)
            }
            other => panic!("amount not laid out: {other:?}"),
        }
    }
}
