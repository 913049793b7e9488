use printpdf::{BuiltinFont, Line, Mm, PdfDocument, Point};

use super::layout::{Layout, Op, PAGE_HEIGHT, PAGE_WIDTH};
use crate::error::AppError;

/// Draws a finished layout and returns the PDF file bytes.
pub fn render(layout: &Layout) -> Result<Vec<u8>, AppError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(&layout.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

    for (i, ops) in layout.pages().iter().enumerate() {
        let layer = if i == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            doc.get_page(page).get_layer(layer)
        };

        for op in ops {
            match op {
                Op::Text {
                    x,
                    y,
                    size,
                    bold: is_bold,
                    text,
                } => {
                    let font = if *is_bold { &bold } else { &regular };
                    layer.use_text(text.as_str(), *size, Mm(*x), Mm(*y), font);
                }
                Op::Rule { x1, x2, y } => {
                    layer.set_outline_thickness(0.5);
                    layer.add_line(Line {
                        points: vec![
                            (Point::new(Mm(*x1), Mm(*y)), false),
                            (Point::new(Mm(*x2), Mm(*y)), false),
                        ],
                        is_closed: false,
                    });
                }
            }
        }
    }

    Ok(doc.save_to_bytes()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::layout::Column;

    #[test]
    fn renders_multi_page_pdf() {
        let mut layout = Layout::new("Test");
        layout.title_bar("INVOICE", "INV/2026-27/0001");
        let rows: Vec<Vec<String>> = (0..70).map(|i| vec![format!("Item {i}")]).collect();
        layout.table(&[Column::left("Item", 1.0)], &rows);
        assert!(layout.pages().len() > 1);

        let bytes = render(&layout).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
