//! PDF rendering of an [`InvoiceLayout`] with genpdf.

use std::path::{Path, PathBuf};

use genpdf::elements::{Break, FrameCellDecorator, Paragraph, TableLayout};
use genpdf::style::Style;
use genpdf::{Alignment, Document, Element, PaperSize, SimplePageDecorator};
use tracing::debug;

use crate::error::{InvoiceError, Result};
use crate::layout::{InvoiceLayout, ITEM_HEADER};

/// Page margin in millimetres.
const PAGE_MARGIN_MM: i32 = 15;

/// Location of the TrueType font family used for rendering.
///
/// genpdf expects `<family>-Regular.ttf`, `<family>-Bold.ttf`,
/// `<family>-Italic.ttf` and `<family>-BoldItalic.ttf` in `dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSpec {
    /// Directory containing the font files.
    pub dir: PathBuf,
    /// Font family name (file name prefix).
    pub family: String,
}

impl FontSpec {
    /// Create a new font specification.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, family: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            family: family.into(),
        }
    }
}

/// Render an invoice layout to PDF bytes.
///
/// # Errors
///
/// Returns an error if the font family cannot be loaded or the document
/// cannot be rendered.
pub fn render_pdf(layout: &InvoiceLayout, font: &FontSpec) -> Result<Vec<u8>> {
    let family = genpdf::fonts::from_files(&font.dir, &font.family, None).map_err(|e| {
        InvoiceError::FontLoad {
            dir: font.dir.clone(),
            family: font.family.clone(),
            message: e.to_string(),
        }
    })?;

    let mut doc = Document::new(family);
    doc.set_title(layout.title.clone());
    doc.set_paper_size(PaperSize::A4);
    doc.set_font_size(10);

    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(PAGE_MARGIN_MM);
    doc.set_page_decorator(decorator);

    doc.push(
        Paragraph::new(layout.title.clone())
            .aligned(Alignment::Center)
            .styled(Style::new().bold().with_font_size(16)),
    );
    doc.push(Break::new(1.5));

    doc.push(metadata_table(layout)?);
    doc.push(Break::new(2));

    doc.push(
        Paragraph::new(layout.items_heading.clone()).styled(Style::new().bold().with_font_size(13)),
    );
    doc.push(Break::new(0.5));
    doc.push(items_table(layout)?);

    let mut buf = Vec::new();
    doc.render(&mut buf)?;
    debug!(bytes = buf.len(), title = %layout.title, "Rendered invoice");
    Ok(buf)
}

fn metadata_table(layout: &InvoiceLayout) -> Result<TableLayout> {
    // 60mm / 120mm in the printed form
    let mut table = TableLayout::new(vec![1, 2]);
    table.set_cell_decorator(FrameCellDecorator::new(true, true, false));

    for (label, value) in &layout.metadata {
        table
            .row()
            .element(
                Paragraph::new(label.clone())
                    .styled(Style::new().bold())
                    .padded(1),
            )
            .element(Paragraph::new(value.clone()).padded(1))
            .push()?;
    }

    Ok(table)
}

fn items_table(layout: &InvoiceLayout) -> Result<TableLayout> {
    let mut table = TableLayout::new(vec![16, 6, 5, 6]);
    table.set_cell_decorator(FrameCellDecorator::new(true, true, false));

    let header = Style::new().bold().italic();
    let mut row = table.row();
    for (idx, title) in ITEM_HEADER.iter().enumerate() {
        let cell = Paragraph::new(*title).aligned(if idx == 0 {
            Alignment::Left
        } else {
            Alignment::Right
        });
        row = row.element(cell.styled(header).padded(1));
    }
    row.push()?;

    for item in &layout.items {
        table
            .row()
            .element(Paragraph::new(item.name.clone()).padded(1))
            .element(
                Paragraph::new(item.price.clone())
                    .aligned(Alignment::Right)
                    .padded(1),
            )
            .element(
                Paragraph::new(item.quantity.clone())
                    .aligned(Alignment::Right)
                    .padded(1),
            )
            .element(
                Paragraph::new(item.amount.clone())
                    .aligned(Alignment::Right)
                    .padded(1),
            )
            .push()?;
    }

    let (label, amount) = &layout.total;
    table
        .row()
        .element(Paragraph::new("").padded(1))
        .element(Paragraph::new("").padded(1))
        .element(
            Paragraph::new(label.clone())
                .aligned(Alignment::Right)
                .styled(header)
                .padded(1),
        )
        .element(
            Paragraph::new(amount.clone())
                .aligned(Alignment::Right)
                .styled(header)
                .padded(1),
        )
        .push()?;

    Ok(table)
}
