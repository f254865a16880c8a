//! crates/bitacora_core/src/export.rs
//!
//! Spreadsheet and printable-document renderings of log-books and expenses.
//!
//! Sheets are built as typed rows and written as XLSX workbooks. Documents
//! are a flat list of items that gets split into A4 pages and drawn as PDF;
//! signature, evidence and receipt images are embedded.

use crate::attachments::decode_image;
use crate::domain::{Expense, ExpenseCategory};
use crate::logbook::LogBookEntry;
use printpdf::image_crate::{self, DynamicImage, RgbImage};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfLayerReference,
};
use rust_xlsxwriter::{Format, Workbook, XlsxError};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("No se pudo generar la hoja de cálculo: {0}")]
    Spreadsheet(#[from] XlsxError),
    #[error("No se pudo generar el PDF: {0}")]
    Pdf(String),
}

fn pdf_error<E: std::fmt::Debug>(e: E) -> ExportError {
    ExportError::Pdf(format!("{:?}", e))
}

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

fn date_or_dash(date: Option<&str>) -> String {
    date.filter(|d| !d.is_empty()).unwrap_or("-").to_string()
}

pub fn category_label(category: ExpenseCategory) -> &'static str {
    match category {
        ExpenseCategory::Fuel => "Combustible",
        ExpenseCategory::Food => "Alimentos",
        ExpenseCategory::Tolls => "Casetas",
        ExpenseCategory::Maintenance => "Mantenimiento",
        ExpenseCategory::Others => "Otros",
        ExpenseCategory::Maniobras => "Maniobras",
        ExpenseCategory::Claves => "Claves",
    }
}

/// Keeps letters, digits, `-` and `_` so the value is safe in a
/// `Content-Disposition` filename.
pub fn file_stem(value: &str) -> String {
    let stem: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "sin_folio".to_string()
    } else {
        stem
    }
}

//=========================================================================================
// Spreadsheets
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    /// A number shown with two decimals and thousands separators.
    Money(f64),
}

impl Cell {
    fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }
}

/// One worksheet: a bold header row followed by data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: &'static str,
    pub headers: &'static [&'static str],
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn to_xlsx(&self) -> Result<Vec<u8>, ExportError> {
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();
        let money = Format::new().set_num_format("#,##0.00");

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(self.name)?;
        for (col, title) in self.headers.iter().enumerate() {
            let col = col as u16;
            worksheet.write_string_with_format(0, col, *title, &header)?;
            worksheet.set_column_width(col, 18.0)?;
        }
        for (index, row) in self.rows.iter().enumerate() {
            let r = index as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                let col = col as u16;
                match cell {
                    Cell::Text(text) => worksheet.write_string(r, col, text.as_str())?,
                    Cell::Number(n) => worksheet.write_number(r, col, *n)?,
                    Cell::Money(n) => worksheet.write_number_with_format(r, col, *n, &money)?,
                };
            }
        }
        Ok(workbook.save_to_buffer()?)
    }
}

const LOGBOOK_HEADERS: &[&str] = &[
    "Fecha",
    "Cliente",
    "Viaje",
    "Unidad",
    "Operador",
    "Distancia (km)",
    "Total",
    "Efectivo",
    "Electrónico",
    "Destinos",
];

const EXPENSE_HEADERS: &[&str] = &[
    "ID",
    "Fecha",
    "Operador",
    "Categoría",
    "Monto",
    "Estado",
    "Descripción",
    "Rendimiento",
];

/// One row per completed log-book.
pub fn logbooks_sheet(entries: &[LogBookEntry]) -> Sheet {
    let rows = entries
        .iter()
        .map(|entry| {
            let r = &entry.record;
            vec![
                Cell::text(date_or_dash(r.form.departure_date.as_deref())),
                Cell::text(r.form.client.as_str()),
                Cell::text(r.form.trip_num.as_str()),
                Cell::text(r.form.unit_eco.as_str()),
                Cell::text(r.form.operator_name.as_str()),
                Cell::Number(r.form.total_distance),
                Cell::Money(r.totals.total_expenses),
                Cell::Money(r.totals.subtotal_cash),
                Cell::Money(r.totals.subtotal_electronic),
                Cell::text(r.form.destinations.as_str()),
            ]
        })
        .collect();
    Sheet {
        name: "Bitácoras",
        headers: LOGBOOK_HEADERS,
        rows,
    }
}

pub fn expenses_sheet(expenses: &[Expense]) -> Sheet {
    let rows = expenses
        .iter()
        .map(|e| {
            vec![
                Cell::text(e.id.to_string()),
                Cell::text(e.date.as_str()),
                Cell::text(e.operator_name.as_str()),
                Cell::text(category_label(e.category)),
                Cell::Money(e.amount),
                Cell::text(e.status.as_str().to_uppercase()),
                Cell::text(e.description.as_str()),
                match e.performance {
                    Some(p) => Cell::Number(p),
                    None => Cell::text("N/A"),
                },
            ]
        })
        .collect();
    Sheet {
        name: "Gastos",
        headers: EXPENSE_HEADERS,
        rows,
    }
}

//=========================================================================================
// Printable Documents
//=========================================================================================

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 14.0;
/// Below the title band repeated on every page.
pub const CONTENT_TOP: f32 = PAGE_HEIGHT - MARGIN - 16.0;
/// Above the footer line.
pub const CONTENT_BOTTOM: f32 = 20.0;
const LINE: f32 = 5.0;
const VALUE_X: f32 = 95.0;
const VALUE_CHARS: usize = 55;
const TEXT_CHARS: usize = 95;
const MM_PER_INCH: f32 = 25.4;
const IMAGE_MAX_WIDTH: f32 = 70.0;
const IMAGE_MAX_HEIGHT: f32 = 45.0;
const FOOTER: &str = "Documento generado por el sistema de bitácoras de flota.";

#[derive(Debug, Clone)]
pub enum DocItem {
    Heading(String),
    Row { label: String, value: String },
    Total { label: String, value: String },
    Text(String),
    /// Already flattened onto white, since PDF images carry no alpha here.
    Image { caption: String, pixels: RgbImage },
}

/// Word-wraps `text` to at most `width` characters per line. Always yields
/// at least one line.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let word: String = word.into_iter().collect();
        let needed = current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn image_dpi(pixels: &RgbImage) -> f32 {
    let (w, h) = pixels.dimensions();
    let fit_width = w as f32 * MM_PER_INCH / IMAGE_MAX_WIDTH;
    let fit_height = h as f32 * MM_PER_INCH / IMAGE_MAX_HEIGHT;
    fit_width.max(fit_height).max(300.0)
}

fn image_height(pixels: &RgbImage) -> f32 {
    pixels.height() as f32 * MM_PER_INCH / image_dpi(pixels)
}

impl DocItem {
    fn row(label: &str, value: impl Into<String>) -> Self {
        DocItem::Row {
            label: label.to_string(),
            value: value.into(),
        }
    }

    /// Vertical space the item takes, in millimetres.
    pub fn height(&self) -> f32 {
        match self {
            DocItem::Heading(_) => 9.0,
            DocItem::Row { value, .. } => wrap(value, VALUE_CHARS).len() as f32 * LINE,
            DocItem::Total { .. } => 8.0,
            DocItem::Text(text) => wrap(text, TEXT_CHARS).len() as f32 * LINE,
            DocItem::Image { pixels, .. } => LINE + image_height(pixels) + 3.0,
        }
    }
}

/// Decodes an image payload and composites it over white.
fn flatten_image(payload: &str) -> Option<RgbImage> {
    let decoded = decode_image(payload).ok()?;
    let rgba = image_crate::load_from_memory(&decoded.bytes).ok()?.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        let over_white = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        rgb.put_pixel(
            x,
            y,
            image_crate::Rgb([over_white(r), over_white(g), over_white(b)]),
        );
    }
    Some(rgb)
}

/// An item placed on a page; `top` is measured from the bottom edge.
#[derive(Debug, Clone, Copy)]
pub struct Placed<'a> {
    pub item: &'a DocItem,
    pub top: f32,
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn draw_lines(
    layer: &PdfLayerReference,
    lines: &[String],
    size: f32,
    x: f32,
    first_baseline: f32,
    font: &IndirectFontRef,
) {
    for (i, line) in lines.iter().enumerate() {
        layer.use_text(
            line.as_str(),
            size,
            Mm(x),
            Mm(first_baseline - i as f32 * LINE),
            font,
        );
    }
}

fn draw(layer: &PdfLayerReference, placed: &Placed<'_>, fonts: &Fonts) {
    let top = placed.top;
    match placed.item {
        DocItem::Heading(text) => {
            layer.use_text(text.to_uppercase(), 10.0, Mm(MARGIN), Mm(top - 7.0), &fonts.bold);
        }
        DocItem::Row { label, value } => {
            layer.use_text(label.as_str(), 9.0, Mm(MARGIN), Mm(top - 4.0), &fonts.regular);
            draw_lines(layer, &wrap(value, VALUE_CHARS), 9.0, VALUE_X, top - 4.0, &fonts.bold);
        }
        DocItem::Total { label, value } => {
            layer.use_text(label.as_str(), 11.0, Mm(MARGIN), Mm(top - 6.0), &fonts.bold);
            layer.use_text(value.as_str(), 11.0, Mm(VALUE_X), Mm(top - 6.0), &fonts.bold);
        }
        DocItem::Text(text) => {
            draw_lines(layer, &wrap(text, TEXT_CHARS), 9.0, MARGIN, top - 4.0, &fonts.regular);
        }
        DocItem::Image { caption, pixels } => {
            layer.use_text(caption.as_str(), 9.0, Mm(MARGIN), Mm(top - 4.0), &fonts.regular);
            let bottom = top - LINE - image_height(pixels);
            Image::from_dynamic_image(&DynamicImage::ImageRgb8(pixels.clone())).add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(Mm(MARGIN)),
                    translate_y: Some(Mm(bottom)),
                    dpi: Some(image_dpi(pixels)),
                    ..Default::default()
                },
            );
        }
    }
}

/// A printable record: a title band with a status badge, then items.
#[derive(Debug, Clone)]
pub struct PrintDocument {
    pub title: String,
    pub badge: String,
    /// Download name, including the `.pdf` extension.
    pub filename: String,
    pub items: Vec<DocItem>,
}

impl PrintDocument {
    /// Splits the items into A4 pages, top to bottom. An item never straddles
    /// a page break; one taller than a whole page gets a page of its own.
    pub fn pages(&self) -> Vec<Vec<Placed<'_>>> {
        let mut pages = Vec::new();
        let mut current = Vec::new();
        let mut cursor = CONTENT_TOP;
        for item in &self.items {
            let height = item.height();
            if cursor - height < CONTENT_BOTTOM && !current.is_empty() {
                pages.push(std::mem::take(&mut current));
                cursor = CONTENT_TOP;
            }
            current.push(Placed { item, top: cursor });
            cursor -= height;
        }
        pages.push(current);
        pages
    }

    pub fn to_pdf(&self) -> Result<Vec<u8>, ExportError> {
        let pages = self.pages();
        let (doc, first_page, first_layer) = PdfDocument::new(
            self.title.as_str(),
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            "Contenido",
        );
        let fonts = Fonts {
            regular: doc
                .add_builtin_font(BuiltinFont::Helvetica)
                .map_err(pdf_error)?,
            bold: doc
                .add_builtin_font(BuiltinFont::HelveticaBold)
                .map_err(pdf_error)?,
        };

        let count = pages.len();
        for (index, placed) in pages.iter().enumerate() {
            let (page, layer) = if index == 0 {
                (first_page, first_layer)
            } else {
                doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Contenido")
            };
            let layer = doc.get_page(page).get_layer(layer);

            let band = PAGE_HEIGHT - MARGIN - 6.0;
            layer.use_text(self.title.as_str(), 15.0, Mm(MARGIN), Mm(band), &fonts.bold);
            layer.use_text(
                self.badge.as_str(),
                10.0,
                Mm(PAGE_WIDTH - MARGIN - 35.0),
                Mm(band),
                &fonts.bold,
            );
            for item in placed {
                draw(&layer, item, &fonts);
            }
            layer.use_text(
                format!("{}  Página {} de {}", FOOTER, index + 1, count),
                8.0,
                Mm(MARGIN),
                Mm(10.0),
                &fonts.regular,
            );
        }
        doc.save_to_bytes().map_err(pdf_error)
    }
}

/// The printable log-book: general data, odometer, itemised expenses,
/// inspection, compliance, the operator's signature and evidence photos.
pub fn logbook_document(entry: &LogBookEntry) -> PrintDocument {
    let r = &entry.record;
    let f = &r.form;
    let mut items = vec![
        DocItem::Heading("Datos generales".to_string()),
        DocItem::row("No. de viaje", f.trip_num.as_str()),
        DocItem::row("Cliente", f.client.as_str()),
        DocItem::row("Unidad", f.unit_eco.as_str()),
        DocItem::row("Operador", f.operator_name.as_str()),
        DocItem::row("Destinos", f.destinations.as_str()),
        DocItem::row("Fecha de salida", date_or_dash(f.departure_date.as_deref())),
        DocItem::row("Entrega de documentos", date_or_dash(f.doc_delivery_date.as_deref())),
        DocItem::row("Entrega de bitácora", date_or_dash(f.log_delivery_date.as_deref())),
        DocItem::Heading("Odómetro".to_string()),
        DocItem::row("Inicial", format!("{}", f.odo_initial)),
        DocItem::row("Distancia recorrida (km)", format!("{}", f.total_distance)),
        DocItem::row("Final", format!("{}", r.odo_final)),
        DocItem::Heading("Gastos".to_string()),
    ];

    for (label, value) in f.expenses.electronic_lines() {
        items.push(DocItem::row(label, money(value)));
    }
    items.push(DocItem::row(
        "Litros (Tarjeta)",
        format!("{}", f.expenses.fuel_card_liters),
    ));
    items.push(DocItem::row(
        "Subtotal electrónico",
        money(r.totals.subtotal_electronic),
    ));
    for (label, value) in f.expenses.cash_lines() {
        items.push(DocItem::row(label, money(value)));
    }
    items.push(DocItem::row("Subtotal efectivo", money(r.totals.subtotal_cash)));
    items.push(DocItem::Total {
        label: "TOTAL DE GASTOS".to_string(),
        value: format!("${}", money(r.totals.total_expenses)),
    });

    if !f.other_expenses.is_empty() {
        items.push(DocItem::Heading("Otros gastos (informativos)".to_string()));
        for other in &f.other_expenses {
            items.push(DocItem::row(&other.description, money(other.amount)));
        }
    }

    let inspection: Vec<String> = f
        .inspection
        .items()
        .iter()
        .map(|(label, ok)| format!("{}: {}", label, if *ok { "OK" } else { "FALLA" }))
        .collect();
    items.push(DocItem::Heading("Inspección de unidad".to_string()));
    items.push(DocItem::Text(inspection.join(" - ")));

    let yes_no = |b: bool| if b { "Sí" } else { "No" };
    items.push(DocItem::Heading("Cumplimiento".to_string()));
    for (label, flag) in [
        ("Combustible", f.compliance.eval_fuel_compliance),
        ("Documentación", f.compliance.eval_docs_compliance),
        ("Presentado a carga", f.compliance.presented_at_load),
        ("Ruta en tiempo", f.compliance.on_time_route),
        ("Evidencia de disciplina", f.compliance.discipline_evidence),
        ("Cumplimiento final", f.compliance.final_compliance),
    ] {
        items.push(DocItem::row(label, yes_no(flag)));
    }

    items.push(DocItem::Heading("Firma del operador".to_string()));
    match f.signature.as_deref().and_then(flatten_image) {
        Some(pixels) => items.push(DocItem::Image {
            caption: f.operator_name.clone(),
            pixels,
        }),
        None => items.push(DocItem::Text(format!("Sin firma. {}", f.operator_name))),
    }

    let evidence: Vec<RgbImage> = f
        .evidence_urls
        .iter()
        .filter_map(|e| flatten_image(e))
        .collect();
    if !evidence.is_empty() {
        items.push(DocItem::Heading("Evidencias".to_string()));
        for (i, pixels) in evidence.into_iter().enumerate() {
            items.push(DocItem::Image {
                caption: format!("Evidencia {}", i + 1),
                pixels,
            });
        }
    }

    PrintDocument {
        title: format!("Bitácora de viaje {}", f.trip_num),
        badge: r.status.label().to_string(),
        filename: format!("Bitacora_{}.pdf", file_stem(&f.trip_num)),
        items,
    }
}

pub fn expense_document(expense: &Expense) -> PrintDocument {
    let mut items = vec![
        DocItem::Heading("Comprobante de gasto".to_string()),
        DocItem::row("Folio", expense.id.to_string()),
        DocItem::row("Fecha", expense.date.as_str()),
        DocItem::row("Operador", expense.operator_name.as_str()),
        DocItem::row("Viaje", expense.trip_id.as_str()),
        DocItem::row("Categoría", category_label(expense.category)),
        DocItem::row("Descripción", expense.description.as_str()),
        DocItem::row("Monto", format!("${}", money(expense.amount))),
    ];
    if expense.category == ExpenseCategory::Fuel {
        if let Some(liters) = expense.diesel_liters {
            items.push(DocItem::row("Litros", format!("{}", liters)));
        }
        if let Some(price) = expense.unit_price {
            items.push(DocItem::row("Precio por litro", money(price)));
        }
        if let Some(odometer) = expense.odometer {
            items.push(DocItem::row("Odómetro", format!("{}", odometer)));
        }
        items.push(DocItem::row(
            "Rendimiento",
            expense
                .performance
                .map(|p| format!("{:.2}", p))
                .unwrap_or_else(|| "N/A".to_string()),
        ));
    }
    if let Some(pixels) = expense.receipt_url.as_deref().and_then(flatten_image) {
        items.push(DocItem::Image {
            caption: "Comprobante".to_string(),
            pixels,
        });
    }

    PrintDocument {
        title: "Reporte de gasto".to_string(),
        badge: expense.status.as_str().to_uppercase(),
        filename: format!("Gasto_{}.pdf", expense.id),
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExpenseStatus;
    use crate::logbook::{LogBookForm, LogBookRecord, LogBookStatus};
    use chrono::Utc;
    use uuid::Uuid;

    // 1x1 transparent PNG
    const PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    fn expense(performance: Option<f64>) -> Expense {
        Expense {
            id: Uuid::nil(),
            trip_id: "T-100".to_string(),
            operator_id: "op-1".to_string(),
            operator_name: "Ana López".to_string(),
            category: ExpenseCategory::Fuel,
            amount: 1225.0,
            date: "2025-04-01".to_string(),
            description: "Carga en \"La Pila\", km 40".to_string(),
            status: ExpenseStatus::Approved,
            unit_price: Some(24.5),
            diesel_liters: Some(50.0),
            odometer: Some(500.0),
            performance,
            receipt_url: None,
        }
    }

    fn entry(form: LogBookForm, status: LogBookStatus) -> LogBookEntry {
        LogBookEntry {
            id: Uuid::new_v4(),
            record: LogBookRecord::commit(&form, status, Utc::now()),
        }
    }

    fn texts(doc: &PrintDocument) -> Vec<String> {
        doc.items
            .iter()
            .filter_map(|item| match item {
                DocItem::Heading(t) | DocItem::Text(t) => Some(t.clone()),
                DocItem::Row { label, value } | DocItem::Total { label, value } => {
                    Some(format!("{}={}", label, value))
                }
                DocItem::Image { .. } => None,
            })
            .collect()
    }

    #[test]
    fn expense_sheet_marks_missing_performance() {
        let sheet = expenses_sheet(&[expense(Some(0.5)), expense(None)]);
        assert_eq!(sheet.name, "Gastos");
        assert_eq!(sheet.headers[..3], ["ID", "Fecha", "Operador"]);
        assert_eq!(sheet.rows[0][3], Cell::text("Combustible"));
        assert_eq!(sheet.rows[0][6], Cell::text("Carga en \"La Pila\", km 40"));
        assert_eq!(sheet.rows[0][7], Cell::Number(0.5));
        assert_eq!(sheet.rows[1][7], Cell::text("N/A"));
    }

    #[test]
    fn logbook_sheet_uses_recomputed_totals() {
        let mut form = LogBookForm {
            client: "Aceros MX".to_string(),
            ..Default::default()
        };
        form.expenses.fuel_card_amount = 100.0;
        form.expenses.food_amount = 40.0;
        let sheet = logbooks_sheet(&[entry(form, LogBookStatus::Completed)]);
        let row = &sheet.rows[0];
        assert_eq!(row[0], Cell::text("-"));
        assert_eq!(row[1], Cell::text("Aceros MX"));
        assert_eq!(row[6..9], [Cell::Money(140.0), Cell::Money(40.0), Cell::Money(100.0)]);
    }

    #[test]
    fn sheets_are_written_as_xlsx_archives() {
        let bytes = expenses_sheet(&[expense(Some(0.5))]).to_xlsx().unwrap();
        // XLSX is a zip container.
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn documents_embed_only_decodable_images() {
        let mut form = LogBookForm {
            operator_name: "Ana López".to_string(),
            signature: Some("javascript:alert(1)".to_string()),
            evidence_urls: vec!["not base64".to_string()],
            ..Default::default()
        };
        let doc = logbook_document(&entry(form.clone(), LogBookStatus::Approved));
        assert_eq!(doc.badge, "EN CURSO");
        assert!(texts(&doc).contains(&"Sin firma. Ana López".to_string()));
        assert!(!doc.items.iter().any(|i| matches!(i, DocItem::Image { .. })));

        form.signature = Some(PNG.to_string());
        form.evidence_urls = vec![PNG.to_string()];
        let doc = logbook_document(&entry(form, LogBookStatus::Completed));
        let images: Vec<&DocItem> = doc
            .items
            .iter()
            .filter(|i| matches!(i, DocItem::Image { .. }))
            .collect();
        assert_eq!(images.len(), 2);
        match images[0] {
            DocItem::Image { pixels, .. } => {
                // Transparent canvas pixels come out white.
                assert_eq!(pixels.get_pixel(0, 0).0, [255, 255, 255]);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn long_documents_break_into_pages_without_overflow() {
        let doc = PrintDocument {
            title: "Prueba".to_string(),
            badge: "OK".to_string(),
            filename: "prueba.pdf".to_string(),
            items: (0..120)
                .map(|i| DocItem::row("Renglón", format!("valor {}", i)))
                .collect(),
        };
        let pages = doc.pages();
        assert!(pages.len() >= 3);
        assert_eq!(pages.iter().map(Vec::len).sum::<usize>(), 120);
        for placed in pages.iter().flatten() {
            assert!(placed.top <= CONTENT_TOP);
            assert!(placed.top - placed.item.height() >= CONTENT_BOTTOM);
        }
    }

    #[test]
    fn documents_render_as_pdf() {
        let mut form = LogBookForm {
            trip_num: "V 2041/A".to_string(),
            signature: Some(PNG.to_string()),
            ..Default::default()
        };
        form.destinations = "Monterrey ".repeat(40);
        let doc = logbook_document(&entry(form, LogBookStatus::Completed));
        assert_eq!(doc.filename, "Bitacora_V_2041_A.pdf");
        let bytes = doc.to_pdf().unwrap();
        assert_eq!(&bytes[..5], b"%PDF-");
    }

    #[test]
    fn expense_document_shows_fuel_details() {
        let doc = expense_document(&expense(Some(0.5)));
        let texts = texts(&doc);
        assert!(texts.contains(&"Rendimiento=0.50".to_string()));
        assert!(texts.contains(&"Monto=$1225.00".to_string()));
        assert_eq!(doc.badge, "APPROVED");
        assert_eq!(doc.filename, format!("Gasto_{}.pdf", Uuid::nil()));
    }

    #[test]
    fn wrapping_keeps_every_word_within_width() {
        assert_eq!(wrap("", 10), vec![String::new()]);
        assert_eq!(wrap("uno dos tres", 7), vec!["uno dos", "tres"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }
}
