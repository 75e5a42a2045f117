use std::io::BufWriter;

use printpdf::*;

use crate::error::{Result, TrueHourError};
use crate::fmt::{hours, money, percent};
use crate::progress::ProgressReport;
use crate::reports::AnnualSummary;
use crate::timeline::TimelineEstimate;

// US Letter dimensions (mm)
const PAGE_W: f32 = 215.9;
const PAGE_H: f32 = 279.4;
const MARGIN_TOP: f32 = 25.4;
const MARGIN_BOTTOM: f32 = 25.4;
const MARGIN_LEFT: f32 = 19.05;
const MARGIN_RIGHT: f32 = 19.05;
const ROW_H: f32 = 5.0;
const FONT_SIZE: f32 = 10.0;
const SMALL_SIZE: f32 = 8.5;
const TITLE_SIZE: f32 = 16.0;
const SUBTITLE_SIZE: f32 = 10.0;

fn approx_text_width(text: &str, size: f32) -> f32 {
    text.len() as f32 * size * 0.18
}

fn pdf_err(e: impl std::fmt::Debug) -> TrueHourError {
    TrueHourError::Pdf(format!("{e:?}"))
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

struct Col {
    width: f32,
    align: Align,
}

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    current_page: PdfPageIndex,
    current_layer: PdfLayerIndex,
    y: f32,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
        let font_bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?;
        Ok(Self {
            doc,
            font,
            font_bold,
            current_page: page,
            current_layer: layer,
            y: MARGIN_TOP,
        })
    }

    fn pdf_y(&self) -> f32 {
        PAGE_H - self.y
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer");
        self.current_page = page;
        self.current_layer = layer;
        self.y = MARGIN_TOP;
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y + needed > PAGE_H - MARGIN_BOTTOM {
            self.new_page();
        }
    }

    fn text(&self, s: &str, x: f32, size: f32, bold: bool) {
        let font = if bold { &self.font_bold } else { &self.font };
        let layer = self.doc.get_page(self.current_page).get_layer(self.current_layer);
        layer.use_text(s, size, Mm(x), Mm(self.pdf_y()), font);
    }

    fn hline(&self, x1: f32, x2: f32) {
        let layer = self.doc.get_page(self.current_page).get_layer(self.current_layer);
        layer.set_outline_thickness(0.5);
        let line = Line {
            points: vec![
                (Point::new(Mm(x1), Mm(self.pdf_y())), false),
                (Point::new(Mm(x2), Mm(self.pdf_y())), false),
            ],
            is_closed: false,
        };
        layer.add_line(line);
    }

    fn header(&mut self, title: &str, subtitle: &str, range: &str) {
        self.text(title, MARGIN_LEFT, TITLE_SIZE, true);
        self.y += 7.0;
        if !subtitle.is_empty() {
            self.text(subtitle, MARGIN_LEFT, SUBTITLE_SIZE, false);
            self.y += 5.0;
        }
        self.text(range, MARGIN_LEFT, SUBTITLE_SIZE, false);
        self.y += 5.0;
        let ts = chrono::Local::now().format("Generated %Y-%m-%d %H:%M").to_string();
        self.text(&ts, MARGIN_LEFT, 8.0, false);
        self.y += 5.0;
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        self.y += 5.0;
    }

    fn cells(&mut self, cols: &[Col], values: &[&str], size: f32, bold: bool) {
        let mut x = MARGIN_LEFT;
        for (col, value) in cols.iter().zip(values) {
            match col.align {
                Align::Left => self.text(value, x, size, bold),
                Align::Right => {
                    let tw = approx_text_width(value, size);
                    self.text(value, x + col.width - tw, size, bold);
                }
            }
            x += col.width;
        }
    }

    fn table_header(&mut self, cols: &[Col], headers: &[&str]) {
        self.ensure_space(ROW_H * 2.0);
        self.cells(cols, headers, FONT_SIZE, true);
        self.y += ROW_H;
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        self.y += 2.0;
    }

    fn table_row(&mut self, cols: &[Col], values: &[&str], bold: bool) {
        self.ensure_space(ROW_H);
        self.cells(cols, values, FONT_SIZE, bold);
        self.y += ROW_H;
    }

    fn detail_row(&mut self, cols: &[Col], values: &[&str]) {
        self.ensure_space(ROW_H);
        self.cells(cols, values, SMALL_SIZE, false);
        self.y += ROW_H - 0.5;
    }

    fn section_label(&mut self, label: &str) {
        self.ensure_space(ROW_H * 2.0);
        self.text(label, MARGIN_LEFT, FONT_SIZE, true);
        self.y += ROW_H;
    }

    fn line(&mut self, s: &str) {
        self.ensure_space(ROW_H);
        self.text(s, MARGIN_LEFT, FONT_SIZE, false);
        self.y += ROW_H;
    }

    fn blank_row(&mut self) {
        self.y += ROW_H;
    }

    fn separator(&mut self) {
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        self.y += 2.0;
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc.save(&mut buf).map_err(pdf_err)?;
        buf.into_inner().map_err(|e| TrueHourError::Pdf(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Render functions
// ---------------------------------------------------------------------------

pub fn render_annual(summary: &AnnualSummary) -> Result<Vec<u8>> {
    let mut pdf = PdfWriter::new("Annual Training Budget")?;
    pdf.header(
        "Annual Training Budget",
        "Active budget cards",
        &format!("January - December {}", summary.year),
    );

    let cols = &[
        Col { width: 70.0, align: Align::Left },
        Col { width: 36.0, align: Align::Right },
        Col { width: 36.0, align: Align::Right },
        Col { width: 35.8, align: Align::Right },
    ];

    pdf.section_label("By Month");
    pdf.table_header(cols, &["Month / Card", "Budgeted", "Actual", "Remaining"]);
    if summary.by_month.is_empty() {
        pdf.line("No active budget cards this year.");
    }
    for month in &summary.by_month {
        let s = &month.summary;
        let (b, a, r) = (money(s.budgeted), money(s.actual), money(s.remaining));
        pdf.table_row(cols, &[&s.month, &b, &a, &r], true);
        for card in &month.cards {
            let name = format!("   {}", card.name);
            let b = money(card.budgeted_amount);
            let a = money(card.actual_amount);
            let r = money(card.remaining_amount());
            pdf.detail_row(cols, &[&name, &b, &a, &r]);
        }
    }
    pdf.separator();
    let (b, a, r) = (
        money(summary.total_budgeted),
        money(summary.total_actual),
        money(summary.total_remaining),
    );
    pdf.table_row(cols, &["Total", &b, &a, &r], true);
    pdf.blank_row();

    if !summary.by_category.is_empty() {
        let cat_cols = &[
            Col { width: 60.0, align: Align::Left },
            Col { width: 15.0, align: Align::Right },
            Col { width: 34.0, align: Align::Right },
            Col { width: 34.0, align: Align::Right },
            Col { width: 34.8, align: Align::Right },
        ];
        pdf.section_label("By Category");
        pdf.table_header(cat_cols, &["Category", "Cards", "Budgeted", "Actual", "Remaining"]);
        for c in &summary.by_category {
            let n = c.card_count.to_string();
            let (b, a, r) = (money(c.budgeted), money(c.actual), money(c.remaining));
            pdf.table_row(cat_cols, &[&c.category, &n, &b, &a, &r], false);
        }
    }

    pdf.to_bytes()
}

pub fn render_progress(report: &ProgressReport, timeline: Option<&TimelineEstimate>) -> Result<Vec<u8>> {
    let mut pdf = PdfWriter::new("Certification Progress")?;
    let today = chrono::Local::now().date_naive();
    pdf.header(
        "Certification Progress",
        report.certification.title(),
        &format!("As of {}", today.format("%Y-%m-%d")),
    );

    let cols = &[
        Col { width: 72.0, align: Align::Left },
        Col { width: 26.0, align: Align::Right },
        Col { width: 26.0, align: Align::Right },
        Col { width: 26.0, align: Align::Right },
        Col { width: 27.8, align: Align::Right },
    ];
    pdf.table_header(cols, &["Requirement", "Required", "Current", "Remaining", "Progress"]);
    for row in &report.rows {
        let suffix = row.unit.suffix();
        let req = format!("{}{suffix}", hours(row.required));
        let cur = format!("{}{suffix}", hours(row.current));
        let rem = format!("{}{suffix}", hours(row.remaining));
        let pct = percent(row.percent);
        pdf.table_row(cols, &[row.label, &req, &cur, &rem, &pct], row.complete);
    }
    pdf.separator();
    let done = format!("{} of {} met", report.completed, report.total);
    let overall = percent(report.overall_percent);
    pdf.table_row(cols, &["Overall", "", "", &done, &overall], true);

    if let Some(est) = timeline {
        pdf.blank_row();
        pdf.section_label("Timeline");
        pdf.line(&format!(
            "{} remaining toward {}: {} h",
            hours(est.remaining_hours),
            est.label,
            hours(est.required)
        ));
        pdf.line(&format!(
            "At {} h/month and {}/h: {} months, {} total, {} per month",
            hours(est.cadence.hours_per_month),
            money(est.cadence.cost_per_hour),
            est.months_to_completion,
            money(est.estimated_budget),
            money(est.monthly_budget)
        ));
        if let Some(done) = est.projected_completion(today) {
            pdf.line(&format!("Projected completion: {}", done.format("%B %Y")));
        }
    }

    pdf.to_bytes()
}
