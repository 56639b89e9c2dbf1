//! Cellar object notices (`application/xml;notice=object`).
//!
//! Only the expression title and the work's document date are read. The
//! notice goes through the HTML parser, which lowercases element names, so
//! selectors are written in lowercase.

use std::sync::LazyLock;

use chrono::NaiveDate;
use eulex_core::normalize_text;
use scraper::{ElementRef, Html, Selector};

use crate::repository::ExpressionMetadata;

pub const NOTICE_MEDIA_TYPE: &str = "application/xml;notice=object";

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("valid notice selector")
}

static EXPRESSION_TITLE: LazyLock<Selector> = LazyLock::new(|| sel("expression expression_title value"));
static DATE_DOCUMENT: LazyLock<Selector> = LazyLock::new(|| sel("work date_document"));
static YEAR: LazyLock<Selector> = LazyLock::new(|| sel("year"));
static MONTH: LazyLock<Selector> = LazyLock::new(|| sel("month"));
static DAY: LazyLock<Selector> = LazyLock::new(|| sel("day"));

pub fn parse_notice(xml: &str) -> ExpressionMetadata {
    let doc = Html::parse_document(xml);
    let title = doc
        .select(&EXPRESSION_TITLE)
        .map(|e| normalize_text(&e.text().collect::<String>()))
        .find(|t| !t.is_empty());
    let date = doc.select(&DATE_DOCUMENT).find_map(document_date);
    ExpressionMetadata { title, date }
}

fn document_date(el: ElementRef<'_>) -> Option<NaiveDate> {
    let part = |selector: &Selector| -> Option<u32> {
        el.select(selector).next()?.text().collect::<String>().trim().parse().ok()
    };
    let year = i32::try_from(part(&YEAR)?).ok()?;
    NaiveDate::from_ymd_opt(year, part(&MONTH)?, part(&DAY)?)
}
