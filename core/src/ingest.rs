//! Normalization of imported spreadsheet exports into ridership records.
//!
//! Raw export bytes are decoded per import kind, split into CSV rows and
//! reduced to normalized (date, line, company) totals. Cells are matched to
//! columns by header keywords because the source exports do not share a
//! layout.

use crate::{
    config::IngestConfig,
    error::{RidershipError, RidershipResult},
    ridership::RidershipRecord,
    types::{LineCode, UNSPECIFIED_COMPANY},
};
use chrono::NaiveDate;
use encoding_rs::{UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// Counted passengers; replaces the realized column.
    Realized,
    /// Scheduled passengers; replaces the predicted column.
    Predicted,
}

const DATE_KEYS: &[&str] = &["datadebito", "data", "date", "dia", "periodo", "período", "dt_"];
const LINE_KEYS: &[&str] = &["linha", "line", "cod", "servico", "serviço"];
const TOTAL_KEYS: &[&str] = &["total", "realizado", "previsto", "sum", "soma"];
const COUNT_KEYS: &[&str] = &["passageiros", "qtd", "passengers", "scheduled", "val"];
const COMPANY_KEYS: &[&str] = &["empresa", "company", "operadora", "nome"];
const NAME_KEYS: &[&str] = &["nome", "denominacao", "denominação", "descric", "descriç"];

/// Parse a passenger count written in pt-BR or plain notation.
///
/// `1.234,5` -> 1234.5, `12,5` -> 12.5, `4.000` -> 4000, `1.000.000` -> 1e6,
/// `3.5` -> 3.5. Anything unparseable is 0.
pub fn sanitize_numeric(raw: &str) -> f64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0.0;
    }
    let cleaned = if s.contains('.') && s.contains(',') {
        s.replace('.', "").replace(',', ".")
    } else if s.contains(',') {
        s.replace(',', ".")
    } else if s.matches('.').count() > 1 {
        s.replace('.', "")
    } else {
        match s.split_once('.') {
            Some((_, frac)) if frac.len() == 3 => s.replace('.', ""),
            _ => s.to_string(),
        }
    };
    cleaned.parse::<f64>().unwrap_or(0.0)
}

/// Normalize a raw line code, or `None` when the line is excluded.
///
/// A leading `A` is dropped, anything after a `.` is dropped and purely
/// numeric codes are zero-padded.
pub fn normalize_line_code(raw: &str, config: &IngestConfig) -> Option<LineCode> {
    let mut code = raw.trim();
    if code.len() > 1 && code.starts_with(['A', 'a']) {
        code = &code[1..];
    }
    if let Some((head, _)) = code.split_once('.') {
        code = head;
    }
    let code = code.trim();
    if code.is_empty() {
        return None;
    }
    let code = if code.chars().all(|c| c.is_ascii_digit()) {
        format!("{code:0>width$}", width = config.line_code_width)
    } else {
        code.to_string()
    };
    if config.excluded_lines.iter().any(|x| *x == code) {
        return None;
    }
    Some(code)
}

/// Accept `DD/MM/YYYY` (optionally followed by a time) or an ISO date prefix.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.contains('/') {
        let day_part = s.split_whitespace().next()?;
        return NaiveDate::parse_from_str(day_part, "%d/%m/%Y").ok();
    }
    let prefix = s.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Split a composite company cell on `/`. Empty input yields the
/// unspecified bucket.
pub fn split_companies(raw: &str) -> Vec<String> {
    let companies: Vec<String> = raw
        .split('/')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_uppercase)
        .collect();
    if companies.is_empty() {
        vec![UNSPECIFIED_COMPANY.to_string()]
    } else {
        companies
    }
}

/// Column positions detected from a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub date:       usize,
    pub line:       usize,
    pub passengers: Option<usize>,
    pub company:    Option<usize>,
    pub name:       Option<usize>,
}

impl ColumnMap {
    pub fn detect<S: AsRef<str>>(headers: &[S]) -> RidershipResult<Self> {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| h.as_ref().trim().trim_start_matches('\u{feff}').to_lowercase())
            .collect();
        let find = |keys: &[&str]| {
            normalized
                .iter()
                .position(|h| keys.iter().any(|k| h.contains(k)))
        };

        let date = find(DATE_KEYS);
        let line = find(LINE_KEYS);
        let (Some(date), Some(line)) = (date, line) else {
            return Err(RidershipError::validation(format!(
                "essential columns (date/line) not found in headers {normalized:?}"
            )));
        };
        Ok(Self {
            date,
            line,
            passengers: find(TOTAL_KEYS).or_else(|| find(COUNT_KEYS)),
            company: find(COMPANY_KEYS),
            name: find(NAME_KEYS),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub rows_read:     usize,
    pub rows_excluded: usize,
    pub rows_rejected: usize,
}

/// Sums passengers per (date, line, company). A row operated by several
/// companies has its value split evenly between them.
#[derive(Debug)]
pub struct ImportAccumulator<'a> {
    kind:    ImportKind,
    config:  &'a IngestConfig,
    columns: ColumnMap,
    totals:  BTreeMap<(NaiveDate, LineCode, String), (f64, Option<String>)>,
    stats:   ImportStats,
}

impl<'a> ImportAccumulator<'a> {
    pub fn new(kind: ImportKind, config: &'a IngestConfig, columns: ColumnMap) -> Self {
        Self {
            kind,
            config,
            columns,
            totals: BTreeMap::new(),
            stats: ImportStats::default(),
        }
    }

    pub fn push_row<S: AsRef<str>>(&mut self, row: &[S]) {
        self.stats.rows_read += 1;
        let cell = |idx: usize| row.get(idx).map(|c| c.as_ref().trim());

        let (Some(raw_date), Some(raw_line)) = (cell(self.columns.date), cell(self.columns.line)) else {
            self.stats.rows_rejected += 1;
            return;
        };
        let Some(date) = normalize_date(raw_date) else {
            self.reject(raw_date);
            return;
        };
        let Some(line_code) = normalize_line_code(raw_line, self.config) else {
            self.stats.rows_excluded += 1;
            return;
        };

        let value = match self.columns.passengers {
            Some(idx) => cell(idx).map_or(0.0, sanitize_numeric),
            None => 1.0,
        };
        let companies = split_companies(self.columns.company.and_then(cell).unwrap_or(""));
        let name = self
            .columns
            .name
            .and_then(cell)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let share = value / companies.len() as f64;
        for company in companies {
            let slot = self
                .totals
                .entry((date, line_code.clone(), company))
                .or_insert((0.0, None));
            slot.0 += share;
            if name.is_some() {
                slot.1 = name.clone();
            }
        }
    }

    fn reject(&mut self, raw_date: &str) {
        self.stats.rows_rejected += 1;
        if self.stats.rows_rejected <= 10 {
            log::warn!("import: unparseable date '{raw_date}', row skipped");
        }
    }

    pub fn stats(&self) -> &ImportStats {
        &self.stats
    }

    pub fn finish(self) -> (Vec<RidershipRecord>, ImportStats) {
        let kind = self.kind;
        let records = self
            .totals
            .into_iter()
            .map(|((date, line_code, company), (value, name))| {
                let (predicted, realized) = match kind {
                    ImportKind::Realized => (0.0, value),
                    ImportKind::Predicted => (value, 0.0),
                };
                RidershipRecord {
                    line_name: name.or_else(|| Some(line_code.clone())),
                    line_code,
                    company: Some(company),
                    date,
                    predicted_passengers: predicted,
                    realized_passengers: realized,
                }
            })
            .collect();
        (records, self.stats)
    }
}

// ── Files ──────────────────────────────────────────────────────

/// Decode a raw export. Realized counts arrive as Latin-1, predicted
/// schedules as UTF-8 with an optional BOM. Bytes that do not decode become
/// U+FFFD; they never fail the import.
pub fn decode_export(bytes: &[u8], kind: ImportKind) -> Cow<'_, str> {
    let (text, had_errors) = match kind {
        ImportKind::Realized => WINDOWS_1252.decode_without_bom_handling(bytes),
        ImportKind::Predicted => UTF_8.decode_with_bom_removal(bytes),
    };
    if had_errors {
        log::warn!("import: {kind:?} export has undecodable bytes, replaced");
    }
    text
}

/// Parse a whole export file into normalized records. The delimiter is `;`
/// when the header row has more semicolons than commas, `,` otherwise.
pub fn parse_export(
    bytes:  &[u8],
    kind:   ImportKind,
    config: &IngestConfig,
) -> RidershipResult<(Vec<RidershipRecord>, ImportStats)> {
    let text = decode_export(bytes, kind);
    let header_line = text.lines().next().unwrap_or_default();
    let delimiter = if header_line.matches(';').count() > header_line.matches(',').count() {
        b';'
    } else {
        b','
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let columns = ColumnMap::detect(&headers)?;
    let mut acc = ImportAccumulator::new(kind, config, columns);
    for row in reader.records() {
        let row = row?;
        acc.push_row(&row.iter().collect::<Vec<_>>());
    }
    Ok(acc.finish())
}
