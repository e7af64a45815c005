//! Ridership fact queries and imports.

use super::RidershipDb;
use crate::{
    error::RidershipResult,
    ingest::ImportKind,
    ridership::RidershipRecord,
    types::{DateRange, LineCode, UNSPECIFIED_COMPANY},
};
use rusqlite::{params, Row};

const RECORD_COLUMNS: &str =
    "date, line_code, line_name, company, predicted_passengers, realized_passengers";

fn record_from_row(r: &Row<'_>) -> rusqlite::Result<RidershipRecord> {
    Ok(RidershipRecord {
        date:                 r.get(0)?,
        line_code:            r.get(1)?,
        line_name:            r.get(2)?,
        company:              r.get(3)?,
        predicted_passengers: r.get(4)?,
        realized_passengers:  r.get(5)?,
    })
}

impl RidershipDb {
    pub(super) fn records_in(&self, range: Option<&DateRange>) -> RidershipResult<Vec<RidershipRecord>> {
        let records = match range {
            Some(range) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {RECORD_COLUMNS} FROM bus_lines
                     WHERE date BETWEEN ?1 AND ?2
                     ORDER BY date, line_code, company"
                ))?;
                let rows = stmt
                    .query_map(params![range.start, range.end], record_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {RECORD_COLUMNS} FROM bus_lines ORDER BY date, line_code, company"
                ))?;
                let rows = stmt
                    .query_map([], record_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        log::debug!("loaded {} ridership rows for {range:?}", records.len());
        Ok(records)
    }

    pub(super) fn distinct_line_codes(&self) -> RidershipResult<Vec<LineCode>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT line_code FROM bus_lines ORDER BY line_code")?;
        let codes = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(codes)
    }

    /// Upsert imported rows in one transaction. A failure rolls back the
    /// whole import.
    pub(super) fn import_records(
        &mut self,
        records: &[RidershipRecord],
        kind:    ImportKind,
    ) -> RidershipResult<usize> {
        let sql = match kind {
            ImportKind::Realized => {
                "INSERT INTO bus_lines (date, line_code, line_name, company, predicted_passengers, realized_passengers)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)
                 ON CONFLICT(date, line_code, company) DO UPDATE SET
                     realized_passengers = excluded.realized_passengers,
                     line_name = COALESCE(excluded.line_name, bus_lines.line_name)"
            }
            ImportKind::Predicted => {
                "INSERT INTO bus_lines (date, line_code, line_name, company, predicted_passengers, realized_passengers)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)
                 ON CONFLICT(date, line_code, company) DO UPDATE SET
                     predicted_passengers = excluded.predicted_passengers,
                     line_name = COALESCE(excluded.line_name, bus_lines.line_name)"
            }
        };

        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(sql)?;
            for r in records {
                let value = match kind {
                    ImportKind::Realized => r.realized_passengers,
                    ImportKind::Predicted => r.predicted_passengers,
                };
                let company = r.company.as_deref().unwrap_or(UNSPECIFIED_COMPANY);
                written += stmt.execute(params![r.date, r.line_code, r.line_name, company, value])?;
            }
        }
        tx.commit()?;
        log::info!("import {kind:?}: {written} rows written");
        Ok(written)
    }

    pub(super) fn delete_all_records(&mut self) -> RidershipResult<usize> {
        let removed = self.conn.execute("DELETE FROM bus_lines", [])?;
        log::info!("ridership wiped: {removed} rows removed");
        Ok(removed)
    }
}
