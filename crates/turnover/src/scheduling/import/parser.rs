use chrono::NaiveTime;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use std::io::Read;

use super::normalizer::{normalize_text, parse_cents, parse_date};
use super::ImportError;
use crate::scheduling::domain::{BookingSource, ImportCandidate};
use crate::scheduling::time_range::TimeRange;

const AIRBNB_DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];
const BOOKING_COM_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Wall-clock times turned onto the date-only columns of channel exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StayTimes {
    pub check_in: NaiveTime,
    pub check_out: NaiveTime,
}

/// Reads a reservation export of the given channel. Cancelled reservations are skipped.
pub fn parse_export<R: Read>(
    source: BookingSource,
    reader: R,
    times: StayTimes,
) -> Result<Vec<ImportCandidate>, ImportError> {
    match source {
        BookingSource::Airbnb => parse_rows::<AirbnbRow, _>(reader, times),
        BookingSource::BookingCom => parse_rows::<BookingComRow, _>(reader, times),
        BookingSource::None => Err(ImportError::UnsupportedSource(source.label().to_string())),
    }
}

/// Common view over the per-channel row layouts.
trait ExportRow: DeserializeOwned {
    const SOURCE: BookingSource;
    const DATE_FORMATS: &'static [&'static str];

    fn status(&self) -> Option<&str>;
    fn external_id(&self) -> &str;
    fn listing_ref(&self) -> &str;
    fn guest(&self) -> &str;
    fn check_in(&self) -> &str;
    fn check_out(&self) -> &str;
    fn amount(&self) -> Option<&str>;
    fn paid(&self) -> bool;
}

fn parse_rows<T: ExportRow, R: Read>(
    reader: R,
    times: StayTimes,
) -> Result<Vec<ImportCandidate>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut candidates = Vec::new();

    for (index, record) in csv_reader.deserialize::<T>().enumerate() {
        // header is line 1
        let row_number = index + 2;
        let row = record?;
        if row
            .status()
            .is_some_and(|status| status.to_ascii_lowercase().contains("cancel"))
        {
            tracing::debug!(row = row_number, source = T::SOURCE.label(), "skipping cancelled reservation");
            continue;
        }
        candidates.push(candidate_from(&row, row_number, times)?);
    }

    tracing::debug!(
        source = T::SOURCE.label(),
        candidates = candidates.len(),
        "parsed reservation export"
    );
    Ok(candidates)
}

fn candidate_from<T: ExportRow>(
    row: &T,
    row_number: usize,
    times: StayTimes,
) -> Result<ImportCandidate, ImportError> {
    let invalid = |reason: String| ImportError::InvalidRow {
        row: row_number,
        reason,
    };

    let external_id = normalize_text(row.external_id());
    if external_id.is_empty() {
        return Err(invalid("missing reservation reference".to_string()));
    }
    let listing_ref = normalize_text(row.listing_ref());
    if listing_ref.is_empty() {
        return Err(invalid("missing listing reference".to_string()));
    }

    let check_in = parse_date(row.check_in(), T::DATE_FORMATS)
        .ok_or_else(|| invalid(format!("unreadable check-in date `{}`", row.check_in())))?;
    let check_out = parse_date(row.check_out(), T::DATE_FORMATS)
        .ok_or_else(|| invalid(format!("unreadable check-out date `{}`", row.check_out())))?;
    let range = TimeRange::new(check_in.and_time(times.check_in), check_out.and_time(times.check_out))
        .map_err(|err| invalid(err.to_string()))?;

    let price_cents = match row.amount() {
        Some(amount) => parse_cents(amount)
            .ok_or_else(|| invalid(format!("unreadable amount `{amount}`")))?,
        None => 0,
    };

    Ok(ImportCandidate {
        source: T::SOURCE,
        external_id,
        listing_ref,
        range,
        name: normalize_text(row.guest()),
        price_cents,
        paid: row.paid(),
    })
}

#[derive(Debug, Deserialize)]
struct AirbnbRow {
    #[serde(rename = "Confirmation code")]
    confirmation_code: String,
    #[serde(rename = "Status", default, deserialize_with = "empty_string_as_none")]
    status: Option<String>,
    #[serde(rename = "Guest name", default)]
    guest_name: String,
    #[serde(rename = "Start date")]
    start_date: String,
    #[serde(rename = "End date")]
    end_date: String,
    #[serde(rename = "Listing", alias = "Listing ID")]
    listing: String,
    #[serde(rename = "Earnings", default, deserialize_with = "empty_string_as_none")]
    earnings: Option<String>,
}

impl ExportRow for AirbnbRow {
    const SOURCE: BookingSource = BookingSource::Airbnb;
    const DATE_FORMATS: &'static [&'static str] = AIRBNB_DATE_FORMATS;

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
    fn external_id(&self) -> &str {
        &self.confirmation_code
    }
    fn listing_ref(&self) -> &str {
        &self.listing
    }
    fn guest(&self) -> &str {
        &self.guest_name
    }
    fn check_in(&self) -> &str {
        &self.start_date
    }
    fn check_out(&self) -> &str {
        &self.end_date
    }
    fn amount(&self) -> Option<&str> {
        self.earnings.as_deref()
    }
    /// Airbnb collects from the guest up front.
    fn paid(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
struct BookingComRow {
    #[serde(rename = "Book number")]
    book_number: String,
    #[serde(rename = "Guest name(s)", default)]
    guest_names: String,
    #[serde(rename = "Check-in")]
    check_in: String,
    #[serde(rename = "Check-out")]
    check_out: String,
    #[serde(rename = "Status", default, deserialize_with = "empty_string_as_none")]
    status: Option<String>,
    #[serde(rename = "Price", default, deserialize_with = "empty_string_as_none")]
    price: Option<String>,
    #[serde(rename = "Property ID", alias = "Property name")]
    property: String,
}

impl ExportRow for BookingComRow {
    const SOURCE: BookingSource = BookingSource::BookingCom;
    const DATE_FORMATS: &'static [&'static str] = BOOKING_COM_DATE_FORMATS;

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
    fn external_id(&self) -> &str {
        &self.book_number
    }
    fn listing_ref(&self) -> &str {
        &self.property
    }
    fn guest(&self) -> &str {
        &self.guest_names
    }
    fn check_in(&self) -> &str {
        &self.check_in
    }
    fn check_out(&self) -> &str {
        &self.check_out
    }
    fn amount(&self) -> Option<&str> {
        self.price.as_deref()
    }
    fn paid(&self) -> bool {
        false
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Cursor;

    fn times() -> StayTimes {
        StayTimes {
            check_in: NaiveTime::from_hms_opt(15, 0, 0).expect("valid time"),
            check_out: NaiveTime::from_hms_opt(11, 0, 0).expect("valid time"),
        }
    }

    #[test]
    fn airbnb_export_applies_stay_times_and_skips_cancellations() {
        let csv = "Confirmation code,Status,Guest name,Start date,End date,Listing,Earnings\n\
HMABC123,Confirmed,Ana  Lopez,07/04/2025,07/07/2025,Loft 4411,\"$1,020.00\"\n\
HMXYZ999,Canceled by guest,Bo Kim,07/10/2025,07/12/2025,Loft 4411,$0.00\n";

        let candidates =
            parse_export(BookingSource::Airbnb, Cursor::new(csv), times()).expect("parse export");

        assert_eq!(candidates.len(), 1);
        let candidate = &candidates[0];
        assert_eq!(candidate.external_id, "HMABC123");
        assert_eq!(candidate.listing_ref, "Loft 4411");
        assert_eq!(candidate.name, "Ana Lopez");
        assert_eq!(candidate.price_cents, 102_000);
        assert!(candidate.paid);
        assert_eq!(
            candidate.range.start,
            NaiveDate::from_ymd_opt(2025, 7, 4)
                .expect("valid date")
                .and_hms_opt(15, 0, 0)
                .expect("valid time")
        );
        assert_eq!(
            candidate.range.end,
            NaiveDate::from_ymd_opt(2025, 7, 7)
                .expect("valid date")
                .and_hms_opt(11, 0, 0)
                .expect("valid time")
        );
    }

    #[test]
    fn booking_com_export_accepts_property_name_column() {
        let csv = "Book number,Guest name(s),Check-in,Check-out,Status,Price,Property name\n\
4021,Jan Novak,2025-08-01,2025-08-03,ok,\"210,50 EUR\",Harbour Studio\n";

        let candidates = parse_export(BookingSource::BookingCom, Cursor::new(csv), times())
            .expect("parse export");

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].listing_ref, "Harbour Studio");
        assert_eq!(candidates[0].price_cents, 21_050);
        assert!(!candidates[0].paid);
        assert_eq!(candidates[0].source, BookingSource::BookingCom);
    }

    #[test]
    fn unreadable_dates_report_the_row() {
        let csv = "Book number,Guest name(s),Check-in,Check-out,Status,Price,Property ID\n\
1,A,2025-08-01,2025-08-03,ok,10,P1\n\
2,B,someday,2025-08-03,ok,10,P1\n";

        let err = parse_export(BookingSource::BookingCom, Cursor::new(csv), times())
            .expect_err("bad date rejected");
        assert!(matches!(err, ImportError::InvalidRow { row: 3, .. }), "{err:?}");
    }

    #[test]
    fn same_day_stays_are_rejected() {
        let csv = "Book number,Guest name(s),Check-in,Check-out,Status,Price,Property ID\n\
1,A,2025-08-01,2025-08-01,ok,10,P1\n";

        let err = parse_export(BookingSource::BookingCom, Cursor::new(csv), times())
            .expect_err("empty stay rejected");
        assert!(matches!(err, ImportError::InvalidRow { row: 2, .. }));
    }

    #[test]
    fn manual_source_has_no_export_format() {
        let err = parse_export(BookingSource::None, Cursor::new(""), times())
            .expect_err("no format");
        assert!(matches!(err, ImportError::UnsupportedSource(_)));
    }
}
