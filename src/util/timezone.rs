use chrono::{NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;

/// The zone named by `name`, or `fallback` when it is absent or unknown.
pub fn resolve_zone(name: Option<&str>, fallback: Tz) -> Tz {
    name.map(str::trim)
        .filter(|name| !name.is_empty())
        .and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(fallback)
}

/// Epoch milliseconds of a wall-clock time in `zone`.
///
/// Ambiguous times (DST fold) take the earlier instant; times inside a DST
/// gap are shifted by the zone's offset at that instant read as UTC.
pub fn local_millis(local: NaiveDateTime, zone: Tz) -> i64 {
    match zone.from_local_datetime(&local).earliest() {
        Some(resolved) => resolved.timestamp_millis(),
        None => {
            let offset = zone.offset_from_utc_datetime(&local).fix();
            (local - offset).and_utc().timestamp_millis()
        }
    }
}
