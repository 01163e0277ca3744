use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

/// Current UTC instant with the offset stripped, for TIMESTAMP columns.
pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let utc = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(utc.date(), utc.time())
}

/// Renders a stored UTC timestamp as an RFC 3339 `Z` string.
pub(crate) fn format_primitive(stamp: PrimitiveDateTime) -> String {
    let utc = stamp.assume_utc();
    utc.format(&Rfc3339).unwrap_or_else(|_| utc.to_string())
}
