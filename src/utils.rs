use iso8601::{Date, DateTime, Time};
use xml::escape::escape_str_pcdata;

use std::borrow::Cow;

/// Escape a string for use as XML characters.
///
/// The resulting string is *not* suitable for use in XML attributes, but XML-RPC doesn't use those.
pub fn escape_xml(s: &str) -> Cow<str> {
    escape_str_pcdata(s)
}

pub fn format_datetime(date_time: &DateTime) -> String {
    let Time {
        hour, minute, second, millisecond, tz_offset_hours, tz_offset_minutes
    } = date_time.time;

    match date_time.date {
        Date::YMD { year, month, day } => {
            format!("{:04}{:02}{:02}T{:02}:{:02}:{:02}.{:03}{:+03}:{:02}",
                year, month, day,
                hour, minute, second, millisecond,
                tz_offset_hours, tz_offset_minutes.abs()
            )
        }
        Date::Week { year, ww, d } => {
            format!("{:04}-W{:02}-{}", year, ww, d)
        }
        Date::Ordinal { year, ddd } => {
            format!("{:04}-{:03}", year, ddd)
        }
    }
}

/// Joins an endpoint URL and a service name with exactly one `/` between them.
pub fn service_url(endpoint: &str, service: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), service.trim_start_matches('/'))
}

const SERVICE_PREFIX: &str = "SoftLayer_";

/// Prepends `SoftLayer_` to service names that lack it, so `"Account"` and `"SoftLayer_Account"`
/// address the same service.
pub fn qualified_service_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() || name.starts_with(SERVICE_PREFIX) {
        name.to_string()
    } else {
        format!("{}{}", SERVICE_PREFIX, name)
    }
}
