//! Static knowledge about GTFS feed files
//!
//! Which files a feed must carry, which header fields each file needs, and
//! the per-field content checks applied by the validator.

use regex::Regex;

/// Files every feed must contain, by stem.
pub const REQUIRED_FILES: &[&str] = &["agency", "stops", "routes", "trips", "stop_times"];

/// Files a feed may contain, by stem.
pub const OPTIONAL_FILES: &[&str] = &[
    "calendar",
    "calendar_dates",
    "fare_attributes",
    "fare_rules",
    "shapes",
    "frequencies",
    "transfers",
    "pathways",
    "levels",
    "translations",
    "feed_info",
    "attributions",
];

/// File name for a stem, e.g. `stops` -> `stops.txt`.
pub fn file_name(stem: &str) -> String {
    format!("{stem}.txt")
}

pub fn is_known_file(stem: &str) -> bool {
    REQUIRED_FILES.contains(&stem) || OPTIONAL_FILES.contains(&stem)
}

/// Header fields a file must declare. Unknown stems have none.
pub fn required_fields(stem: &str) -> &'static [&'static str] {
    match stem {
        "agency" => &["agency_id", "agency_name", "agency_url", "agency_timezone"],
        "stops" => &["stop_id", "stop_name", "stop_lat", "stop_lon"],
        "routes" => &[
            "route_id",
            "agency_id",
            "route_short_name",
            "route_long_name",
            "route_type",
        ],
        "trips" => &["route_id", "service_id", "trip_id"],
        "stop_times" => &[
            "trip_id",
            "arrival_time",
            "departure_time",
            "stop_id",
            "stop_sequence",
        ],
        "calendar" => &[
            "service_id",
            "monday",
            "tuesday",
            "wednesday",
            "thursday",
            "friday",
            "saturday",
            "sunday",
            "start_date",
            "end_date",
        ],
        "calendar_dates" => &["service_id", "date", "exception_type"],
        "fare_attributes" => &[
            "fare_id",
            "price",
            "currency_type",
            "payment_method",
            "transfers",
        ],
        "fare_rules" => &["fare_id"],
        "shapes" => &["shape_id", "shape_pt_lat", "shape_pt_lon", "shape_pt_sequence"],
        "frequencies" => &["trip_id", "start_time", "end_time", "headway_secs"],
        "transfers" => &["from_stop_id", "to_stop_id", "transfer_type"],
        "pathways" => &[
            "pathway_id",
            "from_stop_id",
            "to_stop_id",
            "pathway_mode",
            "is_bidirectional",
        ],
        "levels" => &["level_id", "level_index"],
        "translations" => &["table_name", "field_name", "language", "translation"],
        "feed_info" => &[
            "feed_publisher_name",
            "feed_publisher_url",
            "feed_lang",
            "feed_start_date",
            "feed_end_date",
            "feed_version",
        ],
        "attributions" => &["organization_name"],
        _ => &[],
    }
}

/// Kind of check applied to a single field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    Latitude,
    Longitude,
    Time,
    EnumCode,
}

impl FieldRule {
    /// Rule for a field name, regardless of which file it appears in.
    pub fn for_field(field: &str) -> Option<Self> {
        match field {
            "stop_lat" | "shape_pt_lat" => Some(FieldRule::Latitude),
            "stop_lon" | "shape_pt_lon" => Some(FieldRule::Longitude),
            "arrival_time" | "departure_time" => Some(FieldRule::Time),
            "route_type" | "location_type" | "wheelchair_boarding" | "wheelchair_accessible"
            | "bikes_allowed" | "exception_type" | "pickup_type" | "drop_off_type" => {
                Some(FieldRule::EnumCode)
            },
            _ => None,
        }
    }
}

/// Compiled content checks.
#[derive(Debug, Clone)]
pub struct ContentRules {
    time: Regex,
    code: Regex,
    strict_times: bool,
}

impl ContentRules {
    /// `strict_times` limits hours to 00-23; otherwise 0-47 and single-digit
    /// hours are accepted for service running past midnight.
    pub fn new(strict_times: bool) -> Result<Self, regex::Error> {
        let time = if strict_times {
            Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9]$")?
        } else {
            Regex::new(r"^([0-3]?[0-9]|4[0-7]):[0-5][0-9]:[0-5][0-9]$")?
        };

        Ok(Self {
            time,
            code: Regex::new(r"^[0-9]+$")?,
            strict_times,
        })
    }

    pub fn strict_times(&self) -> bool {
        self.strict_times
    }

    /// Check one value. Empty values always pass.
    ///
    /// Returns the reason on failure.
    pub fn check(&self, rule: FieldRule, value: &str) -> Result<(), String> {
        if value.is_empty() {
            return Ok(());
        }

        match rule {
            FieldRule::Latitude => check_range(value, -90.0, 90.0, "latitude"),
            FieldRule::Longitude => check_range(value, -180.0, 180.0, "longitude"),
            FieldRule::Time => {
                if self.time.is_match(value) {
                    Ok(())
                } else if self.strict_times {
                    Err("time must be HH:MM:SS with an hour from 00 to 23".to_string())
                } else {
                    Err("time must be HH:MM:SS with an hour from 0 to 47".to_string())
                }
            },
            FieldRule::EnumCode => {
                if self.code.is_match(value) {
                    Ok(())
                } else {
                    Err("code must be a non-negative integer".to_string())
                }
            },
        }
    }
}

fn check_range(value: &str, min: f64, max: f64, what: &str) -> Result<(), String> {
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() && (min..=max).contains(&n) => Ok(()),
        Ok(_) => Err(format!("{what} must be between {min} and {max}")),
        Err(_) => Err(format!("{what} is not a number")),
    }
}
