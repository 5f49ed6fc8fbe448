use std::{sync::LazyLock, time::Duration};

use regex::Regex;

use crate::error::{TsumugiError, TsumugiResult};

// Lexical form of xs:duration restricted to what a static presentation needs:
// PnDTnHnMn.nS, eg. "PT0H3M30.030S", "PT634.6S", "P1DT2H".
static XS_DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^P",
        r"(?:(?P<days>\d+)D)?",
        r"(?:(?P<hastime>T)",
        r"(?:(?P<hours>\d+(?:[.,]\d+)?)H)?",
        r"(?:(?P<minutes>\d+(?:[.,]\d+)?)M)?",
        r"(?:(?P<seconds>\d+(?:[.,]\d+)?)S)?",
        r")?$"
    ))
    .expect("valid duration regex")
});

/// Parse `MPD@mediaPresentationDuration` into a [Duration].
pub fn parse_xs_duration(s: &str) -> TsumugiResult<Duration> {
    let invalid = || TsumugiError::InvalidDuration(s.to_string());

    let captures = XS_DURATION_REGEX.captures(s.trim()).ok_or_else(invalid)?;
    if captures.name("days").is_none() && captures.name("hastime").is_none() {
        return Err(invalid());
    }

    let component = |name: &str| -> TsumugiResult<f64> {
        match captures.name(name) {
            Some(m) => m.as_str().replace(',', ".").parse().map_err(|_| invalid()),
            None => Ok(0.),
        }
    };

    let secs = component("days")? * 86400.
        + component("hours")? * 3600.
        + component("minutes")? * 60.
        + component("seconds")?;
    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}
