use std::fmt;
use std::sync::Arc;

use time::OffsetDateTime;
use time_tz::{OffsetDateTimeExt, TimeZone, Tz, timezones};

use crate::error::ProtocolError;

/// A datetime pinned to a named IANA time zone.
///
/// A plain [`OffsetDateTime`] keeps only the UTC offset in effect at
/// that instant. This keeps the zone too, so a value such as
/// `Europe/Paris` survives a round trip even though its offset changes
/// with the season. The local time is always the instant converted into
/// the zone, never a free-standing wall clock.
#[derive(Clone, PartialEq, Eq)]
pub struct ZonedDateTime {
  local: OffsetDateTime,
  zone: Arc<str>,
}

impl ZonedDateTime {
  /// Place `instant` in the zone called `zone`.
  ///
  /// # Errors
  ///
  /// [`ProtocolError::UnknownTimeZone`] if `zone` is not in the IANA
  /// database.
  pub fn new(instant: OffsetDateTime, zone: &str) -> Result<Self, ProtocolError> {
    let tz = lookup(zone)?;
    Ok(Self {
      local: instant.to_timezone(tz),
      zone: Arc::from(tz.name()),
    })
  }

  /// Wall-clock time in the zone, with the offset in effect.
  #[must_use]
  pub fn local(&self) -> OffsetDateTime {
    self.local
  }

  /// The same instant at offset zero.
  #[must_use]
  pub fn utc(&self) -> OffsetDateTime {
    self.local.to_offset(time::UtcOffset::UTC)
  }

  /// IANA name, e.g. `America/New_York`.
  #[must_use]
  pub fn zone(&self) -> &str {
    &self.zone
  }
}

impl fmt::Debug for ZonedDateTime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} [{}]", self.local, self.zone)
  }
}

fn lookup(name: &str) -> Result<&'static Tz, ProtocolError> {
  timezones::get_by_name(name).ok_or_else(|| ProtocolError::UnknownTimeZone {
    name: name.to_owned(),
  })
}

#[cfg(test)]
mod tests {
  use time::macros::datetime;

  use super::*;

  #[test]
  fn local_time_follows_the_zone() {
    let summer = ZonedDateTime::new(datetime!(2024-07-01 12:00 UTC), "Europe/Paris").unwrap();
    assert_eq!(summer.local().offset().whole_hours(), 2);
    assert_eq!(summer.local().hour(), 14);

    let winter = ZonedDateTime::new(datetime!(2024-01-01 12:00 UTC), "Europe/Paris").unwrap();
    assert_eq!(winter.local().offset().whole_hours(), 1);
    assert_eq!(winter.utc(), datetime!(2024-01-01 12:00 UTC));
    assert_eq!(winter.zone(), "Europe/Paris");
  }

  #[test]
  fn offset_of_the_input_is_irrelevant() {
    let a = ZonedDateTime::new(datetime!(2024-03-01 09:00 +09:00), "Asia/Tokyo").unwrap();
    let b = ZonedDateTime::new(datetime!(2024-03-01 00:00 UTC), "Asia/Tokyo").unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn unknown_zone_rejected() {
    assert!(matches!(
      ZonedDateTime::new(OffsetDateTime::UNIX_EPOCH, "Mars/Olympus_Mons"),
      Err(ProtocolError::UnknownTimeZone { name }) if name == "Mars/Olympus_Mons"
    ));
  }
}
