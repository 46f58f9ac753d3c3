//! # Localization
//!
//! Conversion of wall-clock values between UTC (storage) and the
//! requester's timezone (display and input).
//!
//! The zone is guessed from the geolocation header once per request and
//! cached in the request scope. Whenever the guess is impossible (no
//! header, deferred context, unknown country, several zones) UTC is used,
//! which turns both conversions into the identity.

use crate::context::RequestContext;
use crate::tzdata::country_timezones;
use chrono::{Duration, LocalResult, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use tracing::debug;

/// Request-scope key of the cached timezone guess
pub const TIME_ZONE_CACHE_KEY: &str = "timeZone";

/// Guess the timezone of the requester, cached per request
pub fn guess_time_zone(ctx: &RequestContext) -> Tz {
    ctx.scope()
        .get_or_insert_with(TIME_ZONE_CACHE_KEY, || guess_uncached(ctx))
}

fn guess_uncached(ctx: &RequestContext) -> Tz {
    if !ctx.is_interactive() {
        return Tz::UTC;
    }
    let conf = ctx.conf();
    let Some(country) = ctx.header(&conf.country_header) else {
        return Tz::UTC;
    };
    let Some(zones) = country_timezones(country) else {
        debug!(country, "Unknown country, using UTC");
        return Tz::UTC;
    };
    let zone = match zones {
        [single] => *single,
        _ if country.eq_ignore_ascii_case("us") => conf.us_fallback_zone.as_str(),
        _ => {
            debug!(country, zones = zones.len(), "Ambiguous country, using UTC");
            return Tz::UTC;
        }
    };
    zone.parse().unwrap_or_else(|_| {
        debug!(zone, "Zone missing from the timezone database, using UTC");
        Tz::UTC
    })
}

/// Convert a UTC wall-clock value into `tz`
#[must_use]
pub fn to_local(utc: NaiveDateTime, tz: Tz) -> NaiveDateTime {
    if tz == Tz::UTC {
        return utc;
    }
    tz.from_utc_datetime(&utc).naive_local()
}

/// Convert a wall-clock value in `tz` into UTC
///
/// The value is tagged with the zone and normalized so the offset reflects
/// DST at that very date. Ambiguous times (clocks turned back) resolve to
/// standard time. Times skipped by a DST jump are normalized past the jump,
/// and the original wall-clock fields are then read with the offset in
/// effect after it.
#[must_use]
pub fn to_utc(local: NaiveDateTime, tz: Tz) -> NaiveDateTime {
    if tz == Tz::UTC {
        return local;
    }
    let offset = match tz.from_local_datetime(&local) {
        LocalResult::Single(tagged) => tagged.offset().fix(),
        LocalResult::Ambiguous(_, standard) => standard.offset().fix(),
        LocalResult::None => {
            let before = tz.offset_from_utc_datetime(&(local - Duration::days(1))).fix();
            let shifted = local - Duration::seconds(i64::from(before.local_minus_utc()));
            tz.from_utc_datetime(&shifted).offset().fix()
        }
    };
    local - Duration::seconds(i64::from(offset.local_minus_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Conf;
    use crate::i18n::Translations;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn ctx_with_country(country: Option<&str>) -> RequestContext {
        let mut headers = HashMap::new();
        if let Some(c) = country {
            headers.insert("X-Appengine-Country".to_string(), c.to_string());
        }
        RequestContext::new(
            Arc::new(Conf::default()),
            Arc::new(Translations::new()),
            headers,
        )
    }

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_guess_single_zone_country() {
        assert_eq!(guess_time_zone(&ctx_with_country(Some("AT"))), Tz::Europe__Vienna);
        for (country, zone) in [
            ("LK", Tz::Asia__Colombo),
            ("NI", Tz::America__Managua),
            ("SN", Tz::Africa__Dakar),
            ("KH", Tz::Asia__Phnom_Penh),
        ] {
            assert_eq!(guess_time_zone(&ctx_with_country(Some(country))), zone, "{country}");
        }
    }

    #[test]
    fn test_guess_us_fallback() {
        assert_eq!(guess_time_zone(&ctx_with_country(Some("us"))), Tz::EST);
    }

    #[test]
    fn test_guess_ambiguous_and_missing() {
        assert_eq!(guess_time_zone(&ctx_with_country(Some("RU"))), Tz::UTC);
        assert_eq!(guess_time_zone(&ctx_with_country(Some("DE"))), Tz::UTC);
        assert_eq!(guess_time_zone(&ctx_with_country(Some("ZZ"))), Tz::UTC);
        assert_eq!(guess_time_zone(&ctx_with_country(None)), Tz::UTC);
    }

    #[test]
    fn test_guess_detached_is_utc() {
        let ctx = RequestContext::detached(Arc::new(Conf::default()), Arc::new(Translations::new()));
        assert_eq!(guess_time_zone(&ctx), Tz::UTC);
    }

    #[test]
    fn test_guess_is_cached_per_request() {
        let ctx = ctx_with_country(Some("FR"));
        assert_eq!(guess_time_zone(&ctx), Tz::Europe__Paris);
        assert_eq!(ctx.scope().get::<Tz>(TIME_ZONE_CACHE_KEY), Some(Tz::Europe__Paris));

        // The cached entry wins over the header
        ctx.scope().set(TIME_ZONE_CACHE_KEY, Tz::Asia__Tokyo);
        assert_eq!(guess_time_zone(&ctx), Tz::Asia__Tokyo);
    }

    #[test]
    fn test_dst_aware_conversion() {
        let berlin = Tz::Europe__Berlin;
        // Summer: CEST (+2)
        assert_eq!(to_utc(dt(2024, 7, 1, 12, 0, 0), berlin), dt(2024, 7, 1, 10, 0, 0));
        // Winter: CET (+1)
        assert_eq!(to_utc(dt(2024, 1, 15, 12, 0, 0), berlin), dt(2024, 1, 15, 11, 0, 0));
        assert_eq!(to_local(dt(2024, 7, 1, 10, 0, 0), berlin), dt(2024, 7, 1, 12, 0, 0));
    }

    #[test]
    fn test_round_trip_outside_transitions() {
        let tz = Tz::America__New_York;
        for value in [dt(2023, 3, 1, 8, 30, 15), dt(2023, 8, 20, 23, 59, 59)] {
            assert_eq!(to_local(to_utc(value, tz), tz), value);
        }
    }

    #[test]
    fn test_ambiguous_time_uses_standard() {
        // 2024-10-27 02:30 happens twice in Berlin; standard time is +1
        assert_eq!(
            to_utc(dt(2024, 10, 27, 2, 30, 0), Tz::Europe__Berlin),
            dt(2024, 10, 27, 1, 30, 0)
        );
    }

    #[test]
    fn test_skipped_time_uses_post_jump_offset() {
        // 2024-03-31 02:30 doesn't exist in Berlin; read with CEST (+2)
        assert_eq!(
            to_utc(dt(2024, 3, 31, 2, 30, 0), Tz::Europe__Berlin),
            dt(2024, 3, 31, 0, 30, 0)
        );
    }

    #[test]
    fn test_utc_is_identity() {
        let value = dt(2024, 5, 5, 5, 5, 5);
        assert_eq!(to_utc(value, Tz::UTC), value);
        assert_eq!(to_local(value, Tz::UTC), value);
    }
}
