//! Size and duration parsers using nom
//!
//! Size format (binary and decimal suffixes, optional fraction):
//! ```text
//! 0  512  1Ki  1.5Mi  10Gi  2k  3M  1G
//! ```
//!
//! Duration format (one or more number/unit pairs):
//! ```text
//! 0  250ms  30s  5m  1h  1h30m
//! ```

use std::time::Duration;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, opt, value},
    multi::many1,
    sequence::{pair, preceded},
    IResult,
};

use crate::error::{Error, Result};

fn number(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    pair(digit1, opt(preceded(char('.'), digit1)))(input)
}

fn size_suffix(input: &str) -> IResult<&str, u128> {
    alt((
        value(1u128 << 10, tag("Ki")),
        value(1u128 << 20, tag("Mi")),
        value(1u128 << 30, tag("Gi")),
        value(1u128 << 40, tag("Ti")),
        value(1u128 << 50, tag("Pi")),
        value(1u128 << 60, tag("Ei")),
        value(1_000u128, tag("k")),
        value(1_000_000u128, tag("M")),
        value(1_000_000_000u128, tag("G")),
        value(1_000_000_000_000u128, tag("T")),
        value(1_000_000_000_000_000u128, tag("P")),
        value(1_000_000_000_000_000_000u128, tag("E")),
    ))(input)
}

/// Parse a size quantity into bytes.
///
/// Fractions are rounded up to the next whole byte.
pub fn parse_quantity(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let (_, ((int, frac), multiplier)) = all_consuming(pair(number, opt(size_suffix)))(trimmed)
        .map_err(|_| Error::Parse(format!("invalid size quantity {:?}", input)))?;
    let multiplier = multiplier.unwrap_or(1);
    let overflow = || Error::Parse(format!("size quantity {:?} is too large", input));

    let int: u128 = int.parse().map_err(|_| overflow())?;
    let mut bytes = int.checked_mul(multiplier).ok_or_else(overflow)?;

    if let Some(frac) = frac {
        let denominator = u32::try_from(frac.len())
            .ok()
            .and_then(|len| 10u128.checked_pow(len))
            .ok_or_else(overflow)?;
        let numerator: u128 = frac.parse().map_err(|_| overflow())?;
        let scaled = numerator.checked_mul(multiplier).ok_or_else(overflow)?;
        bytes = bytes
            .checked_add(scaled.div_ceil(denominator))
            .ok_or_else(overflow)?;
    }

    u64::try_from(bytes).map_err(|_| overflow())
}

fn duration_unit(input: &str) -> IResult<&str, u64> {
    alt((
        value(1u64, tag("ms")),
        value(1_000u64, tag("s")),
        value(60_000u64, tag("m")),
        value(3_600_000u64, tag("h")),
    ))(input)
}

fn duration_part(input: &str) -> IResult<&str, (u64, u64)> {
    pair(map_res(digit1, str::parse::<u64>), duration_unit)(input)
}

/// Parse a duration such as `1h30m`
pub fn parse_duration(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }
    let (_, parts) = all_consuming(many1(duration_part))(trimmed)
        .map_err(|_| Error::Parse(format!("invalid duration {:?}", input)))?;

    let mut millis: u64 = 0;
    for (amount, unit) in parts {
        millis = amount
            .checked_mul(unit)
            .and_then(|ms| millis.checked_add(ms))
            .ok_or_else(|| Error::Parse(format!("duration {:?} is too large", input)))?;
    }
    Ok(Duration::from_millis(millis))
}
