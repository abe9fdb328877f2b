use crate::error::{DataplaneError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicerType {
    OneRateTwoColor,
    OneRateThreeColor2697,
    TwoRateThreeColor2698,
    TwoRateThreeColor4115,
    TwoRateThreeColorMef5Cf1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    Kbps,
    Pps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Closest,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Drop,
    Transmit,
    MarkDscpAndTransmit,
}

/// The logical, user-facing policer configuration — `qos_pol_cfg` in
/// spec.md §3.3. Validated and converted to a [`PolicerRuntime`] by
/// [`to_runtime`] before it ever reaches the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicerConfig {
    pub policer_type: PolicerType,
    pub rate_unit: RateUnit,
    pub rounding: Rounding,
    pub color_aware: bool,
    pub cir: u64,
    pub cb: u64,
    pub pir: u64,
    pub eb: u64,
    pub conform_action: Action,
    pub exceed_action: Action,
    pub violate_action: Action,
}

/// Runtime state derived from a [`PolicerConfig`] — `policer_t` in
/// spec.md §3.3. The hot-path bucket-advance formula
/// `bucket <- min(limit, bucket + elapsed_ticks * tokens_per_period >> scale)`
/// is this crate's read contract on these fields; advancing the bucket on
/// every packet is out of scope here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicerRuntime {
    pub cir_tokens_per_period: u64,
    pub pir_tokens_per_period: u64,
    pub scale: u8,
    pub current_limit: i64,
    pub extended_limit: i64,
    pub current_bucket: i64,
    pub extended_bucket: i64,
}

const SCALE_BITS: u8 = 14;

/// Ticks the hot-path bucket-advance formula counts `elapsed_ticks` in —
/// microseconds, the same tick granularity `pacer::tx_pacer` uses for its
/// own `tokens_per_period` (see `US_TIME_FREQ` there).
const TICKS_PER_SECOND: u64 = 1_000_000;

/// Deterministic, pure `cfg -> runtime` conversion (spec.md §4.2 "logical
/// to physical"). Rejects an inverted `cir > pir` for dual-rate types and
/// any rate or burst that would overflow the fixed-point token scale.
pub fn to_runtime(cfg: &PolicerConfig) -> Result<PolicerRuntime> {
    let is_dual_rate = matches!(
        cfg.policer_type,
        PolicerType::TwoRateThreeColor2698 | PolicerType::TwoRateThreeColor4115 | PolicerType::TwoRateThreeColorMef5Cf1
    );

    if is_dual_rate && cfg.cir > cfg.pir {
        return Err(DataplaneError::Invalid(format!("cir ({}) must be <= pir ({})", cfg.cir, cfg.pir)));
    }
    if cfg.cir == 0 {
        return Err(DataplaneError::Invalid("cir must be > 0".to_string()));
    }

    let bytes_per_unit: u64 = match cfg.rate_unit {
        RateUnit::Kbps => 1000 / 8,
        RateUnit::Pps => 1,
    };

    let cir_tokens_per_period = checked_tokens_per_period(cfg.cir, bytes_per_unit, cfg.rounding)?;
    let pir_tokens_per_period = if is_dual_rate {
        checked_tokens_per_period(cfg.pir.max(cfg.cir), bytes_per_unit, cfg.rounding)?
    } else {
        cir_tokens_per_period
    };

    let current_limit = i64::try_from(cfg.cb).map_err(|_| DataplaneError::Invalid("cb out of range".to_string()))?;
    let extended_limit = i64::try_from(cfg.eb.max(cfg.cb))
        .map_err(|_| DataplaneError::Invalid("eb out of range".to_string()))?;

    Ok(PolicerRuntime {
        cir_tokens_per_period,
        pir_tokens_per_period,
        scale: SCALE_BITS,
        current_limit,
        extended_limit,
        current_bucket: current_limit,
        extended_bucket: extended_limit,
    })
}

/// Converts a configured rate into tokens-per-tick at `2^SCALE_BITS`
/// fixed-point precision. `bytes_per_unit * rate` is a whole number of
/// bytes/sec, but dividing that by `TICKS_PER_SECOND` to get bytes/tick
/// almost never lands on an exact tick boundary, so `rounding` (the
/// original's `rnd_type`, spec.md §3.3) picks how the remainder is
/// resolved rather than always truncating the way `pacer::tx_pacer`'s
/// fixed rate conversion does.
fn checked_tokens_per_period(rate: u64, bytes_per_unit: u64, rounding: Rounding) -> Result<u64> {
    let bytes_per_sec = rate
        .checked_mul(bytes_per_unit)
        .ok_or_else(|| DataplaneError::Invalid(format!("rate {rate} overflows token scale")))?;
    let numerator = u128::from(bytes_per_sec) << u32::from(SCALE_BITS);
    let denom = u128::from(TICKS_PER_SECOND);
    let divided = match rounding {
        Rounding::Down => numerator / denom,
        Rounding::Up => (numerator + denom - 1) / denom,
        Rounding::Closest => (numerator + denom / 2) / denom,
    };
    u64::try_from(divided).map_err(|_| DataplaneError::Invalid(format!("rate {rate} overflows token scale")))
}
