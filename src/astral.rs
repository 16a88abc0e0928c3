/*
 *  astral.rs
 *
 *  inkpanel - e-ink display control panel
 *  (c) 2020-26 Stuart Hunter
 *
 *  Independent astronomical calculations (moon age, phase, illumination)
 *  Used by the forecast strip - works without the weather service
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use chrono::NaiveDate;

/// Mean synodic month in days
pub const LUNAR_CYCLE_DAYS: f64 = 29.530588853;

/// Julian day of the new moon on 2000-01-06 18:14 UTC
const REFERENCE_NEW_MOON_JD: f64 = 2451550.26;

/// Julian day of 1970-01-01 00:00 UTC
const UNIX_EPOCH_JD: f64 = 2440587.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoonPhase {
    NewMoon,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    FullMoon,
    WaningGibbous,
    LastQuarter,
    WaningCrescent,
}

impl MoonPhase {
    /// Icon name as used for the forecast strip
    pub fn name(self) -> &'static str {
        match self {
            MoonPhase::NewMoon => "newmoon",
            MoonPhase::WaxingCrescent => "waxingcrescent",
            MoonPhase::FirstQuarter => "firstquarter",
            MoonPhase::WaxingGibbous => "waxinggibbous",
            MoonPhase::FullMoon => "fullmoon",
            MoonPhase::WaningGibbous => "waninggibbous",
            MoonPhase::LastQuarter => "lastquarter",
            MoonPhase::WaningCrescent => "waningcrescent",
        }
    }

    /// The phase as seen from the southern hemisphere (lit side mirrored).
    pub fn mirrored(self) -> Self {
        match self {
            MoonPhase::WaxingCrescent => MoonPhase::WaningCrescent,
            MoonPhase::WaningCrescent => MoonPhase::WaxingCrescent,
            MoonPhase::FirstQuarter => MoonPhase::LastQuarter,
            MoonPhase::LastQuarter => MoonPhase::FirstQuarter,
            MoonPhase::WaxingGibbous => MoonPhase::WaningGibbous,
            MoonPhase::WaningGibbous => MoonPhase::WaxingGibbous,
            other => other,
        }
    }
}

/// Moon data for a specific day
#[derive(Debug, Clone)]
pub struct MoonData {
    pub date: NaiveDate,
    /// Days since new moon, 0..LUNAR_CYCLE_DAYS
    pub age: f64,
    pub phase: MoonPhase,
    /// Lit fraction of the disc, percent
    pub illumination_pct: f64,
}

impl MoonData {
    pub fn for_date(date: NaiveDate) -> Self {
        let age = moon_age(date);
        Self {
            date,
            age,
            phase: phase_for_age(age),
            illumination_pct: illumination_pct(age),
        }
    }

    /// Icon name for an observer at `lat`
    pub fn icon_name(&self, lat: f64) -> &'static str {
        if lat < 0.0 {
            self.phase.mirrored().name()
        } else {
            self.phase.name()
        }
    }
}

fn julian_day(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    // noon, so the phase reflects the middle of the day
    (date - epoch).num_days() as f64 + UNIX_EPOCH_JD + 0.5
}

/// Age of the moon in days at noon UTC on `date`.
pub fn moon_age(date: NaiveDate) -> f64 {
    let cycles = (julian_day(date) - REFERENCE_NEW_MOON_JD) / LUNAR_CYCLE_DAYS;
    cycles.rem_euclid(1.0) * LUNAR_CYCLE_DAYS
}

pub fn illumination_pct(age: f64) -> f64 {
    let fraction = age / LUNAR_CYCLE_DAYS;
    (1.0 - (2.0 * std::f64::consts::PI * fraction).cos()) / 2.0 * 100.0
}

pub fn phase_for_age(age: f64) -> MoonPhase {
    // eight equal slices, centred on the principal phases
    let slice = LUNAR_CYCLE_DAYS / 8.0;
    let idx = ((age + slice / 2.0) / slice).floor() as u32 % 8;
    match idx {
        0 => MoonPhase::NewMoon,
        1 => MoonPhase::WaxingCrescent,
        2 => MoonPhase::FirstQuarter,
        3 => MoonPhase::WaxingGibbous,
        4 => MoonPhase::FullMoon,
        5 => MoonPhase::WaningGibbous,
        6 => MoonPhase::LastQuarter,
        _ => MoonPhase::WaningCrescent,
    }
}
