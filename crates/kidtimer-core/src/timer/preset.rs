use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Quick-pick countdown durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPreset {
    FiveMinutes,
    TenMinutes,
    FifteenMinutes,
    TwentyFiveMinutes,
    ThirtyMinutes,
    FortyFiveMinutes,
    OneHour,
}

impl TimerPreset {
    pub const ALL: [TimerPreset; 7] = [
        TimerPreset::FiveMinutes,
        TimerPreset::TenMinutes,
        TimerPreset::FifteenMinutes,
        TimerPreset::TwentyFiveMinutes,
        TimerPreset::ThirtyMinutes,
        TimerPreset::FortyFiveMinutes,
        TimerPreset::OneHour,
    ];

    pub fn minutes(&self) -> u64 {
        match self {
            TimerPreset::FiveMinutes => 5,
            TimerPreset::TenMinutes => 10,
            TimerPreset::FifteenMinutes => 15,
            TimerPreset::TwentyFiveMinutes => 25,
            TimerPreset::ThirtyMinutes => 30,
            TimerPreset::FortyFiveMinutes => 45,
            TimerPreset::OneHour => 60,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.minutes() * 60 * 1000
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TimerPreset::FiveMinutes => "5 min",
            TimerPreset::TenMinutes => "10 min",
            TimerPreset::FifteenMinutes => "15 min",
            TimerPreset::TwentyFiveMinutes => "25 min",
            TimerPreset::ThirtyMinutes => "30 min",
            TimerPreset::FortyFiveMinutes => "45 min",
            TimerPreset::OneHour => "1 hour",
        }
    }

    /// Ages (in years) this duration suits.
    pub fn recommended_ages(&self) -> RangeInclusive<u8> {
        match self {
            TimerPreset::FiveMinutes => 4..=6,
            TimerPreset::TenMinutes => 5..=7,
            TimerPreset::FifteenMinutes => 6..=8,
            TimerPreset::TwentyFiveMinutes => 8..=10,
            TimerPreset::ThirtyMinutes => 9..=12,
            TimerPreset::FortyFiveMinutes => 10..=14,
            TimerPreset::OneHour => 12..=16,
        }
    }

    /// Presets recommended for a child of the given age, shortest first.
    pub fn for_age(age: u8) -> Vec<TimerPreset> {
        Self::ALL
            .into_iter()
            .filter(|p| p.recommended_ages().contains(&age))
            .collect()
    }
}
