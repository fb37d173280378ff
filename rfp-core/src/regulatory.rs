//! Radio configuration ("RC") parameter sets.
//!
//! The add-on never owns the active configuration; it borrows one of these
//! for the lifetime of an open session and copies the frequencies it needs
//! into each run.

use core::fmt;

/// Channel-access rule enforced by a radio configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SpectrumAccess {
    /// Duty-cycle limited.
    DutyCycle,
    /// Low duty cycle.
    LowDutyCycle,
    /// Frequency hopping.
    FrequencyHopping,
    /// Listen before talk.
    ListenBeforeTalk {
        cs_threshold_dbm: i8,
        cs_max_duration_first_frame_ms: u32,
    },
}

impl SpectrumAccess {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SpectrumAccess::DutyCycle => "dc",
            SpectrumAccess::LowDutyCycle => "ldc",
            SpectrumAccess::FrequencyHopping => "fh",
            SpectrumAccess::ListenBeforeTalk { .. } => "lbt",
        }
    }
}

/// Regulatory parameter set for one geographic zone.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RadioConfiguration {
    pub name: &'static str,
    /// Central uplink frequency.
    pub f_ul_hz: u32,
    /// Central downlink frequency.
    pub f_dl_hz: u32,
    pub spectrum_access: SpectrumAccess,
    pub tx_power_dbm_eirp_max: i8,
}

impl fmt::Display for RadioConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ul={}Hz dl={}Hz access={}",
            self.name,
            self.f_ul_hz,
            self.f_dl_hz,
            self.spectrum_access.label()
        )
    }
}

pub const RC1: RadioConfiguration = RadioConfiguration {
    name: "RC1",
    f_ul_hz: 868_130_000,
    f_dl_hz: 869_525_000,
    spectrum_access: SpectrumAccess::DutyCycle,
    tx_power_dbm_eirp_max: 16,
};

pub const RC2: RadioConfiguration = RadioConfiguration {
    name: "RC2",
    f_ul_hz: 902_200_000,
    f_dl_hz: 905_200_000,
    spectrum_access: SpectrumAccess::FrequencyHopping,
    tx_power_dbm_eirp_max: 24,
};

pub const RC3: RadioConfiguration = RadioConfiguration {
    name: "RC3",
    f_ul_hz: 923_200_000,
    f_dl_hz: 922_200_000,
    spectrum_access: SpectrumAccess::ListenBeforeTalk {
        cs_threshold_dbm: -80,
        cs_max_duration_first_frame_ms: 5_000,
    },
    tx_power_dbm_eirp_max: 16,
};

pub const RC4: RadioConfiguration = RadioConfiguration {
    name: "RC4",
    f_ul_hz: 920_800_000,
    f_dl_hz: 922_300_000,
    spectrum_access: SpectrumAccess::FrequencyHopping,
    tx_power_dbm_eirp_max: 24,
};

pub const RC5: RadioConfiguration = RadioConfiguration {
    name: "RC5",
    f_ul_hz: 923_300_000,
    f_dl_hz: 922_300_000,
    spectrum_access: SpectrumAccess::ListenBeforeTalk {
        cs_threshold_dbm: -65,
        cs_max_duration_first_frame_ms: 5_000,
    },
    tx_power_dbm_eirp_max: 14,
};

pub const RC6: RadioConfiguration = RadioConfiguration {
    name: "RC6",
    f_ul_hz: 865_200_000,
    f_dl_hz: 866_300_000,
    spectrum_access: SpectrumAccess::DutyCycle,
    tx_power_dbm_eirp_max: 16,
};

pub const RC7: RadioConfiguration = RadioConfiguration {
    name: "RC7",
    f_ul_hz: 868_800_000,
    f_dl_hz: 869_100_000,
    spectrum_access: SpectrumAccess::DutyCycle,
    tx_power_dbm_eirp_max: 16,
};

const PRESETS: [&RadioConfiguration; 7] = [&RC1, &RC2, &RC3, &RC4, &RC5, &RC6, &RC7];

/// Returns every built-in radio configuration.
#[must_use]
pub const fn presets() -> &'static [&'static RadioConfiguration] {
    &PRESETS
}

/// Finds a preset by name (case insensitive).
#[must_use]
pub fn preset(name: &str) -> Option<&'static RadioConfiguration> {
    PRESETS
        .iter()
        .copied()
        .find(|rc| rc.name.eq_ignore_ascii_case(name))
}
