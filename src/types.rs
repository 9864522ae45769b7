/// Device state tracked by the driver.
///
/// The sensor powers up idle; measuring is entered with one of the start
/// commands and left with stop or reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    Idle,
    Measuring,
}

/// Measured values with the gas and RH/T channels.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// Mass Concentration PM1.0 [μg/m³]
    pub pm1_0: f32,
    /// Mass Concentration PM2.5 [μg/m³]
    pub pm2_5: f32,
    /// Mass Concentration PM4.0 [μg/m³]
    pub pm4_0: f32,
    /// Mass Concentration PM10 [μg/m³]
    pub pm10_0: f32,
    /// Compensated Ambient Humidity [%RH]
    pub humidity: f32,
    /// Compensated Ambient Temperature [°C]
    pub temperature: f32,
    /// VOC Index
    pub voc_index: f32,
    /// NOx Index
    pub nox_index: f32,
}

/// Particulate-matter-only measured values (SPS30 compatible layout).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PmMeasurement {
    /// Mass Concentration PM1.0 [μg/m³]
    pub pm1_0: f32,
    /// Mass Concentration PM2.5 [μg/m³]
    pub pm2_5: f32,
    /// Mass Concentration PM4.0 [μg/m³]
    pub pm4_0: f32,
    /// Mass Concentration PM10 [μg/m³]
    pub pm10_0: f32,
    /// Number Concentration PM0.5 [#/cm³]
    pub number_pm0_5: f32,
    /// Number Concentration PM1.0 [#/cm³]
    pub number_pm1_0: f32,
    /// Number Concentration PM2.5 [#/cm³]
    pub number_pm2_5: f32,
    /// Number Concentration PM4.0 [#/cm³]
    pub number_pm4_0: f32,
    /// Number Concentration PM10 [#/cm³]
    pub number_pm10_0: f32,
    /// Typical Particle Size [μm]
    pub typical_particle_size: f32,
}

/// Version levels reported by the sensor.
///
/// Only the firmware level is documented by the datasheet; the hardware and
/// protocol levels are present in the response anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Version {
    pub firmware: FirmwareVersion,
    /// Firmware is a debug build.
    pub firmware_debug: bool,
    pub hardware_major: u8,
    pub hardware_minor: u8,
    pub protocol_major: u8,
    pub protocol_minor: u8,
}

/// Firmware level of the connected sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl FirmwareVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        FirmwareVersion { major, minor }
    }

    /// Whether this level satisfies `required` as a minimum.
    pub const fn at_least(self, required: FirmwareVersion) -> bool {
        self.major > required.major
            || (self.major == required.major && self.minor >= required.minor)
    }
}

/// Device status register, read with the status command.
///
/// Requires firmware level 2.0. The fan-cleaning bit is a status, not a
/// fault; every other named bit latches a fault until cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceStatus(u32);

impl DeviceStatus {
    /// Fan speed out of range, warning.
    pub const FAN_SPEED_WARNING: u32 = 1 << 21;
    /// Automatic fan cleaning is running.
    pub const FAN_CLEANING_ACTIVE: u32 = 1 << 19;
    /// Gas sensor error (VOC and NOx).
    pub const GAS_SENSOR_ERROR: u32 = 1 << 7;
    /// RH/T sensor error.
    pub const RHT_ERROR: u32 = 1 << 6;
    /// Laser failure.
    pub const LASER_ERROR: u32 = 1 << 5;
    /// Fan failure, mechanically blocked or broken.
    pub const FAN_ERROR: u32 = 1 << 4;

    const FAULT_MASK: u32 = Self::FAN_SPEED_WARNING
        | Self::GAS_SENSOR_ERROR
        | Self::RHT_ERROR
        | Self::LASER_ERROR
        | Self::FAN_ERROR;

    pub const fn from_bits(bits: u32) -> Self {
        DeviceStatus(bits)
    }

    /// Raw register value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn has_fault(self) -> bool {
        self.0 & Self::FAULT_MASK != 0
    }

    pub const fn fan_cleaning_active(self) -> bool {
        self.0 & Self::FAN_CLEANING_ACTIVE != 0
    }

    pub const fn fan_speed_warning(self) -> bool {
        self.0 & Self::FAN_SPEED_WARNING != 0
    }

    pub const fn gas_sensor_error(self) -> bool {
        self.0 & Self::GAS_SENSOR_ERROR != 0
    }

    pub const fn rht_error(self) -> bool {
        self.0 & Self::RHT_ERROR != 0
    }

    pub const fn laser_error(self) -> bool {
        self.0 & Self::LASER_ERROR != 0
    }

    pub const fn fan_error(self) -> bool {
        self.0 & Self::FAN_ERROR != 0
    }
}

/// RH/T acceleration mode.
///
/// Applied only the next time a measurement is started. Medium and high are
/// indicated for monitors subject to large temperature changes, low for
/// stationary devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum RhtAccelerationMode {
    Low = 0,
    High = 1,
    Medium = 2,
}

impl TryFrom<u16> for RhtAccelerationMode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, u16> {
        match value {
            0 => Ok(RhtAccelerationMode::Low),
            1 => Ok(RhtAccelerationMode::High),
            2 => Ok(RhtAccelerationMode::Medium),
            other => Err(other),
        }
    }
}

impl From<RhtAccelerationMode> for u16 {
    fn from(mode: RhtAccelerationMode) -> u16 {
        mode as u16
    }
}

/// Temperature compensation parameters.
///
/// Offset and slope travel as scaled integers (×200 and ×1000); values finer
/// than the scale resolution do not round-trip, which is inherent to the wire
/// format.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureCompensation {
    /// Temperature offset [°C] (default 0).
    pub offset: f32,
    /// Normalized temperature offset slope (default 0).
    pub slope: f32,
    /// Time constant in seconds over which offset and slope are applied;
    /// after this many seconds, 63% of the new values are in effect.
    pub time_constant: u16,
}

impl TemperatureCompensation {
    pub(crate) const OFFSET_SCALE: f32 = 200.0;
    pub(crate) const SLOPE_SCALE: f32 = 1000.0;
}

/// VOC/NOx algorithm tuning parameters.
///
/// Details are in the application note "Engineering Guidelines for SEN5x".
/// Out-of-range fields are clamped to the datasheet default before writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TuningParameters {
    /// Index representing typical (average) conditions, 1..=250.
    pub index_offset: i16,
    /// Time constant to estimate the algorithm offset from history, in
    /// hours, 1..=1000. Past events are forgotten after about twice this.
    pub learn_time_offset_hours: i16,
    /// Time constant to estimate the algorithm gain from history, in hours,
    /// 1..=1000. Has no impact for NOx and must stay at 12 there.
    pub learn_time_gain_hours: i16,
    /// Maximum gating duration in minutes (estimator frozen during a high
    /// index signal), 0..=3000; zero disables gating.
    pub gate_max_duration_min: i16,
    /// Initial estimate for the standard deviation parameter, 10..=5000.
    /// Has no impact for NOx and must stay at 50 there.
    pub std_initial: i16,
    /// Gain factor to amplify or attenuate the index output, 1..=1000.
    pub gain_factor: i16,
}

impl TuningParameters {
    /// Datasheet defaults for the VOC algorithm.
    pub const fn voc_defaults() -> Self {
        TuningParameters {
            index_offset: 100,
            learn_time_offset_hours: 12,
            learn_time_gain_hours: 12,
            gate_max_duration_min: 180,
            std_initial: 50,
            gain_factor: 230,
        }
    }

    /// Datasheet defaults for the NOx algorithm.
    pub const fn nox_defaults() -> Self {
        TuningParameters {
            index_offset: 1,
            learn_time_offset_hours: 12,
            learn_time_gain_hours: 12,
            gate_max_duration_min: 720,
            std_initial: 50,
            gain_factor: 230,
        }
    }

    /// Clamps every field into its VOC range, falling back to the default.
    pub(crate) fn clamped_voc(self) -> Self {
        let defaults = Self::voc_defaults();
        TuningParameters {
            index_offset: in_range_or(self.index_offset, 1, 250, defaults.index_offset),
            learn_time_offset_hours: in_range_or(
                self.learn_time_offset_hours,
                1,
                1000,
                defaults.learn_time_offset_hours,
            ),
            learn_time_gain_hours: in_range_or(
                self.learn_time_gain_hours,
                1,
                1000,
                defaults.learn_time_gain_hours,
            ),
            gate_max_duration_min: in_range_or(
                self.gate_max_duration_min,
                0,
                3000,
                defaults.gate_max_duration_min,
            ),
            std_initial: in_range_or(self.std_initial, 10, 5000, defaults.std_initial),
            gain_factor: in_range_or(self.gain_factor, 1, 1000, defaults.gain_factor),
        }
    }

    /// Clamps for an NOx write. `learn_time_gain_hours` and `std_initial`
    /// are datasheet constants and are overwritten regardless of input.
    pub(crate) fn clamped_nox(self) -> Self {
        let defaults = Self::nox_defaults();
        TuningParameters {
            index_offset: in_range_or(self.index_offset, 1, 250, defaults.index_offset),
            learn_time_offset_hours: in_range_or(
                self.learn_time_offset_hours,
                1,
                1000,
                defaults.learn_time_offset_hours,
            ),
            learn_time_gain_hours: 12,
            gate_max_duration_min: in_range_or(
                self.gate_max_duration_min,
                0,
                3000,
                defaults.gate_max_duration_min,
            ),
            std_initial: 50,
            gain_factor: in_range_or(self.gain_factor, 1, 1000, defaults.gain_factor),
        }
    }

    /// Wire order of the six words.
    pub(crate) fn as_words(&self) -> [i16; 6] {
        [
            self.index_offset,
            self.learn_time_offset_hours,
            self.learn_time_gain_hours,
            self.gate_max_duration_min,
            self.std_initial,
            self.gain_factor,
        ]
    }

    pub(crate) fn from_words(words: [i16; 6]) -> Self {
        TuningParameters {
            index_offset: words[0],
            learn_time_offset_hours: words[1],
            learn_time_gain_hours: words[2],
            gate_max_duration_min: words[3],
            std_initial: words[4],
            gain_factor: words[5],
        }
    }
}

fn in_range_or(value: i16, min: i16, max: i16, default: i16) -> i16 {
    if value < min || value > max {
        default
    } else {
        value
    }
}

/// Size of the opaque VOC algorithm state blob. The device exchanges 8
/// bytes, not the 10 the datasheet claims.
pub const VOC_ALGORITHM_STATE_LEN: usize = 8;

/// Opaque VOC algorithm state for save/restore across power cycles.
pub type VocAlgorithmState = [u8; VOC_ALGORITHM_STATE_LEN];
