//! SEN55 command set.
//!
//! Each command is a 16-bit opcode sent MSB first. Reads and writes share the
//! same opcode; whether a transaction carries a payload is decided by the
//! frame builder, not by a separate write opcode.

/// A command understood by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Command {
    StartMeasurement,
    /// Starts a measurement without the laser, RH/T and gas only.
    StartMeasurementWithoutPm,
    StopMeasurement,
    ReadDataReady,
    ReadMeasuredValues,
    /// Mass, number concentrations and typical particle size (undocumented,
    /// SPS30 compatible).
    ReadMeasuredValuesPm,
    TemperatureCompensation,
    WarmStartParameter,
    VocTuning,
    NoxTuning,
    RhtAcceleration,
    VocAlgorithmState,
    StartFanCleaning,
    AutoCleaningInterval,
    ReadProductName,
    ReadSerialNumber,
    ReadVersion,
    ReadDeviceStatus,
    ClearDeviceStatus,
    Reset,
}

impl Command {
    pub(crate) const fn opcode(self) -> u16 {
        match self {
            Command::StartMeasurement => 0x0021,
            Command::StartMeasurementWithoutPm => 0x0037,
            Command::StopMeasurement => 0x0104,
            Command::ReadDataReady => 0x0202,
            Command::ReadMeasuredValues => 0x03C4,
            Command::ReadMeasuredValuesPm => 0x0413,
            Command::TemperatureCompensation => 0x60B2,
            Command::WarmStartParameter => 0x60C6,
            Command::VocTuning => 0x60D0,
            Command::NoxTuning => 0x60E1,
            Command::RhtAcceleration => 0x60F7,
            Command::VocAlgorithmState => 0x6181,
            Command::StartFanCleaning => 0x5607,
            Command::AutoCleaningInterval => 0x8004,
            Command::ReadProductName => 0xD014,
            Command::ReadSerialNumber => 0xD033,
            Command::ReadVersion => 0xD100,
            Command::ReadDeviceStatus => 0xD206,
            Command::ClearDeviceStatus => 0xD210,
            Command::Reset => 0xD304,
        }
    }
}
