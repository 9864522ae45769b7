//! Platform-agnostic driver for the Sensirion SEN55 particulate matter and
//! gas sensor node, built on [`embedded-hal`](embedded_hal) 1.0 traits.
//!
//! The driver owns one I2C transaction at a time: it builds a
//! checksum-protected command frame, sends it, reads the raw response and
//! validates every 2-byte word against its CRC-8 before decoding typed
//! values. Device state (idle/measuring) and the cached firmware level live
//! on the driver and gate which commands are issued.
//!
//! ```no_run
//! use embedded_hal_mock::eh1::delay::NoopDelay;
//! use embedded_hal_mock::eh1::i2c::Mock as I2cMock;
//! use sen55_rs::Sen55;
//!
//! let mut sensor = Sen55::new(I2cMock::new(&[]), NoopDelay::new());
//! sensor.start_measurement()?;
//! let values = sensor.read_measured_values(true)?;
//! // values.pm2_5, values.temperature, values.voc_index, ...
//! # Ok::<(), sen55_rs::Error<embedded_hal::i2c::ErrorKind>>(())
//! ```

#![cfg_attr(not(test), no_std)]

mod cmd;
mod crc;
mod frame;
mod types;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::cmd::Command;
use crate::frame::{Frame, Payload, ReceiveBuffer};
pub use crate::frame::FrameError;
pub use crate::types::{
    DeviceState, DeviceStatus, FirmwareVersion, Measurement, PmMeasurement, RhtAccelerationMode,
    TemperatureCompensation, TuningParameters, Version, VocAlgorithmState,
    VOC_ALGORITHM_STATE_LEN,
};

/// Fixed I2C address of the SEN55.
pub const SEN55_I2C_ADDRESS: u8 = 0x69;

/// Factory default auto-cleaning interval: one week, in seconds.
pub const DEFAULT_AUTO_CLEANING_INTERVAL: u32 = 604_800;

/// Maximum length of the serial number and product name, in characters.
pub const TEXT_LEN: usize = 32;

/// The status command needs firmware 2.0.
const STATUS_MIN_FIRMWARE: FirmwareVersion = FirmwareVersion::new(2, 0);

/// Settle time between setting the read pointer and reading the response.
const POINTER_DELAY_MS: u32 = 5;
/// Settle time after a start command. The datasheet minimum is 20 ms; the
/// generous margin matches boards that need far more.
const START_DELAY_MS: u32 = 1000;
/// Settle time after a reset before the device answers again.
const RESET_DELAY_MS: u32 = 1000;
/// Warm-up before the first value read after an automatic start.
const WARMUP_DELAY_MS: u32 = 100;

/// Driver errors.
///
/// `E` is the error type of the underlying bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Wrong data length for this command (too much or too little data).
    DataLength,
    /// Unknown command.
    UnknownCommand,
    /// No access right for this command.
    AccessDenied,
    /// Illegal command parameter or parameter out of the allowed range.
    InvalidParameter,
    /// The device status register reported a fault; the raw bit mask is
    /// preserved for inspection.
    SensorFault(DeviceStatus),
    /// Command not allowed in the current device state.
    InvalidState,
    /// No response received within the timeout period.
    Timeout,
    /// Checksum or framing failure in a response.
    Protocol(FrameError),
    /// The connected sensor's firmware level is below the required minimum.
    UnsupportedFirmware {
        required: FirmwareVersion,
    },
    /// The firmware level could not be determined, so a firmware-gated
    /// command was refused.
    FirmwareUnknown,
    /// Bus transport failure.
    I2c(E),
}

impl<E> From<FrameError> for Error<E> {
    fn from(err: FrameError) -> Self {
        Error::Protocol(err)
    }
}

impl<E: core::fmt::Display> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::DataLength => f.write_str("wrong data length for this command"),
            Error::UnknownCommand => f.write_str("unknown command"),
            Error::AccessDenied => f.write_str("no access right for command"),
            Error::InvalidParameter => {
                f.write_str("illegal command parameter or parameter out of allowed range")
            }
            Error::SensorFault(status) => {
                write!(f, "device status register reports a fault: {:#x}", status.bits())
            }
            Error::InvalidState => f.write_str("command not allowed in current state"),
            Error::Timeout => f.write_str("no response received within timeout period"),
            Error::Protocol(err) => write!(f, "protocol error: {err}"),
            Error::UnsupportedFirmware { required } => write!(
                f,
                "not supported below firmware level {}.{}",
                required.major, required.minor
            ),
            Error::FirmwareUnknown => f.write_str("firmware level unknown"),
            Error::I2c(err) => write!(f, "I2C error: {err}"),
        }
    }
}

#[cfg(feature = "thiserror")]
impl<E: core::fmt::Debug + core::fmt::Display> core::error::Error for Error<E> {}

/// SEN55 driver.
///
/// Owns the bus handle, a delay provider and one transaction's worth of
/// send/receive state. Not safe for concurrent use from multiple threads
/// without external synchronization; every operation is a blocking
/// request/response pair.
pub struct Sen55<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    state: DeviceState,
    firmware: Option<FirmwareVersion>,
    text_wire_cap: usize,
}

impl<I2C, D, E> Sen55<I2C, D>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
{
    /// Creates a driver on the fixed SEN55 address.
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, SEN55_I2C_ADDRESS)
    }

    /// Creates a driver on a non-standard address (bus multiplexers).
    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Sen55 {
            i2c,
            delay,
            address,
            state: DeviceState::Idle,
            firmware: None,
            text_wire_cap: frame::MAX_WIRE_LEN,
        }
    }

    /// Caps the raw byte count requested in one bus read.
    ///
    /// Some platforms have small I2C buffers (a 32-byte buffer is common on
    /// AVR). The cap applies to the serial number and product name reads
    /// only; those fields are zero-terminated, so a truncated request still
    /// decodes.
    pub fn with_read_limit(mut self, max_wire_bytes: usize) -> Self {
        self.text_wire_cap = max_wire_bytes.min(frame::MAX_WIRE_LEN);
        self
    }

    /// Releases the bus and delay handles.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Device state as tracked by the driver.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Cached firmware level, populated by the first version read.
    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        self.firmware
    }

    /// Checks that the sensor responds by reading its version.
    pub fn probe(&mut self) -> Result<(), Error<E>> {
        self.read_version().map(|_| ())
    }

    /// Starts a measurement. The laser, fan and all channels run.
    ///
    /// Fails with [`Error::InvalidState`] when already measuring; the
    /// protocol tolerates a double start but it is a caller bug.
    pub fn start_measurement(&mut self) -> Result<(), Error<E>> {
        self.start_with(Command::StartMeasurement)
    }

    /// Starts a measurement without the laser: RH/T and gas channels only.
    pub fn start_measurement_without_pm(&mut self) -> Result<(), Error<E>> {
        self.start_with(Command::StartMeasurementWithoutPm)
    }

    /// Stops the running measurement and returns the device to idle.
    pub fn stop_measurement(&mut self) -> Result<(), Error<E>> {
        self.send(&Frame::new(Command::StopMeasurement))?;
        self.state = DeviceState::Idle;
        Ok(())
    }

    /// Resets the device. The tracked state returns to idle and the cached
    /// firmware level is forgotten.
    ///
    /// Buses that lose their controller state across a device reset must be
    /// reinitialized by the caller afterwards.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.send(&Frame::new(Command::Reset))?;
        self.state = DeviceState::Idle;
        self.firmware = None;
        self.delay.delay_ms(RESET_DELAY_MS);
        Ok(())
    }

    /// Starts a fan cleaning cycle. Only legal while measuring.
    pub fn start_fan_cleaning(&mut self) -> Result<(), Error<E>> {
        if self.state != DeviceState::Measuring {
            return Err(Error::InvalidState);
        }
        self.send(&Frame::new(Command::StartFanCleaning))
    }

    /// Reads the version levels and refreshes the firmware cache.
    pub fn read_version(&mut self) -> Result<Version, Error<E>> {
        let buf = self.request(Command::ReadVersion, 8, false)?;
        let bytes = buf.as_bytes();
        let version = Version {
            firmware: FirmwareVersion::new(bytes[0], bytes[1]),
            firmware_debug: bytes[2] != 0,
            hardware_major: bytes[3],
            hardware_minor: bytes[4],
            protocol_major: bytes[5],
            protocol_minor: bytes[6],
        };
        self.firmware = Some(version.firmware);
        Ok(version)
    }

    /// Whether a new measurement sample can be read.
    pub fn data_ready(&mut self) -> Result<bool, Error<E>> {
        let buf = self.request(Command::ReadDataReady, 2, false)?;
        Ok(buf.as_bytes()[1] == 1)
    }

    /// Reads the device status register. Firmware-gated at 2.0.
    ///
    /// Latched fault bits are cleared with an explicit clear command after
    /// every read, whether or not a fault was present; the clear's own
    /// result is discarded. Any fault bit turns the read into
    /// [`Error::SensorFault`] carrying the raw mask. A fan-cleaning-active
    /// bit alone is a status, not a fault.
    pub fn read_device_status(&mut self) -> Result<DeviceStatus, Error<E>> {
        self.ensure_firmware(STATUS_MIN_FIRMWARE)?;
        let read = self.request(Command::ReadDeviceStatus, 4, false);
        let _ = self.send(&Frame::new(Command::ClearDeviceStatus));
        let status = DeviceStatus::from_bits(read?.u32_at(0));
        if status.has_fault() {
            return Err(Error::SensorFault(status));
        }
        Ok(status)
    }

    /// Reads the auto-cleaning interval in seconds.
    pub fn auto_cleaning_interval(&mut self) -> Result<u32, Error<E>> {
        Ok(self.request(Command::AutoCleaningInterval, 4, false)?.u32_at(0))
    }

    /// Writes the auto-cleaning interval in seconds. Zero disables automatic
    /// cleaning; the factory default is [`DEFAULT_AUTO_CLEANING_INTERVAL`].
    ///
    /// The device only accepts this while idle. A running measurement is
    /// stopped, the interval written, and the measurement restarted; the
    /// tracked state always reflects the state actually reached, so a failed
    /// restart leaves the driver idle.
    pub fn set_auto_cleaning_interval(&mut self, seconds: u32) -> Result<(), Error<E>> {
        let was_measuring = self.state == DeviceState::Measuring;
        if was_measuring {
            self.stop_measurement()?;
        }
        let written = self.send(&Frame::with_payload(
            Command::AutoCleaningInterval,
            Payload::Interval(seconds),
        ));
        let restarted = if was_measuring {
            self.start_measurement()
        } else {
            Ok(())
        };
        written.and(restarted)
    }

    /// Reads the warm start parameter (0 = cold start, 65535 = warm start).
    pub fn warm_start_parameter(&mut self) -> Result<u16, Error<E>> {
        Ok(self.request(Command::WarmStartParameter, 2, false)?.u16_at(0))
    }

    /// Writes the warm start parameter. Applied on the next measurement
    /// start.
    pub fn set_warm_start_parameter(&mut self, value: u16) -> Result<(), Error<E>> {
        self.send(&Frame::with_payload(
            Command::WarmStartParameter,
            Payload::Scalar(value),
        ))
    }

    /// Reads the RH/T acceleration mode.
    pub fn rht_acceleration_mode(&mut self) -> Result<RhtAccelerationMode, Error<E>> {
        let raw = self.request(Command::RhtAcceleration, 2, false)?.u16_at(0);
        RhtAccelerationMode::try_from(raw).map_err(|_| Error::InvalidParameter)
    }

    /// Writes the RH/T acceleration mode. Applied on the next measurement
    /// start.
    pub fn set_rht_acceleration_mode(&mut self, mode: RhtAccelerationMode) -> Result<(), Error<E>> {
        self.send(&Frame::with_payload(
            Command::RhtAcceleration,
            Payload::Scalar(mode.into()),
        ))
    }

    /// Reads the VOC algorithm tuning parameters.
    pub fn voc_tuning_parameters(&mut self) -> Result<TuningParameters, Error<E>> {
        self.read_tuning(Command::VocTuning)
    }

    /// Writes the VOC algorithm tuning parameters. Out-of-range fields are
    /// clamped to the datasheet defaults before encoding.
    pub fn set_voc_tuning_parameters(&mut self, tuning: TuningParameters) -> Result<(), Error<E>> {
        let clamped = tuning.clamped_voc();
        self.send(&Frame::with_payload(
            Command::VocTuning,
            Payload::Tuning(&clamped),
        ))
    }

    /// Reads the NOx algorithm tuning parameters.
    pub fn nox_tuning_parameters(&mut self) -> Result<TuningParameters, Error<E>> {
        self.read_tuning(Command::NoxTuning)
    }

    /// Writes the NOx algorithm tuning parameters. `learn_time_gain_hours`
    /// and `std_initial` are datasheet constants for NOx and are overwritten
    /// regardless of input; other out-of-range fields clamp to defaults.
    pub fn set_nox_tuning_parameters(&mut self, tuning: TuningParameters) -> Result<(), Error<E>> {
        let clamped = tuning.clamped_nox();
        self.send(&Frame::with_payload(
            Command::NoxTuning,
            Payload::Tuning(&clamped),
        ))
    }

    /// Reads the temperature compensation parameters.
    pub fn temperature_compensation(&mut self) -> Result<TemperatureCompensation, Error<E>> {
        let buf = self.request(Command::TemperatureCompensation, 6, false)?;
        Ok(TemperatureCompensation {
            offset: buf.scaled_i16(0, TemperatureCompensation::OFFSET_SCALE),
            slope: buf.scaled_i16(2, TemperatureCompensation::SLOPE_SCALE),
            time_constant: buf.u16_at(4),
        })
    }

    /// Writes the temperature compensation parameters. Offset and slope are
    /// scaled to wire resolution (×200, ×1000); finer values are truncated.
    pub fn set_temperature_compensation(
        &mut self,
        compensation: &TemperatureCompensation,
    ) -> Result<(), Error<E>> {
        self.send(&Frame::with_payload(
            Command::TemperatureCompensation,
            Payload::TempComp {
                offset: (compensation.offset * TemperatureCompensation::OFFSET_SCALE) as i16,
                slope: (compensation.slope * TemperatureCompensation::SLOPE_SCALE) as i16,
                time_constant: compensation.time_constant,
            },
        ))
    }

    /// Reads the opaque VOC algorithm state for later restore.
    pub fn voc_algorithm_state(&mut self) -> Result<VocAlgorithmState, Error<E>> {
        let buf = self.request(Command::VocAlgorithmState, VOC_ALGORITHM_STATE_LEN, false)?;
        let mut state = [0u8; VOC_ALGORITHM_STATE_LEN];
        state.copy_from_slice(buf.as_bytes());
        Ok(state)
    }

    /// Restores a previously saved VOC algorithm state.
    ///
    /// The blob must be exactly [`VOC_ALGORITHM_STATE_LEN`] bytes.
    pub fn set_voc_algorithm_state(&mut self, state: &[u8]) -> Result<(), Error<E>> {
        if state.len() != VOC_ALGORITHM_STATE_LEN {
            return Err(Error::InvalidParameter);
        }
        self.send(&Frame::with_payload(
            Command::VocAlgorithmState,
            Payload::Blob(state),
        ))
    }

    /// Reads the measured values.
    ///
    /// If the device is idle it is started first, with or without the laser
    /// per `laser`, and given a short warm-up. Without the laser the mass
    /// concentration fields are zero.
    pub fn read_measured_values(&mut self, laser: bool) -> Result<Measurement, Error<E>> {
        if self.state == DeviceState::Idle {
            if laser {
                self.start_measurement()?;
            } else {
                self.start_measurement_without_pm()?;
            }
            self.delay.delay_ms(WARMUP_DELAY_MS);
        }
        let buf = self.request(Command::ReadMeasuredValues, 16, false)?;
        let (pm1_0, pm2_5, pm4_0, pm10_0) = if laser {
            (
                buf.scaled_u16(0, 10.0),
                buf.scaled_u16(2, 10.0),
                buf.scaled_u16(4, 10.0),
                buf.scaled_u16(6, 10.0),
            )
        } else {
            (0.0, 0.0, 0.0, 0.0)
        };
        Ok(Measurement {
            pm1_0,
            pm2_5,
            pm4_0,
            pm10_0,
            humidity: buf.scaled_i16(8, 100.0),
            temperature: buf.scaled_i16(10, 200.0),
            voc_index: buf.scaled_i16(12, 10.0),
            nox_index: buf.scaled_i16(14, 10.0),
        })
    }

    /// Reads mass and number concentrations plus typical particle size.
    ///
    /// Starts a full measurement first when idle.
    pub fn read_measured_values_pm(&mut self) -> Result<PmMeasurement, Error<E>> {
        if self.state == DeviceState::Idle {
            self.start_measurement()?;
            self.delay.delay_ms(WARMUP_DELAY_MS);
        }
        let buf = self.request(Command::ReadMeasuredValuesPm, 20, false)?;
        Ok(PmMeasurement {
            pm1_0: buf.scaled_u16(0, 10.0),
            pm2_5: buf.scaled_u16(2, 10.0),
            pm4_0: buf.scaled_u16(4, 10.0),
            pm10_0: buf.scaled_u16(6, 10.0),
            number_pm0_5: buf.scaled_u16(8, 10.0),
            number_pm1_0: buf.scaled_u16(10, 10.0),
            number_pm2_5: buf.scaled_u16(12, 10.0),
            number_pm4_0: buf.scaled_u16(14, 10.0),
            number_pm10_0: buf.scaled_u16(16, 10.0),
            typical_particle_size: buf.scaled_u16(18, 1000.0),
        })
    }

    /// Reads the serial number.
    pub fn serial_number(&mut self) -> Result<heapless::String<TEXT_LEN>, Error<E>> {
        self.read_text(Command::ReadSerialNumber)
    }

    /// Reads the product name.
    pub fn product_name(&mut self) -> Result<heapless::String<TEXT_LEN>, Error<E>> {
        self.read_text(Command::ReadProductName)
    }

    fn start_with(&mut self, command: Command) -> Result<(), Error<E>> {
        if self.state == DeviceState::Measuring {
            return Err(Error::InvalidState);
        }
        self.send(&Frame::new(command))?;
        self.state = DeviceState::Measuring;
        self.delay.delay_ms(START_DELAY_MS);
        Ok(())
    }

    fn read_tuning(&mut self, command: Command) -> Result<TuningParameters, Error<E>> {
        let buf = self.request(command, 12, false)?;
        let mut words = [0i16; 6];
        for (i, word) in words.iter_mut().enumerate() {
            *word = buf.i16_at(i * 2);
        }
        Ok(TuningParameters::from_words(words))
    }

    /// Text fields are zero-terminated and padded with zero words, so a read
    /// capped below the full field length still decodes.
    fn read_text(&mut self, command: Command) -> Result<heapless::String<TEXT_LEN>, Error<E>> {
        let data_len = TEXT_LEN.min(self.text_wire_cap / 3 * 2);
        let buf = self.request(command, data_len, true)?;
        let mut text = heapless::String::new();
        for &byte in buf.as_bytes() {
            if byte == 0 {
                break;
            }
            if byte.is_ascii() {
                let _ = text.push(byte as char);
            }
        }
        Ok(text)
    }

    fn ensure_firmware(&mut self, required: FirmwareVersion) -> Result<(), Error<E>> {
        let current = match self.firmware {
            Some(firmware) => firmware,
            None => {
                self.read_version()
                    .map_err(|_| Error::FirmwareUnknown)?
                    .firmware
            }
        };
        if current.at_least(required) {
            Ok(())
        } else {
            Err(Error::UnsupportedFirmware { required })
        }
    }

    fn send(&mut self, frame: &Frame) -> Result<(), Error<E>> {
        self.i2c
            .write(self.address, frame.as_bytes())
            .map_err(Error::I2c)
    }

    /// Sets the read pointer, waits the mandated settle time, then reads and
    /// validates the response.
    fn request(
        &mut self,
        command: Command,
        data_len: usize,
        stop_on_zero_word: bool,
    ) -> Result<ReceiveBuffer, Error<E>> {
        self.send(&Frame::new(command))?;
        self.delay.delay_ms(POINTER_DELAY_MS);
        let wire = frame::wire_len(data_len);
        let mut raw = [0u8; frame::MAX_WIRE_LEN];
        self.i2c
            .read(self.address, &mut raw[..wire])
            .map_err(Error::I2c)?;
        Ok(ReceiveBuffer::decode(&raw[..wire], data_len, stop_on_zero_word)?)
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    use super::*;
    use crate::crc::crc;

    const ADDR: u8 = SEN55_I2C_ADDRESS;

    /// Encodes decoded data bytes the way the sensor answers: a CRC after
    /// every 2-byte word.
    fn response(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for word in data.chunks(2) {
            out.extend_from_slice(word);
            out.push(crc(word));
        }
        out
    }

    fn words(values: &[u16]) -> Vec<u8> {
        let mut data = Vec::new();
        for value in values {
            data.extend_from_slice(&value.to_be_bytes());
        }
        data
    }

    fn version_exchange(major: u8, minor: u8) -> [I2cTransaction; 2] {
        [
            I2cTransaction::write(ADDR, vec![0xD1, 0x00]),
            I2cTransaction::read(ADDR, response(&[major, minor, 0, 7, 0, 1, 0, 0])),
        ]
    }

    fn sensor(expectations: &[I2cTransaction]) -> (Sen55<I2cMock, NoopDelay>, I2cMock) {
        let i2c = I2cMock::new(expectations);
        (Sen55::new(i2c.clone(), NoopDelay::new()), i2c)
    }

    #[test]
    fn start_enters_measuring_and_double_start_is_flagged() {
        let (mut sensor, mut i2c) = sensor(&[I2cTransaction::write(ADDR, vec![0x00, 0x21])]);
        assert_eq!(sensor.state(), DeviceState::Idle);
        sensor.start_measurement().unwrap();
        assert_eq!(sensor.state(), DeviceState::Measuring);
        // Second start generates no bus traffic.
        assert_eq!(sensor.start_measurement(), Err(Error::InvalidState));
        assert_eq!(sensor.state(), DeviceState::Measuring);
        i2c.done();
    }

    #[test]
    fn stop_returns_to_idle() {
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x00, 0x37]),
            I2cTransaction::write(ADDR, vec![0x01, 0x04]),
        ]);
        sensor.start_measurement_without_pm().unwrap();
        sensor.stop_measurement().unwrap();
        assert_eq!(sensor.state(), DeviceState::Idle);
        i2c.done();
    }

    #[test]
    fn fan_cleaning_requires_measuring() {
        let (mut sensor, mut i2c) = sensor(&[]);
        assert_eq!(sensor.start_fan_cleaning(), Err(Error::InvalidState));
        i2c.done();
    }

    #[test]
    fn fan_cleaning_while_measuring_keeps_state() {
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x00, 0x21]),
            I2cTransaction::write(ADDR, vec![0x56, 0x07]),
        ]);
        sensor.start_measurement().unwrap();
        sensor.start_fan_cleaning().unwrap();
        assert_eq!(sensor.state(), DeviceState::Measuring);
        i2c.done();
    }

    #[test]
    fn reset_forgets_firmware_and_returns_to_idle() {
        let mut expectations = version_exchange(2, 1).to_vec();
        expectations.push(I2cTransaction::write(ADDR, vec![0x00, 0x21]));
        expectations.push(I2cTransaction::write(ADDR, vec![0xD3, 0x04]));
        let (mut sensor, mut i2c) = sensor(&expectations);

        let version = sensor.read_version().unwrap();
        assert_eq!(version.firmware, FirmwareVersion::new(2, 1));
        assert_eq!(sensor.firmware_version(), Some(FirmwareVersion::new(2, 1)));

        sensor.start_measurement().unwrap();
        sensor.reset().unwrap();
        assert_eq!(sensor.state(), DeviceState::Idle);
        assert_eq!(sensor.firmware_version(), None);
        i2c.done();
    }

    #[test]
    fn firmware_gate_probes_once_and_blocks_without_traffic() {
        // The only traffic is the version probe itself.
        let (mut sensor, mut i2c) = sensor(&version_exchange(1, 0));
        assert_eq!(
            sensor.read_device_status(),
            Err(Error::UnsupportedFirmware {
                required: FirmwareVersion::new(2, 0)
            })
        );
        // The gate reuses the cached level; still no traffic.
        assert_eq!(
            sensor.read_device_status(),
            Err(Error::UnsupportedFirmware {
                required: FirmwareVersion::new(2, 0)
            })
        );
        i2c.done();
    }

    #[test]
    fn status_read_always_clears_the_register() {
        let mut expectations = version_exchange(2, 0).to_vec();
        expectations.extend([
            I2cTransaction::write(ADDR, vec![0xD2, 0x06]),
            // Fan cleaning active, no fault.
            I2cTransaction::read(ADDR, response(&[0x00, 0x08, 0x00, 0x00])),
            I2cTransaction::write(ADDR, vec![0xD2, 0x10]),
        ]);
        let (mut sensor, mut i2c) = sensor(&expectations);
        let status = sensor.read_device_status().unwrap();
        assert!(status.fan_cleaning_active());
        assert!(!status.has_fault());
        i2c.done();
    }

    #[test]
    fn status_fault_is_reported_with_the_raw_mask() {
        let mut expectations = version_exchange(2, 0).to_vec();
        expectations.extend([
            I2cTransaction::write(ADDR, vec![0xD2, 0x06]),
            // Laser and fan failure bits.
            I2cTransaction::read(ADDR, response(&[0x00, 0x00, 0x00, 0x30])),
            // The register is still cleared.
            I2cTransaction::write(ADDR, vec![0xD2, 0x10]),
        ]);
        let (mut sensor, mut i2c) = sensor(&expectations);
        match sensor.read_device_status() {
            Err(Error::SensorFault(status)) => {
                assert!(status.laser_error());
                assert!(status.fan_error());
                assert!(!status.gas_sensor_error());
            }
            other => panic!("expected SensorFault, got {other:?}"),
        }
        i2c.done();
    }

    #[test]
    fn measured_values_apply_wire_scales() {
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x00, 0x21]),
            I2cTransaction::write(ADDR, vec![0x03, 0xC4]),
            I2cTransaction::read(
                ADDR,
                response(&words(&[123, 250, 400, 1000, 1000, 2000, 100, 50])),
            ),
        ]);
        // Idle, so the read auto-starts the measurement first.
        let values = sensor.read_measured_values(true).unwrap();
        assert_eq!(values.pm1_0, 12.3);
        assert_eq!(values.pm2_5, 25.0);
        assert_eq!(values.pm4_0, 40.0);
        assert_eq!(values.pm10_0, 100.0);
        assert_eq!(values.humidity, 10.0);
        assert_eq!(values.temperature, 10.0);
        assert_eq!(values.voc_index, 10.0);
        assert_eq!(values.nox_index, 5.0);
        i2c.done();
    }

    #[test]
    fn measured_values_without_laser_zero_the_mass_fields() {
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x00, 0x37]),
            I2cTransaction::write(ADDR, vec![0x03, 0xC4]),
            I2cTransaction::read(
                ADDR,
                response(&words(&[123, 250, 400, 1000, 5000, 4000, 100, 10])),
            ),
        ]);
        let values = sensor.read_measured_values(false).unwrap();
        assert_eq!(values.pm1_0, 0.0);
        assert_eq!(values.pm10_0, 0.0);
        assert_eq!(values.humidity, 50.0);
        assert_eq!(values.temperature, 20.0);
        i2c.done();
    }

    #[test]
    fn negative_temperature_decodes_as_signed() {
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x00, 0x21]),
            I2cTransaction::write(ADDR, vec![0x03, 0xC4]),
            I2cTransaction::read(
                ADDR,
                response(&words(&[0, 0, 0, 0, 3000, (-2000i16) as u16, 0, 0])),
            ),
        ]);
        let values = sensor.read_measured_values(true).unwrap();
        assert_eq!(values.temperature, -10.0);
        i2c.done();
    }

    #[test]
    fn pm_values_include_counts_and_particle_size() {
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x00, 0x21]),
            I2cTransaction::write(ADDR, vec![0x04, 0x13]),
            I2cTransaction::read(
                ADDR,
                response(&words(&[10, 20, 30, 40, 50, 60, 70, 80, 90, 1234])),
            ),
        ]);
        let values = sensor.read_measured_values_pm().unwrap();
        assert_eq!(values.pm1_0, 1.0);
        assert_eq!(values.number_pm0_5, 5.0);
        assert_eq!(values.number_pm10_0, 9.0);
        assert_eq!(values.typical_particle_size, 1.234);
        i2c.done();
    }

    #[test]
    fn auto_cleaning_interval_read() {
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x80, 0x04]),
            I2cTransaction::read(ADDR, response(&[0x00, 0x09, 0x3A, 0x80])),
        ]);
        assert_eq!(
            sensor.auto_cleaning_interval().unwrap(),
            DEFAULT_AUTO_CLEANING_INTERVAL
        );
        i2c.done();
    }

    #[test]
    fn auto_cleaning_write_while_measuring_stops_and_restarts() {
        let interval_frame = vec![
            0x80,
            0x04,
            0x00,
            0x09,
            crc(&[0x00, 0x09]),
            0x3A,
            0x80,
            crc(&[0x3A, 0x80]),
        ];
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x00, 0x21]),
            I2cTransaction::write(ADDR, vec![0x01, 0x04]),
            I2cTransaction::write(ADDR, interval_frame),
            I2cTransaction::write(ADDR, vec![0x00, 0x21]),
        ]);
        sensor.start_measurement().unwrap();
        sensor
            .set_auto_cleaning_interval(DEFAULT_AUTO_CLEANING_INTERVAL)
            .unwrap();
        assert_eq!(sensor.state(), DeviceState::Measuring);
        i2c.done();
    }

    #[test]
    fn auto_cleaning_write_while_idle_is_direct() {
        let (mut sensor, mut i2c) = sensor(&[I2cTransaction::write(
            ADDR,
            vec![
                0x80,
                0x04,
                0x00,
                0x00,
                crc(&[0x00, 0x00]),
                0x00,
                0x00,
                crc(&[0x00, 0x00]),
            ],
        )]);
        sensor.set_auto_cleaning_interval(0).unwrap();
        assert_eq!(sensor.state(), DeviceState::Idle);
        i2c.done();
    }

    #[test]
    fn warm_start_round_trip() {
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x60, 0xC6]),
            I2cTransaction::read(ADDR, response(&[0x12, 0x34])),
            I2cTransaction::write(ADDR, vec![0x60, 0xC6, 0x12, 0x34, crc(&[0x12, 0x34])]),
        ]);
        let value = sensor.warm_start_parameter().unwrap();
        assert_eq!(value, 0x1234);
        sensor.set_warm_start_parameter(value).unwrap();
        i2c.done();
    }

    #[test]
    fn rht_acceleration_mode_round_trip() {
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x60, 0xF7]),
            I2cTransaction::read(ADDR, response(&[0x00, 0x02])),
            I2cTransaction::write(ADDR, vec![0x60, 0xF7, 0x00, 0x02, crc(&[0x00, 0x02])]),
        ]);
        let mode = sensor.rht_acceleration_mode().unwrap();
        assert_eq!(mode, RhtAccelerationMode::Medium);
        sensor.set_rht_acceleration_mode(mode).unwrap();
        i2c.done();
    }

    #[test]
    fn tuning_read_decodes_six_signed_words() {
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x60, 0xD0]),
            I2cTransaction::read(ADDR, response(&words(&[100, 12, 12, 180, 50, 230]))),
        ]);
        let tuning = sensor.voc_tuning_parameters().unwrap();
        assert_eq!(tuning, TuningParameters::voc_defaults());
        i2c.done();
    }

    #[test]
    fn nox_write_forces_datasheet_constants() {
        let expected = TuningParameters {
            learn_time_gain_hours: 12,
            std_initial: 50,
            ..TuningParameters::nox_defaults()
        };
        let frame = Frame::with_payload(Command::NoxTuning, Payload::Tuning(&expected));
        let (mut sensor, mut i2c) =
            sensor(&[I2cTransaction::write(ADDR, frame.as_bytes().to_vec())]);
        let requested = TuningParameters {
            learn_time_gain_hours: 777,
            std_initial: 4000,
            ..TuningParameters::nox_defaults()
        };
        sensor.set_nox_tuning_parameters(requested).unwrap();
        i2c.done();
    }

    #[test]
    fn voc_write_clamps_out_of_range_fields() {
        let expected = TuningParameters::voc_defaults();
        let frame = Frame::with_payload(Command::VocTuning, Payload::Tuning(&expected));
        let (mut sensor, mut i2c) =
            sensor(&[I2cTransaction::write(ADDR, frame.as_bytes().to_vec())]);
        let requested = TuningParameters {
            index_offset: 0,
            learn_time_offset_hours: -3,
            learn_time_gain_hours: 2000,
            gate_max_duration_min: 5000,
            std_initial: 9,
            gain_factor: 1001,
        };
        sensor.set_voc_tuning_parameters(requested).unwrap();
        i2c.done();
    }

    #[test]
    fn temperature_compensation_scaling() {
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x60, 0xB2]),
            I2cTransaction::read(ADDR, response(&words(&[2000, 500, 10]))),
            I2cTransaction::write(
                ADDR,
                vec![
                    0x60,
                    0xB2,
                    0x07,
                    0xD0,
                    crc(&[0x07, 0xD0]),
                    0x01,
                    0xF4,
                    crc(&[0x01, 0xF4]),
                    0x00,
                    0x0A,
                    crc(&[0x00, 0x0A]),
                ],
            ),
        ]);
        let compensation = sensor.temperature_compensation().unwrap();
        assert_eq!(compensation.offset, 10.0);
        assert_eq!(compensation.slope, 0.5);
        assert_eq!(compensation.time_constant, 10);
        sensor.set_temperature_compensation(&compensation).unwrap();
        i2c.done();
    }

    #[test]
    fn voc_algorithm_state_round_trip() {
        let state = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let write_frame = Frame::with_payload(Command::VocAlgorithmState, Payload::Blob(&state));
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x61, 0x81]),
            I2cTransaction::read(ADDR, response(&state)),
            I2cTransaction::write(ADDR, write_frame.as_bytes().to_vec()),
        ]);
        let saved = sensor.voc_algorithm_state().unwrap();
        assert_eq!(saved, state);
        sensor.set_voc_algorithm_state(&saved).unwrap();
        i2c.done();
    }

    #[test]
    fn voc_algorithm_state_rejects_wrong_length() {
        let (mut sensor, mut i2c) = sensor(&[]);
        assert_eq!(
            sensor.set_voc_algorithm_state(&[0u8; 10]),
            Err(Error::InvalidParameter)
        );
        i2c.done();
    }

    #[test]
    fn serial_number_stops_at_the_zero_word() {
        let mut data = Vec::from(&b"SEN55-1234"[..]);
        data.resize(TEXT_LEN, 0);
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0xD0, 0x33]),
            I2cTransaction::read(ADDR, response(&data)),
        ]);
        assert_eq!(sensor.serial_number().unwrap().as_str(), "SEN55-1234");
        i2c.done();
    }

    #[test]
    fn read_limit_caps_text_reads_only() {
        // A 24-byte wire cap allows 16 data bytes per read.
        let mut data = Vec::from(&b"SEN55"[..]);
        data.resize(16, 0);
        let mut i2c = I2cMock::new(&[
            I2cTransaction::write(ADDR, vec![0xD0, 0x14]),
            I2cTransaction::read(ADDR, response(&data)),
        ]);
        let mut sensor = Sen55::new(i2c.clone(), NoopDelay::new()).with_read_limit(24);
        assert_eq!(sensor.product_name().unwrap().as_str(), "SEN55");
        i2c.done();
    }

    #[test]
    fn data_ready_flag() {
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x02, 0x02]),
            I2cTransaction::read(ADDR, response(&[0x00, 0x01])),
            I2cTransaction::write(ADDR, vec![0x02, 0x02]),
            I2cTransaction::read(ADDR, response(&[0x00, 0x00])),
        ]);
        assert!(sensor.data_ready().unwrap());
        assert!(!sensor.data_ready().unwrap());
        i2c.done();
    }

    #[test]
    fn corrupted_response_aborts_the_read() {
        let mut raw = response(&[0x12, 0x34]);
        raw[2] ^= 0x01;
        let (mut sensor, mut i2c) = sensor(&[
            I2cTransaction::write(ADDR, vec![0x60, 0xC6]),
            I2cTransaction::read(ADDR, raw),
        ]);
        assert_eq!(
            sensor.warm_start_parameter(),
            Err(Error::Protocol(FrameError::ChecksumMismatch))
        );
        i2c.done();
    }

    #[test]
    fn release_returns_the_bus() {
        let (sensor, _) = sensor(&[]);
        let (mut i2c, _delay) = sensor.release();
        i2c.done();
    }
}
