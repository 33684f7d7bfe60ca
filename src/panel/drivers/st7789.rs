// src/panel/drivers/st7789.rs
//! ST7789V controller over SPI with data/command, reset and backlight lines.
//!
//! Generic over `embedded-hal` 1.0 SPI, pins and delay so the command stream
//! can be checked without hardware. [`open_linux`] wires it to `spidev` and
//! the GPIO character device.

use crate::error::PanelError;
use crate::frame::Rgb;
use crate::panel::driver::PanelDriver;
use crate::panel::messages::{ColorMode, PanelGeometry, PanelRequest};
use bitflags::bitflags;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;
use log::*;

// Command set (ST7789V datasheet, section 9.1).
const SWRESET: u8 = 0x01;
const SLPIN: u8 = 0x10;
const SLPOUT: u8 = 0x11;
const NORON: u8 = 0x13;
const INVOFF: u8 = 0x20;
const INVON: u8 = 0x21;
const DISPOFF: u8 = 0x28;
const DISPON: u8 = 0x29;
const CASET: u8 = 0x2A;
const RASET: u8 = 0x2B;
const RAMWR: u8 = 0x2C;
const MADCTL: u8 = 0x36;
const COLMOD: u8 = 0x3A;

const RESET_PULSE_MS: u32 = 10;
const SWRESET_DELAY_MS: u32 = 150;
const SLEEP_OUT_DELAY_MS: u32 = 120;
const SLEEP_IN_DELAY_MS: u32 = 5;

/// Largest single SPI write; matches the spidev default `bufsiz`.
pub const SPI_CHUNK_BYTES: usize = 4096;

bitflags! {
    /// Memory data access control (MADCTL) bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Madctl: u8 {
        const ROW_ORDER = 0x80;
        const COLUMN_ORDER = 0x40;
        const ROW_COLUMN_EXCHANGE = 0x20;
        const VERTICAL_REFRESH_BOTTOM_UP = 0x10;
        const BGR = 0x08;
        const HORIZONTAL_REFRESH_RIGHT_LEFT = 0x04;
    }
}

impl Madctl {
    /// Portrait, optionally rotated by 180 degrees.
    pub fn for_orientation(inverted: bool) -> Self {
        if inverted {
            Madctl::ROW_ORDER | Madctl::COLUMN_ORDER
        } else {
            Madctl::empty()
        }
    }
}

/// ST7789V panel driver.
pub struct St7789<SPI, DC, RST, BL, DELAY> {
    spi: SPI,
    dc: DC,
    rst: RST,
    backlight: BL,
    delay: DELAY,
    geometry: PanelGeometry,
    /// Display inversion (INVON). IPS modules need it for correct colours.
    invert_colors: bool,
    color_mode: ColorMode,
    chunk: Vec<u8>,
}

impl<SPI, DC, RST, BL, DELAY> St7789<SPI, DC, RST, BL, DELAY>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BL: OutputPin,
    DELAY: DelayNs,
{
    /// Wrap already-claimed bus and pins. No traffic until `Init`.
    pub fn new(
        spi: SPI,
        dc: DC,
        rst: RST,
        backlight: BL,
        delay: DELAY,
        geometry: PanelGeometry,
        invert_colors: bool,
    ) -> Self {
        Self {
            spi,
            dc,
            rst,
            backlight,
            delay,
            geometry,
            invert_colors,
            color_mode: ColorMode::Rgb666,
            chunk: Vec::with_capacity(SPI_CHUNK_BYTES),
        }
    }

    fn init(&mut self, color_mode: ColorMode, inverted: bool) -> Result<(), PanelError> {
        debug!("St7789: hardware reset");
        self.rst.set_high().map_err(pin_error)?;
        self.delay.delay_ms(RESET_PULSE_MS);
        self.rst.set_low().map_err(pin_error)?;
        self.delay.delay_ms(RESET_PULSE_MS);
        self.rst.set_high().map_err(pin_error)?;
        self.delay.delay_ms(SLEEP_OUT_DELAY_MS);

        self.command(SWRESET, &[])?;
        self.delay.delay_ms(SWRESET_DELAY_MS);
        self.command(SLPOUT, &[])?;
        self.delay.delay_ms(SLEEP_OUT_DELAY_MS);

        self.set_color_mode(color_mode)?;
        self.command(MADCTL, &[Madctl::for_orientation(inverted).bits()])?;
        self.command(if self.invert_colors { INVON } else { INVOFF }, &[])?;
        self.set_window()?;
        self.command(NORON, &[])?;
        self.command(DISPON, &[])
    }

    fn set_power(&mut self, on: bool) -> Result<(), PanelError> {
        if on {
            self.command(SLPOUT, &[])?;
            self.delay.delay_ms(SLEEP_OUT_DELAY_MS);
            self.command(DISPON, &[])
        } else {
            self.command(DISPOFF, &[])?;
            self.command(SLPIN, &[])?;
            self.delay.delay_ms(SLEEP_IN_DELAY_MS);
            Ok(())
        }
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), PanelError> {
        if on {
            self.backlight.set_high().map_err(pin_error)
        } else {
            self.backlight.set_low().map_err(pin_error)
        }
    }

    fn set_color_mode(&mut self, mode: ColorMode) -> Result<(), PanelError> {
        self.command(COLMOD, &[mode.colmod()])?;
        self.color_mode = mode;
        Ok(())
    }

    fn set_window(&mut self) -> Result<(), PanelError> {
        let [xe_hi, xe_lo] = (self.geometry.width - 1).to_be_bytes();
        let [ye_hi, ye_lo] = (self.geometry.height - 1).to_be_bytes();
        self.command(CASET, &[0, 0, xe_hi, xe_lo])?;
        self.command(RASET, &[0, 0, ye_hi, ye_lo])
    }

    fn draw(&mut self, pixels: &[Rgb]) -> Result<(), PanelError> {
        self.set_window()?;
        self.command(RAMWR, &[])?;
        self.dc.set_high().map_err(pin_error)?;

        let bpp = self.color_mode.bytes_per_pixel();
        let mut chunk = std::mem::take(&mut self.chunk);
        chunk.clear();
        let mut result = Ok(());
        for px in pixels {
            if chunk.len() + bpp > SPI_CHUNK_BYTES {
                result = self.spi.write(&chunk).map_err(bus_error);
                if result.is_err() {
                    break;
                }
                chunk.clear();
            }
            pack_pixel(self.color_mode, *px, &mut chunk);
        }
        if result.is_ok() && !chunk.is_empty() {
            result = self.spi.write(&chunk).map_err(bus_error);
        }
        self.chunk = chunk;
        result
    }

    fn command(&mut self, cmd: u8, data: &[u8]) -> Result<(), PanelError> {
        trace!("St7789: cmd {:#04x} ({} data bytes)", cmd, data.len());
        self.dc.set_low().map_err(pin_error)?;
        self.spi.write(&[cmd]).map_err(bus_error)?;
        if !data.is_empty() {
            self.dc.set_high().map_err(pin_error)?;
            self.spi.write(data).map_err(bus_error)?;
        }
        Ok(())
    }
}

impl<SPI, DC, RST, BL, DELAY> PanelDriver for St7789<SPI, DC, RST, BL, DELAY>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BL: OutputPin,
    DELAY: DelayNs,
{
    fn geometry(&self) -> PanelGeometry {
        self.geometry
    }

    fn handle_request(&mut self, request: PanelRequest<'_>) -> Result<(), PanelError> {
        match request {
            PanelRequest::Init {
                color_mode,
                inverted,
            } => self.init(color_mode, inverted),
            PanelRequest::Power(on) => self.set_power(on),
            PanelRequest::Backlight(on) => self.set_backlight(on),
            PanelRequest::SetColorMode(mode) => self.set_color_mode(mode),
            PanelRequest::Draw(pixels) => self.draw(pixels),
        }
    }
}

/// Append one pixel in the controller's wire format.
pub fn pack_pixel(mode: ColorMode, [r, g, b]: Rgb, out: &mut Vec<u8>) {
    match mode {
        ColorMode::Rgb666 => out.extend_from_slice(&[r & 0xFC, g & 0xFC, b & 0xFC]),
        ColorMode::Rgb565 => {
            let packed = ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3);
            out.extend_from_slice(&packed.to_be_bytes());
        }
    }
}

fn bus_error<E: core::fmt::Debug>(e: E) -> PanelError {
    PanelError::HardwareIo(format!("SPI transfer failed: {:?}", e))
}

fn pin_error<E: core::fmt::Debug>(e: E) -> PanelError {
    PanelError::HardwareIo(format!("GPIO write failed: {:?}", e))
}

#[cfg(target_os = "linux")]
pub use self::linux::{open_linux, LinuxSt7789};

#[cfg(target_os = "linux")]
mod linux {
    use super::St7789;
    use crate::config::HardwareConfig;
    use crate::error::PanelError;
    use crate::panel::messages::PanelGeometry;
    use linux_embedded_hal::{
        gpio_cdev::{Chip, LineRequestFlags},
        spidev::{SpiModeFlags, SpidevOptions},
        CdevPin, Delay, SpidevDevice,
    };
    use log::*;

    pub type LinuxSt7789 = St7789<SpidevDevice, CdevPin, CdevPin, CdevPin, Delay>;

    /// Claim the SPI device and the three GPIO lines named in `config`.
    ///
    /// The kernel refuses a second consumer on the same line, which is what
    /// keeps a second process off the panel.
    pub fn open_linux(
        config: &HardwareConfig,
        geometry: PanelGeometry,
    ) -> Result<LinuxSt7789, PanelError> {
        let mut spi = SpidevDevice::open(&config.spi_device)
            .map_err(|e| unavailable(format!("opening {}", config.spi_device.display()), e))?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(config.spi_speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options)
            .map_err(|e| unavailable("configuring SPI", e))?;

        let mut chip = Chip::new(&config.gpio_chip)
            .map_err(|e| unavailable(format!("opening {}", config.gpio_chip.display()), e))?;
        let mut request_output = |line: u32, consumer: &str| -> Result<CdevPin, PanelError> {
            let handle = chip
                .get_line(line)
                .and_then(|l| l.request(LineRequestFlags::OUTPUT, 0, consumer))
                .map_err(|e| unavailable(format!("requesting {} line {}", consumer, line), e))?;
            CdevPin::new(handle).map_err(|e| unavailable(format!("creating {} pin", consumer), e))
        };
        let dc = request_output(config.dc_line, "qr-panel-dc")?;
        let rst = request_output(config.reset_line, "qr-panel-rst")?;
        let backlight = request_output(config.backlight_line, "qr-panel-bl")?;

        info!(
            "St7789: opened {} @ {} Hz, {} lines dc={} rst={} bl={}",
            config.spi_device.display(),
            config.spi_speed_hz,
            config.gpio_chip.display(),
            config.dc_line,
            config.reset_line,
            config.backlight_line
        );

        Ok(St7789::new(
            spi,
            dc,
            rst,
            backlight,
            Delay,
            geometry,
            config.invert_colors,
        ))
    }

    fn unavailable(what: impl std::fmt::Display, e: impl std::fmt::Display) -> PanelError {
        PanelError::HardwareUnavailable(format!("{}: {}", what, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::{PANEL_COLOR_MODE, PANEL_GEOMETRY};
    use core::convert::Infallible;
    use embedded_hal::spi::{ErrorType, Operation};
    use std::cell::RefCell;
    use std::rc::Rc;
    use test_log::test;

    /// What went over the wire, with the DC level at the time of each write.
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Wire {
        Command(u8),
        Data(Vec<u8>),
    }

    #[derive(Default)]
    struct Bus {
        dc_high: bool,
        backlight_high: bool,
        writes: Vec<Wire>,
        fail_writes_after: Option<usize>,
    }

    type SharedBus = Rc<RefCell<Bus>>;

    struct FakeSpi(SharedBus);
    struct FakeDc(SharedBus);
    struct FakeBacklight(SharedBus);
    struct NoopPin;
    struct NoDelay;

    #[derive(Debug)]
    struct BusFault;

    impl embedded_hal::spi::Error for BusFault {
        fn kind(&self) -> embedded_hal::spi::ErrorKind {
            embedded_hal::spi::ErrorKind::Other
        }
    }

    impl ErrorType for FakeSpi {
        type Error = BusFault;
    }

    impl SpiDevice for FakeSpi {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), BusFault> {
            let mut bus = self.0.borrow_mut();
            for op in operations.iter() {
                if let Operation::Write(bytes) = op {
                    if bus.fail_writes_after == Some(bus.writes.len()) {
                        return Err(BusFault);
                    }
                    let wire = if bus.dc_high {
                        Wire::Data(bytes.to_vec())
                    } else {
                        assert_eq!(bytes.len(), 1, "commands are single bytes");
                        Wire::Command(bytes[0])
                    };
                    bus.writes.push(wire);
                }
            }
            Ok(())
        }
    }

    impl embedded_hal::digital::ErrorType for FakeDc {
        type Error = Infallible;
    }

    impl OutputPin for FakeDc {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().dc_high = false;
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().dc_high = true;
            Ok(())
        }
    }

    impl embedded_hal::digital::ErrorType for FakeBacklight {
        type Error = Infallible;
    }

    impl OutputPin for FakeBacklight {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().backlight_high = false;
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().backlight_high = true;
            Ok(())
        }
    }

    impl embedded_hal::digital::ErrorType for NoopPin {
        type Error = Infallible;
    }

    impl OutputPin for NoopPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    type TestPanel = St7789<FakeSpi, FakeDc, NoopPin, FakeBacklight, NoDelay>;

    fn panel(geometry: PanelGeometry) -> (TestPanel, SharedBus) {
        let bus = SharedBus::default();
        let panel = St7789::new(
            FakeSpi(bus.clone()),
            FakeDc(bus.clone()),
            NoopPin,
            FakeBacklight(bus.clone()),
            NoDelay,
            geometry,
            true,
        );
        (panel, bus)
    }

    fn commands(bus: &SharedBus) -> Vec<u8> {
        bus.borrow()
            .writes
            .iter()
            .filter_map(|w| match w {
                Wire::Command(c) => Some(*c),
                Wire::Data(_) => None,
            })
            .collect()
    }

    #[test]
    fn init_programs_format_orientation_and_turns_display_on() {
        let (mut panel, bus) = panel(PANEL_GEOMETRY);
        panel
            .handle_request(PanelRequest::Init {
                color_mode: PANEL_COLOR_MODE,
                inverted: true,
            })
            .unwrap();

        assert_eq!(
            commands(&bus),
            vec![SWRESET, SLPOUT, COLMOD, MADCTL, INVON, CASET, RASET, NORON, DISPON]
        );
        let writes = bus.borrow().writes.clone();
        let after = |cmd: u8| {
            let i = writes.iter().position(|w| *w == Wire::Command(cmd)).unwrap();
            writes[i + 1].clone()
        };
        assert_eq!(after(COLMOD), Wire::Data(vec![0x66]));
        assert_eq!(after(MADCTL), Wire::Data(vec![0xC0]));
        // 240x320: columns 0..=239, rows 0..=319.
        assert_eq!(after(CASET), Wire::Data(vec![0, 0, 0x00, 0xEF]));
        assert_eq!(after(RASET), Wire::Data(vec![0, 0, 0x01, 0x3F]));
    }

    #[test]
    fn power_requests_toggle_sleep_and_display() {
        let (mut panel, bus) = panel(PANEL_GEOMETRY);
        panel.handle_request(PanelRequest::Power(false)).unwrap();
        panel.handle_request(PanelRequest::Power(true)).unwrap();
        assert_eq!(commands(&bus), vec![DISPOFF, SLPIN, SLPOUT, DISPON]);
    }

    #[test]
    fn backlight_follows_requested_level() {
        let (mut panel, bus) = panel(PANEL_GEOMETRY);
        panel.handle_request(PanelRequest::Backlight(true)).unwrap();
        assert!(bus.borrow().backlight_high);
        panel.handle_request(PanelRequest::Backlight(false)).unwrap();
        assert!(!bus.borrow().backlight_high);
        assert!(bus.borrow().writes.is_empty());
    }

    #[test]
    fn draw_streams_rgb666_in_bounded_chunks() {
        let geometry = PanelGeometry::new(40, 50); // 2000 px = 6000 bytes at RGB666
        let (mut panel, bus) = panel(geometry);
        let pixels = vec![[0xFF, 0x81, 0x03]; geometry.pixel_count()];
        panel.handle_request(PanelRequest::Draw(&pixels)).unwrap();

        assert_eq!(commands(&bus), vec![CASET, RASET, RAMWR]);
        let writes = bus.borrow().writes.clone();
        let ramwr = writes.iter().position(|w| *w == Wire::Command(RAMWR)).unwrap();
        let payload: Vec<Vec<u8>> = writes[ramwr + 1..]
            .iter()
            .map(|w| match w {
                Wire::Data(d) => d.clone(),
                Wire::Command(c) => panic!("unexpected command {c:#04x} in pixel data"),
            })
            .collect();
        assert!(payload.iter().all(|chunk| chunk.len() <= SPI_CHUNK_BYTES));
        let bytes: Vec<u8> = payload.concat();
        assert_eq!(bytes.len(), 6000);
        assert_eq!(&bytes[..3], &[0xFC, 0x80, 0x00]);
    }

    #[test]
    fn color_mode_switch_changes_pixel_packing() {
        let geometry = PanelGeometry::new(2, 1);
        let (mut panel, bus) = panel(geometry);
        panel
            .handle_request(PanelRequest::SetColorMode(ColorMode::Rgb565))
            .unwrap();
        panel
            .handle_request(PanelRequest::Draw(&[[0xFF, 0x00, 0x00], [0x00, 0x00, 0xFF]]))
            .unwrap();
        let last = bus.borrow().writes.last().cloned().unwrap();
        assert_eq!(last, Wire::Data(vec![0xF8, 0x00, 0x00, 0x1F]));
    }

    #[test]
    fn bus_failure_surfaces_as_hardware_io() {
        let (mut panel, bus) = panel(PANEL_GEOMETRY);
        bus.borrow_mut().fail_writes_after = Some(3);
        let pixels = vec![[0, 0, 0]; PANEL_GEOMETRY.pixel_count()];
        let err = panel.handle_request(PanelRequest::Draw(&pixels)).unwrap_err();
        assert!(matches!(err, PanelError::HardwareIo(_)), "{err:?}");
    }

    #[test]
    fn rgb565_packing_keeps_top_bits() {
        let mut out = Vec::new();
        pack_pixel(ColorMode::Rgb565, [0xFF, 0xFF, 0xFF], &mut out);
        pack_pixel(ColorMode::Rgb565, [0x00, 0x04, 0x00], &mut out);
        assert_eq!(out, vec![0xFF, 0xFF, 0x00, 0x20]);
    }
}
