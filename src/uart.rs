//! UART transport for ESP32 using esp-idf-svc

use esp_idf_svc::hal::delay::TickType;
use esp_idf_svc::hal::gpio::{self, InputPin, OutputPin};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::uart::{self, UartDriver};
use esp_idf_svc::sys::{ESP_ERR_TIMEOUT, EspError, esp_err_t};
use log::info;
use std::time::Duration;

use crate::transport::{DEFAULT_FRAME_GAP, RfidTransport};

/// UART settings for the reader link, 8N1 in every case.
#[derive(Debug, Clone)]
pub struct UartConfig {
    pub baud_rate: u32,
    pub frame_gap: Duration,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            frame_gap: DEFAULT_FRAME_GAP,
        }
    }
}

/// UART link to the reader, typically through an RS485 transceiver
pub struct UartTransport<'a> {
    uart: UartDriver<'a>,
    frame_gap: Duration,
}

impl<'a> UartTransport<'a> {
    /// Open the UART at `baud_rate` with the default frame gap
    pub fn new(
        uart: impl Peripheral<P = impl uart::Uart> + 'a,
        tx: impl Peripheral<P = impl OutputPin> + 'a,
        rx: impl Peripheral<P = impl InputPin> + 'a,
        baud_rate: u32,
    ) -> Result<Self, EspError> {
        Self::with_config(
            uart,
            tx,
            rx,
            &UartConfig {
                baud_rate,
                ..UartConfig::default()
            },
        )
    }

    pub fn with_config(
        uart: impl Peripheral<P = impl uart::Uart> + 'a,
        tx: impl Peripheral<P = impl OutputPin> + 'a,
        rx: impl Peripheral<P = impl InputPin> + 'a,
        config: &UartConfig,
    ) -> Result<Self, EspError> {
        // Driver defaults are 8N1
        let driver_config = uart::config::Config::default().baudrate(config.baud_rate.into());
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<gpio::Gpio0>::None,
            Option::<gpio::Gpio0>::None,
            &driver_config,
        )?;
        uart.clear_rx()?;
        info!("UART opened at {} baud", config.baud_rate);

        Ok(Self {
            uart,
            frame_gap: config.frame_gap,
        })
    }
}

impl RfidTransport for UartTransport<'_> {
    type Error = EspError;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        self.uart.write(data)
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        let ticks = TickType::new_millis(timeout_ms as u64).ticks();
        match self.uart.read(buf, ticks) {
            Err(e) if e.code() == ESP_ERR_TIMEOUT as esp_err_t => Ok(0),
            other => other,
        }
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        self.uart.clear_rx()
    }

    fn frame_gap(&self) -> Duration {
        self.frame_gap
    }
}
