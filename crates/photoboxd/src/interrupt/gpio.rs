//! Physical buttons on Raspberry Pi GPIO lines.
//!
//! Each button is an input with the internal pull-up enabled, wired to
//! ground, so a press is a falling edge. rppal runs the callbacks on its own
//! interrupt thread; the callback only pushes into the bridge.

use std::time::Duration;

use rppal::gpio::{Gpio, InputPin, Trigger};
use thiserror::Error;
use tracing::{info, warn};

use photobox_core::InterruptSignal;

use super::InterruptProducer;
use crate::config::GpioConfig;

/// Errors raised while claiming GPIO lines.
#[derive(Debug, Error)]
pub enum GpioError {
    #[error("GPIO unavailable: {0}")]
    Unavailable(#[source] rppal::gpio::Error),

    #[error("Cannot watch GPIO {pin} for {signal}: {source}")]
    Pin {
        pin: u8,
        signal: InterruptSignal,
        #[source]
        source: rppal::gpio::Error,
    },
}

/// Registered button lines. Interrupts stay armed while this is alive.
pub struct GpioButtons {
    _pins: Vec<InputPin>,
}

impl GpioButtons {
    /// Claims the configured pins and arms their interrupts.
    pub fn register(config: &GpioConfig, producer: &InterruptProducer) -> Result<Self, GpioError> {
        let gpio = Gpio::new().map_err(GpioError::Unavailable)?;
        let debounce = Duration::from_millis(config.debounce_ms);

        let pins = vec![
            watch(&gpio, config.button_pin, debounce, InterruptSignal::ButtonPressed, producer)?,
            watch(&gpio, config.settings_pin, debounce, InterruptSignal::Settings, producer)?,
        ];

        info!(
            button_pin = config.button_pin,
            settings_pin = config.settings_pin,
            debounce_ms = config.debounce_ms,
            "GPIO buttons armed"
        );
        Ok(Self { _pins: pins })
    }
}

fn watch(
    gpio: &Gpio,
    pin: u8,
    debounce: Duration,
    signal: InterruptSignal,
    producer: &InterruptProducer,
) -> Result<InputPin, GpioError> {
    let pin_error = |source: rppal::gpio::Error| GpioError::Pin {
        pin,
        signal,
        source,
    };

    let mut input = gpio.get(pin).map_err(pin_error)?.into_input_pullup();
    let producer = producer.clone();
    input
        .set_async_interrupt(Trigger::FallingEdge, Some(debounce), move |_event| {
            if !producer.push(signal) {
                warn!(pin, signal = %signal, "Hub gone, dropping button press");
            }
        })
        .map_err(pin_error)?;
    Ok(input)
}
