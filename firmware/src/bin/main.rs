#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::{error, info, trace, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::SPI0;
use embassy_rp::spi::{Blocking, Spi};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_time::{Delay, Timer};
use static_cell::StaticCell;
use topcase_firmware::{
    probe, spi_config, BoardProperties, ForwardingKeyboard, ForwardingTrackpad, MessageQueue,
    ReplyMode, Request, SharedSpiTransport, Topcase, TrackpadEvent, TrackpadQueue, WarmWait,
};

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

type TopcaseSpi = Spi<'static, SPI0, Blocking>;
type TopcaseTransport =
    SharedSpiTransport<'static, CriticalSectionRawMutex, TopcaseSpi, Output<'static>, Delay>;
type BoardTopcase = Topcase<'static, CriticalSectionRawMutex, TopcaseTransport>;

/// SPI0, shared with whatever else sits on the bus.
static SPI_BUS: StaticCell<Mutex<CriticalSectionRawMutex, RefCell<TopcaseSpi>>> = StaticCell::new();

static TOPCASE: StaticCell<BoardTopcase> = StaticCell::new();

static KEYBOARD_QUEUE: MessageQueue = Channel::new();
static TRACKPAD_QUEUE: TrackpadQueue = Channel::new();
static KEYBOARD: ForwardingKeyboard = ForwardingKeyboard::new(&KEYBOARD_QUEUE);
static TRACKPAD: ForwardingTrackpad = ForwardingTrackpad::new(&TRACKPAD_QUEUE);

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("topcase driver starting...");

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    let params = match probe(&mut BoardProperties, &mut Delay) {
        Ok(params) => params,
        Err(e) => {
            error!("not attaching: {}", e);
            return;
        }
    };
    let bus_config = params.bus_config();
    info!("bus: {} Hz, {}", bus_config.frequency_hz, bus_config.mode);

    // --- SPI Setup ---
    let spi = Spi::new_blocking(
        p.SPI0,
        p.PIN_18, // SCK
        p.PIN_19, // TX
        p.PIN_16, // RX
        spi_config(&bus_config),
    );
    let spi_bus = SPI_BUS.init(Mutex::new(RefCell::new(spi)));
    let cs = Output::new(p.PIN_17, Level::High);
    let irq = Input::new(p.PIN_20, Pull::Up);

    // --- Controller reset ---
    let mut reset = Output::new(p.PIN_21, Level::High);
    reset.set_low();
    Timer::after_micros(u64::from(params.reset_assert_us)).await;
    reset.set_high();
    Timer::after_micros(u64::from(params.reset_recovery_us)).await;

    let transport = SharedSpiTransport::new(spi_bus, cs, Delay, bus_config.cs_delay_us);
    let topcase: &'static BoardTopcase = TOPCASE.init(Topcase::new(transport, spi_config(&bus_config)));
    topcase.attach_keyboard(&KEYBOARD);
    topcase.attach_trackpad(&TRACKPAD);

    // Nobody services the IRQ line yet, so poll for this reply.
    let mut cold = ReplyMode::select(false, Delay);
    if let Err(e) = topcase.send(&Request::touchpad_info(), &mut cold).await {
        warn!("touchpad info request failed: {}", e);
    }

    spawner.spawn(irq_task(topcase, irq).unwrap());
    spawner.spawn(keyboard_task(&KEYBOARD_QUEUE).unwrap());
    spawner.spawn(trackpad_task(&TRACKPAD_QUEUE).unwrap());

    if let Err(e) = topcase.send(&Request::touchpad_init(), &mut WarmWait::new()).await {
        warn!("touchpad init failed: {}", e);
    }

    info!("topcase initialized, waiting for input...");
}

/// Interrupt task - runs the receive path on every falling edge of the IRQ line.
#[embassy_executor::task]
async fn irq_task(topcase: &'static BoardTopcase, mut irq: Input<'static>) {
    loop {
        irq.wait_for_falling_edge().await;
        match topcase.on_interrupt() {
            Ok(delivery) => trace!("routed: {}", delivery),
            Err(e) => warn!("receive failed: {}", e),
        }
    }
}

/// Keyboard task - logs keyboard reports.
#[embassy_executor::task]
async fn keyboard_task(queue: &'static MessageQueue) {
    loop {
        let message = queue.receive().await;
        info!("keyboard {}: {=[u8]:02x}", message.kind, &message.payload[..]);
    }
}

/// Trackpad task - logs trackpad reports and the touchpad info reply.
#[embassy_executor::task]
async fn trackpad_task(queue: &'static TrackpadQueue) {
    loop {
        match queue.receive().await {
            TrackpadEvent::Report(message) => {
                info!("trackpad {}: {=[u8]:02x}", message.kind, &message.payload[..]);
            }
            TrackpadEvent::Info(message) => {
                info!("touchpad info: {=[u8]:02x}", &message.payload[..]);
            }
        }
    }
}
