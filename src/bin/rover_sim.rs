//! Desktop simulator for the acquisition and actuation core.
//!
//! Runs [`RobotCore`] on the ATmega2560 mock bus:
//! - a tokio task injects encoder edges asynchronously, as the pin-change
//!   interrupt would
//! - the main loop samples at 50Hz, steers from the reflectance line
//!   position and logs each frame
//! - the simulated line drifts under the array and the bumper is hit once
//!
//! # Usage
//!
//! ```sh
//! cargo run --bin rover_sim --features sim
//! ```

use std::time::Duration;

use anyhow::Context;
use log::{info, LevelFilter, Log, Metadata, Record};
use rover_io::encoder::{EncoderTicks, Wheel};
use rover_io::hal::{mega2560, MockDelay, MockPortBus, MockSampleBus, MockTimeline};
use rover_io::reflectance::POSITION_SCALE;
use rover_io::{DriveCommand, RelayCommand, RobotConfig, RobotCore, SensorFrame};

/// Sampling interval (50Hz).
const FRAME_INTERVAL_MS: u64 = 20;

/// Frames to run before stopping.
const FRAMES: u32 = 100;

/// Frame on which the front-left bumper closes.
const BUMP_FRAME: u32 = 60;

/// Cruise speed while following the line.
const CRUISE: f32 = 0.4;

/// Steering gain per sensor of line offset.
const STEER_GAIN: f32 = 0.08;

static TICKS: EncoderTicks = EncoderTicks::new();

struct StdoutLogger;

impl Log for StdoutLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            println!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StdoutLogger = StdoutLogger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(LevelFilter::Info))
        .map_err(|e| anyhow::anyhow!("logger: {e}"))?;

    println!("=================================");
    println!("  rover-io simulator");
    println!("=================================");

    let pins = mega2560::pin_map();
    let config = RobotConfig::new(pins);
    let timeline = MockTimeline::new();

    let mut bus = MockPortBus::mega2560();
    // Pull-ups: all bumpers released.
    bus.set_input(pins.switches.top_left.port, 0xFF);

    let mut core = RobotCore::new(
        &config,
        bus,
        MockSampleBus::new().with_timeline(timeline.clone()),
        MockDelay::on(timeline.clone()),
        timeline.clone(),
        &TICKS,
    )
    .context("robot core rejected the board manifest")?;

    // Encoder edges at roughly 300 Hz per wheel.
    let injector = tokio::spawn(async {
        let mut interval = tokio::time::interval(Duration::from_millis(3));
        loop {
            interval.tick().await;
            TICKS.record(Wheel::Left);
            TICKS.record(Wheel::Right);
        }
    });

    let mut interval = tokio::time::interval(Duration::from_millis(FRAME_INTERVAL_MS));
    for n in 0..FRAMES {
        interval.tick().await;
        timeline.advance_ns(FRAME_INTERVAL_MS * 1_000_000);
        stage_world(&mut core, &pins, &timeline, &config, n);

        let frame = core.sample();
        report(&frame);

        if frame.switches.any() {
            info!("bumper hit, reversing");
            core.drive(DriveCommand::straight(-CRUISE));
            core.set_relays(RelayCommand::new(true, false));
        } else {
            core.drive(steer(&frame));
            core.set_relays(RelayCommand::OFF);
        }
    }

    injector.abort();
    core.stop_all();
    println!("done after {} frames", core.sequence());
    Ok(())
}

type SimCore<'t> = RobotCore<'t, MockPortBus, MockSampleBus, MockDelay, MockTimeline>;

/// Sets up sensor inputs for frame `n`.
fn stage_world(
    core: &mut SimCore<'_>,
    pins: &rover_io::PinMap,
    timeline: &MockTimeline,
    config: &RobotConfig,
    n: u32,
) {
    // Line drifts back and forth across the middle of the array.
    let center = 7.5 + 3.0 * ((n as f32) / 15.0).sin();
    for (i, ch) in pins.reflectance.iter().enumerate() {
        let d = (i as f32 - center).abs();
        let v = (1000.0 - 400.0 * d).max(0.0) as u16;
        core.samples_mut().set(*ch, v);
    }

    // Capacitive: charging starts after the discharge settle. A hand near
    // the electrode around the bump shortens the time constant.
    let tau = if (BUMP_FRAME - 5..BUMP_FRAME).contains(&n) {
        150.0
    } else {
        900.0
    };
    let charge_start = timeline.now_us() + u64::from(config.capacitive.settle_us);
    core.samples_mut()
        .set_rc_curve(pins.capacitive.sample, charge_start, tau, 1023);

    // Waveform ADC: a slow triangle on the data bus.
    let phase = (n * 16) % 512;
    let wave = if phase < 256 { phase } else { 511 - phase };
    core.bus_mut().set_input(pins.adc.data.port, wave as u16);

    // Bumper held for several frames so the debounce window passes.
    let pressed = (BUMP_FRAME..BUMP_FRAME + 5).contains(&n);
    core.bus_mut()
        .set_input_pin(pins.switches.top_left, !pressed);
}

/// Proportional line following on the weighted reflectance position.
fn steer(frame: &SensorFrame) -> DriveCommand {
    let Some(position) = frame.reflectance.weighted_position() else {
        return DriveCommand::stop();
    };
    let center = 7.5 * POSITION_SCALE as f32;
    let offset = (position as f32 - center) / POSITION_SCALE as f32;
    let turn = STEER_GAIN * offset;
    DriveCommand::new(CRUISE + turn, CRUISE - turn)
}

fn report(frame: &SensorFrame) {
    info!(
        "#{:03} t={}ms line={:?} ticks=({}, {}) contact={} ({}us) wave={:?} bump={}",
        frame.sequence,
        frame.timestamp_ms,
        frame.reflectance.weighted_position(),
        frame.encoder.left,
        frame.encoder.right,
        frame.contact.contact,
        frame.contact.charge_time_us,
        frame.waveform.get(),
        frame.switches.any(),
    );
}
