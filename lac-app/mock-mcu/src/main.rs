use clap::Parser;
use core::cell::RefCell;
use embassy_executor::{Executor, Spawner};
use embassy_time::{Duration, Timer};
use lac_core::mk_static;
use lac_core::utils::hal::{Actuator, Direction, DriverError, PositionSensor, Watchdog};
use lac_core::utils::{
    ACTUATOR_CHANNEL, ActuatorCommand, ControlLoop, DriverConfig, EmbassyClock, MotorDriver,
    SoftWatchdog,
};
use static_cell::StaticCell;
use tracing::{error, info, warn};

const DEFAULT_SCRIPT: &str = r#"[
    {"ac":"enable"},
    {"ac":"position","p":700},
    {"ac":"speed","v":-150.0},
    {"ac":"position","p":250},
    {"ac":"disable"}
]"#;

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts
{
    /// JSON array of actuator commands, one sent every `gap_ms`
    #[clap(long, default_value = DEFAULT_SCRIPT)]
    script: String,
    /// delay between script commands
    #[clap(long, default_value_t = 2000)]
    gap_ms: u64,
    /// JSON object overriding driver configuration fields
    #[clap(long)]
    config: Option<String>,
    #[clap(long, default_value_t = 0.5)]
    kp: f32,
    #[clap(long, default_value_t = 0.0)]
    ki: f32,
    #[clap(long, default_value_t = 0.0)]
    kd: f32,
    /// initial raw position of the simulated actuator
    #[clap(long, default_value_t = 300)]
    start: u16,
    /// simulated speed in counts/s per unit of PWM duty
    #[clap(long, default_value_t = 2.0)]
    plant_gain: f32,
}

/// Actuator model: speed proportional to duty, hard stops at the ADC range.
struct Plant {
    pos: f32,
    drive: (Direction, u16),
    powered: bool,
    gain: f32,
}

impl Plant {
    fn advance(
        &mut self,
        dt: f32,
    ) {
        if !self.powered {
            return;
        }
        let v = self.gain * f32::from(self.drive.1);
        self.pos = match self.drive.0 {
            Direction::Extend => self.pos + v * dt,
            Direction::Retract => self.pos - v * dt,
            Direction::Stop => self.pos,
        }
        .clamp(0.0, 1023.0);
    }
}

struct SimBridge(&'static RefCell<Plant>);

impl Actuator for SimBridge {
    fn configure(&mut self) -> Result<(), DriverError> {
        let mut plant = self.0.borrow_mut();
        plant.drive = (Direction::Stop, 0);
        plant.powered = false;
        Ok(())
    }

    fn set_enabled(
        &mut self,
        enabled: bool,
    ) -> Result<(), DriverError> {
        info!("ENAB -> {}", enabled);
        self.0.borrow_mut().powered = enabled;
        Ok(())
    }

    fn drive(
        &mut self,
        direction: Direction,
        duty: u16,
        _full_scale: u16,
    ) -> Result<(), DriverError> {
        self.0.borrow_mut().drive = (direction, duty);
        Ok(())
    }
}

struct SimSensor(&'static RefCell<Plant>);

impl PositionSensor for SimSensor {
    type Error = core::convert::Infallible;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        Ok(self.0.borrow().pos.round() as u16)
    }
}

/// Watchdog shared between the control loop and the reset monitor.
struct SharedWatchdog(&'static RefCell<SoftWatchdog<EmbassyClock>>);

impl Watchdog for SharedWatchdog {
    fn arm(
        &mut self,
        timeout: Duration,
    ) {
        self.0.borrow_mut().arm(timeout);
    }

    fn disarm(&mut self) {
        self.0.borrow_mut().disarm();
    }

    fn feed(&mut self) {
        self.0.borrow_mut().feed();
    }
}

type SimLoop = ControlLoop<SimBridge, SimSensor, SharedWatchdog, EmbassyClock>;

#[embassy_executor::task]
async fn control_task(mut ctrl: SimLoop) -> ! {
    ctrl.run().await
}

#[embassy_executor::task]
async fn plant_task(plant: &'static RefCell<Plant>) -> ! {
    let mut ticks: u32 = 0;
    loop {
        Timer::after_millis(1).await;
        plant.borrow_mut().advance(0.001);
        ticks = ticks.wrapping_add(1);
        if ticks % 250 == 0 {
            let p = plant.borrow();
            info!(pos = p.pos, dir = ?p.drive.0, duty = p.drive.1, "plant");
        }
    }
}

#[embassy_executor::task]
async fn reset_monitor(wd: &'static RefCell<SoftWatchdog<EmbassyClock>>) -> ! {
    loop {
        Timer::after_millis(5).await;
        if let Err(starved) = wd.borrow().check() {
            error!(
                "watchdog reset after {} ms without a command",
                starved.overdue.as_millis()
            );
            std::process::exit(2);
        }
    }
}

#[embassy_executor::task]
async fn main_task(
    spawner: Spawner,
    opts: Opts,
) {
    let script: Vec<ActuatorCommand> = match serde_json::from_str(&opts.script) {
        Ok(s) => s,
        Err(e) => {
            error!("invalid --script: {}", e);
            std::process::exit(1);
        }
    };
    let config = match opts.config.as_deref().map(serde_json::from_str::<DriverConfig>) {
        None => DriverConfig::default(),
        Some(Ok(cfg)) => cfg,
        Some(Err(e)) => {
            error!("invalid --config: {}", e);
            std::process::exit(1);
        }
    };

    let plant = &*mk_static!(
        RefCell<Plant>,
        RefCell::new(Plant {
            pos: f32::from(opts.start),
            drive: (Direction::Stop, 0),
            powered: false,
            gain: opts.plant_gain,
        })
    );
    let wd = &*mk_static!(
        RefCell<SoftWatchdog<EmbassyClock>>,
        RefCell::new(SoftWatchdog::new(EmbassyClock))
    );

    let mut driver = MotorDriver::new(
        opts.kp,
        opts.ki,
        opts.kd,
        SimBridge(plant),
        SimSensor(plant),
        SharedWatchdog(wd),
        EmbassyClock,
    )
    .with_config(config);
    if let Err(e) = driver.init() {
        error!("driver init failed: {:?}", e);
        std::process::exit(1);
    }

    spawner.spawn(plant_task(plant)).unwrap();
    spawner.spawn(reset_monitor(wd)).unwrap();
    spawner.spawn(control_task(ControlLoop::new(driver))).unwrap();

    let gap = Duration::from_millis(opts.gap_ms);
    for cmd in script {
        info!(?cmd, "sending");
        ACTUATOR_CHANNEL.send(cmd).await;
        Timer::after(gap).await;
    }
    if wd.borrow().is_armed() {
        warn!("script ended with the driver still enabled");
    }
    info!(pos = plant.borrow().pos, "script finished");
    std::process::exit(0);
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let opts = Opts::parse();
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner, opts)).unwrap();
    });
}
