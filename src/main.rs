use seaker_tracker::api::{Clock, ContextParts, Emission, SensorTask, TrackerContext};
use seaker_tracker::hardware::{MockFix, MockRangingConfig, MockRangingGenerator, StreamPort};
use seaker_tracker::utils::{init_logging, ConfigurationManager};
use std::fs::File;
use std::sync::mpsc;
use std::time::{Duration, Instant};

const GNSS_PERIOD: Duration = Duration::from_millis(100);
const ACOUSTIC_PERIOD: Duration = Duration::from_millis(10);
const DEPTH_PERIOD: Duration = Duration::from_millis(200);
const FUSION_PERIOD: Duration = Duration::from_millis(50);

struct Options {
    config_path: Option<String>,
    seconds: u64,
    json: bool,
    gnss_replay: Option<String>,
    seaker_replay: Option<String>,
    depth_replay: Option<String>,
    write_config: Option<String>,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} [--config <file.json>] [--seconds <n>] [--json]\n\
         \x20      [--gnss <nmea log>] [--seaker <seaker log>] [--depth <nmea log>]\n\
         \x20  or: {} --write-config <file.json>\n\
         Sensors without a log run on synthetic data.",
        program, program
    )
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let program = args.first().map_or("seaker-tracker", |s| s.as_str());
    let mut options = Options {
        config_path: None,
        seconds: 10,
        json: false,
        gnss_replay: None,
        seaker_replay: None,
        depth_replay: None,
        write_config: None,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = || iter.next().cloned().ok_or_else(|| usage(program));
        match arg.as_str() {
            "--config" => options.config_path = Some(value()?),
            "--seconds" => options.seconds = value()?.parse().map_err(|_| usage(program))?,
            "--json" => options.json = true,
            "--gnss" => options.gnss_replay = Some(value()?),
            "--seaker" => options.seaker_replay = Some(value()?),
            "--depth" => options.depth_replay = Some(value()?),
            "--write-config" => options.write_config = Some(value()?),
            _ => return Err(usage(program)),
        }
    }
    Ok(options)
}

fn print_emission(emission: &Emission, json: bool) {
    if json {
        println!("{}", emission.to_json());
    } else {
        println!("{}", emission);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let options = parse_args(&args)?;

    if let Some(path) = &options.write_config {
        let mut manager = ConfigurationManager::new();
        manager.save_to_file(path)?;
        println!("Default configuration written to {}", path);
        return Ok(());
    }

    let manager = match &options.config_path {
        Some(path) => ConfigurationManager::from_file(path)?,
        None => ConfigurationManager::new(),
    };
    init_logging(manager.config().level_filter());

    let mut ctx = TrackerContext::new(manager.handle());
    match &options.gnss_replay {
        Some(path) => ctx = ctx.with_gnss_port(Box::new(StreamPort::new("gnss", File::open(path)?))),
        None => ctx.set_gnss_mock(Some(MockFix::default())),
    }
    match &options.seaker_replay {
        Some(path) => ctx = ctx.with_acoustic_port(Box::new(StreamPort::new("seaker", File::open(path)?))),
        None => {
            let ranging = MockRangingConfig {
                base_angle_deg: 45.0,
                base_distance_m: 120.0,
                ..Default::default()
            };
            ctx.set_ranging_mock(Some(MockRangingGenerator::new(ranging)));
        }
    }
    if let Some(path) = &options.depth_replay {
        ctx = ctx.with_depth_port(Box::new(StreamPort::new("depth", File::open(path)?)));
    }

    let ContextParts {
        config,
        telemetry,
        mut gnss,
        mut acoustic,
        mut depth,
        mut tracker,
    } = ctx.into_parts();

    let clock = Clock::new();
    let (tx, rx) = mpsc::channel::<Emission>();

    let acoustic_tx = tx.clone();
    let mut tasks = vec![
        SensorTask::spawn("gnss", GNSS_PERIOD, clock, move |now| {
            gnss.poll(now);
        })?,
        SensorTask::spawn("seaker", ACOUSTIC_PERIOD, clock, move |now| {
            for report in acoustic.poll(now) {
                let _ = acoustic_tx.send(report);
            }
        })?,
        SensorTask::spawn("depth", DEPTH_PERIOD, clock, move |now| {
            depth.poll(now);
        })?,
    ];
    let fusion_telemetry = telemetry.clone();
    tasks.push(SensorTask::spawn("fusion", FUSION_PERIOD, clock, move |now| {
        for emission in tracker.run(now, &fusion_telemetry, &config) {
            let _ = tx.send(emission);
        }
    })?);

    let deadline = Instant::now() + Duration::from_secs(options.seconds);
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(remaining) {
            Ok(emission) => print_emission(&emission, options.json),
            Err(mpsc::RecvTimeoutError::Timeout) => break,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    for task in &mut tasks {
        task.stop();
    }

    let reading = telemetry.acoustic.snapshot();
    eprintln!(
        "pings accepted {} rejected {}; last depth {:?} m",
        reading.accepted_pings,
        reading.rejected_pings,
        telemetry.depth.snapshot().depth_m
    );
    Ok(())
}
