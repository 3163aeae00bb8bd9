use crate::assets::{
    DEFAULT_BIND_ADDR, DEFAULT_ESTIMATOR_CMD, DEFAULT_FRAME_BUDGET_MS, DEFAULT_JPEG_QUALITY,
    DEFAULT_MIN_VISIBILITY, DEFAULT_QUEUE_DEPTH, DEFAULT_SERVICE_PORT,
};
use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Settings shared by every session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub echo_frames: bool,
    pub jpeg_quality: u8,
    pub min_visibility: f32,
    pub queue_depth: usize,
    pub frame_budget: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            echo_frames: false,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            min_visibility: DEFAULT_MIN_VISIBILITY,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            frame_budget: Duration::from_millis(DEFAULT_FRAME_BUDGET_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: IpAddr,
    pub port: u16,
    pub estimator_cmd: String,
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: IpAddr::from([127, 0, 0, 1]),
            port: DEFAULT_SERVICE_PORT,
            estimator_cmd: DEFAULT_ESTIMATOR_CMD.to_string(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    pub fn command() -> Command {
        Command::new(app_name())
            .version(app_version())
            .author(env!("CARGO_PKG_AUTHORS"))
            .about(env!("CARGO_PKG_DESCRIPTION"))
            .arg(
                Arg::new("bind")
                    .short('b')
                    .long("bind")
                    .value_name("ADDR")
                    .help("Address to listen on.")
                    .default_value(DEFAULT_BIND_ADDR),
            )
            .arg(
                Arg::new("port")
                    .short('p')
                    .long("port")
                    .value_name("PORT")
                    .help("WebSocket port [default: 8001].")
                    .value_parser(clap::value_parser!(u16)),
            )
            .arg(
                Arg::new("estimator")
                    .short('e')
                    .long("estimator")
                    .value_name("COMMAND")
                    .help("Command line of the pose estimation sidecar.")
                    .default_value(DEFAULT_ESTIMATOR_CMD),
            )
            .arg(
                Arg::new("echo-frames")
                    .long("echo-frames")
                    .value_name("ECHO")
                    .help("Send back each frame with the skeleton drawn on it (yes/no).")
                    .ignore_case(true)
                    .num_args(0..=1)
                    .default_missing_value("yes")
                    .default_value("no"),
            )
            .arg(
                Arg::new("jpeg-quality")
                    .long("jpeg-quality")
                    .value_name("QUALITY")
                    .help("JPEG quality of echoed frames, 1-100 [default: 80].")
                    .value_parser(clap::value_parser!(u8).range(1..=100)),
            )
            .arg(
                Arg::new("min-visibility")
                    .long("min-visibility")
                    .value_name("SCORE")
                    .help("Landmarks below this visibility are treated as not detected, 0.0-1.0 [default: 0].")
                    .value_parser(clap::value_parser!(f32)),
            )
            .arg(
                Arg::new("queue-depth")
                    .long("queue-depth")
                    .value_name("FRAMES")
                    .help("Frames buffered per session before late ones are dropped [default: 4].")
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                Arg::new("frame-budget-ms")
                    .long("frame-budget-ms")
                    .value_name("MS")
                    .help("Per-frame latency budget, slower frames are logged [default: 66].")
                    .value_parser(clap::value_parser!(u64)),
            )
    }

    pub fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let mut config = Config::default();

        if let Some(bind) = matches.get_one::<String>("bind") {
            config.bind = bind
                .parse()
                .with_context(|| format!("invalid bind address '{}'", bind))?;
        }
        if let Some(port) = matches.get_one::<u16>("port") {
            config.port = *port;
        }
        if let Some(cmd) = matches.get_one::<String>("estimator") {
            config.estimator_cmd = cmd.clone();
        }

        config.session.echo_frames = match matches.get_one::<String>("echo-frames") {
            Some(val) => &val.to_lowercase() == "yes",
            None => false,
        };
        if let Some(quality) = matches.get_one::<u8>("jpeg-quality") {
            config.session.jpeg_quality = *quality;
        }
        if let Some(min_visibility) = matches.get_one::<f32>("min-visibility") {
            if !(0.0..=1.0).contains(min_visibility) {
                anyhow::bail!("min-visibility must be within 0.0 and 1.0, got {}", min_visibility);
            }
            config.session.min_visibility = *min_visibility;
        }
        if let Some(depth) = matches.get_one::<usize>("queue-depth") {
            config.session.queue_depth = (*depth).max(1);
        }
        if let Some(ms) = matches.get_one::<u64>("frame-budget-ms") {
            config.session.frame_budget = Duration::from_millis(*ms);
        }

        Ok(config)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Returns a version as specified in Cargo.toml
pub fn app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
