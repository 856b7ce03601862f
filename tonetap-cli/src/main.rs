//! tonetap CLI — live tone player driven from stdin.
//!
//! Commands, one per line:
//!   f <delta>   shift frequency by <delta> Hz
//!   d <delta>   shift echo delay by round(<delta>/10) samples
//!   p           toggle play/pause
//!   ?           print current state
//!   q           quit

use std::io::{self, BufRead};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam::channel::{self as chan, RecvTimeoutError};
use tonetap_engine::cpal_sink::output_device_names;
use tonetap_engine::{
    AudioBackend, CpalBackend, EngineConfig, EngineError, EngineState, MemoryDevice, Status, StatusStyle,
    ToneEngine,
};

/// How often the main loop checks for auto-stop and engine failure.
const TICK: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "tonetap", version, about = "Live tone generator with an adjustable echo tap")]
struct Args {
    /// Print output devices and exit.
    #[arg(long)]
    list_devices: bool,

    /// Output device name (default device if omitted).
    #[arg(long)]
    device: Option<String>,

    /// Output gain, 0.0..=1.0.
    #[arg(long, default_value_t = 1.0)]
    gain: f32,

    /// Engine sample rate in Hz.
    #[arg(long, default_value_t = 8000)]
    sample_rate: u32,

    /// Length of one synthesized buffer in milliseconds.
    #[arg(long, default_value_t = 1000)]
    buffer_ms: u64,

    /// Starting frequency in Hz (clamped to 100..=4000).
    #[arg(long, default_value_t = 500.0)]
    frequency: f64,

    /// Starting echo delay in samples (clamped to 0..=441).
    #[arg(long, default_value_t = 0)]
    delay: u32,

    /// Stop automatically after this many seconds.
    #[arg(long)]
    duration: Option<u64>,

    /// Start playing immediately instead of paused.
    #[arg(long)]
    autoplay: bool,

    /// Discard audio instead of opening a sound card.
    #[arg(long)]
    null_device: bool,

    #[arg(long, value_enum, default_value_t = StyleArg::Line)]
    status_style: StyleArg,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StyleArg {
    Line,
    Card,
}

impl From<StyleArg> for StatusStyle {
    fn from(s: StyleArg) -> Self {
        match s {
            StyleArg::Line => StatusStyle::Line,
            StyleArg::Card => StatusStyle::Card,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Control {
    Frequency(f64),
    Delay(f64),
    Toggle,
    Query,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<Control>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else { return Ok(None) };
    let delta = |words: &mut std::str::SplitWhitespace<'_>| -> Result<f64> {
        let raw = words.next().ok_or_else(|| anyhow!("`{head}` needs a numeric delta"))?;
        raw.parse::<f64>().with_context(|| format!("bad delta {raw:?}"))
    };
    let control = match head {
        "f" => Control::Frequency(delta(&mut words)?),
        "d" => Control::Delay(delta(&mut words)?),
        "p" => Control::Toggle,
        "?" => Control::Query,
        "q" => Control::Quit,
        other => bail!("unknown command {other:?} (f <delta>, d <delta>, p, ?, q)"),
    };
    if let Some(extra) = words.next() {
        bail!("unexpected argument {extra:?}");
    }
    Ok(Some(control))
}

/// Forward stdin commands until EOF or `q`.
fn spawn_stdin_reader(tx: chan::Sender<Control>) -> Result<()> {
    thread::Builder::new()
        .name("tonetap-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line) {
                    Ok(Some(control)) => {
                        if tx.send(control).is_err() || control == Control::Quit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => eprintln!("{e:#}"),
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(())
}

fn config_from(args: &Args) -> EngineConfig {
    EngineConfig::default()
        .with_sample_rate(args.sample_rate)
        .with_buffer_duration(Duration::from_millis(args.buffer_ms))
        .with_initial_frequency(args.frequency)
        .with_initial_delay(args.delay)
        .with_status_style(args.status_style.into())
}

fn run<B: AudioBackend>(args: &Args, backend: B) -> Result<()> {
    let style = StatusStyle::from(args.status_style);
    let engine = ToneEngine::start(config_from(args), backend, |text: &str| println!("{text}"))
        .context("could not start the tone engine")?;

    if args.autoplay {
        engine.play()?;
    }

    let (tx, rx) = chan::unbounded();
    spawn_stdin_reader(tx)?;
    let deadline = args.duration.map(|s| Instant::now() + Duration::from_secs(s));
    let mut stdin_open = true;

    loop {
        if engine.engine_state() == EngineState::Stopped {
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            log::info!("duration reached");
            break;
        }

        let control = if stdin_open {
            match rx.recv_timeout(TICK) {
                Ok(control) => control,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    stdin_open = false;
                    if deadline.is_none() {
                        break;
                    }
                    continue;
                }
            }
        } else {
            thread::sleep(TICK);
            continue;
        };

        let outcome = match control {
            Control::Frequency(delta) => {
                engine.adjust_frequency(delta);
                Ok(())
            }
            Control::Delay(delta) => {
                engine.adjust_delay(delta);
                Ok(())
            }
            Control::Toggle => engine.toggle_play_pause().map(|_| ()),
            Control::Query => {
                let p = engine.query_state();
                let stats = engine.stats();
                println!("{}", Status::of(p, p.is_playing()).render(style));
                println!("elapsed {} ({} buffers, {} underruns)", stats.elapsed_display(), stats.buffers_submitted, stats.underruns);
                Ok(())
            }
            Control::Quit => break,
        };
        match outcome {
            Ok(()) | Err(EngineError::Stopped) => {}
            Err(e) => return Err(e.into()),
        }
    }

    engine.stop();
    let stats = engine.stats();
    log::info!(
        "played {} in {} buffer(s), {} sink retries, {} underruns",
        stats.elapsed_display(),
        stats.buffers_submitted,
        stats.sink_retries,
        stats.underruns
    );
    match engine.last_error() {
        Some(err) => Err(anyhow!(err)),
        None => Ok(()),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_devices {
        println!("Available output devices:");
        for name in output_device_names()? {
            println!("- {name}");
        }
        return Ok(());
    }

    println!("tonetap: live tone generator");
    println!("commands: f <delta> | d <delta> | p (play/pause) | ? (state) | q (quit)\n");

    if args.null_device {
        log::info!("null device: audio is generated and discarded");
        return run(&args, MemoryDevice::discarding());
    }

    let mut backend = CpalBackend::new().with_gain(args.gain);
    if let Some(name) = &args.device {
        backend = backend.with_device(name.clone());
    }
    run(&args, backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("f 500").unwrap(), Some(Control::Frequency(500.0)));
        assert_eq!(parse_command("  d -4410 ").unwrap(), Some(Control::Delay(-4410.0)));
        assert_eq!(parse_command("p").unwrap(), Some(Control::Toggle));
        assert_eq!(parse_command("?").unwrap(), Some(Control::Query));
        assert_eq!(parse_command("q").unwrap(), Some(Control::Quit));
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(parse_command("f").is_err());
        assert!(parse_command("f fast").is_err());
        assert!(parse_command("p now").is_err());
        assert!(parse_command("x").is_err());
    }

    #[test]
    fn args_map_onto_engine_config() {
        let args = Args::parse_from([
            "tonetap", "--sample-rate", "16000", "--buffer-ms", "250", "--frequency", "1000", "--delay", "12",
            "--status-style", "card",
        ]);
        let cfg = config_from(&args);
        assert_eq!(cfg.sample_rate, 16_000);
        assert_eq!(cfg.buffer_frames(), 4000);
        assert_eq!(cfg.initial_parameters().frequency_hz(), 1000.0);
        assert_eq!(cfg.initial_parameters().delay_samples(), 12);
        assert_eq!(cfg.status_style, StatusStyle::Card);
    }

    #[test]
    fn clap_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
