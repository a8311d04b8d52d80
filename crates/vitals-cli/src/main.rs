//! vitals-inspect - decode a monitor recording and print per-channel statistics
//!
//! Usage: `vitals-inspect <recording.raw|recording.bin> [start_s [end_s]] [denoise]`

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use vitals_core::{ChannelSignal, Decoder, TimeWindow};
use vitals_processing::{ChannelStatus, DenoiseConfig, DenoiseRunner};

const USAGE: &str = "usage: vitals-inspect <recording> [start_s [end_s]] [denoise]";

#[derive(Debug, PartialEq)]
struct Invocation {
    path: String,
    window: Option<TimeWindow>,
    denoise: bool,
}

fn parse_args(args: &[String]) -> Result<Invocation> {
    let (path, rest) = match args.split_first() {
        Some((path, rest)) => (path.clone(), rest),
        None => bail!(USAGE),
    };

    let mut bounds = Vec::new();
    let mut denoise = false;
    for arg in rest {
        if arg == "denoise" {
            denoise = true;
            continue;
        }
        let value: f64 = arg
            .parse()
            .with_context(|| format!("'{}' is not a time in seconds\n{}", arg, USAGE))?;
        bounds.push(value);
    }

    let window = match bounds.as_slice() {
        [] => None,
        [start] => Some(TimeWindow::starting_at(*start)),
        [start, end] => {
            if end <= start {
                bail!("window end {} must be after start {}", end, start);
            }
            Some(TimeWindow::new(*start, *end))
        }
        _ => bail!(USAGE),
    };

    Ok(Invocation { path, window, denoise })
}

fn print_channels(title: &str, channels: &[ChannelSignal]) {
    println!("{}", title);
    println!(
        "{:>4} {:>9} {:>9} {:>10} {:>10} {:>10} {:>10}",
        "ch", "rate_hz", "samples", "mean", "std_dev", "min", "max"
    );
    for signal in channels {
        let stats = signal.stats();
        println!(
            "{:>4} {:>9.1} {:>9} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
            signal.channel,
            signal.sampling_rate,
            signal.len(),
            stats.mean,
            stats.std_dev,
            stats.min,
            stats.max
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = parse_args(&args)?;

    let recording = Decoder::default()
        .decode_file(&invocation.path, invocation.window.as_ref())
        .with_context(|| format!("failed to decode {}", invocation.path))?;
    info!(
        format = %recording.format,
        channels = recording.channels.len(),
        duration_s = recording.duration_s(),
        "recording loaded"
    );
    print_channels("decoded", &recording.channels);

    if invocation.denoise {
        let runner = DenoiseRunner::new(DenoiseConfig::ecg()).context("invalid denoise configuration")?;
        let outcome = runner
            .run_blocking(recording.channels, None)
            .context("denoising failed")?;
        print_channels("denoised", &outcome.channels);
        for report in &outcome.reports {
            if let ChannelStatus::Bypassed { reason } = &report.status {
                println!("channel {} kept raw: {}", report.channel, reason);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_path_only() {
        let invocation = parse_args(&args(&["night.raw"])).unwrap();
        assert_eq!(invocation.path, "night.raw");
        assert_eq!(invocation.window, None);
        assert!(!invocation.denoise);
    }

    #[test]
    fn test_window_and_denoise() {
        let invocation = parse_args(&args(&["night.bin", "2", "5.5", "denoise"])).unwrap();
        assert_eq!(invocation.window, Some(TimeWindow::new(2.0, 5.5)));
        assert!(invocation.denoise);

        let open = parse_args(&args(&["night.bin", "3"])).unwrap();
        assert_eq!(open.window, Some(TimeWindow::starting_at(3.0)));
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(parse_args(&[]).is_err());
        assert!(parse_args(&args(&["a.raw", "soon"])).is_err());
        assert!(parse_args(&args(&["a.raw", "4", "1"])).is_err());
        assert!(parse_args(&args(&["a.raw", "1", "2", "3"])).is_err());
    }
}
