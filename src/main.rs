use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rfd::FileDialog;
use safety_limiter::{
    LimiterSettings,
    render::{limit_interleaved, read_wav, write_wav},
};
use std::{
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;

/// Bound a WAV file to unity gain with a hold-and-release safety limiter
#[derive(Parser, Debug)]
struct Args {
    /// Path to the input WAV file (optional, will show file dialog if not provided)
    input: Option<PathBuf>,

    /// Path to the output WAV file (defaults to "<input name>_limited.wav")
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Gain applied before limiting, in dB
    #[arg(short = 'a', long, allow_negative_numbers = true)]
    amplify: Option<f32>,

    /// Seconds for a held peak to decay by 60 dB (0 for instant release)
    #[arg(long, allow_negative_numbers = true)]
    release_time: Option<f32>,

    /// Seconds a peak is held before release begins
    #[arg(long, allow_negative_numbers = true)]
    hold_time: Option<f32>,

    /// TOML file with release_time, hold_time and amplify_db (flags override it)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of threads used to process channels (0 for auto-detect)
    #[arg(short = 't', long, default_value_t = 0)]
    thread_count: usize,

    /// Headless mode (use non-interactive progress output)
    #[arg(short = 'H', long)]
    headless: bool,

    /// Log output interval in milliseconds for headless mode
    #[arg(long, default_value_t = 1000)]
    log_interval_ms: u64,
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs_f64();
    let hours = (total_seconds / 3600.0) as u64;
    let minutes = ((total_seconds % 3600.0) / 60.0) as u64;
    let seconds = (total_seconds % 60.0) as u64;
    let ms = (total_seconds.fract() * 100.0) as u64;
    format!("{:02}:{:02}:{:02}.{:02}", hours, minutes, seconds, ms)
}

fn resolve_settings(args: &Args) -> Result<LimiterSettings> {
    let mut settings = match &args.config {
        Some(path) => LimiterSettings::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => LimiterSettings::default(),
    };
    if let Some(release_time) = args.release_time {
        settings.release_time = release_time;
    }
    if let Some(hold_time) = args.hold_time {
        settings.hold_time = hold_time;
    }
    if let Some(amplify) = args.amplify {
        settings.amplify_db = amplify;
    }
    settings.validate()?;
    Ok(settings)
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("Unknown");
    PathBuf::from(format!("{}_limited.wav", stem))
}

fn run(args: Args) -> Result<()> {
    let headless = args.headless;
    let settings = resolve_settings(&args)?;
    let thread_count = if args.thread_count == 0 {
        num_cpus::get()
    } else {
        args.thread_count
    };

    let input = match &args.input {
        Some(path) => {
            if !path.exists() {
                bail!("input file not found: {}", path.display());
            }
            path.clone()
        }
        None if headless => bail!("input file must be specified in headless mode"),
        None => match FileDialog::new()
            .add_filter("WAV File", &["wav", "wave"])
            .pick_file()
        {
            Some(file) => file,
            None => {
                println!("No input file selected. Exiting.");
                return Ok(());
            }
        },
    };
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&input));

    if headless {
        eprintln!("input={}", input.display());
        eprintln!("output={}", output.display());
        eprintln!("release_time={}", settings.release_time);
        eprintln!("hold_time={}", settings.hold_time);
        eprintln!("amplify_db={}", settings.amplify_db);
        eprintln!("thread_count={}", thread_count);
    } else {
        println!("Safety Limiter");
        println!("==============");
        println!("Input: {}", input.display());
        println!("Output: {}", output.display());
        println!("Release Time: {} s", settings.release_time);
        println!("Hold Time: {} s", settings.hold_time);
        println!("Amplify: {} dB", settings.amplify_db);
        println!("Thread Count: {}", thread_count);
        println!();
    }

    let mut audio =
        read_wav(&input).with_context(|| format!("audio loading failed: {}", input.display()))?;
    let duration = Duration::try_from_secs_f64(audio.duration_secs())?;
    if headless {
        eprintln!("sample_rate={}", audio.sample_rate);
        eprintln!("channels={}", audio.channels);
        eprintln!("duration_sec={:.2}", duration.as_secs_f64());
    } else {
        println!(
            "Loaded {} Hz, {} channel(s), {}",
            audio.sample_rate,
            audio.channels,
            format_duration(duration)
        );
    }

    let total_samples = audio.samples.len() as u64;
    let pb = if !headless {
        let pb = ProgressBar::new(total_samples);
        pb.set_style(
            ProgressStyle::with_template("[{wide_bar:.cyan/blue}] {percent}%")?
                .progress_chars("##-"),
        );
        Some(pb)
    } else {
        None
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()?;

    let processing_start_time = Instant::now();
    let done = AtomicU64::new(0);
    let last_report = Mutex::new(Instant::now());
    let report_interval = Duration::from_millis(args.log_interval_ms);

    if headless {
        eprintln!("processing_started");
    }
    pool.install(|| {
        limit_interleaved(&mut audio, &settings, |n| {
            if let Some(ref pb) = pb {
                pb.inc(n);
                return;
            }
            let current = done.fetch_add(n, Ordering::Relaxed) + n;
            // Skip the report if another worker is already printing one
            if let Ok(mut last) = last_report.try_lock() {
                if last.elapsed() >= report_interval {
                    eprintln!(
                        "progress percent={:.1}",
                        current as f64 / total_samples as f64 * 100.0
                    );
                    *last = Instant::now();
                }
            }
        })
    })?;

    write_wav(&output, &audio)
        .with_context(|| format!("audio saving failed: {}", output.display()))?;

    let processing_took_time = processing_start_time.elapsed();
    tracing::info!(
        output = %output.display(),
        elapsed_ms = processing_took_time.as_millis() as u64,
        "finished"
    );

    if let Some(pb) = pb {
        pb.finish();
        println!(
            "\nProcessing finished!\nTotal time: {}\nReal-time ratio: {:.2}x",
            format_duration(processing_took_time),
            duration.as_secs_f64() / processing_took_time.as_secs_f64()
        );
    } else {
        eprintln!("progress percent=100.0");
        eprintln!("processing_finished");
        eprintln!(
            "processing_time_sec={:.2}",
            processing_took_time.as_secs_f64()
        );
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let headless = args.headless;
    if let Err(e) = run(args) {
        if headless {
            eprintln!("error {:#}", e);
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}
