use criterion::{black_box, Criterion};
use pid_core::config::{load_config, LoopConfig};
use pid_core::metrics::CycleRecord;
use pid_core::{Controller, ManualClock};
use std::env;
use tracing_subscriber::EnvFilter;

fn analyze_results_detailed(results: &[CycleRecord], name: &str) {
    if results.is_empty() {
        println!("{}: No results to analyze", name);
        return;
    }

    let total = results.len();
    let limited = results.iter().filter(|r| r.limited).count();
    let suppressed = results.iter().filter(|r| r.suppressed).count();
    let manual = results.iter().filter(|r| r.manual).count();

    let errors: Vec<f64> = results.iter().filter_map(|r| r.error).map(f64::abs).collect();

    let intervals: Vec<f64> = results.iter()
        .filter_map(|r| r.elapsed_ms)
        .skip(1) // the first interval is synthesized, not measured
        .collect();

    println!("\n=== {} Detailed Analysis ===", name);
    println!("Total cycles: {}", total);
    println!("Limited cycles: {} ({:.2}%)", limited, limited as f64 / total as f64 * 100.0);
    println!("Cycles on a suppressed input: {}", suppressed);
    if manual > 0 {
        println!("Manual cycles: {}", manual);
    }

    if !errors.is_empty() {
        let mean = errors.iter().sum::<f64>() / errors.len() as f64;
        let max = errors.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        println!("|error|: mean={:.3}, max={:.3}", mean, max);
    }

    if let Some(last) = results.iter().rev().find(|r| r.error.is_some()) {
        println!(
            "Final state: setpoint={:.3}, actual={:.3}, output={:.3}, error={:.3}",
            last.setpoint.unwrap_or_default(),
            last.actual.unwrap_or_default(),
            last.output.unwrap_or_default(),
            last.error.unwrap_or_default(),
        );
    }

    if !intervals.is_empty() {
        let avg = intervals.iter().sum::<f64>() / intervals.len() as f64;
        let min = intervals.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = intervals.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        println!("Update interval (ms): avg={:.2}, min={:.2}, max={:.2}", avg, min, max);
    }
}

fn benchmark_threaded(c: &mut Criterion, config: &LoopConfig) {
    let config = config.clone();
    c.bench_function("threaded_experiment", |b| {
        b.iter(|| {
            let recorder = threaded_impl::run_experiment(black_box(config.clone()));
            black_box(recorder.get_results());
        });
    });
}

fn benchmark_async(c: &mut Criterion, config: &LoopConfig) {
    let config = config.clone();
    let rt = tokio::runtime::Runtime::new().expect("Failed to build Tokio runtime");

    c.bench_function("async_experiment", |b| {
        b.iter(|| {
            let recorder = rt.block_on(async_impl::run_experiment(black_box(config.clone())));
            black_box(recorder.get_results());
        });
    });
}

fn benchmark_update(c: &mut Criterion, config: &LoopConfig) {
    let clock = ManualClock::new(0);
    let mut controller = match Controller::with_clock(config.controller, clock.clone()) {
        Ok(controller) => controller,
        Err(err) => {
            tracing::error!(%err, "invalid controller tuning, skipping update benchmark");
            return;
        }
    };
    if let Err(err) = controller.set_setpoint(config.setpoint) {
        tracing::warn!(%err, "setpoint rejected, benchmarking at 0");
    }
    let mut actual = config.plant.initial;

    c.bench_function("controller_update", |b| {
        b.iter(|| {
            clock.advance(10);
            actual = (actual + 0.37) % 100.0;
            controller.set_actual(black_box(actual));
            black_box(controller.update());
        });
    });
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: benchmark_runner <config_file> [threaded|async|both] [--criterion]");
        eprintln!("Example: benchmark_runner configs/baseline.toml both");
        eprintln!("Example: benchmark_runner configs/baseline.toml both --criterion");
        std::process::exit(1);
    }

    let config_path = &args[1];
    let mode = args.get(2).map(|s| s.as_str()).unwrap_or("both");
    let use_criterion = args.contains(&"--criterion".to_string());

    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, path = %config_path, "failed to load config");
            std::process::exit(1);
        }
    };

    // per-update logging would dominate the measurement
    if use_criterion {
        config.log_calc = false;
    }

    println!("========================================");
    println!("PID Control Loop Benchmark");
    println!("========================================");
    println!("Config: {}", config_path);
    println!("Experiment: {}", config.experiment_name);
    println!("Duration: {} ms", config.duration_ms);
    match config.cycle_ms {
        Some(cycle) => println!("Cycle: {} ms", cycle),
        None => println!("Cycle: event-driven"),
    }
    println!("Setpoint: {}", config.setpoint);
    if use_criterion {
        println!("Using Criterion for statistical analysis");
    }
    println!("========================================\n");

    if use_criterion {
        let mut criterion = Criterion::default()
            .sample_size(20)
            .measurement_time(std::time::Duration::from_secs(30));

        println!("Running controller update micro-benchmark...");
        benchmark_update(&mut criterion, &config);

        if mode == "threaded" || mode == "both" {
            println!("Running THREADED statistical benchmarks...");
            benchmark_threaded(&mut criterion, &config);
        }

        if mode == "async" || mode == "both" {
            println!("\nRunning ASYNC statistical benchmarks...");
            benchmark_async(&mut criterion, &config);
        }

        println!("\n========================================");
        println!("Criterion statistical analysis complete!");
        println!("Check the target/criterion directory for detailed HTML reports.");
        println!("========================================");
    } else {
        if mode == "threaded" || mode == "both" {
            println!("Running THREADED experiment...");
            let start = std::time::Instant::now();
            let threaded_recorder = threaded_impl::run_experiment(config.clone());
            let elapsed = start.elapsed();

            println!("Threaded experiment completed in {:.2} seconds", elapsed.as_secs_f64());

            let results = threaded_recorder.get_results();
            analyze_results_detailed(&results, "THREADED");

            match threaded_recorder.save_to_csv("threaded_results.csv") {
                Ok(()) => println!("Results saved to threaded_results.csv"),
                Err(err) => tracing::error!(%err, "failed to save threaded CSV"),
            }
        }

        if mode == "async" || mode == "both" {
            println!("\nRunning ASYNC experiment...");
            let start = std::time::Instant::now();
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(err) => {
                    tracing::error!(%err, "failed to build Tokio runtime");
                    std::process::exit(1);
                }
            };
            let async_recorder = rt.block_on(async_impl::run_experiment(config.clone()));
            let elapsed = start.elapsed();

            println!("Async experiment completed in {:.2} seconds", elapsed.as_secs_f64());

            let results = async_recorder.get_results();
            analyze_results_detailed(&results, "ASYNC");

            match async_recorder.save_to_csv("async_results.csv") {
                Ok(()) => println!("Results saved to async_results.csv"),
                Err(err) => tracing::error!(%err, "failed to save async CSV"),
            }
        }

        println!("\n========================================");
        println!("Benchmark complete!");
        println!("========================================");
    }
}
