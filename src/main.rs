mod menu;

use pid_core::config::{load_config, LoopConfig};
use pid_core::metrics::CycleRecord;
use pid_core::{ManualClock, StationOutput};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "configs/baseline.toml";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("===========================================");
    println!("Welcome to the PID Control Loop");
    println!("===========================================");

    loop {
        menu::show_menu();

        match menu::get_user_choice() {
            Ok(1) => run_threaded_demo(),
            Ok(2) => run_async_demo(),
            Ok(3) => run_comparison(),
            Ok(4) => run_station_walkthrough(),
            Ok(5) => {
                println!("Goodbye!");
                break;
            }
            _ => println!("Invalid choice. Please select 1-5."),
        }
    }
}

fn demo_config() -> Option<LoopConfig> {
    match load_config(CONFIG_PATH) {
        Ok(mut config) => {
            config.log_calc = true;
            println!("Configuration: {} mode, {:?} ms cycle, {} ms duration, setpoint {}",
                     config.mode(), config.cycle_ms, config.duration_ms, config.setpoint);
            Some(config)
        }
        Err(err) => {
            tracing::error!(%err, path = CONFIG_PATH, "failed to load config");
            None
        }
    }
}

fn run_threaded_demo() {
    println!("\n=== Running Threaded Loop Demo ===");

    if let Some(config) = demo_config() {
        let recorder = threaded_impl::run_experiment(config);
        display_results(&recorder.get_results());
    }

    menu::wait_for_enter();
}

fn run_async_demo() {
    println!("\n=== Running Async Loop Demo ===");

    if let Some(config) = demo_config() {
        match tokio::runtime::Runtime::new() {
            Ok(rt) => {
                let recorder = rt.block_on(async_impl::run_experiment(config));
                display_results(&recorder.get_results());
            }
            Err(err) => tracing::error!(%err, "failed to build Tokio runtime"),
        }
    }

    menu::wait_for_enter();
}

fn run_comparison() {
    println!("\n=== Running Comparison (Async vs Threaded) ===");

    let Some(mut config) = demo_config() else {
        menu::wait_for_enter();
        return;
    };
    config.log_calc = false;

    println!("\n--- Running THREADED Implementation ---");
    let threaded_results = threaded_impl::run_experiment(config.clone()).get_results();
    display_results(&threaded_results);

    println!("\n--- Running ASYNC Implementation ---");
    let async_results = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(async_impl::run_experiment(config)).get_results(),
        Err(err) => {
            tracing::error!(%err, "failed to build Tokio runtime");
            Vec::new()
        }
    };
    display_results(&async_results);

    println!("\n=== Comparison Summary ===");
    println!("- Threaded: {} cycles, mean |error| {:.3}", threaded_results.len(), mean_abs_error(&threaded_results));
    println!("- Async:    {} cycles, mean |error| {:.3}", async_results.len(), mean_abs_error(&async_results));

    menu::wait_for_enter();
}

/// Steps a station by hand on a simulated clock: held start, release, manual
/// override, return to automatic.
fn run_station_walkthrough() {
    println!("\n=== Manual / Hold Walkthrough ===");

    let Some(mut config) = demo_config() else {
        menu::wait_for_enter();
        return;
    };
    config.auto_start = false;

    let clock = ManualClock::new(0);
    let mut station = match config.build_station(clock.clone()) {
        Ok(station) => station,
        Err(err) => {
            tracing::error!(%err, "invalid controller tuning");
            menu::wait_for_enter();
            return;
        }
    };
    station.controller_mut().set_actual(config.plant.initial);

    print_step("held, tick", station.tick());
    print_step("release hold", station.set_hold(false));
    clock.advance(1_000);
    print_step("tick after 1s", station.tick());
    station.set_manual_value(42.0);
    print_step("enter manual", station.set_manual(true));
    clock.advance(30_000);
    print_step("leave manual after 30s", station.set_manual(false));

    menu::wait_for_enter();
}

fn print_step(label: &str, out: Option<StationOutput>) {
    match out {
        None => println!("{:<24} -> no output", label),
        Some(StationOutput::Manual(value)) => println!("{:<24} -> manual {:?}", label, value),
        Some(StationOutput::Auto(out)) => println!(
            "{:<24} -> y={:.2} error={:.2} limited={} dt={}ms integral={:?}",
            label, out.output, out.error, out.limited, out.elapsed_ms, out.integral
        ),
    }
}

fn mean_abs_error(results: &[CycleRecord]) -> f64 {
    let errors: Vec<f64> = results.iter().filter_map(|r| r.error).map(f64::abs).collect();
    if errors.is_empty() {
        0.0
    } else {
        errors.iter().sum::<f64>() / errors.len() as f64
    }
}

fn display_results(results: &[CycleRecord]) {
    if results.is_empty() {
        println!("No results to display.");
        return;
    }

    let total_cycles = results.len();
    let limited = results.iter().filter(|r| r.limited).count();

    println!("\n=== Loop Results ===");
    println!("Total Cycles: {}", total_cycles);
    println!("Limited: {:.2}% ({} cycles)", limited as f64 / total_cycles as f64 * 100.0, limited);
    println!("Mean |error|: {:.3}", mean_abs_error(results));

    if let Some(last) = results.last() {
        println!("Last cycle: actual={:?}, output={:?}, error={:?}", last.actual, last.output, last.error);
    }
}
