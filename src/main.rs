use std::backtrace::Backtrace;
use std::fs::File;
use std::io::Write;
use std::panic;

use anyhow::Context as _;
use log::{info, LevelFilter};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    setup_os_optimizations();
    setup_diagnostics();

    info!("Starting Anchor Drop (native)...");

    match anchor_drop::run_native() {
        Ok(()) => Ok(()),
        Err(err) if err.is_unsupported_environment() => {
            log::warn!("{}", err);
            eprintln!("{}", anchor_drop::UNSUPPORTED_ENVIRONMENT_MESSAGE);
            std::process::exit(2);
        }
        Err(err) => Err(err).context("demo terminated"),
    }
}

/// Sets up high-performance OS-level constraints
fn setup_os_optimizations() {
    #[cfg(feature = "high_priority")]
    {
        // render/event loop thread
        let _ = thread_priority::set_current_thread_priority(thread_priority::ThreadPriority::Max);
        info!("Elevated main thread priority to Max.");
    }
}

/// Sets up logging and crash reports
fn setup_diagnostics() {
    env_logger::Builder::new()
        .filter_level(if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .format_timestamp_millis()
        .format_target(false)
        .parse_default_env()
        .init();

    panic::set_hook(Box::new(|panic_info| {
        let backtrace = Backtrace::force_capture();

        let msg = match panic_info.payload().downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => match panic_info.payload().downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<dyn Any>",
            },
        };

        let location = panic_info
            .location()
            .map_or("Unknown location".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));

        let crash_msg = format!(
            "=== ANCHOR DROP CRASH ===\nReason: {}\nLocation: {}\n\nStack Trace:\n{}",
            msg, location, backtrace
        );

        eprintln!("\x1b[31;1m{}\x1b[0m", crash_msg);

        if let Ok(mut file) = File::create("anchor_drop_crash.log") {
            let _ = file.write_all(crash_msg.as_bytes());
            eprintln!("Crash report saved to anchor_drop_crash.log");
        }
    }));
}
