use log::info;

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

pub fn setup_logging(level: &str) -> Result<(), fern::InitError> {
    let level = level.parse().unwrap_or(log::LevelFilter::Info);
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn)
        .level_for("redis", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;
    info!("Logging initialized at {}.", level);
    Ok(())
}

/// Converts a raw base-unit amount into whole units (`decimals` places).
pub fn to_units(amount: u128, decimals: u32) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}

/// Basis-point share of `amount`, rounded down.
pub fn bps_of(amount: u128, bps: u16) -> u128 {
    amount.saturating_mul(bps as u128) / 10_000
}
