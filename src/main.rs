use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = sahha_pulse_lib::run() {
        log::error!("sahha-pulse exited: {e}");
        eprintln!("{}", sahha_pulse_lib::error::ErrorReport::from(&e).recovery_suggestion);
        std::process::exit(1);
    }
}
