fn main() {
    if let Err(error) = confpp_cli::run() {
        // Tracing is initialized inside run() after argument parsing.
        tracing::error!("{error:#}");
        std::process::exit(1);
    }
}
