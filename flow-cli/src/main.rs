fn main() {
    if let Err(err) = flow_cli::run_cli() {
        std::process::exit(flow_cli::report_error(err.as_ref()));
    }
}
