fn main() {
    if let Err(err) = round_analytics::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
