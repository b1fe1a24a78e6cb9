fn main() {
    if let Err(err) = csv_studio::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
