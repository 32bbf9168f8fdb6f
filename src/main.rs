fn main() {
    if let Err(err) = tabular_schema::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
