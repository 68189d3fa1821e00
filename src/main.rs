fn main() {
    if let Err(err) = dbx::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
