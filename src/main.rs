fn main() {
    if let Err(err) = htbmcp::cli::main() {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
