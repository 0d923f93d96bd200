fn main() {
    if let Err(err) = icfes_dw::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
