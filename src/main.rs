fn main() {
    if let Err(err) = image_bracket_lib::run() {
        eprintln!("image-bracket: {err}");
        std::process::exit(1);
    }
}
