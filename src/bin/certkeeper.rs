use certkeeper::cli::{self, Options};

fn main() {
    if let Err(err) = cli::run(Options::from_args()) {
        eprintln!("{}", err);
        ::std::process::exit(1);
    }
}
