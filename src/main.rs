use relative_init::Run;

// input: a json file with the corpus, the pair files, the embedding and the output directory
// (the parameters and their defaults are listed in config.rs)
// output: relative_init.<model>.txt / .bin in the output directory, plus the stage checkpoints

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = Run::run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
