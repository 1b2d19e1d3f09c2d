
use log::info;
use relative_init::config::files_handling;
use relative_init::embedding::KeyedVectors;
use relative_init::errors::{Error, Result};
use relative_init::similarity::Similarity;
use std::env;
use std::path::Path;


// checks on computed relation vectors: for every query pair, print the k pairs
// whose RELATIVE vectors are most similar to it.
// treated as binary executable so it can be ran independently from the pipeline
//
// arguments:
// path to the relation vectors (word2vec .txt or .bin)
// path to a queries file, one pair per line, either `a<TAB>b` or `a__b`
// optional k, defaults to 10
// example: ... cache/relative_init.fasttext.bin queries.txt 20

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    // Main can't return a Result, and the ? operator needs the enclosing function to return Result
    if let Err(e) = inner_main() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn inner_main() -> Result<()> {

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 && args.len() != 4 {
        return Err(Error::Config("usage: relative-query <vectors file> <queries file> [k]".to_string()));
    }
    let k = match args.get(3) {
        Some(k) => k.parse::<usize>().map_err(|_| Error::Config(format!("k should be a positive integer, got {}", k)))?,
        None => 10
    };

    let sim_obj = Similarity::new(KeyedVectors::load(Path::new(&args[1]))?);
    info!("answering queries from {}", &args[2]);

    for line in files_handling::read_lines(Path::new(&args[2]))? {
        let line = line?;
        let query = line.trim();
        if query.is_empty() {
            continue;
        }

        let vec = match query.split_once('\t') {
            Some((left, right)) => sim_obj.extract_vec_from_pair(left, Some(right)),
            None => sim_obj.extract_vec_from_pair(query, None),
        };
        let vec = match vec {
            Ok(vec) => vec,
            Err(e) => {
                println!("{}\n", e);
                continue;
            }
        };

        let key = query.replace('\t', "__");
        println!("searching {} most similar pairs to {}", k, key);
        for (i, (similar_pair, score)) in sim_obj.find_k_most_similar(&vec, k, Some(key.as_str())).iter().enumerate() {
            println!("{} : {} ~ {} = {}", i, key, similar_pair, score);
        }
        println!("\n");
    }

    Ok(())
}
