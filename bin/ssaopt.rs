//! Optimize a textual SSA module from the command line:
//!
//!   ssaopt input.ssa [options.json]
//!
//! The options file is a JSON object of pass flags, e.g.
//! `{"no_float": true}`. The optimized module is printed on stdout.

use std::collections::BTreeMap as Map;
use std::env;

use ssa_opt::commons::Valid;
use ssa_opt::middle_end::optimization::{optimize_module, Options};
use ssa_opt::middle_end::ssa::Module;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: ssaopt <input.ssa> [options.json]");
        std::process::exit(1);
    }

    let module: Module = read_from(&args[1])
        .parse()
        .unwrap_or_else(|e| panic!("{}: {e}", args[1]));

    let opts = match args.get(2) {
        Some(path) => {
            let flags: Map<String, bool> =
                serde_json::from_str(&read_from(path)).unwrap_or_else(|e| panic!("{path}: {e}"));
            Options::from_flags(flags)
        }
        None => Options::new(),
    };

    match optimize_module(module, &opts) {
        Ok(Valid(out)) => println!("{out}"),
        Err(e) => {
            eprintln!("internal error while optimizing {e}");
            std::process::exit(2);
        }
    }
}

fn read_from(path: &str) -> String {
    String::from_utf8(
        std::fs::read(path).unwrap_or_else(|_| panic!("Could not read the input file {}", path)),
    )
    .expect("The input file does not contain valid utf-8 text")
}
