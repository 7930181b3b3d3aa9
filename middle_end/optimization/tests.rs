use collapse::*;

use super::{optimize_module, Options};
use crate::commons::Valid;
use crate::middle_end::ssa::Module;

mod cse;
mod element;
mod live;
mod misc;
mod pipeline;
mod record;
mod sink;

const ALL_PASSES: &[&str] = &[
    "split_blocks",
    "element",
    "linearize",
    "record",
    "cse",
    "type",
    "float",
    "live",
    "bsm",
    "bsm_shortcut",
    "misc",
    "blockify",
    "sink",
    "merge_blocks",
];

// Run the pipeline with only the given passes enabled (plus the two
// representation switches, so the output is always a label-keyed map
// printed in ascending label order) and return the printed module.
fn run_passes(passes: &[&str], input: &str) -> String {
    let module = input.parse::<Module>().unwrap();
    let mut opts = Options::new();
    for p in ALL_PASSES {
        let keep = passes.contains(p) || *p == "linearize" || *p == "blockify";
        if !keep {
            opts.set(&format!("no_{p}"), true);
        }
    }
    let Valid(out) = optimize_module(module, &opts).unwrap();
    out.to_string()
}

// Check that the input program optimizes to the expected output program
// under the given passes. Both sides are normalized by parsing and
// printing.
fn optimizes_to(passes: &[&str], input: &str, expected: &str) {
    let actual = run_passes(passes, input);
    let expected = expected.parse::<Module>().unwrap().to_string();
    collapsed_eq!(&actual, &expected);
}
