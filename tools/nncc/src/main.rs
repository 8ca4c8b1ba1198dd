use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use nnc_rs::{MemoryAllocation, Module, ModulePass, SimDla};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(cmd) = args.next() else {
        print_help();
        return Ok(());
    };

    match cmd.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("nncc 0.1.0");
            Ok(())
        }
        "alloc" => run_alloc(args.collect()),
        "dump" => run_dump(args.collect()),
        other => bail!("unknown command '{other}'"),
    }
}

fn run_alloc(raw_args: Vec<String>) -> Result<()> {
    let mut local_mem: Option<u64> = None;
    let mut input: Option<PathBuf> = None;
    let mut placements = false;

    let mut i = 0usize;
    while i < raw_args.len() {
        match raw_args[i].as_str() {
            "--local-mem" => {
                i += 1;
                let raw = raw_args
                    .get(i)
                    .context("--local-mem requires a byte count")?;
                local_mem = Some(raw.parse().context("--local-mem must be an integer")?);
            }
            "--placements" => placements = true,
            other if other.starts_with('-') => bail!("unknown flag '{other}'"),
            other => input = Some(PathBuf::from(other)),
        }
        i += 1;
    }

    let local_mem = local_mem.context("missing --local-mem <bytes>")?;
    let input = input.context("missing input module path")?;

    let mut module =
        Module::load_json(&input).with_context(|| format!("loading {}", input.display()))?;
    module.graph.validate().context("module schedule invalid")?;

    let mut pass = MemoryAllocation::new(Arc::new(SimDla::new(local_mem)));
    let outcome = pass.run(&mut module);
    if outcome.is_failure() {
        bail!("memory allocation failed");
    }

    print!("{}", pass.report(&module.graph));
    if placements {
        println!("{}", pass.placement_json(&module.graph)?);
    }
    Ok(())
}

fn run_dump(raw_args: Vec<String>) -> Result<()> {
    let [input] = raw_args.as_slice() else {
        bail!("usage: nncc dump <module.json>");
    };
    let module =
        Module::load_json(input).with_context(|| format!("loading {input}"))?;
    print!("{module}");
    Ok(())
}

fn print_help() {
    println!("nncc: compiler driver for nnc-rs passes");
    println!();
    println!("USAGE:");
    println!("  nncc alloc --local-mem <bytes> [--placements] <module.json>");
    println!("  nncc dump <module.json>");
    println!("  nncc help | version");
}
