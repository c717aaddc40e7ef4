//! The register allocator executable.

use std::{
    error::Error,
    fs,
    io::{self, Read},
    process,
};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::info;
use rvalloc::{
    backend::{
        reg_alloc::{
            greedy_allocation::block_weights,
            live_range_analysis,
            GreedyAllocation,
            RegAllocConfig,
        },
        riscv64::{RvAllocTarget, RvInst},
        MContext,
    },
    collections::linked_list::LinkedListContainerPtr,
    frontend,
};

fn cli() -> Command {
    Command::new("rvalloc")
        .about("greedy register allocation of RISC-V64 assembly with virtual registers")
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("INPUT")
                .help("input assembly, `-` for stdin"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("write the allocated assembly to FILE instead of stdout"),
        )
        .arg(
            Arg::new("loop-weight")
                .long("loop-weight")
                .value_name("F")
                .value_parser(value_parser!(f64))
                .default_value("4.0")
                .help("weight multiplier of each enclosing loop"),
        )
        .arg(
            Arg::new("max-regs")
                .long("max-regs")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("only use the first N allocatable registers of each class"),
        )
        .arg(
            Arg::new("keep-identity-moves")
                .long("keep-identity-moves")
                .action(ArgAction::SetTrue)
                .help("keep the copies coalescing turned into `r = r`"),
        )
        .arg(
            Arg::new("emit-liveness")
                .long("emit-liveness")
                .action(ArgAction::SetTrue)
                .help("print the live ranges before allocation to stderr"),
        )
        .arg(
            Arg::new("emit-weights")
                .long("emit-weights")
                .action(ArgAction::SetTrue)
                .help("print the block weights to stderr"),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .action(ArgAction::SetTrue)
                .help("print allocation statistics to stderr"),
        )
}

fn config_from(matches: &ArgMatches) -> RegAllocConfig {
    let mut config = RegAllocConfig {
        remove_identity_moves: !matches.get_flag("keep-identity-moves"),
        reg_limit: matches.get_one::<usize>("max-regs").copied(),
        ..RegAllocConfig::default()
    };
    if let Some(&loop_weight) = matches.get_one::<f64>("loop-weight") {
        config.loop_weight = loop_weight;
    }
    config
}

fn read_input(path: &str) -> io::Result<String> {
    if path == "-" {
        let mut src = String::new();
        io::stdin().read_to_string(&mut src)?;
        Ok(src)
    } else {
        fs::read_to_string(path)
    }
}

/// Print the analyses the allocator is going to consume.
fn emit_analyses(mctx: &MContext<RvInst>, matches: &ArgMatches, config: &RegAllocConfig) {
    for func in mctx.funcs() {
        if func.is_external(mctx) || func.head(mctx).is_none() {
            continue;
        }
        let label = func.label(mctx);

        if matches.get_flag("emit-liveness") {
            let live = live_range_analysis::analyze_on_function::<RvAllocTarget>(mctx, func);
            eprint!(
                "# live ranges of {}\n{}",
                label,
                live.display::<RvAllocTarget>(mctx)
            );
        }

        if matches.get_flag("emit-weights") {
            let weights = block_weights(mctx, func, config.loop_weight);
            eprintln!("# block weights of {}", label);
            for block in func.iter(mctx) {
                eprintln!("{}: {}", block.label(mctx), weights.weight(block));
            }
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let matches = cli().get_matches();

    let input = matches
        .get_one::<String>("input")
        .map(String::as_str)
        .unwrap_or("-");
    let src = read_input(input)?;

    let mut mctx = frontend::parse(&src)?;
    let config = config_from(&matches);
    info!("allocating {} with {:?}", input, config);

    emit_analyses(&mctx, &matches, &config);

    let mut allocator = GreedyAllocation::<RvAllocTarget>::new(config);
    let results = allocator.run_on_context(&mut mctx)?;

    if matches.get_flag("stats") {
        for (func, result) in results.iter() {
            eprintln!("{}: {}", func.label(&mctx), result.stats);
        }
        eprintln!("total: {}", allocator.total);
    }

    let asm = mctx.display().to_string();
    match matches.get_one::<String>("output") {
        Some(path) => fs::write(path, asm)?,
        None => print!("{}", asm),
    }

    Ok(())
}

fn main() {
    pretty_env_logger::init();

    if let Err(err) = run() {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}
