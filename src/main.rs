use clap::Parser;
use mktools::{MkCommand, MkTool};

fn main() {
    let cli = MkTool::parse();

    let verbose = match &cli.command {
        MkCommand::Sys(args) => args.options.verbose,
        MkCommand::App(args) => args.options.verbose,
        MkCommand::Exe(args) => args.options.verbose,
        MkCommand::Comp(args) => args.options.verbose,
        MkCommand::Edit(_) => false,
    };
    if verbose {
        mktools::system::enable_verbose();
    }

    if let Err(e) = cli.command.run() {
        e.print();
        std::process::exit(1);
    }
}
