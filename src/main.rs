use clap::Parser;
use tabflow::cli::{self, Args};
use tabflow::logging;

fn main() -> tabflow::Result<()> {
    let args = Args::parse();
    let _guard = logging::init(args.command.workspace().as_deref(), args.quiet)?;
    cli::run(args)
}
