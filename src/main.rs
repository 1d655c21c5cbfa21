use jvm_rebuild::cli::{self, CliArgs};
use jvm_rebuild::util::logging;
use jvm_rebuild::VERSION;

use clap::Parser;
use tracing::{debug, error};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("jvm-rebuild v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match cli::run(&args).await {
        Ok(output) => {
            if !args.quiet && !output.is_empty() {
                println!("{}", output.trim_end());
            }
            0
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    if let Some(level) = &args.log_level {
        logging::with_level(level);
    } else if args.verbose {
        logging::with_level("debug");
    } else if args.quiet {
        logging::with_level("error");
    } else {
        logging::init_from_env();
    }
}
