use clap::Parser;
use dumpsift::{
    logging, Cli, DumpSift, DumpSiftError, OutputFormatter, OutputMode, UserFriendlyError,
};
use std::process;
use tracing::error;

fn main() {
    let exit_code = run();
    process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let dumpsift = match DumpSift::from_cli(&cli) {
        Ok(dumpsift) => dumpsift,
        Err(e) => {
            print_startup_error(&e);
            return e.exit_code();
        }
    };

    // Held until the process exits so the file sink is flushed.
    let _log_guard = match logging::init_logging(
        &dumpsift.config().logging,
        cli.verbosity_level(),
        cli.quiet,
    ) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return 1;
        }
    };

    let bin_name = match cli.bin_name.as_deref() {
        Some(name) => name,
        None => {
            let e = DumpSiftError::config("No dump name given (use --bin-name)");
            dumpsift.handle_error(&e);
            return e.exit_code();
        }
    };

    let operations = cli.requested_operations();

    if cli.dry_run {
        return handle_dry_run(&dumpsift, bin_name, &operations);
    }

    match dumpsift.execute(bin_name, &operations) {
        Ok(report) => {
            dumpsift.output_formatter().print_run_report(&report);
            0
        }
        Err(e) => {
            error!("Run for {} failed: {}", bin_name, e);
            dumpsift.handle_error(&e);
            e.exit_code()
        }
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "dumpsift.toml".to_string());

    match DumpSift::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!(
                "  dumpsift --config {} --base-dir <dir> --bin-name <dump> --radare",
                config_path
            );
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            e.exit_code()
        }
    }
}

fn handle_dry_run(
    dumpsift: &DumpSift,
    bin_name: &str,
    operations: &[dumpsift::OperationKind],
) -> i32 {
    let formatter = dumpsift.output_formatter();
    formatter.info("DRY RUN MODE - nothing will be created or executed");

    match dumpsift.plan(bin_name, operations) {
        Ok(entries) => {
            formatter.print_plan("Execution plan", &entries);
            if operations.is_empty() {
                formatter.warning("No operations selected (use -c, --radare or --sifter)");
            }
            0
        }
        Err(e) => {
            dumpsift.handle_error(&e);
            e.exit_code()
        }
    }
}

fn print_startup_error(error: &DumpSiftError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}
