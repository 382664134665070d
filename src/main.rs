use clap::{value_parser, Arg, ArgAction, Command};
use std::fs;
use std::path::Path;
use sysy::config::EvaluatorConfig;
use sysy::runner;

fn main() {
    let defaults = EvaluatorConfig::default();

    let matches = Command::new("sysy")
        .about("An interpreter for the SysY teaching language")
        .arg(
            Arg::new("file")
                .help("The source file to run")
                .value_name("FILE")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("entry")
                .long("entry")
                .value_name("NAME")
                .help("Function to call after the globals are initialized")
                .default_value("main"),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .help("Stop after parsing and the control-flow check")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max-call-depth")
                .long("max-call-depth")
                .value_name("N")
                .help("Deepest allowed nesting of function calls")
                .value_parser(value_parser!(usize)),
        )
        .get_matches();

    let mut config = defaults.clone();
    if let Some(entry) = matches.get_one::<String>("entry") {
        config = config.with_entry(entry);
    }
    let depth = matches
        .get_one::<usize>("max-call-depth")
        .copied()
        .unwrap_or(defaults.max_call_depth);
    config = config.with_max_call_depth(depth);

    // `file` is required, so clap has already rejected a missing one.
    let Some(file_path) = matches.get_one::<String>("file") else {
        std::process::exit(2);
    };
    let code = run_file(file_path, config, matches.get_flag("check"));
    std::process::exit(code);
}

fn run_file(path: &str, config: EvaluatorConfig, check_only: bool) -> i32 {
    let path = Path::new(path);

    if !path.exists() {
        eprintln!("Error: File '{}' not found", path.display());
        return 1;
    }

    match fs::read_to_string(path) {
        Ok(source) => {
            let filename = path.display().to_string();
            runner::run(&source, Some(&filename), config, check_only)
        }
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            1
        }
    }
}
