use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Arg, ArgMatches, Command};
use colored::Colorize;
use log::{debug, LevelFilter};
use thiserror::Error;

use menuvm::bytecode::{disassemble, BytecodeError};
use menuvm::compiler::{assemble_to_vec, CompilerError};
use menuvm::config::{Config, ConfigError};
use menuvm::engine::{run_loop, Engine, EngineError};
use menuvm::storage::{DataType, FileStorage, StorageBackend, StorageError, StorageExtensions};
use menuvm::vm::VMError;

#[derive(Debug, Error)]
enum AppError {
    #[error("Compiler error: {0}")]
    Compiler(#[from] CompilerError),

    #[error("Bytecode error: {0}")]
    Bytecode(#[from] BytecodeError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Other(s)
    }
}

fn cli() -> Command {
    Command::new("menuvm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Bytecode VM for turn-based menu services")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .global(true)
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("asm")
                .about("Assemble a source file into bytecode")
                .arg(Arg::new("input").required(true).value_name("FILE"))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Output file (default: input with .bin extension)"),
                ),
        )
        .subcommand(
            Command::new("disasm")
                .about("Print the instructions of a bytecode file")
                .arg(Arg::new("input").required(true).value_name("FILE")),
        )
        .subcommand(
            Command::new("dump")
                .about("List what a session has stored")
                .arg(
                    Arg::new("dir")
                        .short('d')
                        .long("dir")
                        .value_name("DIR")
                        .required(true),
                )
                .arg(
                    Arg::new("session")
                        .long("session")
                        .value_name("ID")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Run a session against a content directory")
                .arg(
                    Arg::new("dir")
                        .short('d')
                        .long("dir")
                        .value_name("DIR")
                        .required(true)
                        .help("Directory holding node code, templates and state"),
                )
                .arg(Arg::new("root").long("root").value_name("NODE").help("Start node"))
                .arg(
                    Arg::new("session")
                        .long("session")
                        .value_name("ID")
                        .help("Session to resume (default: a new random id)"),
                )
                .arg(
                    Arg::new("flags")
                        .long("flags")
                        .value_name("N")
                        .value_parser(clap::value_parser!(u32))
                        .help("Number of program flags"),
                )
                .arg(
                    Arg::new("output-size")
                        .long("output-size")
                        .value_name("BYTES")
                        .value_parser(clap::value_parser!(usize))
                        .help("Maximum size of one display"),
                )
                .arg(Arg::new("language").long("language").value_name("CODE"))
                .arg(
                    Arg::new("batch")
                        .long("batch")
                        .help("Read input lines from stdin without a prompt")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
}

fn main() {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let result = match matches.subcommand() {
        Some(("asm", sub)) => asm_command(sub),
        Some(("disasm", sub)) => disasm_command(sub),
        Some(("dump", sub)) => dump_command(sub),
        Some(("run", sub)) => run_command(sub),
        _ => Err(AppError::Other("no command given".to_string())),
    };

    if let Err(err) = result {
        eprintln!("{} {}", "Error:".red().bold(), err);
        process::exit(1);
    }
}

fn input_path(matches: &ArgMatches) -> Result<&String, AppError> {
    matches
        .get_one::<String>("input")
        .ok_or_else(|| AppError::Other("missing input file".to_string()))
}

fn asm_command(matches: &ArgMatches) -> Result<(), AppError> {
    let input = input_path(matches)?;
    let output = match matches.get_one::<String>("output") {
        Some(path) => PathBuf::from(path),
        None => Path::new(input).with_extension("bin"),
    };

    let source = fs::read_to_string(input)?;
    let code = assemble_to_vec(&source)?;
    fs::write(&output, &code)?;
    println!(
        "{} {} bytes to {}",
        "Wrote".green(),
        code.len(),
        output.display()
    );
    Ok(())
}

fn disasm_command(matches: &ArgMatches) -> Result<(), AppError> {
    let input = input_path(matches)?;
    let code = fs::read(input)?;
    print!("{}", disassemble(&code)?);
    Ok(())
}

fn dump_command(matches: &ArgMatches) -> Result<(), AppError> {
    let dir = matches
        .get_one::<String>("dir")
        .ok_or_else(|| AppError::Other("missing content directory".to_string()))?;
    let session = matches
        .get_one::<String>("session")
        .ok_or_else(|| AppError::Other("missing session".to_string()))?;
    let store = FileStorage::new(dir)?;

    let mut count = 0;
    for data_type in DataType::ALL.into_iter().filter(|t| t.is_sessioned()) {
        for (name, value) in store.dump_session(data_type, session)? {
            println!("{:<10} {:<20} {} bytes", format!("{:?}", data_type), name, value.len());
            count += 1;
        }
    }
    if count == 0 {
        println!("{} {}", "Nothing stored for session".dimmed(), session);
    }
    Ok(())
}

fn run_config(matches: &ArgMatches) -> Result<Config, AppError> {
    let mut config = Config::from_env()?;
    if let Some(root) = matches.get_one::<String>("root") {
        config.root = root.clone();
    }
    match matches.get_one::<String>("session") {
        Some(session) => config.session_id = session.clone(),
        None if config.session_id.is_empty() => {
            config.session_id = uuid::Uuid::new_v4().to_string();
        }
        None => {}
    }
    if let Some(flags) = matches.get_one::<u32>("flags") {
        config.flag_count = *flags;
    }
    if let Some(size) = matches.get_one::<usize>("output-size") {
        config.output_size = *size;
    }
    if let Some(language) = matches.get_one::<String>("language") {
        config.language = Some(language.clone());
    }
    config.validate()?;
    Ok(config)
}

fn run_command(matches: &ArgMatches) -> Result<(), AppError> {
    let dir = matches
        .get_one::<String>("dir")
        .ok_or_else(|| AppError::Other("missing content directory".to_string()))?;
    let config = run_config(matches)?;
    debug!("running session {} from {}", config.session_id, dir);

    let mut store = FileStorage::new(dir)?;
    store.seal();
    let mut engine = Engine::new(config, store)?;

    if matches.get_flag("batch") {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        run_loop(&mut engine, stdin.lock(), &mut stdout)?;
        stdout.flush()?;
        return Ok(());
    }
    run_interactive(&mut engine)
}

fn show(engine: &Engine<FileStorage>) -> Result<(), AppError> {
    let mut stdout = io::stdout();
    engine.write_result(&mut stdout)?;
    writeln!(stdout)?;
    Ok(())
}

fn run_interactive(engine: &mut Engine<FileStorage>) -> Result<(), AppError> {
    println!(
        "{} {} (ctrl-d to leave)",
        "Session".bold(),
        engine.config().session_id
    );
    let mut alive = engine.init()?;
    show(engine)?;

    let mut rl = rustyline::DefaultEditor::new().map_err(|e| AppError::Other(e.to_string()))?;
    while alive {
        let line = match rl.readline("> ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted)
            | Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => return Err(format!("Error reading input: {}", e).into()),
        };
        if let Err(e) = rl.add_history_entry(line.as_str()) {
            return Err(format!("Error adding to history: {}", e).into());
        }

        // slash commands never classify as menu input
        match line.trim() {
            "/help" => {
                println!("  /stack     - Show the position stack");
                println!("  /symbols   - Show loaded symbols");
                println!("  /help      - Show this help message");
                println!("Anything else is sent to the session as input.");
                continue;
            }
            "/stack" => {
                println!("{}", engine.state().stack().format_stack());
                continue;
            }
            "/symbols" => {
                println!("{}", engine.state().symbols().format_memory());
                continue;
            }
            _ => {}
        }

        match engine.exec(line.trim().as_bytes()) {
            Ok(more) => alive = more,
            Err(EngineError::VM(e @ VMError::InvalidInput(_))) => {
                eprintln!("{} {}", "Invalid:".yellow(), e);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
        show(engine)?;
    }
    if !alive {
        println!("{}", "Session ended".dimmed());
    }
    Ok(())
}
