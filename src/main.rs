use std::io::{stdin, stdout, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use leafdb::constants::*;
use leafdb::table::Table;
use leafdb::virtual_machine::{prepare_statement, VMErr, VMResult, VirtualMachine};

/// Interactive shell over a single-table database file
#[derive(Parser, Debug)]
#[command(name = "leafdb", version)]
struct Args {
    /// Database file, created if it does not exist
    #[arg(value_name = "FILE", env = "LEAFDB_FILE")]
    filename: PathBuf,

    /// Log engine activity to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Do not print the prompt (for scripting)
    #[arg(short, long)]
    quiet: bool,
}

enum MetaCommand {
    Exit,
    Constants,
    Btree,
    Unsupported,
}

enum ReplAction<'a> {
    Exit,
    Constants,
    Btree,
    Statement { original_input: &'a str },
    Unsupported { message: String },
    Empty,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "fatal");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("leafdb=debug")
        } else {
            EnvFilter::new("leafdb=warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(args: &Args) -> Result<ExitCode> {
    let mut table = Table::open(&args.filename)
        .with_context(|| format!("unable to open {}", args.filename.display()))?;
    info!(path = %args.filename.display(), "database ready");

    let mut input_buffer = Vec::new();

    // Loop until ".exit" input is provided
    loop {
        if !args.quiet {
            print!("db > ");
        }
        let input = match read_user_input(&mut input_buffer)? {
            Some(input) => input,
            None => {
                if !args.quiet {
                    // keep the shell prompt off our prompt line
                    println!();
                }
                println!("Error reading input");
                close(table, args)?;
                return Ok(ExitCode::FAILURE);
            }
        };

        match input.as_str().into() {
            ReplAction::Exit => {
                close(table, args)?;
                return Ok(ExitCode::SUCCESS);
            }
            ReplAction::Constants => print_constants(),
            ReplAction::Btree => print_tree(&mut table)?,
            ReplAction::Statement { original_input } => match prepare_statement(original_input) {
                Ok(statement) => {
                    let mut vm = VirtualMachine { table: &mut table };
                    match vm.execute_statement(statement) {
                        Ok(VMResult::Rows(rows)) => {
                            rows.iter().for_each(|r| println!("{}", r));
                            println!("Executed.");
                        }
                        Ok(VMResult::Success) => println!("Executed."),
                        Err(e @ VMErr::TableFull) => println!("{}", e),
                        Err(VMErr::Table(e)) => return Err(e).context("statement failed"),
                    }
                }
                Err(e) => println!("{}", e),
            },
            ReplAction::Unsupported { message } => println!("{}", message),
            ReplAction::Empty => {}
        }
    }
}

fn close(table: Table, args: &Args) -> Result<()> {
    table
        .close()
        .with_context(|| format!("unable to close {}", args.filename.display()))
}

// Bytes that are not UTF-8 become U+FFFD instead of ending the session.
fn read_user_input(input_buffer: &mut Vec<u8>) -> Result<Option<String>> {
    stdout().flush()?;
    input_buffer.clear();
    if stdin().lock().read_until(b'\n', input_buffer)? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(input_buffer).trim().to_owned()))
}

fn print_constants() {
    println!("Constants:");
    println!("ROW_SIZE: {}", ROW_SIZE);
    println!("COMMON_NODE_HEADER_SIZE: {}", COMMON_NODE_HEADER_SIZE);
    println!("LEAF_NODE_HEADER_SIZE: {}", LEAF_NODE_HEADER_SIZE);
    println!("LEAF_NODE_CELL_SIZE: {}", LEAF_NODE_CELL_SIZE);
    println!("LEAF_NODE_SPACE_FOR_CELLS: {}", LEAF_NODE_SPACE_FOR_CELLS);
    println!("LEAF_NODE_MAX_CELLS: {}", LEAF_NODE_MAX_CELLS);
}

fn print_tree(table: &mut Table) -> Result<()> {
    println!("Tree:");
    println!("leaf (size {})", table.num_rows()?);
    let mut cursor = table.start()?;
    while !cursor.end_of_table {
        println!("  - {} : {}", cursor.cell_num(), cursor.key()?);
        cursor.advance()?;
    }
    Ok(())
}

impl<'a> From<&'a str> for ReplAction<'a> {
    fn from(s: &'a str) -> Self {
        if s.is_empty() {
            ReplAction::Empty
        } else if let Some('.') = s.chars().next() {
            match s.into() {
                MetaCommand::Exit => ReplAction::Exit,
                MetaCommand::Constants => ReplAction::Constants,
                MetaCommand::Btree => ReplAction::Btree,
                MetaCommand::Unsupported => ReplAction::Unsupported {
                    message: format!("Unrecognized command '{}'", s),
                },
            }
        } else {
            ReplAction::Statement { original_input: s }
        }
    }
}

impl From<&str> for MetaCommand {
    fn from(s: &str) -> Self {
        match s.trim() {
            ".exit" => MetaCommand::Exit,
            ".constants" => MetaCommand::Constants,
            ".btree" => MetaCommand::Btree,
            _ => MetaCommand::Unsupported,
        }
    }
}
