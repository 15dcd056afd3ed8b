// ABOUTME: Demo REPL/script-runner binary exercising the library's host
// surface — not part of the sandboxed core itself (spec.md §6: "no file,
// network, persistent-state, or CLI surface defined by the core").
//
// Loop/history/Ctrl-C handling grounded in
// examples/TrevorS-lisp-llm-sandbox/src/main.rs, stripped of its
// Lisp-specific macro registry, filesystem/network sandbox, and stdlib
// loading (none of which this language has).

use std::path::PathBuf;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sandscript::{Builtins, Config, Interpreter};

/// Run or interactively evaluate scripts against the sandboxed interpreter.
#[derive(Parser, Debug)]
#[command(name = "sandscript-repl")]
#[command(version)]
#[command(about = "Demo host for the sandboxed interpreter library")]
struct CliArgs {
    /// Script file to execute (omit to start the REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Load resource ceilings and deny-lists from a JSON config file,
    /// overridden by any of the --max-* flags below
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum approx_len any container or string may reach
    #[arg(long)]
    max_const_len: Option<usize>,

    /// Maximum total loop iterations per top-level run
    #[arg(long)]
    max_loops: Option<u64>,

    /// Maximum syntax-tree node evaluations per top-level run
    #[arg(long)]
    max_statements: Option<u64>,

    /// Maximum user-call nesting depth
    #[arg(long)]
    max_recursion_depth: Option<u32>,
}

fn build_config(args: &CliArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| format!("cannot read config file {}: {e}", path.display()))?;
            serde_json::from_str(&raw).map_err(|e| format!("invalid config file {}: {e}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(v) = args.max_const_len {
        config.max_const_len = v;
    }
    if let Some(v) = args.max_loops {
        config.max_loops = v;
    }
    if let Some(v) = args.max_statements {
        config.max_statements = v;
    }
    if let Some(v) = args.max_recursion_depth {
        config.max_recursion_depth = v;
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = CliArgs::parse();
    let config = build_config(&args)?;
    let mut interp = Interpreter::new(config, Builtins::new());

    if let Some(path) = &args.script {
        return run_script(&mut interp, path);
    }

    run_repl(&mut interp)
}

fn run_script(interp: &mut Interpreter, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path).map_err(|e| format!("cannot read script file {}: {e}", path.display()))?;
    match interp.execute(&source) {
        Ok(value) => {
            if !value.is_none() {
                println!("{value}");
            }
            Ok(())
        }
        Err(err) => Err(err.render_traceback().into()),
    }
}

fn run_repl(interp: &mut Interpreter) -> Result<(), Box<dyn std::error::Error>> {
    let mut rl = DefaultEditor::new()?;
    let history_file = ".sandscript_history";
    let _ = rl.load_history(history_file);

    println!("sandscript REPL — Ctrl-D to exit, :clear to reset scrollback");

    loop {
        match rl.readline(">>> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed == ":quit" || trimmed == ":exit" {
                    break;
                }
                if trimmed == ":clear" {
                    print!("\x1B[2J\x1B[H");
                    continue;
                }
                match interp.eval(trimmed) {
                    Ok(value) => println!("{value}"),
                    Err(err) => eprint!("{}", err.render_traceback()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                eprintln!("readline error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(history_file);
    Ok(())
}
