use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::{env, fs, process};

use amp_ast::{Diagnostic, Program};
use amp_interp::{Interpreter, RuntimeError};
use amp_stdlib::Builtins;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("run") => match args.get(1) {
            Some(path) => cmd_run(path),
            None => usage(),
        },
        Some("build") => cmd_build(&args[1..]),
        Some("check") => match args.get(1) {
            Some(path) => cmd_check(path),
            None => usage(),
        },
        Some("repl") => cmd_repl(),
        _ => usage(),
    }
}

fn usage() -> ! {
    eprintln!("usage: amp <command> [args]");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  run <script>                               parse and execute a script");
    eprintln!("  build [--target py|js] [-o <out>] <script> compile to Python or JavaScript");
    eprintln!("  check <script>                             parse only, report diagnostics");
    eprintln!("  repl                                       interactive session");
    process::exit(1);
}

// ── Commands ──────────────────────────────────────────────────────

fn cmd_run(path: &str) {
    let (source, program) = load_program(path);
    let mut interp = Interpreter::with_echo(Builtins::new());
    if let Err(e) = interp.run(&program) {
        print_runtime_error(path, &source, &e);
        process::exit(1);
    }
}

fn cmd_check(path: &str) {
    let _ = load_program(path);
    eprintln!("{path}: ok");
}

enum Target {
    Python,
    JavaScript,
}

fn cmd_build(args: &[String]) {
    let mut target = Target::Python;
    let mut output: Option<PathBuf> = None;
    let mut input: Option<&str> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--target" => {
                i += 1;
                let Some(name) = args.get(i) else {
                    eprintln!("error: --target needs a value");
                    process::exit(1);
                };
                target = match name.as_str() {
                    "py" => Target::Python,
                    "js" => Target::JavaScript,
                    other => {
                        eprintln!("error: unsupported target '{other}'");
                        process::exit(1);
                    }
                };
            }
            "-o" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    eprintln!("error: -o needs a value");
                    process::exit(1);
                };
                output = Some(PathBuf::from(path));
            }
            arg if input.is_none() => input = Some(arg),
            arg => {
                eprintln!("error: unexpected argument '{arg}'");
                process::exit(1);
            }
        }
        i += 1;
    }

    let Some(input) = input else {
        eprintln!("usage: amp build [--target py|js] [-o <out>] <script>");
        process::exit(1);
    };

    let (_, program) = load_program(input);
    let code = match target {
        Target::Python => amp_codegen::python::generate(&program),
        Target::JavaScript => amp_codegen::javascript::generate(&program),
    };
    let output = output.unwrap_or_else(|| {
        Path::new(input).with_extension(match target {
            Target::Python => "py",
            Target::JavaScript => "js",
        })
    });
    if let Err(e) = fs::write(&output, code) {
        eprintln!("error: cannot write '{}': {e}", output.display());
        process::exit(1);
    }
    eprintln!("compiled {} -> {}", input, output.display());
}

fn cmd_repl() {
    eprintln!("amp {} repl (Ctrl-D to exit)", env!("CARGO_PKG_VERSION"));
    let mut interp = Interpreter::with_echo(Builtins::new());
    let stdin = io::stdin();
    loop {
        // The prompt goes to stderr so piped stdout holds only values.
        eprint!("amp> ");
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let result = amp_parser::parse(line);
        for diag in &result.diagnostics {
            print_diagnostic("<repl>", line, diag);
        }
        let Some(program) = result.program else {
            continue;
        };
        if let Err(e) = interp.run(&program) {
            print_runtime_error("<repl>", line, &e);
        }
    }
}

// ── Loading and reporting ─────────────────────────────────────────

fn load_program(path: &str) -> (String, Program) {
    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{path}': {e}");
            process::exit(1);
        }
    };
    let result = amp_parser::parse(&source);
    for diag in &result.diagnostics {
        print_diagnostic(path, &source, diag);
    }
    match result.program {
        Some(program) => (source, program),
        None => process::exit(1),
    }
}

fn print_diagnostic(file: &str, source: &str, diag: &Diagnostic) {
    let (line, col) = offset_to_line_col(source, diag.span.start as usize);
    eprintln!("{file}:{line}:{col}: error: {}", diag.message);
}

fn print_runtime_error(file: &str, source: &str, err: &RuntimeError) {
    let (line, col) = offset_to_line_col(source, err.span().start as usize);
    eprintln!("{file}:{line}:{col}: runtime error: {err}");
}

fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}
