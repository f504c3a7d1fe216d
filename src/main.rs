// quill - CLI for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

use std::env;
use std::fs;
use std::path::Path;
use std::process;

use quill_embed::{Script, ScriptError};
use quill_parser::SourceFile;
use quill_vm::{ModuleMap, Unit, Vm};

/// File extension of serialized compiled units.
const UNIT_EXT: &str = "qlc";

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() == 2 && (args[1] == "--version" || args[1] == "-v") {
        println!("Quill v{}", env!("CARGO_PKG_VERSION"));
        return;
    }

    match args.get(1).map(String::as_str) {
        Some("--compile") | Some("-c") => {
            let Some(path) = args.get(2) else {
                eprintln!("usage: quill --compile <file>");
                process::exit(2);
            };
            compile_file(path);
        }
        Some(path) => {
            if Path::new(path).extension().and_then(|e| e.to_str()) == Some(UNIT_EXT) {
                run_unit(path, &args[2..]);
            } else {
                run_source(path, &args[2..]);
            }
        }
        None => {
            eprintln!("usage: quill [--compile] <file> [args...]");
            process::exit(2);
        }
    }
}

fn make_script(path: &str, source: String, args: &[String]) -> Script {
    let mut script = Script::new(source);
    script
        .set_name(path)
        .enable_file_import(true)
        .set_args(args.to_vec());
    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            script.set_import_dir(dir);
        }
    }
    script
}

/// Run a source file to completion.
fn run_source(path: &str, args: &[String]) {
    let source = read_or_exit(path);
    let script = make_script(path, source, args);

    let mut compiled = match script.compile() {
        Ok(compiled) => compiled,
        Err(e) => exit_with(&e, path),
    };
    if let Err(e) = compiled.run() {
        eprintln!("{}", e.display_in(compiled.source_file()));
        process::exit(1);
    }
}

/// Compile a source file to a `.qlc` unit next to it.
fn compile_file(path: &str) {
    let source = read_or_exit(path);
    let script = make_script(path, source, &[]);

    let compiled = match script.compile() {
        Ok(compiled) => compiled,
        Err(e) => exit_with(&e, path),
    };
    let encoded = match compiled.unit().encode() {
        Ok(encoded) => encoded,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            process::exit(1);
        }
    };
    let out_path = Path::new(path).with_extension(UNIT_EXT);
    if let Err(e) = fs::write(&out_path, encoded) {
        eprintln!("{}: {}", out_path.display(), e);
        process::exit(1);
    }
    println!("wrote {}", out_path.display());
}

/// Execute a serialized unit.
fn run_unit(path: &str, args: &[String]) {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            process::exit(1);
        }
    };
    let unit = match Unit::decode(&bytes, &ModuleMap::new()) {
        Ok(unit) => unit,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            process::exit(1);
        }
    };
    let mut vm = Vm::new(unit, Vec::new(), args.to_vec());
    if let Err(e) = vm.run() {
        eprintln!("{}: {}", path, e);
        process::exit(1);
    }
}

fn read_or_exit(path: &str) -> String {
    match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            process::exit(1);
        }
    }
}

fn exit_with(e: &ScriptError, path: &str) -> ! {
    let source = fs::read_to_string(path).unwrap_or_default();
    let file = SourceFile::new(path, &source);
    eprintln!("{}", e.display_in(&file));
    process::exit(1)
}
