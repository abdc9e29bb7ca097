use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use schemy::ast::Value;
use schemy::interpreter::Interpreter;

fn main() {
    env_logger::init();

    let mut interp = Interpreter::new();

    let init_path = Path::new(".init.ss");
    if init_path.exists() {
        match interp.load_init_file(init_path) {
            Ok(_) => println!("Loaded .init.ss"),
            Err(err) => eprintln!("Error in .init.ss: {err}"),
        }
    }

    match env::args().nth(1) {
        Some(path) if Path::new(&path).is_file() => run_file(&mut interp, &path),
        _ => run_repl(&mut interp),
    }
}

fn run_file(interp: &mut Interpreter, path: &str) {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Cannot open {path}: {err}");
            std::process::exit(1);
        }
    };
    match interp.evaluate(BufReader::new(file)) {
        Ok(Some(value)) => {
            if !matches!(value, Value::None) {
                println!("{value}");
            }
        }
        Ok(None) => {}
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

fn run_repl(interp: &mut Interpreter) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    if let Err(err) = interp.repl(stdin.lock(), &mut stdout, Some("Schemy> "), None) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
