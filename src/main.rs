extern crate clap;
extern crate rinha;

use clap::{App, Arg};

use rinha::compiler;
use rinha::errors::*;
use rinha::loader;
use rinha::printer;
use rinha::vm::VM;

use std::path::Path;

fn main() {
    if let Err(ref e) = run() {
        eprintln!("error: {}", e);

        for cause in e.iter_causes() {
            eprintln!("caused by: {}", cause);
        }

        ::std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let matches = App::new("rinha")
        .version("v0.1.0")
        .about("Bytecode compiler and VM for the Rinha functional language")
        .arg(
            Arg::with_name("FILE")
                .help("AST file to execute")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("ast")
                .long("ast")
                .help("Pretty-print the program source before running"),
        )
        .arg(
            Arg::with_name("disassemble")
                .long("disassemble")
                .help("Print a disassembly of the compiled chunks before running"),
        )
        .arg(
            Arg::with_name("trace")
                .long("trace")
                .help("Print every executed instruction to stderr"),
        )
        .get_matches();

    let path = matches.value_of("FILE").unwrap();

    let file = loader::load_path(Path::new(path)).context("While loading the AST")?;

    if matches.is_present("ast") {
        println!("{}", printer::render(&file));
        println!();
    }

    let code = compiler::compile(&file).context("While compiling")?;

    if matches.is_present("disassemble") {
        code.disassemble();
        println!();
    }

    let mut vm = VM::new(code);
    vm.trace = matches.is_present("trace");

    // The final value is deliberately not printed; only the guest's own
    // `print` calls reach standard output.
    vm.run().context("While executing")?;

    Ok(())
}
