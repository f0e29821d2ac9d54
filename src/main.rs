use std::fs;
use std::io::{self, Read};

use anyhow::{Context as _, Result, bail};

use minipy::interpreter::StepResult;
use minipy::lexer::Lexer;
use minipy::parser;
use minipy::runtime::Scope;
use minipy::runtime::context::StreamContext;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let input_path = args.next();
    if args.next().is_some() {
        bail!("Only one input file is supported");
    }

    let source = if let Some(path) = input_path {
        fs::read_to_string(&path).with_context(|| format!("Reading {path}"))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        buffer
    };

    let mut lexer = Lexer::new(&source)?;
    let program = parser::parse(&mut lexer)?;

    let mut globals = Scope::new();
    let mut ctx = StreamContext::new(io::stdout().lock());
    match program.execute(&mut globals, &mut ctx)? {
        StepResult::Value(_) => Ok(()),
        StepResult::Returning(_) => bail!("Return outside of a method body"),
    }
}
