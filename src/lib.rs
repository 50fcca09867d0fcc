//! A whitespace decoder, linker and stack machine.
//!
//! A program goes through three stages: [`parser::decode`] turns the significant characters of
//! the source into [`Instruction`]s, [`linker::link`] resolves labels into a [`Program`] and
//! [`Vm`] executes it.

pub mod input;
pub mod ir;
pub mod linker;
pub mod parser;
pub mod reader;
pub mod stack;
pub mod vm;
pub mod wasm;

pub use ir::{ImpKind, Instruction};
pub use linker::{link, LinkError, Program};
pub use parser::{decode, DecodeError, Parser};
pub use vm::{RuntimeError, Streams, Vm, VmConfig, VmState};

use std::io::{BufRead, Read, Write};
use thiserror::Error;

/// Everything that can go wrong between reading a source and finishing its execution
#[derive(Debug, Error)]
pub enum Error {
    #[error("decoding failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("linking failed: {0}")]
    Link(#[from] LinkError),
    #[error("execution failed: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Decodes and links a whitespace source
pub fn load<R: Read>(source: R) -> Result<Program, Error> {
    let instructions = decode(source)?;
    Ok(link(instructions)?)
}

/// Runs a linked program with a default configuration
pub fn run<'a>(
    program: &Program,
    input: Option<&'a mut dyn BufRead>,
    output: Option<&'a mut dyn Write>,
) -> Result<(), RuntimeError> {
    Vm::new(program, VmConfig::default()).run(Streams::new(input, output))
}

/// Decodes a source into a listing with one mnemonic per line, without linking it
pub fn disassemble<R: Read>(source: R) -> Result<String, DecodeError> {
    let mut listing = String::new();
    for instr in decode(source)? {
        listing.push_str(&instr.to_string());
        listing.push('\n');
    }

    Ok(listing)
}

/// Loads and runs a source against an in-memory input, collecting everything it prints
pub fn execute(source: &[u8], input: &[u8]) -> Result<Vec<u8>, Error> {
    let program = load(source)?;
    let mut input = input;
    let mut output = Vec::new();
    run(&program, Some(&mut input), Some(&mut output))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::{disassemble, execute, load, Error};
    use crate::linker::LinkError;
    use crate::parser::DecodeErrorKind;
    use std::fs::File;

    #[test]
    fn add_and_print() -> Result<(), Error> {
        let output = execute(b"   \t\n   \t \n\t   \t\n \t\n\n\n", b"")?;
        assert_eq!(output, b"3");

        Ok(())
    }

    #[test]
    fn comments_are_stripped() -> Result<(), Error> {
        let source = b"push1[   \t\n]push2[   \t \n]add[\t   ]print[\t\n \t]end[\n\n\n]";
        assert_eq!(execute(source, b"")?, b"3");

        Ok(())
    }

    #[test]
    fn undefined_label_fails_to_load() {
        // jump to label "t" with nothing defining it
        let res = load(&b"\n \n\t\n\n\n\n"[..]);
        assert!(matches!(
            res,
            Err(Error::Link(LinkError::UndefinedLabel { index: 0, .. }))
        ));
    }

    #[test]
    fn empty_source_fails_to_load() {
        assert!(matches!(
            load(&b"nothing-significant-here"[..]),
            Err(Error::Link(LinkError::EmptyProgram))
        ));
    }

    #[test]
    fn malformed_source_fails_to_load() {
        let res = load(&b"\t\t\n"[..]);
        match res {
            Err(Error::Decode(err)) => {
                assert!(matches!(err.kind, DecodeErrorKind::UnknownOpcode { .. }))
            }
            other => panic!("expected a decode error, got {:?}", other),
        }
    }

    #[test]
    fn runtime_errors_are_reported() {
        // discard on an empty stack
        let res = execute(b" \n\n\n\n\n", b"");
        assert!(matches!(res, Err(Error::Runtime(_))));
    }

    #[test]
    fn disassemble_listing() -> Result<(), Box<dyn std::error::Error>> {
        let listing = disassemble(&b"   \t\n   \t \n\t   \t\n \t\n\n\n"[..])?;
        assert_eq!(listing, "push 1\npush 2\nadd\nprintnumber\nstop\n");

        let listing = disassemble(File::open("resources/calls.ws")?)?;
        assert!(listing.lines().any(|line| line.starts_with("call ")));
        assert!(listing.lines().any(|line| line == "return"));

        Ok(())
    }

    #[test]
    fn execute_files() -> Result<(), Box<dyn std::error::Error>> {
        let source = std::fs::read("resources/hello_world.ws")?;
        assert_eq!(execute(&source, b"")?, b"Hello, World!\n");

        let source = std::fs::read("resources/echo.ws")?;
        assert_eq!(execute(&source, "21\nZ".as_bytes())?, b"42Z");

        Ok(())
    }
}
