use crate::ir::{visible, ImpKind, Instruction, LINE_FEED, SPACE, TAB};
use crate::reader::SignificantReader;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::io::{self, Read};
use thiserror::Error;
use tracing::debug;

/// Kind of operand an unterminated literal belonged to
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operand {
    Number,
    Label,
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Number => f.write_str("number"),
            Operand::Label => f.write_str("label"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeErrorKind {
    #[error("source ended inside the opcode of {}", describe_family(.family))]
    IncompleteOpcode { family: Option<ImpKind> },
    #[error("unknown {family} opcode, did not expect {:?}", as_char(.found))]
    UnknownOpcode { family: ImpKind, found: u8 },
    #[error("number literal must start with a sign (space or tab), got {:?}", as_char(.found))]
    InvalidSign { found: u8 },
    #[error("{0} literal is missing its terminating line feed")]
    Unterminated(Operand),
    #[error("label {:?} is defined more than once", crate::ir::label_to_mnemonic(.0))]
    DuplicateLabel(String),
    #[error("failed to read source: {0}")]
    Io(#[from] io::Error),
}

fn describe_family(family: &Option<ImpKind>) -> String {
    match family {
        Some(family) => format!("a {} instruction", family),
        None => "an instruction".to_string(),
    }
}

fn as_char(token: &u8) -> char {
    *token as char
}

/// Failure to decode the significant characters into instructions
#[derive(Debug, Error)]
#[error("{kind} at position {position} (byte {offset}), instruction so far: `{}`", visible(.context))]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    /// Index of the significant character at which decoding failed
    pub position: usize,
    /// Raw byte offset into the source, comments included
    pub offset: usize,
    /// Significant characters consumed for the failing instruction
    pub context: Vec<u8>,
}

/// The component responsible for turning significant characters into instructions
#[derive(Debug)]
pub struct Parser<R> {
    source: SignificantReader<R>,
    labels: HashMap<String, usize>,
    context: Vec<u8>,
    instruction_index: usize,
    done: bool,
}

impl<R: Read> Parser<R> {
    pub fn new(source: R) -> Parser<R> {
        Parser {
            source: SignificantReader::new(source),
            labels: HashMap::new(),
            context: Vec::new(),
            instruction_index: 0,
            done: false,
        }
    }

    /// Decodes the whole source into the flat instruction sequence
    pub fn parse(mut self) -> Result<Vec<Instruction>, DecodeError> {
        let mut instructions = Vec::new();
        for instr in &mut self {
            instructions.push(instr?);
        }
        debug!(
            instructions = instructions.len(),
            labels = self.labels.len(),
            tokens = self.source.position(),
            "decoded source"
        );

        Ok(instructions)
    }

    fn throw<T>(&self, kind: DecodeErrorKind) -> Result<T, DecodeError> {
        Err(DecodeError {
            kind,
            position: self.source.position(),
            offset: self.source.offset(),
            context: self.context.clone(),
        })
    }

    fn next(&mut self) -> Result<Option<u8>, DecodeError> {
        match self.source.next_token() {
            Some(Ok(token)) => {
                self.context.push(token);
                Ok(Some(token))
            }
            Some(Err(err)) => self.throw(DecodeErrorKind::Io(err)),
            None => Ok(None),
        }
    }

    /// Next token of an opcode, running out of source here is an error
    fn opcode(&mut self, family: ImpKind) -> Result<u8, DecodeError> {
        match self.next()? {
            Some(token) => Ok(token),
            None => self.throw(DecodeErrorKind::IncompleteOpcode {
                family: Some(family),
            }),
        }
    }

    fn unknown<T>(&self, family: ImpKind, found: u8) -> Result<T, DecodeError> {
        self.throw(DecodeErrorKind::UnknownOpcode { family, found })
    }

    fn imp(&mut self) -> Result<Option<ImpKind>, DecodeError> {
        let val = match self.next()? {
            Some(val) => val,
            None => return Ok(None),
        };
        match val {
            SPACE => Ok(Some(ImpKind::Stack)),
            LINE_FEED => Ok(Some(ImpKind::Flow)),
            _ => match self.next()? {
                Some(SPACE) => Ok(Some(ImpKind::Arithmetic)),
                Some(TAB) => Ok(Some(ImpKind::Heap)),
                Some(_) => Ok(Some(ImpKind::IO)),
                None => self.throw(DecodeErrorKind::IncompleteOpcode { family: None }),
            },
        }
    }

    fn stack(&mut self) -> Result<Instruction, DecodeError> {
        let family = ImpKind::Stack;
        match self.opcode(family)? {
            SPACE => Ok(Instruction::Push(self.number()?)),
            TAB => match self.opcode(family)? {
                SPACE => Ok(Instruction::Copy(self.number()?)),
                LINE_FEED => Ok(Instruction::Slide(self.number()?)),
                val => self.unknown(family, val),
            },
            _ => match self.opcode(family)? {
                SPACE => Ok(Instruction::Duplicate),
                TAB => Ok(Instruction::Swap),
                _ => Ok(Instruction::Discard),
            },
        }
    }

    fn arithmetic(&mut self) -> Result<Instruction, DecodeError> {
        let family = ImpKind::Arithmetic;
        match self.opcode(family)? {
            SPACE => match self.opcode(family)? {
                SPACE => Ok(Instruction::Add),
                TAB => Ok(Instruction::Subtract),
                _ => Ok(Instruction::Multiply),
            },
            TAB => match self.opcode(family)? {
                SPACE => Ok(Instruction::Divide),
                TAB => Ok(Instruction::Modulo),
                val => self.unknown(family, val),
            },
            val => self.unknown(family, val),
        }
    }

    fn heap(&mut self) -> Result<Instruction, DecodeError> {
        let family = ImpKind::Heap;
        match self.opcode(family)? {
            SPACE => Ok(Instruction::Store),
            TAB => Ok(Instruction::Load),
            val => self.unknown(family, val),
        }
    }

    fn flow(&mut self) -> Result<Instruction, DecodeError> {
        let family = ImpKind::Flow;
        match self.opcode(family)? {
            SPACE => match self.opcode(family)? {
                SPACE => Ok(Instruction::Label(self.label()?)),
                TAB => Ok(Instruction::Call(self.label()?)),
                _ => Ok(Instruction::Jump(self.label()?)),
            },
            TAB => match self.opcode(family)? {
                SPACE => Ok(Instruction::JumpIfZero(self.label()?)),
                TAB => Ok(Instruction::JumpIfNegative(self.label()?)),
                _ => Ok(Instruction::Return),
            },
            _ => match self.opcode(family)? {
                LINE_FEED => Ok(Instruction::Stop),
                val => self.unknown(family, val),
            },
        }
    }

    fn io(&mut self) -> Result<Instruction, DecodeError> {
        let family = ImpKind::IO;
        match self.opcode(family)? {
            SPACE => match self.opcode(family)? {
                SPACE => Ok(Instruction::PrintChar),
                TAB => Ok(Instruction::PrintNumber),
                val => self.unknown(family, val),
            },
            TAB => match self.opcode(family)? {
                SPACE => Ok(Instruction::ReadChar),
                TAB => Ok(Instruction::ReadNumber),
                val => self.unknown(family, val),
            },
            val => self.unknown(family, val),
        }
    }

    /// Sign, then magnitude bits (most significant first), then a line feed. Values wider than
    /// 64 bits wrap.
    fn number(&mut self) -> Result<i64, DecodeError> {
        let negative = match self.next()? {
            Some(SPACE) => false,
            Some(TAB) => true,
            Some(found) => return self.throw(DecodeErrorKind::InvalidSign { found }),
            None => return self.throw(DecodeErrorKind::Unterminated(Operand::Number)),
        };
        let mut magnitude: i64 = 0;
        loop {
            match self.next()? {
                Some(SPACE) => magnitude <<= 1,
                Some(TAB) => magnitude = (magnitude << 1) | 1,
                Some(_) => break,
                None => return self.throw(DecodeErrorKind::Unterminated(Operand::Number)),
            }
        }

        Ok(if negative {
            magnitude.wrapping_neg()
        } else {
            magnitude
        })
    }

    fn label(&mut self) -> Result<String, DecodeError> {
        let mut label = String::new();
        loop {
            match self.next()? {
                Some(LINE_FEED) => return Ok(label),
                Some(val) => label.push(val as char),
                None => return self.throw(DecodeErrorKind::Unterminated(Operand::Label)),
            }
        }
    }

    /// Decodes the next instruction. `None` once the source is exhausted or after the first
    /// error.
    pub fn instruction(&mut self) -> Option<Result<Instruction, DecodeError>> {
        if self.done {
            return None;
        }
        let res = self.decode();
        match res {
            Ok(Some(instr)) => Some(Ok(instr)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }

    fn decode(&mut self) -> Result<Option<Instruction>, DecodeError> {
        self.context.clear();
        let imp = match self.imp()? {
            Some(imp) => imp,
            None => return Ok(None),
        };
        let instr = match imp {
            ImpKind::Stack => self.stack()?,
            ImpKind::Arithmetic => self.arithmetic()?,
            ImpKind::Heap => self.heap()?,
            ImpKind::Flow => self.flow()?,
            ImpKind::IO => self.io()?,
        };
        if let Instruction::Label(label) = &instr {
            if self.labels.contains_key(label) {
                return self.throw(DecodeErrorKind::DuplicateLabel(label.clone()));
            }
            self.labels.insert(label.clone(), self.instruction_index);
        }
        self.instruction_index += 1;

        Ok(Some(instr))
    }
}

impl<R: Read> Iterator for &mut Parser<R> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.instruction()
    }
}

/// Decodes a complete source into its flat instruction sequence
pub fn decode<R: Read>(source: R) -> Result<Vec<Instruction>, DecodeError> {
    Parser::new(source).parse()
}

#[cfg(test)]
mod tests {
    use super::{decode, DecodeError, DecodeErrorKind, Operand, Parser};
    use crate::ir::{ImpKind, Instruction};

    fn parse(source: &str) -> Result<Vec<Instruction>, DecodeError> {
        decode(source.as_bytes())
    }

    fn parse_err(source: &str) -> DecodeError {
        match parse(source) {
            Ok(instructions) => panic!("expected a decode error, got {:?}", instructions),
            Err(err) => err,
        }
    }

    #[test]
    fn parse_stack() -> Result<(), DecodeError> {
        let results = vec![
            Instruction::Push(0),
            Instruction::Push(1),
            Instruction::Push(-75),
            Instruction::Copy(1),
            Instruction::Copy(75),
            Instruction::Slide(1),
            Instruction::Slide(75),
            Instruction::Discard,
            Instruction::Duplicate,
            Instruction::Swap,
        ];
        let source = "   \n   \t\n  \t\t  \t \t\t\n \t  \t\n \t  \t  \t \t\t\n \t\n \t\n \t\n \t  \t \t\t\n \n\n \n  \n\t";
        assert_eq!(parse(source)?, results);

        Ok(())
    }

    #[test]
    fn parse_arithmetic() -> Result<(), DecodeError> {
        let results = vec![
            Instruction::Add,
            Instruction::Subtract,
            Instruction::Multiply,
            Instruction::Divide,
            Instruction::Modulo,
        ];
        assert_eq!(parse("\t   \t  \t\t  \n\t \t \t \t\t")?, results);

        Ok(())
    }

    #[test]
    fn parse_heap() -> Result<(), DecodeError> {
        assert_eq!(
            parse("\t\t \t\t\t")?,
            vec![Instruction::Store, Instruction::Load]
        );

        Ok(())
    }

    #[test]
    fn parse_flow() -> Result<(), DecodeError> {
        let results = vec![
            Instruction::Label("    ".into()),
            Instruction::Label("\t \t".into()),
            Instruction::Call("   ".into()),
            Instruction::Jump("\t \t".into()),
            Instruction::JumpIfZero("   ".into()),
            Instruction::JumpIfNegative("\t \t".into()),
            Instruction::Return,
            Instruction::Stop,
        ];
        let source = "\n      \n\n  \t \t\n\n \t   \n\n \n\t \t\n\n\t    \n\n\t\t\t \t\n\n\t\n\n\n\n";
        assert_eq!(parse(source)?, results);

        Ok(())
    }

    #[test]
    fn parse_io() -> Result<(), DecodeError> {
        let results = vec![
            Instruction::PrintChar,
            Instruction::PrintNumber,
            Instruction::ReadChar,
            Instruction::ReadNumber,
        ];
        assert_eq!(parse("\t\n  \t\n \t\t\n\t \t\n\t\t")?, results);

        Ok(())
    }

    #[test]
    fn parse_empty_label() -> Result<(), DecodeError> {
        assert_eq!(
            parse("\n  \n\n \n\n")?,
            vec![Instruction::Label(String::new()), Instruction::Jump(String::new())]
        );

        Ok(())
    }

    #[test]
    fn parse_empty_source() -> Result<(), DecodeError> {
        assert!(parse("")?.is_empty());
        assert!(parse("comments-only")?.is_empty());

        Ok(())
    }

    #[test]
    fn round_trip_every_instruction() -> Result<(), DecodeError> {
        let instructions = vec![
            Instruction::Push(0),
            Instruction::Push(i64::MAX),
            Instruction::Push(i64::MIN),
            Instruction::Push(-1),
            Instruction::Duplicate,
            Instruction::Copy(3),
            Instruction::Swap,
            Instruction::Discard,
            Instruction::Slide(i64::MIN + 1),
            Instruction::Add,
            Instruction::Subtract,
            Instruction::Multiply,
            Instruction::Divide,
            Instruction::Modulo,
            Instruction::Store,
            Instruction::Load,
            Instruction::Label(String::new()),
            Instruction::Call(" \t".into()),
            Instruction::Jump("\t\t\t".into()),
            Instruction::JumpIfZero(String::new()),
            Instruction::JumpIfNegative(" ".into()),
            Instruction::Return,
            Instruction::Stop,
            Instruction::PrintChar,
            Instruction::PrintNumber,
            Instruction::ReadChar,
            Instruction::ReadNumber,
        ];
        for instr in instructions {
            assert_eq!(parse(&instr.to_source())?, vec![instr]);
        }

        Ok(())
    }

    #[test]
    fn comments_are_ignored_mid_token() -> Result<(), DecodeError> {
        let plain = "   \t\n   \t \n\t   \t\n \t\n\n\n";
        let annotated: String = plain
            .chars()
            .flat_map(|c| [c, 'x', 'ü'])
            .collect::<String>();
        assert_eq!(parse(&annotated)?, parse(plain)?);
        assert_eq!(
            parse("push[ ]one[  \t\n]")?,
            vec![Instruction::Push(1)]
        );

        Ok(())
    }

    #[test]
    fn overlong_numbers_wrap() -> Result<(), DecodeError> {
        // 2^64 + 5 keeps only the low 64 bits
        let source = format!("   \t{}\t \t\n", " ".repeat(61));
        assert_eq!(parse(&source)?, vec![Instruction::Push(5)]);

        Ok(())
    }

    #[test]
    fn unknown_opcode() {
        let err = parse_err("\t\t\n");
        assert!(matches!(
            err.kind,
            DecodeErrorKind::UnknownOpcode {
                family: ImpKind::Heap,
                found: b'\n'
            }
        ));
        assert_eq!(err.context, b"\t\t\n");
        assert_eq!(err.position, 3);

        let err = parse_err("\t \n ");
        assert!(matches!(
            err.kind,
            DecodeErrorKind::UnknownOpcode {
                family: ImpKind::Arithmetic,
                found: b'\n'
            }
        ));

        let err = parse_err("\n\n ");
        assert!(matches!(
            err.kind,
            DecodeErrorKind::UnknownOpcode {
                family: ImpKind::Flow,
                found: b' '
            }
        ));

        let err = parse_err(" \t\t");
        assert!(matches!(
            err.kind,
            DecodeErrorKind::UnknownOpcode {
                family: ImpKind::Stack,
                found: b'\t'
            }
        ));

        let err = parse_err("\t\n\n");
        assert!(matches!(
            err.kind,
            DecodeErrorKind::UnknownOpcode {
                family: ImpKind::IO,
                found: b'\n'
            }
        ));
    }

    #[test]
    fn incomplete_opcode() {
        let err = parse_err("\t");
        assert!(matches!(
            err.kind,
            DecodeErrorKind::IncompleteOpcode { family: None }
        ));

        let err = parse_err("\n\n\n\t ");
        assert!(matches!(
            err.kind,
            DecodeErrorKind::IncompleteOpcode {
                family: Some(ImpKind::Arithmetic)
            }
        ));
        assert_eq!(err.context, b"\t ");
    }

    #[test]
    fn unterminated_operands() {
        let err = parse_err("   \t\t");
        assert!(matches!(
            err.kind,
            DecodeErrorKind::Unterminated(Operand::Number)
        ));

        let err = parse_err("  ");
        assert!(matches!(
            err.kind,
            DecodeErrorKind::Unterminated(Operand::Number)
        ));

        let err = parse_err("\n \n\t\t ");
        assert!(matches!(
            err.kind,
            DecodeErrorKind::Unterminated(Operand::Label)
        ));
    }

    #[test]
    fn number_without_sign() {
        let err = parse_err("  \n");
        assert!(matches!(
            err.kind,
            DecodeErrorKind::InvalidSign { found: b'\n' }
        ));
    }

    #[test]
    fn duplicate_label() {
        let err = parse_err("\n  \t\n\n\n\n\n  \t\n");
        assert!(matches!(
            err.kind,
            DecodeErrorKind::DuplicateLabel(ref label) if label == "\t"
        ));
        assert!(err.to_string().contains("\"t\""));
    }

    #[test]
    fn iterator_stops_after_error() {
        let mut parser = Parser::new("\t\t\n\t   ".as_bytes());
        let mut results = Vec::new();
        for instr in &mut parser {
            results.push(instr.is_ok());
        }
        assert_eq!(results, vec![false]);
    }
}
