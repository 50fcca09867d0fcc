use std::fmt::{self, Display};

pub const SPACE: u8 = b' ';
pub const TAB: u8 = b'\t';
pub const LINE_FEED: u8 = b'\n';

/// Instruction modification parameter, the prefix selecting an instruction family
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ImpKind {
    Stack,
    Arithmetic,
    Heap,
    Flow,
    IO,
}

impl ImpKind {
    /// The significant characters that introduce this family
    pub fn prefix(&self) -> &'static str {
        match self {
            ImpKind::Stack => " ",
            ImpKind::Arithmetic => "\t ",
            ImpKind::Heap => "\t\t",
            ImpKind::Flow => "\n",
            ImpKind::IO => "\t\n",
        }
    }
}

impl Display for ImpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImpKind::Stack => "stack manipulation",
            ImpKind::Arithmetic => "arithmetic",
            ImpKind::Heap => "heap access",
            ImpKind::Flow => "flow control",
            ImpKind::IO => "i/o",
        };
        f.write_str(name)
    }
}

/// A single decoded whitespace instruction.
///
/// Labels are kept exactly as they appear in the source, as a string over space and tab.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum Instruction {
    Push(i64),
    Duplicate,
    Copy(i64),
    Swap,
    Discard,
    Slide(i64),
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Store,
    Load,
    Label(String),
    Call(String),
    Jump(String),
    JumpIfZero(String),
    JumpIfNegative(String),
    Return,
    Stop,
    PrintChar,
    PrintNumber,
    ReadChar,
    ReadNumber,
}

impl Instruction {
    pub fn imp(&self) -> ImpKind {
        match self {
            Instruction::Push(_)
            | Instruction::Duplicate
            | Instruction::Copy(_)
            | Instruction::Swap
            | Instruction::Discard
            | Instruction::Slide(_) => ImpKind::Stack,
            Instruction::Add
            | Instruction::Subtract
            | Instruction::Multiply
            | Instruction::Divide
            | Instruction::Modulo => ImpKind::Arithmetic,
            Instruction::Store | Instruction::Load => ImpKind::Heap,
            Instruction::Label(_)
            | Instruction::Call(_)
            | Instruction::Jump(_)
            | Instruction::JumpIfZero(_)
            | Instruction::JumpIfNegative(_)
            | Instruction::Return
            | Instruction::Stop => ImpKind::Flow,
            Instruction::PrintChar
            | Instruction::PrintNumber
            | Instruction::ReadChar
            | Instruction::ReadNumber => ImpKind::IO,
        }
    }

    /// The label a branching instruction refers to. `None` for label definitions and for
    /// everything that does not branch.
    pub fn branch_label(&self) -> Option<&str> {
        match self {
            Instruction::Call(label)
            | Instruction::Jump(label)
            | Instruction::JumpIfZero(label)
            | Instruction::JumpIfNegative(label) => Some(label),
            _ => None,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Push(_) => "push",
            Instruction::Duplicate => "duplicate",
            Instruction::Copy(_) => "copy",
            Instruction::Swap => "swap",
            Instruction::Discard => "discard",
            Instruction::Slide(_) => "slide",
            Instruction::Add => "add",
            Instruction::Subtract => "subtract",
            Instruction::Multiply => "multiply",
            Instruction::Divide => "divide",
            Instruction::Modulo => "modulo",
            Instruction::Store => "store",
            Instruction::Load => "load",
            Instruction::Label(_) => "label",
            Instruction::Call(_) => "call",
            Instruction::Jump(_) => "jump",
            Instruction::JumpIfZero(_) => "jumpzero",
            Instruction::JumpIfNegative(_) => "jumpminus",
            Instruction::Return => "return",
            Instruction::Stop => "stop",
            Instruction::PrintChar => "printchar",
            Instruction::PrintNumber => "printnumber",
            Instruction::ReadChar => "readchar",
            Instruction::ReadNumber => "readnumber",
        }
    }

    /// Encodes the instruction in its canonical whitespace form. Decoding the result yields
    /// the same instruction.
    pub fn to_source(&self) -> String {
        let mut source = String::from(self.imp().prefix());
        let command = match self {
            Instruction::Push(_) => " ",
            Instruction::Duplicate => "\n ",
            Instruction::Copy(_) => "\t ",
            Instruction::Swap => "\n\t",
            Instruction::Discard => "\n\n",
            Instruction::Slide(_) => "\t\n",
            Instruction::Add => "  ",
            Instruction::Subtract => " \t",
            Instruction::Multiply => " \n",
            Instruction::Divide => "\t ",
            Instruction::Modulo => "\t\t",
            Instruction::Store => " ",
            Instruction::Load => "\t",
            Instruction::Label(_) => "  ",
            Instruction::Call(_) => " \t",
            Instruction::Jump(_) => " \n",
            Instruction::JumpIfZero(_) => "\t ",
            Instruction::JumpIfNegative(_) => "\t\t",
            Instruction::Return => "\t\n",
            Instruction::Stop => "\n\n",
            Instruction::PrintChar => "  ",
            Instruction::PrintNumber => " \t",
            Instruction::ReadChar => "\t ",
            Instruction::ReadNumber => "\t\t",
        };
        source.push_str(command);
        match self {
            Instruction::Push(value) | Instruction::Copy(value) | Instruction::Slide(value) => {
                source.push_str(&encode_number(*value))
            }
            Instruction::Label(label)
            | Instruction::Call(label)
            | Instruction::Jump(label)
            | Instruction::JumpIfZero(label)
            | Instruction::JumpIfNegative(label) => source.push_str(&encode_label(label)),
            _ => {}
        }
        source
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Push(value) | Instruction::Copy(value) | Instruction::Slide(value) => {
                write!(f, "{} {}", self.mnemonic(), value)
            }
            Instruction::Label(label)
            | Instruction::Call(label)
            | Instruction::Jump(label)
            | Instruction::JumpIfZero(label)
            | Instruction::JumpIfNegative(label) => {
                write!(f, "{} {}", self.mnemonic(), label_to_mnemonic(label))
            }
            _ => f.write_str(self.mnemonic()),
        }
    }
}

/// Sign character, magnitude bits most significant first, then the terminating line feed.
pub fn encode_number(value: i64) -> String {
    let sign = if value < 0 { '\t' } else { ' ' };
    let bits = format!("{:b}", value.unsigned_abs());
    let mut encoded = String::with_capacity(bits.len() + 2);
    encoded.push(sign);
    encoded.extend(bits.chars().map(|bit| if bit == '1' { '\t' } else { ' ' }));
    encoded.push('\n');
    encoded
}

pub fn encode_label(label: &str) -> String {
    let mut encoded = String::with_capacity(label.len() + 1);
    encoded.push_str(label);
    encoded.push('\n');
    encoded
}

/// Makes a label printable: space becomes `s`, tab becomes `t`.
pub fn label_to_mnemonic(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            ' ' => 's',
            '\t' => 't',
            other => other,
        })
        .collect()
}

/// Exact inverse of [`label_to_mnemonic`]. Returns `None` if the text contains anything other
/// than `s` and `t`.
pub fn label_from_mnemonic(text: &str) -> Option<String> {
    text.chars()
        .map(|c| match c {
            's' => Some(' '),
            't' => Some('\t'),
            _ => None,
        })
        .collect()
}

/// Renders raw significant characters as `s`, `t` and `n` for diagnostics.
pub fn visible(tokens: &[u8]) -> String {
    tokens
        .iter()
        .map(|token| match *token {
            SPACE => 's',
            TAB => 't',
            LINE_FEED => 'n',
            other => other as char,
        })
        .collect()
}
