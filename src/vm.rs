use crate::input::{read_char, read_number};
use crate::ir::{ImpKind, Instruction};
use crate::linker::{Node, Program};
use crate::stack::Stack;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tracing::{debug, trace};

/// Configuration options for the virtual machine
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// trace every executed instruction together with the stack
    pub debug: bool,
    /// trace a heap dump before every executed instruction
    pub debug_heap: bool,
}

impl VmConfig {
    pub fn new(debug: bool, debug_heap: bool) -> VmConfig {
        VmConfig { debug, debug_heap }
    }

    /// Returns a configuration tracing every executed instruction
    pub fn debug() -> VmConfig {
        VmConfig {
            debug: true,
            debug_heap: false,
        }
    }

    /// Returns a configuration tracing every executed instruction and the heap
    pub fn debug_heap() -> VmConfig {
        VmConfig {
            debug: true,
            debug_heap: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum RuntimeErrorKind {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("division by zero")]
    DivideByZero,
    #[error("return without a matching call")]
    ReturnWithoutCall,
    #[error("no {0} stream attached")]
    NilStream(&'static str),
    #[error("input {0:?} is not a decimal integer")]
    MalformedNumber(String),
    #[error("read past the end of the input")]
    EndOfInput,
    #[error("program ended without reaching stop")]
    PrematureEnd,
    #[error("operand {0} is out of range")]
    InvalidOperand(i64),
    #[error("{0} is not a printable character")]
    InvalidCharacter(i64),
    #[error("inconsistent program state: {0}")]
    LogicError(&'static str),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// A fault while running a program, naming the instruction that caused it
#[derive(Debug, Error)]
#[error("{kind} while executing `{instruction}` (instruction {index})")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub instruction: Instruction,
    /// Position of the instruction in the decoded sequence
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Running,
    Halted,
    Faulted,
}

/// The streams a program reads from and writes to. A missing stream is only an error once
/// the program actually uses it.
pub struct Streams<'a> {
    pub input: Option<&'a mut dyn BufRead>,
    pub output: Option<&'a mut dyn Write>,
}

impl<'a> Streams<'a> {
    pub fn new(
        input: Option<&'a mut dyn BufRead>,
        output: Option<&'a mut dyn Write>,
    ) -> Streams<'a> {
        Streams { input, output }
    }

    pub fn none() -> Streams<'a> {
        Streams {
            input: None,
            output: None,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.output.as_deref_mut() {
            Some(output) => output.flush(),
            None => Ok(()),
        }
    }
}

enum Flow {
    Next,
    Branch(usize),
    Halt,
}

/// The root component for the virtual machine
#[derive(Debug)]
pub struct Vm<'p> {
    program: &'p Program,
    config: VmConfig,
    stack: Stack,
    call_stack: Vec<Option<usize>>,
    heap: HashMap<i64, i64>,
    current: usize,
    state: VmState,
    steps: u64,
}

impl<'p> Vm<'p> {
    pub fn new(program: &'p Program, config: VmConfig) -> Vm<'p> {
        Vm {
            program,
            config,
            stack: Stack::new(),
            call_stack: vec![],
            heap: HashMap::new(),
            current: program.entry(),
            state: VmState::Running,
            steps: 0,
        }
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Reads a heap cell, cells never written read as zero
    pub fn heap_value(&self, addr: i64) -> i64 {
        self.heap.get(&addr).copied().unwrap_or(0)
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Resets the stack, heap and call stack and moves back to the entry instruction
    pub fn reset(&mut self) {
        self.stack.clear();
        self.call_stack.clear();
        self.heap.clear();
        self.current = self.program.entry();
        self.state = VmState::Running;
        self.steps = 0;
    }

    /// Executes the program from its entry instruction until it stops or faults
    pub fn run(&mut self, mut streams: Streams<'_>) -> Result<(), RuntimeError> {
        self.reset();
        while self.step(&mut streams)? == VmState::Running {}
        debug!(steps = self.steps, "program halted");

        Ok(())
    }

    /// Executes a single instruction. Stepping a halted or faulted machine does nothing.
    pub fn step(&mut self, streams: &mut Streams<'_>) -> Result<VmState, RuntimeError> {
        if self.state != VmState::Running {
            return Ok(self.state);
        }
        let program = self.program;
        let node = &program[self.current];
        if self.config.debug {
            trace!(
                index = node.index,
                stack = ?self.stack.as_slice(),
                call_depth = self.call_stack.len(),
                "{}",
                node.instruction
            );
        }
        if self.config.debug_heap {
            trace!(heap = ?self.heap_dump(), "heap");
        }
        self.steps += 1;

        let res = match node.instruction.imp() {
            ImpKind::Stack => self.stack_op(node),
            ImpKind::Arithmetic => self.arithmetic(node),
            ImpKind::Heap => self.heap_op(node),
            ImpKind::Flow => self.flow(node),
            ImpKind::IO => self.io(node, streams),
        };
        let flow = match res {
            Ok(flow) => flow,
            Err(kind) => return Err(self.fault(node, kind)),
        };
        match flow {
            Flow::Next => match node.next {
                Some(next) => self.current = next,
                None => return Err(self.fault(node, RuntimeErrorKind::PrematureEnd)),
            },
            Flow::Branch(target) => self.current = target,
            Flow::Halt => {
                if let Err(err) = streams.flush() {
                    return Err(self.fault(node, err.into()));
                }
                self.state = VmState::Halted;
            }
        }

        Ok(self.state)
    }

    fn fault(&mut self, node: &Node, kind: RuntimeErrorKind) -> RuntimeError {
        self.state = VmState::Faulted;
        let err = RuntimeError {
            kind,
            instruction: node.instruction.clone(),
            index: node.index,
        };
        debug!(steps = self.steps, error = %err, "program faulted");
        err
    }

    fn pop(&mut self) -> Result<i64, RuntimeErrorKind> {
        self.stack.pop().ok_or(RuntimeErrorKind::StackUnderflow)
    }

    fn stack_op(&mut self, node: &Node) -> Result<Flow, RuntimeErrorKind> {
        match node.instruction {
            Instruction::Push(val) => self.stack.push(val),
            Instruction::Duplicate => {
                let val = self.stack.peek().ok_or(RuntimeErrorKind::StackUnderflow)?;
                self.stack.push(val);
            }
            Instruction::Copy(depth) => {
                let depth =
                    usize::try_from(depth).map_err(|_| RuntimeErrorKind::InvalidOperand(depth))?;
                let val = self
                    .stack
                    .get(depth)
                    .ok_or(RuntimeErrorKind::StackUnderflow)?;
                self.stack.push(val);
            }
            Instruction::Swap => {
                let top = self.pop()?;
                let other = self.pop()?;
                self.stack.push(top);
                self.stack.push(other);
            }
            Instruction::Discard => {
                self.pop()?;
            }
            Instruction::Slide(count) => {
                let count =
                    usize::try_from(count).map_err(|_| RuntimeErrorKind::InvalidOperand(count))?;
                let top = self.pop()?;
                if self.stack.len() < count {
                    return Err(RuntimeErrorKind::StackUnderflow);
                }
                for _ in 0..count {
                    self.pop()?;
                }
                self.stack.push(top);
            }
            _ => return Err(RuntimeErrorKind::LogicError("not a stack instruction")),
        }

        Ok(Flow::Next)
    }

    fn arithmetic(&mut self, node: &Node) -> Result<Flow, RuntimeErrorKind> {
        let right = self.pop()?;
        let left = self.pop()?;
        let res = match node.instruction {
            Instruction::Add => left.wrapping_add(right),
            Instruction::Subtract => left.wrapping_sub(right),
            Instruction::Multiply => left.wrapping_mul(right),
            Instruction::Divide | Instruction::Modulo if right == 0 => {
                return Err(RuntimeErrorKind::DivideByZero)
            }
            Instruction::Divide => left.wrapping_div(right),
            Instruction::Modulo => left.wrapping_rem(right),
            _ => return Err(RuntimeErrorKind::LogicError("not an arithmetic instruction")),
        };
        self.stack.push(res);

        Ok(Flow::Next)
    }

    fn heap_op(&mut self, node: &Node) -> Result<Flow, RuntimeErrorKind> {
        match node.instruction {
            Instruction::Store => {
                let val = self.pop()?;
                let addr = self.pop()?;
                self.heap.insert(addr, val);
            }
            Instruction::Load => {
                let addr = self.pop()?;
                self.stack.push(self.heap_value(addr));
            }
            _ => return Err(RuntimeErrorKind::LogicError("not a heap instruction")),
        }

        Ok(Flow::Next)
    }

    fn flow(&mut self, node: &Node) -> Result<Flow, RuntimeErrorKind> {
        let target = || {
            node.branch
                .ok_or(RuntimeErrorKind::LogicError("unresolved branch target"))
        };
        match node.instruction {
            Instruction::Label(_) => {
                Err(RuntimeErrorKind::LogicError("label left in linked program"))
            }
            Instruction::Call(_) => {
                let target = target()?;
                self.call_stack.push(node.next);
                Ok(Flow::Branch(target))
            }
            Instruction::Jump(_) => Ok(Flow::Branch(target()?)),
            Instruction::JumpIfZero(_) => {
                if self.pop()? == 0 {
                    return Ok(Flow::Branch(target()?));
                }
                Ok(Flow::Next)
            }
            Instruction::JumpIfNegative(_) => {
                if self.pop()? < 0 {
                    return Ok(Flow::Branch(target()?));
                }
                Ok(Flow::Next)
            }
            Instruction::Return => match self.call_stack.pop() {
                Some(Some(resume)) => Ok(Flow::Branch(resume)),
                Some(None) => Err(RuntimeErrorKind::PrematureEnd),
                None => Err(RuntimeErrorKind::ReturnWithoutCall),
            },
            Instruction::Stop => Ok(Flow::Halt),
            _ => Err(RuntimeErrorKind::LogicError("not a flow control instruction")),
        }
    }

    fn io(&mut self, node: &Node, streams: &mut Streams<'_>) -> Result<Flow, RuntimeErrorKind> {
        match node.instruction {
            Instruction::PrintChar => {
                let output = streams
                    .output
                    .as_deref_mut()
                    .ok_or(RuntimeErrorKind::NilStream("output"))?;
                let val = self.pop()?;
                let character = u32::try_from(val)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(RuntimeErrorKind::InvalidCharacter(val))?;
                write!(output, "{}", character)?;
            }
            Instruction::PrintNumber => {
                let output = streams
                    .output
                    .as_deref_mut()
                    .ok_or(RuntimeErrorKind::NilStream("output"))?;
                let val = self.pop()?;
                write!(output, "{}", val)?;
            }
            Instruction::ReadChar => {
                if streams.input.is_none() {
                    return Err(RuntimeErrorKind::NilStream("input"));
                }
                let addr = self.pop()?;
                streams.flush()?;
                if let Some(input) = streams.input.as_deref_mut() {
                    let character = read_char(input)?;
                    self.heap.insert(addr, character as i64);
                }
            }
            Instruction::ReadNumber => {
                if streams.input.is_none() {
                    return Err(RuntimeErrorKind::NilStream("input"));
                }
                let addr = self.pop()?;
                streams.flush()?;
                if let Some(input) = streams.input.as_deref_mut() {
                    let val = read_number(input)?;
                    self.heap.insert(addr, val);
                }
            }
            _ => return Err(RuntimeErrorKind::LogicError("not an i/o instruction")),
        }

        Ok(Flow::Next)
    }

    fn heap_dump(&self) -> BTreeMap<i64, i64> {
        self.heap
            .iter()
            .filter(|(_, val)| **val != 0)
            .map(|(addr, val)| (*addr, *val))
            .collect()
    }
}
