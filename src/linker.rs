use crate::ir::{label_to_mnemonic, Instruction};
use std::collections::HashMap;
use std::ops::Index;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum LinkError {
    #[error("program contains no instructions")]
    EmptyProgram,
    #[error("label '{}' is defined again at instruction {index}", label_to_mnemonic(.label))]
    DuplicateLabel { label: String, index: usize },
    #[error("label '{}' at instruction {index} is not followed by any instruction", label_to_mnemonic(.label))]
    LabelToNothing { label: String, index: usize },
    #[error("instruction {index} refers to undefined label '{}'", label_to_mnemonic(.label))]
    UndefinedLabel { label: String, index: usize },
}

/// One executable unit of a linked program.
///
/// `next` and `branch` are slots into [`Program::nodes`]. `next` is the sequential successor,
/// `branch` the resolved target of a call or jump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Position of the instruction in the decoded sequence
    pub index: usize,
    pub instruction: Instruction,
    pub next: Option<usize>,
    pub branch: Option<usize>,
}

/// A linked program. Label definitions are gone, every branch points directly at the
/// instruction following its label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    nodes: Vec<Node>,
    entry: usize,
}

impl Program {
    /// Slot of the first instruction to execute
    pub fn entry(&self) -> usize {
        self.entry
    }

    pub fn node(&self, slot: usize) -> Option<&Node> {
        self.nodes.get(slot)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walks the sequential chain starting at the entry node
    pub fn chain(&self) -> Chain<'_> {
        Chain {
            program: self,
            slot: Some(self.entry),
        }
    }
}

impl Index<usize> for Program {
    type Output = Node;

    fn index(&self, slot: usize) -> &Self::Output {
        &self.nodes[slot]
    }
}

pub struct Chain<'p> {
    program: &'p Program,
    slot: Option<usize>,
}

impl<'p> Iterator for Chain<'p> {
    type Item = &'p Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.program.node(self.slot?)?;
        self.slot = node.next;
        Some(node)
    }
}

/// Resolves every label reference of the flat instruction sequence and drops the label
/// definitions from the executable chain.
pub fn link(instructions: Vec<Instruction>) -> Result<Program, LinkError> {
    if instructions.is_empty() {
        return Err(LinkError::EmptyProgram);
    }

    let count = instructions.len();
    // slot each surviving instruction will occupy once labels are removed
    let mut slots = vec![None; count];
    let mut executable = 0;
    for (index, instr) in instructions.iter().enumerate() {
        if !matches!(instr, Instruction::Label(_)) {
            slots[index] = Some(executable);
            executable += 1;
        }
    }
    // first surviving slot at or after each index
    let mut following = vec![None; count + 1];
    for index in (0..count).rev() {
        following[index] = slots[index].or(following[index + 1]);
    }

    let branches = {
        let mut labels: HashMap<&str, usize> = HashMap::new();
        for (index, instr) in instructions.iter().enumerate() {
            if let Instruction::Label(label) = instr {
                if labels.contains_key(label.as_str()) {
                    return Err(LinkError::DuplicateLabel {
                        label: label.clone(),
                        index,
                    });
                }
                match following[index + 1] {
                    Some(target) => labels.insert(label, target),
                    None => {
                        return Err(LinkError::LabelToNothing {
                            label: label.clone(),
                            index,
                        })
                    }
                };
            }
        }

        let mut branches = vec![None; count];
        for (index, instr) in instructions.iter().enumerate() {
            if let Some(label) = instr.branch_label() {
                match labels.get(label) {
                    Some(target) => branches[index] = Some(*target),
                    None => {
                        return Err(LinkError::UndefinedLabel {
                            label: label.to_string(),
                            index,
                        })
                    }
                }
            }
        }
        debug!(labels = labels.len(), "resolved branch targets");
        branches
    };

    let mut nodes = Vec::with_capacity(executable);
    for (index, instr) in instructions.into_iter().enumerate() {
        let slot = match slots[index] {
            Some(slot) => slot,
            None => continue,
        };
        let next = if slot + 1 < executable {
            Some(slot + 1)
        } else {
            None
        };
        nodes.push(Node {
            index,
            instruction: instr,
            next,
            branch: branches[index],
        });
    }
    debug!(nodes = nodes.len(), instructions = count, "linked program");

    Ok(Program { nodes, entry: 0 })
}
