use criterion::{criterion_group, criterion_main, Criterion};
use std::fs::File;
use std::io;
use wspace::{load, Program, RuntimeError, Streams, Vm, VmConfig};

fn program(path: &str) -> Program {
    load(File::open(path).unwrap()).unwrap()
}

pub fn single_instruction_benchmark(c: &mut Criterion) {
    let program = program("resources/calls.ws");
    let mut vm = Vm::new(&program, VmConfig::default());
    let mut output = io::sink();
    let mut streams = Streams::new(None, Some(&mut output));
    c.bench_function("single instruction", |b| {
        b.iter(|| -> Result<(), RuntimeError> {
            if vm.step(&mut streams)? != wspace::VmState::Running {
                vm.reset();
            }

            Ok(())
        })
    });
}

pub fn reset_vm_benchmark(c: &mut Criterion) {
    let program = program("resources/hello_world.ws");
    let mut vm = Vm::new(&program, VmConfig::default());
    c.bench_function("reset vm", |b| b.iter(|| vm.reset()));
}

pub fn hello_world_benchmark(c: &mut Criterion) {
    let program = program("resources/hello_world.ws");
    let mut vm = Vm::new(&program, VmConfig::default());
    c.bench_function("hello world", |b| {
        b.iter(|| -> Result<(), RuntimeError> {
            let mut output = io::sink();
            vm.run(Streams::new(None, Some(&mut output)))?;

            Ok(())
        })
    });
}

pub fn count_benchmark(c: &mut Criterion) {
    let program = program("resources/count.ws");
    let mut vm = Vm::new(&program, VmConfig::default());
    c.bench_function("count", |b| {
        b.iter(|| -> Result<(), RuntimeError> {
            let mut output = io::sink();
            vm.run(Streams::new(None, Some(&mut output)))?;

            Ok(())
        })
    });
}

pub fn factorial_benchmark(c: &mut Criterion) {
    let program = program("resources/factorial.ws");
    let mut vm = Vm::new(&program, VmConfig::default());
    c.bench_function("factorial", |b| {
        b.iter(|| -> Result<(), RuntimeError> {
            let mut output = io::sink();
            vm.run(Streams::new(None, Some(&mut output)))?;

            Ok(())
        })
    });
}

criterion_group!(
    vm,
    single_instruction_benchmark,
    reset_vm_benchmark,
    hello_world_benchmark,
    count_benchmark,
    factorial_benchmark,
);
criterion_main!(vm);
