use clap::{App, Arg, ArgMatches};
#[cfg(not(target_arch = "wasm32"))]
use getch::Getch;
#[cfg(not(target_arch = "wasm32"))]
use memmap::Mmap;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::process;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wspace::{Streams, Vm, VmConfig};

fn args() -> ArgMatches {
    App::new("wspace")
        .about("a whitespace interpreter")
        .version("0.1.0")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .takes_value(true)
                .required(false)
                .help("whitespace source file to interpret, read from stdin if omitted"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .takes_value(true)
                .required(false)
                .help("file the program reads its input from, defaults to stdin"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .required(false)
                .help("file the program writes its output to, defaults to stdout"),
        )
        .arg(
            Arg::new("raw")
                .short('r')
                .long("raw")
                .takes_value(false)
                .required(false)
                .conflicts_with("input")
                .help("reads input from the terminal one key at a time"),
        )
        .arg(
            Arg::new("asm")
                .short('a')
                .long("asm")
                .takes_value(false)
                .required(false)
                .help("prints the instruction listing instead of running the program"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .takes_value(false)
                .required(false)
                .help("traces every executed instruction"),
        )
        .arg(
            Arg::new("debug-heap")
                .short('m')
                .long("debug-heap")
                .takes_value(false)
                .required(false)
                .help("traces a heap dump before every executed instruction"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .takes_value(false)
                .required(false)
                .help("suppresses all output other than what the whitespace program is producing"),
        )
        .get_matches()
}

/// Unbuffered terminal input, one key per read
#[cfg(not(target_arch = "wasm32"))]
struct RawInput {
    getch: Getch,
}

#[cfg(not(target_arch = "wasm32"))]
impl RawInput {
    fn new() -> RawInput {
        RawInput {
            getch: Getch::new(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Read for RawInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let key = match self.getch.getch()? {
            b'\r' => b'\n',
            key => key,
        };
        // the terminal does not echo in raw mode
        let mut echo = io::stderr();
        echo.write_all(&[key])?;
        echo.flush()?;
        buf[0] = key;

        Ok(1)
    }
}

fn init_logging(args: &ArgMatches) {
    let level = if args.is_present("quiet") {
        "warn"
    } else if args.is_present("debug") || args.is_present("debug-heap") {
        "trace"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .init();
}

#[cfg(not(target_arch = "wasm32"))]
fn raw_input() -> Result<Box<dyn BufRead>, Box<dyn Error>> {
    Ok(Box::new(BufReader::new(RawInput::new())))
}

#[cfg(target_arch = "wasm32")]
fn raw_input() -> Result<Box<dyn BufRead>, Box<dyn Error>> {
    Err("raw terminal input is not available on this target".into())
}

#[cfg(not(target_arch = "wasm32"))]
fn with_file<T>(
    path: &str,
    f: impl FnOnce(&mut dyn Read) -> Result<T, Box<dyn Error>>,
) -> Result<T, Box<dyn Error>> {
    let file = File::open(path)?;
    // empty files cannot be mapped
    if file.metadata()?.len() == 0 {
        return f(&mut io::empty());
    }
    let source = unsafe { Mmap::map(&file)? };
    f(&mut &source[..])
}

#[cfg(target_arch = "wasm32")]
fn with_file<T>(
    path: &str,
    f: impl FnOnce(&mut dyn Read) -> Result<T, Box<dyn Error>>,
) -> Result<T, Box<dyn Error>> {
    let source = std::fs::read(path)?;
    f(&mut &source[..])
}

/// Hands the program source to `f`, memory mapping it when it comes from a file
fn with_source<T>(
    file: Option<&str>,
    f: impl FnOnce(&mut dyn Read) -> Result<T, Box<dyn Error>>,
) -> Result<T, Box<dyn Error>> {
    match file {
        Some(path) => with_file(path, f),
        None => f(&mut io::stdin().lock()),
    }
}

fn try_main(args: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let file = args.value_of("file");
    let mut output: Box<dyn Write> = match args.value_of("output") {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    if args.is_present("asm") {
        let listing = with_source(file, |source| Ok(wspace::disassemble(source)?))?;
        output.write_all(listing.as_bytes())?;
        output.flush()?;
        return Ok(());
    }

    let start = Instant::now();
    let program = with_source(file, |source| Ok(wspace::load(source)?))?;
    info!(
        instructions = program.len(),
        elapsed = ?start.elapsed(),
        "loaded {}",
        file.unwrap_or("<stdin>")
    );

    let mut input: Option<Box<dyn BufRead>> = if args.is_present("raw") {
        Some(raw_input()?)
    } else if let Some(path) = args.value_of("input") {
        Some(Box::new(BufReader::new(File::open(path)?)))
    } else if file.is_some() {
        Some(Box::new(BufReader::new(io::stdin())))
    } else {
        // stdin already held the program
        None
    };

    let config = VmConfig::new(args.is_present("debug"), args.is_present("debug-heap"));
    let mut vm = Vm::new(&program, config);
    let start = Instant::now();
    let res = vm.run(Streams::new(
        input.as_mut().map(|r| r as &mut dyn BufRead),
        Some(&mut output),
    ));
    output.flush()?;
    res?;
    info!(steps = vm.steps(), elapsed = ?start.elapsed(), "program finished");

    Ok(())
}

fn main() {
    let args = args();
    init_logging(&args);
    if let Err(err) = try_main(&args) {
        error!("{}", err);
        process::exit(1);
    }
}
