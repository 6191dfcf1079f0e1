use std::fmt;
use std::process;

use clap::{App, Arg, ArgMatches};
use log::LevelFilter;

use bcpu::machine::{Machine, RunControl};
use bcpu::memory::Vm;
use bcpu::{Addr, UWord, MAX_STORE_WORDS};
use bfile::{find_loader, loaders};

const DEFAULT_MEMORY_WORDS: Addr = 32;
const DEFAULT_INPUT_FORMAT: &str = "bits.snp";

#[derive(Debug)]
enum Error {
    File(bfile::Error),
    StoreTooSmall { need: Addr },
    Reported,
}

impl From<bfile::Error> for Error {
    fn from(err: bfile::Error) -> Error {
        Error::File(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::File(err) => write!(f, "{}", err),
            Error::StoreTooSmall { need } => write!(
                f,
                "{} words exceeds maximum store size of {}",
                need, MAX_STORE_WORDS
            ),
            Error::Reported => f.write_str("error already reported"),
        }
    }
}

fn main() {
    let format_names: Vec<&str> = loaders().iter().map(|l| l.name).collect();
    let after_help = format!("supported input formats: {}", format_names.join(" "));

    let matches = App::new("bsim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Simulator for the Manchester Baby")
        .after_help(after_help.as_str())
        .arg(
            Arg::with_name("memory")
                .short("m")
                .long("memory")
                .takes_value(true)
                .value_name("WORDS")
                .help("Memory size in words [default: 32]"),
        )
        .arg(
            Arg::with_name("input-format")
                .short("I")
                .long("input-format")
                .takes_value(true)
                .value_name("FMT")
                .help("Use FMT input format [default: bits.snp]"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Output verbose information"),
        )
        .arg(
            Arg::with_name("OBJECT")
                .help("Object file to execute")
                .required(true),
        )
        .get_matches();

    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(if matches.is_present("verbose") {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    });
    builder.init();

    if let Err(err) = bsim(&matches) {
        if !matches!(err, Error::Reported) {
            eprintln!("bsim: {}", err);
        }
        process::exit(1);
    }
}

fn bsim(matches: &ArgMatches) -> Result<(), Error> {
    let format_name = matches
        .value_of("input-format")
        .unwrap_or(DEFAULT_INPUT_FORMAT);
    let loader = match find_loader(format_name) {
        Some(loader) => loader,
        None => {
            eprintln!("No such format: {}", format_name);
            return Err(Error::Reported);
        }
    };

    let mut memory_words = DEFAULT_MEMORY_WORDS;
    if let Some(requested) = matches.value_of("memory") {
        let requested: Addr = match requested.parse() {
            Ok(words) => words,
            Err(_) => {
                eprintln!("Invalid memory size: {}", requested);
                return Err(Error::Reported);
            }
        };
        // round up to a power of two, the default being the minimum
        while memory_words < requested && memory_words <= MAX_STORE_WORDS {
            memory_words <<= 1;
        }
    }

    let object = matches.value_of("OBJECT").unwrap();
    let segment = loader.stat(object)?;

    // grow the store to fit the image
    while memory_words < segment.length && memory_words <= MAX_STORE_WORDS {
        memory_words <<= 1;
    }
    if memory_words > MAX_STORE_WORDS {
        return Err(Error::StoreTooSmall { need: memory_words });
    }

    let mut vm = Vm::new(memory_words);
    eprintln!(
        "Mapped fully aliased page of {} words of RAM",
        memory_words
    );

    loader.load(object, &segment, &mut vm)?;

    let mut machine = Machine::new(vm);
    let control = RunControl::new();
    machine.run(&control, |m| println!("{}", m));

    dump_vm(&machine.vm);
    println!("{}", machine);
    Ok(())
}

fn dump_vm(vm: &Vm) {
    for (i, chunk) in vm.words().chunks(4).enumerate() {
        print!("{:08x}:", i * 4);
        for word in chunk {
            print!(" {:08x}", *word as UWord);
        }
        println!();
    }
}
