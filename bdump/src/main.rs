use std::fmt;
use std::io::{self, Write};
use std::process;

use clap::{App, Arg, ArgMatches};
use log::LevelFilter;

use bcpu::memory::Vm;
use bcpu::Addr;
use bfile::{find_loader, loaders};

mod dis;

const DEFAULT_INPUT_FORMAT: &str = "bits.snp";

#[derive(Debug)]
enum Error {
    File(bfile::Error),
    Io(io::Error),
    EmptyObject,
    Reported,
}

impl From<bfile::Error> for Error {
    fn from(err: bfile::Error) -> Error {
        Error::File(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::File(err) => write!(f, "{}", err),
            Error::Io(err) => write!(f, "{}", err),
            Error::EmptyObject => f.write_str("object file holds no words"),
            Error::Reported => f.write_str("error already reported"),
        }
    }
}

fn main() {
    let format_names: Vec<&str> = loaders().iter().map(|l| l.name).collect();
    let after_help = format!("supported input formats: {}", format_names.join(" "));

    let matches = App::new("bdump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Disassembler for the Manchester Baby")
        .after_help(after_help.as_str())
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
                .help("Object file to disassemble")
                .required(true),
        )
        .get_matches();

    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(if matches.is_present("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    builder.init();

    if let Err(err) = bdump(&matches) {
        if !matches!(err, Error::Reported) {
            eprintln!("bdump: {}", err);
        }
        process::exit(1);
    }
}

fn bdump(matches: &ArgMatches) -> Result<(), Error> {
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

    let object = matches.value_of("OBJECT").unwrap();
    let segment = loader.stat(object)?;
    if segment.length == 0 {
        return Err(Error::EmptyObject);
    }

    let page_words = next_page_size(segment.length);
    let mut vm = Vm::new(page_words);
    loader.load(object, &segment, &mut vm)?;

    let disassembly = dis::Disassembly::new(&vm, segment.length);
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    disassembly.render(&mut handle)?;
    handle.flush()?;
    Ok(())
}

fn next_page_size(length: Addr) -> Addr {
    length.next_power_of_two()
}
