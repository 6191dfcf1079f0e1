use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::process;

use clap::{App, Arg, ArgMatches};
use log::LevelFilter;

use basm::Assembler;
use bcpu::section::Section;
use bcpu::UWord;
use bfile::{find_writer, write_section, writers};

const DEFAULT_OUTPUT_FILE: &str = "b.out";
const DEFAULT_OUTPUT_FORMAT: &str = "bits.snp";

#[derive(Debug)]
enum Error {
    Asm(basm::Error),
    Io(std::io::Error, PathBuf),
    Write(bfile::Error),
}

impl Error {
    fn already_reported(&self) -> bool {
        matches!(self, Error::Asm(basm::Error::Diagnosed))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Asm(err) => write!(f, "{}", err),
            Error::Io(err, path) => write!(f, "{}: {}", path.display(), err),
            Error::Write(err) => write!(f, "writing output failed: {}", err),
        }
    }
}

fn main() {
    let format_names: Vec<&str> = writers().iter().map(|w| w.name).collect();
    let after_help = format!("supported output formats: {}", format_names.join(" "));

    let matches = App::new("bas")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Assembler for the Manchester Baby")
        .after_help(after_help.as_str())
        .arg(
            Arg::with_name("listing")
                .short("a")
                .long("listing")
                .help("Output listing"),
        )
        .arg(
            Arg::with_name("map")
                .short("m")
                .long("map")
                .help("Output map"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .help("Write object to FILE, or - for stdout [default: b.out]"),
        )
        .arg(
            Arg::with_name("output-format")
                .short("O")
                .long("output-format")
                .takes_value(true)
                .value_name("FMT")
                .help("Use FMT output format [default: bits.snp]"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Output verbose information"),
        )
        .arg(
            Arg::with_name("SOURCE")
                .help("Source files to assemble, - for stdin")
                .required(true)
                .multiple(true),
        )
        .get_matches();

    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(if matches.is_present("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    builder.init();

    if let Err(err) = bas(&matches) {
        if !err.already_reported() {
            eprintln!("bas: {}", err);
        }
        process::exit(1);
    }
}

fn bas(matches: &ArgMatches) -> Result<(), Error> {
    let output = matches.value_of("output").unwrap_or(DEFAULT_OUTPUT_FILE);
    let format_name = matches
        .value_of("output-format")
        .unwrap_or(DEFAULT_OUTPUT_FORMAT);
    let writer = match find_writer(format_name) {
        Some(writer) => writer,
        None => {
            eprintln!("No such output format: {}", format_name);
            return Err(Error::Asm(basm::Error::Diagnosed));
        }
    };

    let mut assembler = Assembler::new();
    for path in matches.values_of("SOURCE").unwrap() {
        let text = read_source(path)?;
        assembler.add_source(path, &text).map_err(Error::Asm)?;
    }
    assembler.assemble().map_err(Error::Asm)?;

    if matches.is_present("listing") {
        print_listing(&assembler);
    }

    write_section(output, assembler.section(), writer).map_err(Error::Write)?;

    if matches.is_present("map") {
        print_map(assembler.section());
    }
    Ok(())
}

fn read_source(path: &str) -> Result<String, Error> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|err| Error::Io(err, PathBuf::from("stdin")))?;
        return Ok(text);
    }
    std::fs::read_to_string(path).map_err(|err| Error::Io(err, PathBuf::from(path)))
}

/// Prints each emitted word with the source line recovered through the
/// section's provenance back-links.
fn print_listing(assembler: &Assembler) {
    let section = assembler.section();

    println!("Listing:");
    for addr in section.org()..section.org() + section.length() {
        let value = section.value(addr) as UWord;
        let debug = section.slot(addr).and_then(|slot| slot.debug);
        match debug {
            Some(idx) => {
                let record = assembler.record(idx);
                let source = assembler.source(record.source);
                let text = if source.listable {
                    record
                        .line
                        .checked_sub(1)
                        .and_then(|l| source.text.lines().nth(l as usize))
                        .unwrap_or("")
                } else {
                    ""
                };
                println!(
                    "  {:08x}: {:08x} {:>10.10}:{:<5} {:.60}",
                    addr,
                    value,
                    source.leaf(),
                    record.line,
                    text
                );
            }
            None => println!("  {:08x}: {:08x}", addr, value),
        }
    }
}

fn print_map(section: &Section) {
    println!("Sections:");
    println!("  [{:<8.8}  {:<8.8}] {:<8.8}", "START", "END", "LENGTH");
    println!(
        "  [{:08x}, {:08x}] {:08x}",
        section.org(),
        (section.org() + section.length()).saturating_sub(1),
        section.length()
    );
}
