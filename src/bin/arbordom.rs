//! Command-line front end: parse, validate, query, and reformat XML files.

use std::process::ExitCode;

use clap::Parser;

use arbordom::{Document, ParseOptions, XmlError};

/// arbordom -- parse, validate, and process XML files.
#[derive(Parser, Debug)]
#[command(name = "arbordom", version, about, long_about = None)]
struct Cli {
    /// XML files to process.
    #[arg(required = true)]
    files: Vec<String>,

    /// Character encoding of the input (overrides autodetection).
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<String>,

    /// Validate against the DOCTYPE declared in the document.
    #[arg(long)]
    valid: bool,

    /// Evaluate a path query and print the matching node.
    #[arg(long, value_name = "EXPR")]
    xpath: Option<String>,

    /// Pretty-print (indent) the output.
    #[arg(long)]
    format: bool,

    /// Do not output the result tree.
    #[arg(long)]
    noout: bool,

    /// Save output to a file instead of stdout.
    #[arg(long, value_name = "FILE")]
    output: Option<String>,
}

// Exit codes follow the xmllint conventions.
const EXIT_SUCCESS: u8 = 0;
const EXIT_PARSE_ERROR: u8 = 1;
const EXIT_VALIDATION_ERROR: u8 = 3;
const EXIT_QUERY_ERROR: u8 = 10;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut worst_exit = EXIT_SUCCESS;

    for file in &cli.files {
        let exit = process_file(&cli, file);
        if exit > worst_exit {
            worst_exit = exit;
        }
    }

    ExitCode::from(worst_exit)
}

/// Processes a single input file and returns an exit code.
fn process_file(cli: &Cli, filename: &str) -> u8 {
    let mut options = ParseOptions::default().validate(cli.valid);
    if let Some(encoding) = &cli.encoding {
        options = options.encoding(encoding);
    }

    let doc = match Document::load_file_with(filename, &options) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("{e}");
            return match e {
                XmlError::Parse { ref message, .. } if message.starts_with("validity error") => {
                    EXIT_VALIDATION_ERROR
                }
                _ => EXIT_PARSE_ERROR,
            };
        }
    };

    if let Some(query) = &cli.xpath {
        let node = match doc.find_node(query) {
            Ok(node) => node,
            Err(e) => {
                eprintln!("{filename}: {e}");
                return EXIT_QUERY_ERROR;
            }
        };
        if !cli.noout {
            println!("{}", doc.dump_node(node, cli.format));
        }
        return EXIT_SUCCESS;
    }

    if cli.noout {
        return EXIT_SUCCESS;
    }

    match &cli.output {
        Some(path) => {
            if let Err(e) = doc.write_to_file(path, 0) {
                eprintln!("{e}");
                return EXIT_PARSE_ERROR;
            }
        }
        None => print!("{}", doc.dump(cli.format)),
    }

    EXIT_SUCCESS
}
