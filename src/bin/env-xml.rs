use anyhow::anyhow;
use casexml_bin::{Case, EnvBase, Error, HeaderProvider, Headers};
use clap::{Parser, Subcommand};
use derive_more::Display;
use log::LevelFilter;
use serde_json::{Map, Value};
use simple_logger::SimpleLogger;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[clap(name = "env-xml", version = "0.1.0", about = "Query and edit the env files of a case")]
struct Cli {
    #[clap(flatten)]
    global_opts: GlobalOpts,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[clap(arg_required_else_help = true, about = "View an entry")]
    View {
        #[clap(required = true, short = 'k', long = "key")]
        key: String,
    },
    #[clap(about = "List all entries")]
    List {
        #[clap(long = "json", help = "Print entries as a json object")]
        json: bool,
    },
    #[clap(arg_required_else_help = true, about = "Set an entry")]
    Set {
        #[clap(required = true, short = 'k', long = "key")]
        key: String,
        #[clap(required = true, short = 'v', long = "value")]
        value: String,
        #[clap(long = "force", help = "Store the value without checking its type")]
        force: bool,
    },
    #[clap(arg_required_else_help = true, about = "Search for entries (? and * wildcards)")]
    Search {
        #[clap(required = true, short = 'k', long = "key")]
        key: String,
    },
    #[clap(arg_required_else_help = true, about = "Create an env file with its default header")]
    Create {
        #[clap(required = true, short = 'f', long = "file")]
        file: String,
    },
}

#[derive(Debug, Parser)]
struct GlobalOpts {
    #[clap(short = 'c', long = "caseroot", global = true, default_value = ".")]
    caseroot: PathBuf,
    #[clap(long = "headers", global = true, help = "Header template file, builtin templates when omitted")]
    headers: Option<PathBuf>,
    #[clap(short = 'd', long = "debug", global = true)]
    debug: bool,
}

#[derive(Clone, Copy, Debug, Display)]
enum Outcome {
    #[display("created")]
    Created,
    #[display("already exists")]
    Exists,
}

fn load_headers(opts: &GlobalOpts) -> anyhow::Result<Headers> {
    let headers = match &opts.headers {
        Some(path) => Headers::load(path)?,
        None => Headers::builtin()?,
    };
    Ok(headers)
}

fn create(opts: &GlobalOpts, headers: &dyn HeaderProvider, file: &str) -> anyhow::Result<Outcome> {
    let mut env = EnvBase::new(&opts.caseroot, file, headers)?;
    if !env.is_new() {
        return Ok(Outcome::Exists);
    }

    env.write()?;
    Ok(Outcome::Created)
}

/// Typed json value of an entry. Values that don't fit their declared type are listed as stored.
fn json_value(case: &Case, key: &str, raw: String) -> anyhow::Result<Value> {
    match case.get_typed_value(key) {
        Ok(Some(typed)) => Ok(serde_json::to_value(typed)?),
        Ok(None) | Err(Error::InvalidValue { .. }) => Ok(Value::String(raw)),
        Err(err) => Err(err.into()),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let level = if args.global_opts.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    let headers = load_headers(&args.global_opts)?;

    if let Commands::Create { file } = &args.command {
        let outcome = create(&args.global_opts, &headers, file)?;
        println!("{file}: {outcome}");
        return Ok(());
    }

    let mut case = Case::open(&args.global_opts.caseroot, &Case::DEFAULT_FILES, &headers)?;

    match args.command {
        Commands::View { key } => {
            let Some(env) = case.owner_of(&key)? else {
                println!("Key not found");
                return Ok(());
            };

            let value = case.get_value(&key)?.unwrap_or_default();
            let resolved = case.get_resolved_value(&key)?.unwrap_or_default();

            println!("Key            : {key}");
            println!("Value          : {value}");
            println!("Resolved Value : {resolved}");
            println!("Type           : {}", env.get_type_info(&key)?.unwrap_or_default());
            println!("Valid Values   : {}", env.get_valid_values(&key)?.join(","));
            println!("Description    : {}", env.get_description(&key)?.unwrap_or_default());
            println!("File           : {}", env.file_name());
        }
        Commands::List { json } => {
            let mut entries = Map::new();
            for key in case.find("*")? {
                let value = case.get_value(&key)?.unwrap_or_default();
                if json {
                    let typed = json_value(&case, &key, value)?;
                    entries.insert(key, typed);
                } else {
                    println!("{key:40}: {value}");
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&Value::Object(entries))?);
            }
        }
        Commands::Set { key, value, force } => {
            let stored = case
                .set_value(&key, &value, force)?
                .ok_or_else(|| anyhow!("{key} is not known in this case"))?;
            case.flush()?;
            println!("{key:40}: {stored}");
        }
        Commands::Search { key } => {
            for key in case.find(&key)? {
                let value = case.get_value(&key)?.unwrap_or_default();
                println!("{key:40}: {value}");
            }
        }
        Commands::Create { .. } => {}
    }

    Ok(())
}
