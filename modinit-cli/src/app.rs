use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use modinit::PatchOptions;
use regex::Regex;

/// First arguments that ask for help: `/?`, `-h`, `--help`, `/help`, ...
const HELP_PATTERN: &str = r"^((/|--?)(\?|h|help))$";

/// Windows style key switch, `/k:<file>` or `/keyfile:<file>`
const KEY_SWITCH_PATTERN: &str = r"(?i)^/k(eyfile)?:(.+)";

const REQUIREMENTS: &str = "\
The initializer method must
  - not be private or protected
  - take no parameters
  - return void
  - be static

/k:<KEYFILE> and /keyfile:<KEYFILE> are accepted in place of --keyfile. Without a key,
a fourth argument in front of TYPE_NAME is ignored.";

/// modinit - inject a module initializer into a .NET assembly
#[derive(Debug, Parser)]
#[command(
    name = "modinit",
    about,
    override_usage = "modinit [/k:<KEYFILE>|/keyfile:<KEYFILE>] <TYPE_NAME> <METHOD_NAME> <IMAGE>",
    after_help = REQUIREMENTS,
    disable_help_flag = true
)]
pub struct Cli {
    /// Strong name key pair (.snk) to re-sign the assembly with.
    #[arg(short = 'k', long = "keyfile", value_name = "KEYFILE")]
    pub keyfile: Option<PathBuf>,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Name of the type declaring the initializer, without namespace.
    #[arg(value_name = "TYPE_NAME")]
    pub type_name: String,

    /// Name of the initializer method.
    #[arg(value_name = "METHOD_NAME")]
    pub method_name: String,

    /// Assembly to patch in place. A companion .pdb is rewritten as well.
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,
}

impl Cli {
    pub fn patch_options(&self) -> PatchOptions {
        let options = PatchOptions::new(&self.type_name, &self.method_name, &self.image);
        match &self.keyfile {
            Some(key) => options.with_key_file(key),
            None => options,
        }
    }
}

/// What the command line asks for.
#[derive(Debug)]
pub enum Invocation {
    /// Print the help and fail
    Help,
    /// Arguments that clap rejected
    Usage(clap::Error),
    /// Patch an image
    Patch(Cli),
}

/// Interpret the arguments (without the program name).
pub fn parse<I>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();

    let help = Regex::new(HELP_PATTERN)?;
    if args.first().is_some_and(|arg| help.is_match(arg)) {
        return Ok(Invocation::Help);
    }

    let mut args = normalize(args)?;
    if !(3..=4).contains(&arity(&args)) {
        return Ok(Invocation::Help);
    }

    // Four arguments without a key switch: the image and its two names come last
    let positional = positionals(&args);
    if positional.len() > 3 {
        args.remove(positional[0]);
    }

    let argv = std::iter::once("modinit".to_string()).chain(args);
    Ok(match Cli::try_parse_from(argv) {
        Ok(cli) => Invocation::Patch(cli),
        Err(err) => Invocation::Usage(err),
    })
}

pub fn help_text() -> String {
    Cli::command().render_help().to_string()
}

/// Rewrite `/k:<file>` and `/keyfile:<file>` into `--keyfile=<file>`. The last argument is
/// always the image, even if it looks like a switch.
fn normalize(mut args: Vec<String>) -> Result<Vec<String>> {
    let switch = Regex::new(KEY_SWITCH_PATTERN)?;
    let last = args.len().saturating_sub(1);

    for arg in args.iter_mut().take(last) {
        let key = switch
            .captures(arg)
            .and_then(|captures| captures.get(2))
            .map(|key| key.as_str().to_string());
        if let Some(key) = key {
            *arg = format!("--keyfile={key}");
        }
    }

    Ok(args)
}

/// Number of arguments as the legacy front-end counted them: the key switch is one, the
/// verbosity flag none.
fn arity(args: &[String]) -> usize {
    let mut count = 0;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => {}
            "-k" | "--keyfile" => {
                iter.next();
                count += 1;
            }
            _ => count += 1,
        }
    }
    count
}

/// Indices of the arguments that are neither flags nor flag values.
fn positionals(args: &[String]) -> Vec<usize> {
    let mut indices = Vec::new();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "-v" | "--verbose" => {}
            "-k" | "--keyfile" => index += 1,
            arg if arg.starts_with("--keyfile=") => {}
            _ => indices.push(index),
        }
        index += 1;
    }
    indices
}
