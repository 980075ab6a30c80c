use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{
    Parser,
    Subcommand,
};
use fw_env_tool::{
    confirm,
    script,
    Config,
    Error,
    MtdDevice,
    Tool,
    Update,
    DEFAULT_CONFIG_PATH,
};

#[derive(Parser)]
#[command(name = "fw-env-tool")]
#[command(about = "Print and modify U-Boot environment variables", long_about = None)]
struct Cli {
    /// Device configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print all variables, or the given ones
    Printenv {
        /// Print only the value, requires exactly one name
        #[arg(short = 'n')]
        value_only: bool,

        names: Vec<String>,
    },
    /// Set a variable to the values joined by spaces, or delete it if no value is given
    Setenv {
        /// Force update, assume 'yes'
        #[arg(short, long)]
        force: bool,

        /// Read name/value pairs from a file, one per line. Use '-' for stdin together with -f
        #[arg(short, long, value_name = "FILE", conflicts_with_all = ["name", "values"])]
        script: Option<PathBuf>,

        #[arg(required_unless_present = "script")]
        name: Option<String>,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        values: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("## Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Error> {
    let config = Config::from_file(&cli.config)?;

    match cli.command {
        Commands::Printenv { value_only, names } => {
            let Some(tool) = open(&config, false, "display")? else {
                return Ok(ExitCode::FAILURE);
            };

            let missing = tool.printenv(&names, value_only, &mut io::stdout().lock())?;
            for name in &missing {
                eprintln!("## Error: \"{name}\" not defined");
            }

            Ok(if missing.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Setenv {
            force,
            script,
            name,
            values,
        } => {
            let updates = match (script, name) {
                (Some(path), _) if path.as_os_str() == "-" => {
                    // the answer to the prompt would be read from the script
                    if !force {
                        return Err(Error::StdinRequiresForce);
                    }
                    script::parse(io::stdin().lock())?
                }
                (Some(path), _) => script::from_file(path)?,
                (None, Some(name)) => vec![Update::from_args(name, &values)],
                (None, None) => Vec::new(),
            };

            let Some(mut tool) = open(&config, true, "update")? else {
                return Ok(ExitCode::FAILURE);
            };

            if !tool.setenv(&updates, force, &mut io::stderr().lock())? {
                return Ok(ExitCode::SUCCESS);
            }

            if !force && !confirm(&mut io::stdin().lock(), &mut io::stderr().lock())? {
                return Ok(ExitCode::SUCCESS);
            }

            if let Err(e) = tool.commit() {
                eprintln!("Error: can't write fw_env to flash");
                return Err(e);
            }
            tool.close()?;

            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Loads the environment. A corrupted environment is reported here and yields `None`.
fn open(config: &Config, writable: bool, action: &str) -> Result<Option<Tool<MtdDevice>>, Error> {
    match Tool::open(config, writable) {
        Ok(tool) => Ok(Some(tool)),
        Err(Error::EnvError(fw_env::error::Error::CorruptEnvironment)) => {
            eprintln!(
                "## Error: Unable to {action} variables when flash environment is corrupted."
            );
            eprintln!("## Error: Use u-boot 'saveenv' CLI to update variables with defaults.");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
