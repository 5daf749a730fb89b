use clap::Parser;
use joblib::SupervisorConfig;
use std::path::PathBuf;

/// Launch jobs under the job supervisor and follow their output until they finish
#[derive(Debug, Parser)]
pub struct ArgParser {
    /// path or name of the executable every job runs
    #[clap(short = 'e', long = "exe", env = "JOBLIB_EXECUTABLE")]
    pub executable: PathBuf,

    /// working directory for the jobs (defaults to the executable's directory)
    #[clap(short = 'd', long = "dir", env = "JOBLIB_WORKDIR")]
    pub dir: Option<PathBuf>,

    /// argument passed before the job parameter, may be repeated
    #[clap(short = 'a', long = "arg", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// extra environment variable for the jobs, as VAR=VAL
    #[clap(long = "env", parse(try_from_str = var_eq_val))]
    pub envs: Vec<(String, String)>,

    /// advice printed when the executable cannot be found
    #[clap(long)]
    pub hint: Option<String>,

    /// milliseconds between polls
    #[clap(
        short = 'i',
        long = "interval-ms",
        env = "JOBLIB_POLL_INTERVAL_MS",
        default_value = "250"
    )]
    pub interval_ms: u64,

    /// print each poll as a JSON object instead of prefixed lines
    #[clap(long)]
    pub json: bool,

    /// one job is started per parameter
    #[clap(required = true)]
    pub parameters: Vec<String>,
}

impl ArgParser {
    pub fn supervisor_config(&self) -> SupervisorConfig {
        let mut config = SupervisorConfig::new(&self.executable).args(self.args.iter().cloned());
        if let Some(dir) = &self.dir {
            config = config.working_dir(dir);
        }
        for (var, val) in &self.envs {
            config = config.env(var, val);
        }
        if let Some(hint) = &self.hint {
            config = config.hint(hint);
        }
        config
    }
}

/// try_from_str parse function for job env variables
fn var_eq_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((var, val)) if !var.is_empty() => Ok((var.to_string(), val.to_string())),
        _ => Err("Required format is VAR=VAL".to_string()),
    }
}
