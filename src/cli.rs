use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use jobless_worker::ShellHandler;

/// Command line of the `jobless` binary
pub fn build_cli() -> Command {
    Command::new("jobless")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Persistent background job queue")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Config file; defaults to config/jobless.toml or jobless.toml when present")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Tracing level, overriding observability.log_level")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("Tracing output format, overriding observability.log_format")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand(
            Command::new("register")
                .about("Add a job to the queue")
                .arg(Arg::new("kind").value_name("KIND").required(true))
                .arg(
                    Arg::new("payload")
                        .value_name("PAYLOAD_JSON")
                        .help("JSON payload handed to the handler")
                        .default_value("null"),
                ),
        )
        .subcommand(with_exec(
            Command::new("work").about("Claim and run jobs until stopped").arg(
                Arg::new("kinds")
                    .short('k')
                    .long("kinds")
                    .value_name("KINDS")
                    .help("Comma separated job kinds to claim")
                    .required(true),
            ),
        ))
        .subcommand(with_exec(
            Command::new("task").about("Run a command once as a one-shot task"),
        ))
        .subcommand(Command::new("config").about("Print the effective configuration"))
}

fn with_exec(command: Command) -> Command {
    command
        .arg(
            Arg::new("exec")
                .short('e')
                .long("exec")
                .value_name("CMD")
                .help("Command run for each job; payload in $JOB_PAYLOAD and on stdin")
                .required(true),
        )
        .arg(
            Arg::new("workdir")
                .short('w')
                .long("workdir")
                .value_name("DIR")
                .help("Working directory of the command"),
        )
        .arg(
            Arg::new("env")
                .long("env")
                .value_name("KEY=VALUE")
                .help("Extra environment variable for the command; repeatable")
                .action(ArgAction::Append)
                .value_parser(parse_env_var),
        )
        .arg(
            Arg::new("args")
                .value_name("ARGS")
                .action(ArgAction::Append)
                .num_args(0..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        )
}

fn parse_env_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Shell handler described by the `--exec` family of arguments
pub fn shell_handler(matches: &ArgMatches) -> Result<ShellHandler> {
    let command = matches
        .get_one::<String>("exec")
        .ok_or_else(|| anyhow!("missing argument: exec"))?;
    let args: Vec<String> = matches
        .get_many::<String>("args")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let mut handler = ShellHandler::new(command, args);
    if let Some(dir) = matches.get_one::<String>("workdir") {
        handler = handler.with_working_dir(dir);
    }
    if let Some(vars) = matches.get_many::<(String, String)>("env") {
        for (key, value) in vars {
            handler = handler.with_env(key, value);
        }
    }
    Ok(handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_command() {
        let matches = build_cli()
            .try_get_matches_from([
                "jobless", "-c", "jobless.toml", "work", "--kinds", "resize,email", "--exec",
                "convert", "--", "-resize", "50%",
            ])
            .unwrap();

        assert_eq!(
            matches.get_one::<String>("config").map(String::as_str),
            Some("jobless.toml")
        );
        let (name, work) = matches.subcommand().unwrap();
        assert_eq!(name, "work");
        assert_eq!(work.get_one::<String>("kinds").unwrap(), "resize,email");
        assert_eq!(work.get_one::<String>("exec").unwrap(), "convert");
        let args: Vec<_> = work.get_many::<String>("args").unwrap().collect();
        assert_eq!(args, vec!["-resize", "50%"]);
    }

    #[test]
    fn test_register_defaults_payload_to_null() {
        let matches = build_cli()
            .try_get_matches_from(["jobless", "register", "resize"])
            .unwrap();
        let (_, register) = matches.subcommand().unwrap();
        assert_eq!(register.get_one::<String>("payload").unwrap(), "null");
    }

    #[test]
    fn test_work_requires_kinds() {
        assert!(build_cli()
            .try_get_matches_from(["jobless", "work", "--exec", "true"])
            .is_err());
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        assert!(build_cli()
            .try_get_matches_from(["jobless", "--log-format", "xml", "config"])
            .is_err());
    }

    #[test]
    fn test_env_requires_key_value() {
        assert!(build_cli()
            .try_get_matches_from(["jobless", "task", "--exec", "true", "--env", "NOVALUE"])
            .is_err());
        assert!(build_cli()
            .try_get_matches_from(["jobless", "task", "--exec", "true", "--env", "=x"])
            .is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_handler_uses_workdir_and_env() {
        use jobless_domain::entities::WorkerIdentity;
        use jobless_infrastructure::Logger;
        use jobless_worker::{JobContext, JobHandler};

        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().to_string_lossy().into_owned();
        let matches = build_cli()
            .try_get_matches_from([
                "jobless",
                "task",
                "--workdir",
                workdir.as_str(),
                "--env",
                "GREETING=hi=there",
                "--exec",
                "sh",
                "--",
                "-c",
                "printf '%s' \"$GREETING\" > greeting.txt",
            ])
            .unwrap();
        let (_, task) = matches.subcommand().unwrap();

        let handler = shell_handler(task).unwrap();
        let ctx = JobContext::new(None, WorkerIdentity::new("box-1", 1, "cli"), Logger::Console);
        handler.handle(&ctx).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("greeting.txt")).unwrap();
        assert_eq!(written, "hi=there");
    }
}
