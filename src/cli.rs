use std::collections::HashMap;
use std::io::Write;
use std::str::FromStr;

use clap::{crate_version, Command};
use clap_complete::{generate, Shell};

use crate::errors::LancError;

/// Builds the `--help`/`--version` surface. The engine's actual options are
/// not modeled as clap flags: per spec.md §6 they arrive as bare
/// `key=value` tokens, the same convention as the reference tool this
/// engine's CLI follows.
pub fn build_cli() -> Command {
    Command::new("localanc")
        .version(crate_version!())
        .about("Local ancestry inference for admixed samples via a reference-haplotype HMM")
        .arg(
            clap::Arg::new("args")
                .help("key=value run parameters, e.g. ref=panel.vcf.gz gt=study.vcf.gz out=run1")
                .num_args(0..)
                .trailing_var_arg(true),
        )
}

/// Writes a shell completion script for `shell` to `out`, mirroring the
/// teacher's `shell-completion` subcommand.
pub fn write_shell_completion(shell: &str, out: impl Write) -> Result<(), LancError> {
    let generator = Shell::from_str(shell)
        .map_err(|_| LancError::malformed(format!("unrecognized shell {:?} for shell-completion", shell)))?;
    let mut cmd = build_cli();
    let name = cmd.get_name().to_string();
    let mut out = out;
    generate(generator, &mut cmd, name, &mut out);
    Ok(())
}

/// Splits the program's positional arguments into `key=value` pairs.
/// `verbose`/`quiet` are boolean flags with no `=`; every other token must
/// contain exactly one `=`.
pub fn parse_key_value_args(args: &[String]) -> Result<HashMap<String, String>, LancError> {
    let mut map = HashMap::new();
    for arg in args {
        if arg == "verbose" || arg == "quiet" || arg == "array" {
            map.insert(arg.clone(), "true".to_string());
            continue;
        }
        match arg.split_once('=') {
            Some((key, value)) => {
                if key.is_empty() {
                    return Err(LancError::malformed(format!("argument {:?} has an empty key", arg)));
                }
                map.insert(key.to_string(), value.to_string());
            }
            None => {
                return Err(LancError::malformed(format!(
                    "argument {:?} is not in key=value form",
                    arg
                )))
            }
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_pairs() {
        let args = vec!["ref=panel.vcf.gz".to_string(), "out=run1".to_string()];
        let parsed = parse_key_value_args(&args).unwrap();
        assert_eq!(parsed.get("ref").unwrap(), "panel.vcf.gz");
        assert_eq!(parsed.get("out").unwrap(), "run1");
    }

    #[test]
    fn recognizes_bare_boolean_flags() {
        let args = vec!["verbose".to_string(), "array".to_string()];
        let parsed = parse_key_value_args(&args).unwrap();
        assert_eq!(parsed.get("verbose").unwrap(), "true");
        assert_eq!(parsed.get("array").unwrap(), "true");
    }

    #[test]
    fn rejects_tokens_without_equals() {
        assert!(parse_key_value_args(&["nonsense".to_string()]).is_err());
    }

    #[test]
    fn writes_completion_script_for_known_shell() {
        let mut buf = Vec::new();
        write_shell_completion("bash", &mut buf).unwrap();
        assert!(!buf.is_empty());
    }

    #[test]
    fn rejects_unknown_shell() {
        let mut buf = Vec::new();
        assert!(write_shell_completion("not-a-shell", &mut buf).is_err());
    }
}
