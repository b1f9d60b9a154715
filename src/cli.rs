use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Cross-platform evidence collection and chain-of-custody tool", long_about = None)]
pub struct Args {
    /// Evidence domains to collect, comma separated (disk, memory, network,
    /// log) or "all"
    #[arg(short, long, default_value = "all", value_delimiter = ',')]
    pub domains: Vec<String>,

    /// Enable capability-gated advanced forensic tools
    #[arg(short, long)]
    pub advanced: bool,

    /// Base directory for session output (overrides the config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Investigator identifier recorded on evidence and custody events
    #[arg(short, long)]
    pub investigator: Option<String>,

    /// Path to a YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Collect evidence without recording a custody event
    #[arg(long)]
    pub skip_custody_log: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every configured forensic tool with tier and availability
    Tools,

    /// Write the built-in default configuration to a file
    InitConfig {
        /// Where to write the configuration
        #[arg(default_value = "custodian.yaml")]
        path: PathBuf,
    },

    /// Verify the evidence hash of an existing session
    Verify {
        /// Session directory to verify
        session: PathBuf,

        /// Verify against this hash instead of the stored one
        #[arg(long)]
        hash: Option<String>,
    },

    /// Show the custody chain of an existing session
    Chain {
        /// Session directory to inspect
        session: PathBuf,
    },

    /// Show custody statistics for an existing session
    Stats {
        /// Session directory to inspect
        session: PathBuf,
    },

    /// Record an evidence access event in the custody log
    Access {
        /// Session directory holding the evidence
        session: PathBuf,

        /// Why the evidence was accessed
        #[arg(long)]
        purpose: String,
    },

    /// Record a custody transfer event in the custody log
    Transfer {
        /// Session directory holding the evidence
        session: PathBuf,

        /// Who receives custody
        #[arg(long)]
        to: String,

        /// Free-form transfer notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show the lifecycle status of an existing session
    Status {
        /// Session directory to inspect
        session: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["custodian"]).unwrap();
        assert_eq!(args.domains, vec!["all".to_string()]);
        assert!(!args.advanced);
        assert!(!args.verbose);
        assert!(!args.skip_custody_log);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_domains_comma_separated() {
        let args = Args::try_parse_from(["custodian", "--domains", "disk,network"]).unwrap();
        assert_eq!(
            args.domains,
            vec!["disk".to_string(), "network".to_string()]
        );
    }

    #[test]
    fn test_collection_flags() {
        let args = Args::try_parse_from([
            "custodian",
            "--advanced",
            "--investigator",
            "INV042",
            "--output",
            "/tmp/out",
        ])
        .unwrap();
        assert!(args.advanced);
        assert_eq!(args.investigator.as_deref(), Some("INV042"));
        assert_eq!(args.output, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_verify_subcommand() {
        let args =
            Args::try_parse_from(["custodian", "verify", "/tmp/session_x", "--hash", "abc"])
                .unwrap();
        match args.command {
            Some(Command::Verify { session, hash }) => {
                assert_eq!(session, PathBuf::from("/tmp/session_x"));
                assert_eq!(hash.as_deref(), Some("abc"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_transfer_requires_recipient() {
        assert!(Args::try_parse_from(["custodian", "transfer", "/tmp/session_x"]).is_err());

        let args = Args::try_parse_from([
            "custodian",
            "transfer",
            "/tmp/session_x",
            "--to",
            "INV099",
        ])
        .unwrap();
        match args.command {
            Some(Command::Transfer { to, notes, .. }) => {
                assert_eq!(to, "INV099");
                assert!(notes.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_init_config_default_path() {
        let args = Args::try_parse_from(["custodian", "init-config"]).unwrap();
        match args.command {
            Some(Command::InitConfig { path }) => {
                assert_eq!(path, PathBuf::from("custodian.yaml"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
