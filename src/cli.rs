use clap::{Parser, Subcommand, ValueEnum};

use grc_e2e::config::E2eConfig;
use grc_e2e::crd::ComplianceState;

#[derive(Parser)]
#[command(name = "grc-e2e")]
#[command(about = "End-to-end checks for policy template-sync error handling")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Display application version
    Version,

    /// Check hub and managed cluster connectivity
    Check {
        #[command(flatten)]
        config: E2eConfig,
    },

    /// Manage the Policy CRD
    Crd {
        #[command(subcommand)]
        action: CrdAction,
    },

    /// Wait for a replicated policy's template status message
    WaitMessage {
        #[command(flatten)]
        config: E2eConfig,

        /// Root policy name (the replica name is derived from it)
        #[arg(long)]
        policy: String,

        /// Index into status.details
        #[arg(long, default_value_t = 0)]
        template_index: usize,

        /// Regex the latest message must match
        #[arg(long)]
        matches: String,

        /// Wait until the message does NOT match instead
        #[arg(long)]
        negate: bool,
    },

    /// Wait for a root policy on the hub to reach a compliance state
    WaitCompliance {
        #[command(flatten)]
        config: E2eConfig,

        /// Root policy name
        #[arg(long)]
        policy: String,

        /// Expected state: Compliant, NonCompliant or Pending
        #[arg(long)]
        state: ComplianceState,
    },

    /// Run an end-to-end suite
    Run {
        #[command(subcommand)]
        suite: Suite,
    },
}

#[derive(Subcommand)]
pub enum CrdAction {
    /// Print the CRD YAML to stdout
    Generate,

    /// Install the CRD into the hub cluster
    Install {
        #[command(flatten)]
        config: E2eConfig,
    },
}

#[derive(Subcommand)]
pub enum Suite {
    /// Template-sync error handling
    TemplateSyncErrors {
        #[command(flatten)]
        config: E2eConfig,

        /// Abort the whole suite after this many seconds
        #[arg(long)]
        suite_timeout: Option<u64>,
    },
}
