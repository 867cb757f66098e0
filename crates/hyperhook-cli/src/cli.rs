use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hyperhook",
    about = "Hyperhook: issue tracker database with auditor and reactor hooks",
    version
)]
pub struct Cli {
    /// Tracker home directory
    #[arg(long, global = true, default_value = ".hyperhook")]
    pub tracker: String,

    /// Act as this user id (defaults to the configured admin uid)
    #[arg(long, global = true)]
    pub uid: Option<String>,

    /// Log debug output to stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a tracker home
    Init {
        /// Schema TOML to install instead of the classic tracker schema
        #[arg(long)]
        schema: Option<String>,

        /// Builtin detector to enable (repeatable)
        #[arg(long = "enable")]
        enable: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a node through the hook dispatcher
    Create {
        /// Class name (e.g. `issue`)
        class: String,

        /// Property assignments `prop=value`; multilinks take `a,b,c`
        assignments: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change properties of a node
    Set {
        class: String,

        id: String,

        /// Property assignments `prop=value`; multilinks take `a,b,c`
        #[arg(required = true)]
        assignments: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Retire a node
    Retire {
        class: String,

        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restore a retired node
    Restore {
        class: String,

        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a node, or one property of it
    Get {
        class: String,

        id: String,

        /// Only this property
        prop: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List live node ids of a class
    List {
        class: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Filter live nodes by property values
    Filter {
        class: String,

        /// Filters `prop=v1,v2`; link values may be opcode programs
        #[arg(required = true)]
        filters: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the journal of a node
    History {
        class: String,

        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show available builtins, loaded detectors and registered hooks
    Detectors {
        /// Enable a builtin detector (repeatable)
        #[arg(long = "enable")]
        enable: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile a filter opcode program and optionally evaluate it
    Expr {
        /// Opcode values, e.g. `1 -1 -4`
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<String>,

        /// Match as a single-valued link instead of a multilink
        #[arg(long)]
        link: bool,

        /// Comma-separated candidate ids to evaluate against
        #[arg(long)]
        against: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
