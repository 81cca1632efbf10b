use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::styling};

const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::Green.on_default().bold())
    .usage(styling::AnsiColor::Green.on_default().bold())
    .literal(styling::AnsiColor::Cyan.on_default().bold())
    .placeholder(styling::AnsiColor::Cyan.on_default());

#[derive(Parser)]
#[command(name = "ab")]
#[command(author, version, long_about = None)]
#[command(about = "Feed local git and file context to an LLM and apply the answer")]
#[command(styles = STYLES)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output (debug logs on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable coloured output (NO_COLOR is honoured too)
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage ~/.ab/config.json
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Concatenate files into a context and optionally ask the LLM about it
    Prompt(PromptArgs),

    /// Git helpers
    Git {
        #[command(subcommand)]
        action: GitCommand,
    },

    /// Explanations, script generation and passwords
    Util {
        #[command(subcommand)]
        action: UtilCommand,
    },

    /// Browse the OpenRouter model catalogue (default: list)
    Models {
        #[command(subcommand)]
        action: Option<ModelsCommand>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the configuration file (or the defaults)
    Show,

    /// Print one value
    Get {
        /// Dotted key, e.g. global.language
        key: String,
    },

    /// Store one value
    Set {
        /// Dotted key, e.g. models.small
        key: String,
        /// true/false, integers and JSON objects/arrays are typed; anything else is text
        value: String,
    },

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file (kept as config.json.bak)
        #[arg(short, long)]
        force: bool,
    },

    /// Print the configuration file path
    Path,

    /// Open the configuration file in $VISUAL / $EDITOR
    Edit,

    /// List every known key
    ListKeys,

    /// Delete the LLM interaction history
    ClearHistory {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
pub struct PromptArgs {
    /// Files and/or directories to include
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Prompt to send; '-' reads it from stdin
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Output language
    #[arg(long)]
    pub lang: Option<String>,

    /// Maximum estimated tokens for the whole context
    #[arg(short = 'n', long)]
    pub max_tokens: Option<i64>,

    /// Maximum estimated tokens per file
    #[arg(long)]
    pub max_tokens_doc: Option<i64>,

    /// Specialist persona: dev | rm
    #[arg(short, long)]
    pub specialist: Option<String>,

    /// Model to use instead of the token-based choice
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum tokens in the response
    #[arg(short = 'm', long)]
    pub max_completion_tokens: Option<i64>,

    /// Do not limit the response length
    #[arg(short, long)]
    pub unlimited: bool,

    /// Persist models.default and exit when nothing else is given
    #[arg(long)]
    pub set_default_model: Option<String>,

    /// Print only the model response
    #[arg(long)]
    pub only_output: bool,

    /// Format the response as JSON (with --only-output)
    #[arg(long)]
    pub json: bool,

    /// Show paths relative to the working directory
    #[arg(long, conflicts_with = "filename_only")]
    pub relative_paths: bool,

    /// Show only file names
    #[arg(long)]
    pub filename_only: bool,

    /// Write the context or response to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum GitCommand {
    /// Generate a commit message for the staged changes and commit
    AutoCommit {
        /// Commit without asking
        #[arg(short = 'y', long)]
        yes: bool,

        /// Stage every change first (git add -A)
        #[arg(short, long)]
        add: bool,

        /// Output language
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Suggest a branch name from a description
    BranchName {
        /// What the branch is for
        description: String,

        /// Create and switch to the branch
        #[arg(short, long)]
        create: bool,

        /// Force a prefix (feature, fix, ...)
        #[arg(short, long)]
        prefix: Option<String>,

        /// Output language
        #[arg(short, long)]
        lang: Option<String>,

        /// Create without asking (with --create)
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Write a pull request title and description
    PrDescription {
        /// Base branch (auto-detected: main, master, develop)
        #[arg(short, long)]
        base: Option<String>,

        /// Open the PR with gh
        #[arg(short, long)]
        create: bool,

        /// Open it as a draft
        #[arg(short, long)]
        draft: bool,

        /// Output language
        #[arg(short, long)]
        lang: Option<String>,

        /// Create without asking (with --create)
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Generate release notes from commits
    Changelog {
        /// Commit range (default: latest tag..HEAD)
        range: Option<String>,

        /// markdown | plain | json
        #[arg(short, long, default_value = "markdown")]
        format: String,

        /// Write the changelog to a file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Group commits by type
        #[arg(short = 'c', long = "categories")]
        categories: bool,

        /// Output language
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Resolve merge conflicts with the LLM
    ResolveConflict {
        /// Conflicted file (default: every conflicted file)
        file: Option<PathBuf>,

        /// Apply every resolution without asking
        #[arg(short = 'y', long)]
        yes: bool,

        /// Show resolutions without writing them
        #[arg(long)]
        dry_run: bool,

        /// Output language
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Rewrite unclear commit messages
    RewriteHistory {
        /// Commit range (default: HEAD~10..HEAD, or --root)
        range: Option<String>,

        /// Show the new messages without rewriting
        #[arg(long)]
        dry_run: bool,

        /// Rewrite every commit in the range
        #[arg(long)]
        force_all: bool,

        /// Leave merge commits alone
        #[arg(long, overrides_with = "include_merges")]
        skip_merges: bool,

        /// Rewrite merge commits too
        #[arg(long, overrides_with = "skip_merges")]
        include_merges: bool,

        /// Let the LLM decide which messages need rewriting
        #[arg(long, overrides_with = "no_smart")]
        smart: bool,

        /// Only rewrite messages shorter than three words
        #[arg(long, overrides_with = "smart")]
        no_smart: bool,

        /// Name of the backup branch
        #[arg(long)]
        backup_name: Option<String>,

        /// Rewrite without asking
        #[arg(short = 'y', long)]
        yes: bool,

        /// Output language
        #[arg(short, long)]
        lang: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum UtilCommand {
    /// Explain a file, a line range, an error message or a concept
    Explain {
        /// file, file:line, file:start-end, error text, or '-' for stdin
        input: Option<String>,

        /// Explain a concept instead
        #[arg(short, long)]
        concept: Option<String>,

        /// Include the last N bash history lines
        #[arg(long)]
        history: Option<usize>,

        /// Read files referenced by an error message
        #[arg(long)]
        with_files: bool,

        /// Include a directory listing
        #[arg(long)]
        context_dir: Option<PathBuf>,

        /// Output language
        #[arg(short, long)]
        lang: Option<String>,

        /// Ask for a longer explanation
        #[arg(long)]
        detailed: bool,
    },

    /// Generate a script or one-liner for the local system
    GenScript {
        /// What the script should do
        description: String,

        /// bash | sh | python | python3 | perl | ruby | node
        #[arg(long = "lang", default_value = "bash")]
        script_lang: String,

        /// script | cron | oneshot
        #[arg(long = "type", default_value = "oneshot")]
        script_type: String,

        /// Generate a complete script (same as --type script)
        #[arg(long)]
        full: bool,

        /// Save the script and mark it executable
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run the result after generating it
        #[arg(long)]
        run: bool,

        /// Language for comments and explanations
        #[arg(short = 'l', long = "output-lang")]
        output_lang: Option<String>,
    },

    /// Generate random passwords
    Passgenerator {
        /// Password length
        #[arg(short = 'n', long)]
        length: Option<i64>,

        /// How many passwords
        #[arg(short, long, default_value_t = 1)]
        count: usize,

        /// Letters and digits only
        #[arg(long)]
        no_symbols: bool,

        /// Leave out look-alike characters (0O1lI|)
        #[arg(long)]
        no_ambiguous: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// List models
    List {
        /// Only free models
        #[arg(long)]
        free: bool,

        /// Search in id, name and description
        #[arg(short, long)]
        search: Option<String>,

        /// Minimum context length
        #[arg(long)]
        context_min: Option<u64>,

        /// Input modality, e.g. image
        #[arg(short, long)]
        modality: Option<String>,

        /// name | context | price
        #[arg(long, default_value = "name")]
        sort: String,

        /// Maximum rows (0 = all)
        #[arg(short, long, default_value_t = 50)]
        limit: usize,

        /// Raw JSON output
        #[arg(long)]
        json: bool,
    },

    /// Show one model
    Info {
        /// Model id or a unique part of it
        model_id: String,

        /// Raw JSON output
        #[arg(long)]
        json: bool,
    },
}
