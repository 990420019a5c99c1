use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

#[derive(Debug, Parser)]
#[command(name = "tmemo")]
#[command(bin_name = "tmemo")]
#[command(version)]
#[command(about = "Timestamped memos in folders, kept in a local document store")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'd',
        long,
        env = "TIMEMEMO_DB_PATH",
        default_value = ".timememo/store.sqlite",
        help = "Path to the SQLite document store."
    )]
    pub db: String,

    #[arg(
        short = 's',
        long,
        env = "TIMEMEMO_SETTINGS",
        help = "Optional TOML settings file."
    )]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Add a memo to the current folder.")]
    Add(AddArgs),
    #[command(about = "List memos through the saved view settings.", alias = "view")]
    Ls(JsonArgs),
    #[command(about = "Replace a memo's text; empty text deletes it.")]
    Edit(EditArgs),
    #[command(about = "Delete memos.")]
    Rm(RemoveArgs),
    #[command(about = "Mark memos completed.")]
    Done(IdsArgs),
    #[command(about = "Mark memos not completed.")]
    Undone(IdsArgs),
    #[command(about = "Set a memo's priority (high, medium, low).")]
    Priority(PriorityArgs),
    #[command(about = "Move memos to another folder.")]
    Mv(MoveArgs),
    #[command(about = "Manage folders.")]
    Folder(FolderArgs),
    #[command(about = "Show or change view settings.")]
    Config(ConfigArgs),
    #[command(about = "Import memos from a CSV file.")]
    Import(ImportArgs),
    #[command(about = "Export every memo as CSV.")]
    Export(ExportArgs),
    #[command(about = "Show storage mode, counts, and load repairs.")]
    Status(JsonArgs),
}

#[derive(Debug, Args)]
pub struct JsonArgs {
    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(help = "Memo text.")]
    pub content: String,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    #[arg(help = "Memo id.")]
    pub id: u64,

    #[arg(help = "New memo text.")]
    pub content: String,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    #[arg(required = true, help = "Memo ids.")]
    pub ids: Vec<u64>,

    #[arg(short = 'y', long, help = "Skip the confirmation question.")]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct IdsArgs {
    #[arg(required = true, help = "Memo ids.")]
    pub ids: Vec<u64>,
}

#[derive(Debug, Args)]
pub struct PriorityArgs {
    #[arg(help = "Memo id.")]
    pub id: u64,

    #[arg(help = "Priority level: high, medium, or low.")]
    pub level: String,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    #[arg(required = true, help = "Memo ids.")]
    pub ids: Vec<u64>,

    #[arg(short = 't', long = "to", help = "Target folder name.")]
    pub folder: String,
}

#[derive(Debug, Args)]
pub struct FolderArgs {
    #[command(subcommand)]
    pub command: FolderSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum FolderSubcommands {
    #[command(about = "List folders in display order.", alias = "ls")]
    List(JsonArgs),
    #[command(about = "Create a folder and select it.")]
    Add(FolderNameArgs),
    #[command(about = "Select the current folder.")]
    Select(FolderNameArgs),
    #[command(about = "Delete a folder, and its memos after a second confirmation.")]
    Rm(FolderRemoveArgs),
    #[command(about = "Rename a folder and the memos filed under it.")]
    Rename(FolderRenameArgs),
}

#[derive(Debug, Args)]
pub struct FolderNameArgs {
    #[arg(help = "Folder name.")]
    pub name: String,
}

#[derive(Debug, Args)]
pub struct FolderRemoveArgs {
    #[arg(help = "Folder name.")]
    pub name: String,

    #[arg(short = 'y', long, help = "Answer yes to every confirmation question.")]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct FolderRenameArgs {
    #[arg(help = "Current folder name.")]
    pub old: String,

    #[arg(help = "New folder name.")]
    pub new: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSubcommands {
    #[command(about = "Show the saved view settings.")]
    Show(JsonArgs),
    #[command(about = "Sort by status or time; repeating the key flips the direction.")]
    Sort(ChoiceArgs),
    #[command(about = "Keep completed memos below open ones when sorting by time.")]
    Pin(PinArgs),
    #[command(about = "Filter by priority (all, high, medium, low).")]
    PriorityFilter(ChoiceArgs),
    #[command(about = "Filter by completion (all, completed, uncompleted).")]
    StatusFilter(ChoiceArgs),
    #[command(about = "Filter by creation period (all, day, week, month, year).")]
    DateFilter(ChoiceArgs),
    #[command(about = "Anchor the date filter at a day (YYYY-MM-DD); omit to clear.")]
    DateBase(DateBaseArgs),
}

#[derive(Debug, Args)]
pub struct ChoiceArgs {
    #[arg(help = "Setting value.")]
    pub value: String,
}

#[derive(Debug, Args)]
pub struct PinArgs {
    #[arg(
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        help = "on or off."
    )]
    pub enabled: bool,
}

#[derive(Debug, Args)]
pub struct DateBaseArgs {
    #[arg(help = "Day in YYYY-MM-DD form.")]
    pub day: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CollisionChoice {
    Reassign,
    Overwrite,
    Skip,
}

impl CollisionChoice {
    /// The answers the import questions would get for this choice.
    pub fn answers(self) -> &'static [bool] {
        match self {
            CollisionChoice::Reassign => &[true],
            CollisionChoice::Overwrite => &[false, true],
            CollisionChoice::Skip => &[false, false],
        }
    }
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[arg(help = "CSV file to read.")]
    pub path: PathBuf,

    #[arg(
        short = 'c',
        long,
        value_enum,
        help = "Resolve id collisions without asking."
    )]
    pub collisions: Option<CollisionChoice>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(short = 'o', long, help = "Write to this file instead of stdout.")]
    pub out: Option<PathBuf>,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
