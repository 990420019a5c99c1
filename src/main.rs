mod app;
mod cli;
mod config;
mod csv;
mod db;
mod domain;
mod prompt;
mod reconcile;
mod settings;
mod storage;
mod ui;
mod view;

use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => tracing::warn!(error = %err, "could not render JSON output"),
    }
}

fn run() -> Result<(), app::AppError> {
    use clap::Parser;
    use cli::Commands;

    let cli = cli::Cli::parse();
    let settings = settings::Settings::load(cli.settings.as_deref())?;
    let mut app = app::App::open(&cli.db, settings)?;

    match cli.command {
        Commands::Add(args) => {
            let memo = app.add_memo(&args.content)?;
            println!("added #{} to {}", memo.id, memo.folder_name);
        }
        Commands::Ls(args) => {
            let memos = app.view();
            if args.json {
                print_json(&memos);
            } else {
                ui::print_memo_list(
                    &memos,
                    &app.config_view(),
                    app.collection().current_folder.as_deref(),
                );
            }
        }
        Commands::Edit(args) => match app.update_content(args.id, &args.content)? {
            Some(memo) => println!("updated #{}", memo.id),
            None => println!("deleted #{}", args.id),
        },
        Commands::Rm(args) => {
            let mut prompt = prompt::TerminalPrompt::stdio().assume_yes(args.yes);
            let removed = match args.ids.as_slice() {
                [id] => usize::from(app.delete_memo(*id, &mut prompt)?),
                ids => app.delete_memos(ids, &mut prompt)?,
            };
            println!("deleted {} memo(s)", removed);
        }
        Commands::Done(args) => set_completed(&mut app, &args.ids, true)?,
        Commands::Undone(args) => set_completed(&mut app, &args.ids, false)?,
        Commands::Priority(args) => {
            let memo = app.set_priority(args.id, &args.level)?;
            println!("#{} priority {}", memo.id, memo.priority);
        }
        Commands::Mv(args) => {
            let moved = app.move_memos(&args.ids, &args.folder)?;
            println!("moved {} memo(s) to {}", moved, args.folder.trim());
        }
        Commands::Folder(args) => run_folder_command(&mut app, args.command)?,
        Commands::Config(args) => run_config_command(&mut app, args.command)?,
        Commands::Import(args) => {
            let summary = match args.collisions {
                Some(choice) => {
                    let mut prompt = prompt::ScriptedPrompt::new(choice.answers().iter().copied());
                    app.import_csv(&args.path, &mut prompt)?
                }
                None => app.import_csv(&args.path, &mut prompt::TerminalPrompt::stdio())?,
            };
            if args.json {
                print_json(&summary);
            } else {
                println!("{}", ui::format_import_summary(&summary));
            }
        }
        Commands::Export(args) => {
            let mut prompt = prompt::TerminalPrompt::stdio();
            if let Some(text) = app.export_csv(&mut prompt) {
                match args.out {
                    Some(path) => {
                        std::fs::write(&path, text)?;
                        println!(
                            "exported {} memo(s) to {}",
                            app.collection().memos.len(),
                            path.display()
                        );
                    }
                    None => print!("{text}"),
                }
            }
        }
        Commands::Status(args) => {
            let status = app.status();
            if args.json {
                print_json(&status);
            } else {
                ui::print_status(&status);
            }
        }
    }
    Ok(())
}

fn set_completed(app: &mut app::App, ids: &[u64], completed: bool) -> Result<(), app::AppError> {
    // Refuse the whole batch before touching anything.
    if let Some(missing) = ids
        .iter()
        .find(|id| app.collection().find_memo(**id).is_none())
    {
        return Err(app::AppError::NotFound(*missing));
    }
    for id in ids {
        let memo = app.set_completed(*id, completed)?;
        let label = if memo.completed { "completed" } else { "reopened" };
        println!("{} #{}", label, memo.id);
    }
    Ok(())
}

fn run_folder_command(
    app: &mut app::App,
    command: cli::FolderSubcommands,
) -> Result<(), app::AppError> {
    use cli::FolderSubcommands;

    match command {
        FolderSubcommands::List(args) => {
            let folders = app.folders();
            if args.json {
                print_json(&folders);
            } else {
                ui::print_folder_list(&folders);
            }
        }
        FolderSubcommands::Add(args) => {
            let mut prompt = prompt::TerminalPrompt::stdio();
            if let Some(folder) = app.add_folder(&args.name, &mut prompt)? {
                println!("created folder {} (selected)", folder.name);
            }
        }
        FolderSubcommands::Select(args) => {
            app.select_folder(&args.name)?;
            println!("selected folder {}", args.name.trim());
        }
        FolderSubcommands::Rm(args) => {
            let mut prompt = prompt::TerminalPrompt::stdio().assume_yes(args.yes);
            if app.delete_folder(&args.name, &mut prompt)? {
                println!("deleted folder {}", args.name.trim());
            }
        }
        FolderSubcommands::Rename(args) => {
            let mut prompt = prompt::TerminalPrompt::stdio();
            if app.rename_folder(&args.old, &args.new, &mut prompt)? {
                println!("renamed folder {} -> {}", args.old.trim(), args.new.trim());
            }
        }
    }
    Ok(())
}

fn run_config_command(
    app: &mut app::App,
    command: cli::ConfigSubcommands,
) -> Result<(), app::AppError> {
    use cli::ConfigSubcommands;

    let view = match command {
        ConfigSubcommands::Show(args) => {
            let view = app.config_view();
            if args.json {
                print_json(&view);
                return Ok(());
            }
            view
        }
        ConfigSubcommands::Sort(args) => app.set_sort_by(&args.value)?,
        ConfigSubcommands::Pin(args) => app.set_fixed_comp_down(args.enabled),
        ConfigSubcommands::PriorityFilter(args) => app.set_priority_filter(&args.value)?,
        ConfigSubcommands::StatusFilter(args) => app.set_status_filter(&args.value)?,
        ConfigSubcommands::DateFilter(args) => app.set_date_filter(&args.value)?,
        ConfigSubcommands::DateBase(args) => {
            let day = args.day.as_deref().map(parse_day_arg).transpose()?;
            app.set_date_filter_base(day)
        }
    };
    ui::print_config(&view);
    Ok(())
}

fn parse_day_arg(raw: &str) -> Result<time::Date, app::AppError> {
    domain::timestamp::parse_day(raw).ok_or_else(|| {
        app::AppError::InvalidArgument(format!("invalid day '{}': expected YYYY-MM-DD", raw))
    })
}
