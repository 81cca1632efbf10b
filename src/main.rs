use std::io::Read;

use ab_cli::*;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, GitCommand, ModelsCommand, PromptArgs, UtilCommand};
use commands::format::ModelSort;
use context::PathFormat;
use error::AbError;
use llm::prompt::ScriptMode;
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    human_panic::setup_panic!();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();

    // 日志只写 stderr，stdout 留给命令输出（管道友好）
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .init();

    let colored = !cli.no_color && std::env::var_os("NO_COLOR").is_none();
    if !colored {
        colored::control::set_override(false);
    }

    let rt = Runtime::new()?;
    if let Err(e) = rt.block_on(dispatch(cli.command, colored)) {
        exit_with(e, colored);
    }
    Ok(())
}

/// 根据子命令路由
async fn dispatch(command: Commands, colored: bool) -> error::Result<()> {
    // config 子命令不加载配置，配置文件损坏时也能修
    if let Commands::Config { action } = &command {
        return commands::config::run(action, &config::default_path()?, colored);
    }

    let mut config = config::ConfigStore::load()?;

    match command {
        Commands::Config { .. } => Ok(()),
        Commands::Prompt(args) => {
            let options = prompt_options(args)?;
            commands::prompt::run(&options, &mut config, colored).await
        }
        Commands::Git { action } => run_git(action, &config, colored).await,
        Commands::Util { action } => run_util(action, &config, colored).await,
        Commands::Models { action } => {
            let action = action.unwrap_or(ModelsCommand::List {
                free: false,
                search: None,
                context_min: None,
                modality: None,
                sort: "name".to_string(),
                limit: 50,
                json: false,
            });
            match action {
                ModelsCommand::List {
                    free,
                    search,
                    context_min,
                    modality,
                    sort,
                    limit,
                    json,
                } => {
                    let options = commands::ModelsListOptions {
                        free,
                        search,
                        context_min,
                        modality,
                        sort: sort.parse::<ModelSort>()?,
                        limit,
                        json,
                    };
                    commands::models::list(&options, &config, colored).await
                }
                ModelsCommand::Info { model_id, json } => {
                    commands::models::info(&model_id, json, &config, colored).await
                }
            }
        }
    }
}

async fn run_git(
    action: GitCommand,
    config: &config::ConfigStore,
    colored: bool,
) -> error::Result<()> {
    match action {
        GitCommand::AutoCommit { yes, add, lang } => {
            let options = commands::AutoCommitOptions {
                yes,
                add_all: add,
                language: lang,
            };
            commands::auto_commit::run(&options, config, colored).await
        }
        GitCommand::BranchName {
            description,
            create,
            prefix,
            lang,
            yes,
        } => {
            let options = commands::BranchNameOptions {
                description,
                create,
                prefix,
                language: lang,
                yes,
            };
            commands::branch_name::run(&options, config, colored).await
        }
        GitCommand::PrDescription {
            base,
            create,
            draft,
            lang,
            yes,
        } => {
            let options = commands::PrDescriptionOptions {
                base,
                create,
                draft,
                language: lang,
                yes,
            };
            commands::pr_description::run(&options, config, colored).await
        }
        GitCommand::Changelog {
            range,
            format,
            output,
            categories,
            lang,
        } => {
            let options = commands::ChangelogOptions {
                range,
                format: format.parse()?,
                output,
                categorize: categories,
                language: lang,
            };
            commands::changelog::run(&options, config, colored).await
        }
        GitCommand::ResolveConflict {
            file,
            yes,
            dry_run,
            lang,
        } => {
            let options = commands::ResolveConflictOptions {
                file,
                yes,
                dry_run,
                language: lang,
            };
            commands::resolve_conflict::run(&options, config, colored).await
        }
        GitCommand::RewriteHistory {
            range,
            dry_run,
            force_all,
            skip_merges,
            include_merges,
            smart,
            no_smart,
            backup_name,
            yes,
            lang,
        } => {
            let options = commands::RewriteHistoryOptions {
                range,
                dry_run,
                force_all,
                skip_merges: tri_state(skip_merges, include_merges),
                smart: tri_state(smart, no_smart),
                backup_name,
                yes,
                language: lang,
            };
            commands::rewrite_history::run(&options, config, colored).await
        }
    }
}

async fn run_util(
    action: UtilCommand,
    config: &config::ConfigStore,
    colored: bool,
) -> error::Result<()> {
    match action {
        UtilCommand::Explain {
            input,
            concept,
            history,
            with_files,
            context_dir,
            lang,
            detailed,
        } => {
            let options = commands::ExplainOptions {
                input,
                concept,
                history,
                with_files,
                context_dir,
                language: lang,
                detailed,
            };
            commands::explain::run(&options, config, colored).await
        }
        UtilCommand::GenScript {
            description,
            script_lang,
            script_type,
            full,
            output,
            run,
            output_lang,
        } => {
            let mode = if full {
                ScriptMode::Full
            } else {
                script_type.parse()?
            };
            let options = commands::GenScriptOptions {
                description,
                script_language: script_lang,
                mode,
                output,
                run,
                language: output_lang,
            };
            commands::gen_script::run(&options, config, colored).await
        }
        UtilCommand::Passgenerator {
            length,
            count,
            no_symbols,
            no_ambiguous,
        } => {
            let options = commands::PassgenOptions {
                length,
                count,
                no_symbols,
                no_ambiguous,
            };
            commands::passgenerator::run(&options, config)
        }
    }
}

fn prompt_options(args: PromptArgs) -> error::Result<commands::PromptOptions> {
    let prompt = match args.prompt {
        Some(p) if p == "-" => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Some(buf.trim_end().to_string())
        }
        other => other,
    };
    let path_format = if args.relative_paths {
        PathFormat::Relative
    } else if args.filename_only {
        PathFormat::NameOnly
    } else {
        PathFormat::Full
    };

    Ok(commands::PromptOptions {
        paths: args.paths,
        prompt,
        language: args.lang,
        max_tokens: args.max_tokens,
        max_tokens_doc: args.max_tokens_doc,
        specialist: args.specialist.map(|s| s.parse()).transpose()?,
        model: args.model,
        max_completion_tokens: args.max_completion_tokens,
        unlimited: args.unlimited,
        set_default_model: args.set_default_model,
        only_output: args.only_output,
        json: args.json,
        path_format,
        output: args.output,
    })
}

/// `--flag` / `--no-flag` 对；都没给时交给配置决定
fn tri_state(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn exit_with(e: AbError, colored: bool) -> ! {
    // 用户取消不算错误，正常退出
    if matches!(e, AbError::UserCancelled) {
        std::process::exit(0);
    }
    ui::error(&e.to_string(), colored);
    if let Some(suggestion) = e.suggestion() {
        println!();
        ui::info(&suggestion, colored);
    }
    std::process::exit(1);
}
