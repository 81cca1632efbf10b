use std::fs;

use super::format::pretty_json_or_raw;
use super::options::PromptOptions;
use super::{LlmCall, ask, completion_cap};
use crate::config::{ConfigStore, ConfigValue};
use crate::context::{AssembledContext, ContextLimits, IgnoreRules, PromptAssembler};
use crate::error::Result;
use crate::llm::LlmProvider;
use crate::llm::provider::create_provider;
use crate::ui;

const COMMAND: &str = "prompt";

/// `ab prompt`
pub async fn run(options: &PromptOptions, config: &mut ConfigStore, colored: bool) -> Result<()> {
    if let Some(model) = options.set_default_model.as_deref() {
        config.set_value("models.default", ConfigValue::from(model))?;
        if !options.only_output {
            ui::success(
                &format!(
                    "Default model set to {} in {}",
                    model,
                    config.path().display()
                ),
                colored,
            );
        }
        if options.prompt.is_none() && options.paths.is_empty() {
            return Ok(());
        }
    }

    let context = assemble(options, config)?;

    match options.prompt.as_deref() {
        Some(_) => {
            let provider = create_provider(config)?;
            run_with_provider(options, config, provider.as_ref(), &context, colored).await
        }
        None => emit_context(options, &context, colored),
    }
}

/// Build the file context with limits from the CLI or `commands.prompt.*`.
pub fn assemble(options: &PromptOptions, config: &ConfigStore) -> Result<AssembledContext> {
    if options.paths.is_empty() {
        return Ok(AssembledContext::default());
    }

    let cwd = std::env::current_dir()?;
    let ignore = IgnoreRules::discover(&cwd)?;
    for source in ignore.sources() {
        tracing::info!("Loaded .aiignore from: {}", source.display());
    }

    let limits = ContextLimits {
        max_tokens: non_negative(config.command_int(COMMAND, "max_tokens", options.max_tokens)),
        max_tokens_doc: non_negative(config.command_int(
            COMMAND,
            "max_tokens_doc",
            options.max_tokens_doc,
        )),
    };
    tracing::debug!(
        "Context limits: max_tokens={} max_tokens_doc={}",
        limits.max_tokens,
        limits.max_tokens_doc
    );

    let assembler = PromptAssembler::new(ignore, options.path_format, limits)?;
    Ok(assembler.build(&options.paths))
}

/// Ask the model about `context` and print (or write) the answer.
pub async fn run_with_provider(
    options: &PromptOptions,
    config: &ConfigStore,
    provider: &dyn LlmProvider,
    context: &AssembledContext,
    colored: bool,
) -> Result<()> {
    let prompt = options.prompt.clone().unwrap_or_default();
    let language = config.language(Some(COMMAND), options.language.as_deref());
    let max_completion_tokens = if options.unlimited {
        None
    } else {
        completion_cap(config.command_int(
            COMMAND,
            "max_completion_tokens",
            options.max_completion_tokens,
        ))
    };

    let mut call = LlmCall::new(COMMAND, prompt, language);
    call.context = context.text.clone();
    call.specialist = options.specialist;
    call.model = options.model.clone();
    call.max_completion_tokens = max_completion_tokens;
    call.files = Some(context);
    if !options.only_output {
        call = call.with_spinner("Waiting for the model...");
    }

    let completion = ask(provider, config, call).await?;

    if options.only_output {
        let text = if options.json {
            pretty_json_or_raw(&completion.text)
        } else {
            completion.text.trim().to_string()
        };
        return write_or_print(options, &text, colored);
    }

    let tokens = |n: Option<u64>| n.map_or_else(|| "n/a".to_string(), |n| n.to_string());
    println!();
    ui::header("REQUEST INFORMATION", colored);
    println!("Provider Used: {}", completion.provider);
    println!("Model Used: {}", completion.model);
    println!(
        "Files Processed: {} ({} words, ~{} tokens) | Errors: {} | Ignored: {}",
        context.processed, context.words, context.tokens, context.errors, context.skipped
    );
    println!("Tokens Sent (API): {}", tokens(completion.prompt_tokens));
    println!("Tokens Received (API): {}", tokens(completion.completion_tokens));
    println!();
    ui::header("MODEL RESPONSE", colored);
    println!();

    write_or_print(options, &completion.text, colored)
}

/// No prompt: hand the assembled context to the user.
fn emit_context(options: &PromptOptions, context: &AssembledContext, colored: bool) -> Result<()> {
    if context.text.is_empty() {
        ui::warning("No valid files were found or processed.", colored);
        if context.skipped > 0 {
            ui::info(
                &format!("{} file(s) were ignored.", context.skipped),
                colored,
            );
        }
        return Ok(());
    }

    let summary = format!(
        "Processed {} file(s) ({} words, ~{} tokens in total).",
        context.processed, context.words, context.tokens
    );

    match &options.output {
        Some(path) => {
            fs::write(path, &context.text)?;
            ui::success(&summary, colored);
            if context.skipped > 0 {
                ui::info(&format!("{} file(s) were ignored.", context.skipped), colored);
            }
            if context.errors > 0 {
                ui::warning(&format!("Errors in {} file(s).", context.errors), colored);
            }
            ui::success(&format!("Context written to: {}", path.display()), colored);
        }
        None => {
            // stdout 只放内容，方便管道
            print!("{}", context.text);
            eprintln!("{}", summary);
            if context.skipped > 0 {
                eprintln!("{} file(s) were ignored.", context.skipped);
            }
            if context.errors > 0 {
                eprintln!("Errors in {} file(s).", context.errors);
            }
        }
    }
    Ok(())
}

fn write_or_print(options: &PromptOptions, text: &str, colored: bool) -> Result<()> {
    match &options.output {
        Some(path) => {
            fs::write(path, format!("{}\n", text))?;
            if !options.only_output {
                ui::success(&format!("Response written to: {}", path.display()), colored);
            }
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn non_negative(value: Option<i64>) -> usize {
    value
        .filter(|n| *n > 0)
        .map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX))
}
