use anyhow::Result;
use console::style;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tabletalk_core::config::{Config, get_tabletalk_dir};
use tabletalk_core::{AgentError, AgentLoop, ConversationState};
use tokio_util::sync::CancellationToken;

const HISTORY_FILE: &str = "history.txt";

/// Interactive session over one conversation. `reset` starts a new one.
pub async fn run(agent: &AgentLoop, config: &Config) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let history = get_tabletalk_dir().join(HISTORY_FILE);
    let _ = editor.load_history(&history);

    println!("{}", style("tabletalk").cyan().bold());
    println!(
        "{}",
        style(format!(
            "Data: {} · model: {}",
            config.data_dir.display(),
            config.model
        ))
        .dim()
    );
    println!("{}\n", style("Commands: reset, quit (Ctrl+D to exit)").dim());

    let pricing = config.cost_tracker();
    let mut conversation = ConversationState::new();
    let mut questions = 0usize;

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input);

        match input {
            "quit" | "exit" | "q" => break,
            "reset" => {
                print_summary(agent, &conversation, questions);
                conversation.reset();
                agent.executor().source().refresh().await;
                questions = 0;
                println!("{}\n", style("Conversation cleared; files will be re-read.").green());
                continue;
            }
            _ => {}
        }

        let before = conversation.usage();
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        println!("\n{}\n", style("Analyzing...").dim());
        let result = agent.run_query(input, &mut conversation, &cancel).await;
        watcher.abort();
        questions += 1;

        match result {
            Ok(outcome) => {
                termimad::print_text(&outcome.answer);
                let turn = outcome.usage.since(&before);
                println!(
                    "\n{}\n",
                    style(format!(
                        "tokens: {} in / {} out · session ${:.4}",
                        turn.prompt_tokens, turn.completion_tokens, outcome.estimated_cost.total_cost
                    ))
                    .dim()
                );
            }
            Err(e) => {
                match &e {
                    AgentError::Cancelled { .. } => println!("{}", style("Cancelled.").yellow()),
                    _ => eprintln!("{} {}", style("✗").red(), e),
                }
                if let Some(line) = crate::partial_usage_line(&e, &before, &pricing) {
                    println!("{}", style(line).dim());
                }
                println!();
            }
        }
    }

    print_summary(agent, &conversation, questions);
    if std::fs::create_dir_all(get_tabletalk_dir()).is_ok() {
        let _ = editor.save_history(&history);
    }
    println!("Goodbye!");
    Ok(())
}

fn print_summary(agent: &AgentLoop, conversation: &ConversationState, questions: usize) {
    let usage = conversation.usage();
    if usage.is_empty() {
        return;
    }
    let cost = agent.estimate_cost(&usage);
    println!(
        "\n{} {} questions · {} tokens ({} in / {} out) · ${:.4}",
        style("Session").bold(),
        questions,
        usage.total_tokens(),
        usage.prompt_tokens,
        usage.completion_tokens,
        cost.total_cost
    );
}
