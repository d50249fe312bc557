//! The `adaptest take` command.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;

use adaptest_core::bank::{parse_bank, validate_bank};
use adaptest_core::model::QuestionView;
use adaptest_core::service::{Outcome, SubmitRequest};
use adaptest_core::session::SessionSummary;
use adaptest_core::store::spawn_sweeper;
use adaptest_core::{AdaptiveEngine, QuizError, QuizService, SessionStore};
use adaptest_oracles::{create_oracle, load_config_from};

const QUIT_COMMANDS: [&str; 2] = [":q", ":quit"];

pub async fn execute(
    bank_path: PathBuf,
    oracle_name: Option<String>,
    max_questions: Option<usize>,
    json: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config_from(config_path.as_deref())?;
    if let Some(n) = max_questions {
        config.quiz.max_questions = n;
        config.validate()?;
    }

    let bank = parse_bank(&bank_path)?;
    for w in validate_bank(&bank, &config.policy, config.quiz.max_questions) {
        tracing::warn!(question = ?w.question_id, "{}", w.message);
    }

    let name = oracle_name.unwrap_or_else(|| config.default_oracle.clone());
    let oracle = create_oracle(&config.oracle(&name)?, &config)?;

    let engine = Arc::new(AdaptiveEngine::new(
        Arc::new(bank),
        config.policy.clone(),
        config.quiz.max_questions,
    ));
    let mut store = SessionStore::new(config.inactivity_timeout()?);
    if let Some(max) = config.quiz.max_sessions {
        store = store.with_max_sessions(max);
    }
    let store = Arc::new(store);

    let cancel = CancellationToken::new();
    let sweeper = spawn_sweeper(store.clone(), config.sweep_interval(), cancel.clone());
    let service =
        QuizService::new(engine, store, oracle).with_oracle_timeout(config.oracle_timeout());

    let result = run_quiz(&service, json).await;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!("session sweeper ended abnormally: {e}");
    }
    result
}

async fn run_quiz(service: &QuizService, json: bool) -> Result<()> {
    let start = service.start().await?;
    let session_id = start.session_id;
    println!(
        "{} ({} questions). Type {} to stop early.\n",
        service.engine().bank().name(),
        start.question.total,
        QUIT_COMMANDS[1]
    );

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut current = start.question;

    let summary = loop {
        print_question(&current);

        let Some(answer) = read_answer(&mut input).await? else {
            break service.finish(session_id).await?;
        };
        let explanation = prompt(&mut input, "Explanation (optional): ")
            .await?
            .filter(|e| !e.trim().is_empty());

        let request = SubmitRequest {
            session_id,
            question_id: current.id.clone(),
            answer,
            explanation,
        };

        let response = match service.submit(request).await {
            Ok(response) => response,
            Err(QuizError::Oracle(e)) => {
                println!("Scoring failed ({e}). Your answer was not recorded, please try again.\n");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        println!(
            "Score: {:.2}  Difficulty: {}\n{}",
            response.score, response.updated_difficulty, response.feedback
        );
        if let Some(explanation_score) = response.explanation_score {
            println!("Explanation: {explanation_score:.2}");
        }
        if let Some(m) = &response.misconception {
            println!("Misconception: {m}");
        }
        println!();

        match response.outcome {
            Outcome::Next { question } => current = question,
            Outcome::Completed { .. } => break service.finish(session_id).await?,
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_question(question: &QuestionView) {
    let topic = question
        .topic
        .as_deref()
        .map(|t| format!(", {t}"))
        .unwrap_or_default();
    println!(
        "Question {}/{} ({}{topic})\n{}\n",
        question.number, question.total, question.tier, question.prompt
    );
}

/// Read a non-empty answer. `None` on end of input or a quit command.
async fn read_answer(input: &mut Lines<BufReader<Stdin>>) -> Result<Option<String>> {
    loop {
        let Some(line) = prompt(input, "Answer: ").await? else {
            return Ok(None);
        };
        let trimmed = line.trim();
        if QUIT_COMMANDS.contains(&trimmed) {
            return Ok(None);
        }
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.to_string()));
        }
    }
}

async fn prompt(input: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<Option<String>> {
    print!("{label}");
    std::io::stdout().flush()?;
    Ok(input.next_line().await?)
}

fn print_summary(summary: &SessionSummary) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Tier", "Answered", "Average score"]);
    for tier in &summary.per_tier {
        table.add_row(vec![
            Cell::new(tier.tier),
            Cell::new(tier.answered),
            Cell::new(format!("{:.2}", tier.average_score)),
        ]);
    }

    println!("{table}");
    println!(
        "Answered {}/{}{}",
        summary.answered,
        summary.total,
        if summary.answered < summary.total {
            " (ended early)"
        } else {
            ""
        }
    );
    println!("Average score: {:.2}", summary.average_score);
    println!("Average explanation score: {:.2}", summary.average_explanation);
    println!("Final difficulty: {}", summary.final_difficulty);
    println!("Time: {:.0}s", summary.elapsed_secs);
}
