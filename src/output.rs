//! Terminal rendering for CLI commands.

use cricket_qa_core::format::{AnswerData, TableRow};
use cricket_qa_core::models::{ConversationTurn, UserSummary};

use crate::pipeline::AskResponse;

pub fn print_answer(response: &AskResponse) {
    if !response.success {
        println!("{}", response.message.as_deref().unwrap_or("Request failed."));
    } else {
        match &response.data {
            Some(AnswerData::Text(text)) => println!("{}", text),
            Some(AnswerData::Table(rows)) => print!("{}", render_table(rows)),
            None => {}
        }
    }

    let steps: Vec<String> = response
        .trace
        .steps()
        .iter()
        .map(|s| {
            if s.used_external_model {
                format!("{}*", s.step_name)
            } else {
                s.step_name.clone()
            }
        })
        .collect();
    println!();
    println!("trace: {}", steps.join(" → "));
}

/// Fixed-width table of answer rows.
pub fn render_table(rows: &[TableRow]) -> String {
    let name_w = rows
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut out = format!(
        "{:<name_w$}  {:<8} {:<6} {:>7} {:>8} {:>8} {:>6} {:>7}\n",
        "NAME", "COUNTRY", "FORMAT", "RUNS", "AVG", "SR", "HS", "MATCHES",
        name_w = name_w
    );
    out.push_str(&"-".repeat(name_w + 60));
    out.push('\n');
    for r in rows {
        out.push_str(&format!(
            "{:<name_w$}  {:<8} {:<6} {:>7} {:>8} {:>8} {:>6} {:>7}\n",
            r.name,
            r.country,
            r.format,
            r.runs,
            r.average,
            r.strike_rate,
            r.highest_score,
            r.matches,
            name_w = name_w
        ));
    }
    out
}

pub fn print_history(user_id: &str, turns: &[ConversationTurn]) {
    if turns.is_empty() {
        println!("No conversation history for {}.", user_id);
        return;
    }
    for t in turns {
        println!("[{}] {}", t.timestamp.format("%Y-%m-%d %H:%M:%S"), t.question);
        println!("    {}", t.answer);
    }
}

pub fn print_summary(user_id: &str, summary: Option<&UserSummary>) {
    match summary {
        Some(s) => {
            println!(
                "Summary for {} (after {} turns, updated {}):",
                user_id,
                s.conversation_count,
                s.last_updated.format("%Y-%m-%d %H:%M")
            );
            println!("{}", s.summary);
        }
        None => println!("No summary for {}.", user_id),
    }
}
