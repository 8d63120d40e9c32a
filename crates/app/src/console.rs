//! Line-oriented terminal front end for an exam session.

use std::fmt;

use exam_core::model::{AnswerValue, Question, QuestionKind};
use serde_json::Value;
use services::{ExamSessionHandle, ExamSessionView, SaveBanner, SessionError, SessionPhase};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Answer(String),
    Next,
    Previous,
    Jump { section: usize, question: usize },
    Flag,
    Submit,
    Confirm,
    Cancel,
    Retry,
    Show,
    Help,
    Quit,
}

impl Input {
    fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match word {
            "a" | "answer" if !rest.is_empty() => Ok(Self::Answer(rest.to_owned())),
            "n" | "next" => Ok(Self::Next),
            "p" | "prev" | "previous" => Ok(Self::Previous),
            "j" | "jump" => {
                let mut parts = rest.split_whitespace().map(str::parse::<usize>);
                match (parts.next(), parts.next()) {
                    (Some(Ok(section)), Some(Ok(question))) if section > 0 && question > 0 => {
                        Ok(Self::Jump {
                            section: section - 1,
                            question: question - 1,
                        })
                    }
                    _ => Err("usage: jump <section> <question>".into()),
                }
            }
            "f" | "flag" => Ok(Self::Flag),
            "submit" => Ok(Self::Submit),
            "y" | "yes" | "confirm" => Ok(Self::Confirm),
            "cancel" => Ok(Self::Cancel),
            "r" | "retry" => Ok(Self::Retry),
            "" | "s" | "show" => Ok(Self::Show),
            "h" | "help" | "?" => Ok(Self::Help),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            "a" | "answer" => Err("usage: answer <value>".into()),
            other => Err(format!("unknown command: {other} (type `help`)")),
        }
    }
}

const HELP: &str = "\
commands:
  answer <value>     answer the current question (option number, true/false, or text)
  next | prev        move between questions
  jump <s> <q>       go to question <q> of section <s>
  flag               toggle the review flag
  submit             review and submit (then `confirm` or `cancel`)
  retry              retry a failed save or submit
  show | quit";

/// Run the prompt until the exam is submitted or the user quits.
///
/// # Errors
///
/// Returns `SessionError::EngineClosed` if the engine stops underneath the prompt.
pub async fn run(handle: &ExamSessionHandle) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut updates = handle.subscribe();
    let mut last = handle.view();
    println!("{HELP}");
    print!("{}", Screen(&last));
    if last.phase == SessionPhase::Submitted {
        return Ok(());
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match Input::parse(&line) {
                    Ok(Input::Quit) => break,
                    Ok(Input::Help) => println!("{HELP}"),
                    Ok(Input::Show) => print!("{}", Screen(&handle.view())),
                    Ok(input) => apply(handle, &handle.view(), input)?,
                    Err(message) => println!("{message}"),
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();
                if let Some(notice) = notable_change(&last, &view) {
                    print!("{notice}");
                }
                let done = view.phase == SessionPhase::Submitted;
                last = view;
                if done {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn apply(
    handle: &ExamSessionHandle,
    view: &ExamSessionView,
    input: Input,
) -> Result<(), SessionError> {
    match input {
        Input::Answer(raw) => match parse_answer(view, &raw) {
            Some(value) => handle.answer(value),
            None => {
                println!("that does not answer this question");
                Ok(())
            }
        },
        Input::Next => handle.next(),
        Input::Previous => handle.previous(),
        Input::Jump { section, question } => handle.jump_to(section, question),
        Input::Flag => handle.toggle_flag(),
        Input::Submit => handle.request_submit(),
        Input::Confirm => handle.confirm_submit(),
        Input::Cancel => handle.cancel_submit(),
        Input::Retry if view.phase == SessionPhase::SubmitFailed => handle.retry_submit(),
        Input::Retry => handle.retry_save(),
        Input::Show | Input::Help | Input::Quit => Ok(()),
    }
}

/// Decode typed input for the current question. Choices are numbered from 1 on screen.
fn parse_answer(view: &ExamSessionView, raw: &str) -> Option<AnswerValue> {
    let current = view.current_question.as_ref()?;
    let question = Question::new(current.id, current.kind, current.points)
        .with_options(current.options.clone());
    let value = match current.kind {
        QuestionKind::MultipleChoice => {
            let shown: u64 = raw.trim().parse().ok()?;
            Value::from(shown.checked_sub(1)?)
        }
        _ => Value::String(raw.to_owned()),
    };
    AnswerValue::resolve(&question, &value).ok()
}

/// Something worth printing without being asked: a new question, phase or banner.
fn notable_change(before: &ExamSessionView, after: &ExamSessionView) -> Option<String> {
    let moved = before.current_question != after.current_question
        || before.position != after.position
        || before.phase != after.phase
        || before.confirm != after.confirm;
    if moved {
        return Some(Screen(after).to_string());
    }
    if before.save.banner != after.save.banner {
        if before.save.banner.is_visible() && !after.save.banner.is_visible() {
            return Some("progress saved\n".into());
        }
        return banner_line(&after.save.banner);
    }
    if after.low_time && !before.low_time {
        return Some(format!("less than five minutes left ({})\n", time(after)));
    }
    None
}

/// Full screen for one view.
struct Screen<'a>(&'a ExamSessionView);

impl fmt::Display for Screen<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = self.0;
        match view.phase {
            SessionPhase::Idle | SessionPhase::Starting => return writeln!(f, "starting exam..."),
            SessionPhase::Failed => {
                return writeln!(f, "{}", view.error.as_deref().unwrap_or("exam could not start"));
            }
            SessionPhase::Submitting => return writeln!(f, "submitting..."),
            SessionPhase::SubmitFailed => {
                return writeln!(
                    f,
                    "{} (type `retry`)",
                    view.error.as_deref().unwrap_or("submit failed")
                );
            }
            SessionPhase::Submitted => {
                write!(f, "submitted")?;
                if let Some(receipt) = &view.receipt {
                    write!(f, " at {} (receipt {})", receipt.submitted_at, receipt.id)?;
                }
                return writeln!(f);
            }
            SessionPhase::Unmounted => return writeln!(f, "exam closed"),
            SessionPhase::Active => {}
        }

        writeln!(
            f,
            "\n{} ({} pts) | {} left | {}/{} answered ({}%)",
            view.exam_title.as_deref().unwrap_or_default(),
            view.total_points,
            time(view),
            view.answered,
            view.total,
            view.progress_percent
        )?;
        if let Some(position) = &view.position {
            writeln!(
                f,
                "{} | question {} of {}",
                position.section_title,
                position.global_index + 1,
                view.total
            )?;
        }
        if let Some(question) = &view.current_question {
            let flag = if question.flagged { " [flagged]" } else { "" };
            writeln!(f, "{} ({} pts){flag}", question.prompt, question.points)?;
            for (index, option) in question.options.iter().enumerate() {
                writeln!(f, "  {}. {option}", index + 1)?;
            }
            if let Some(answer) = &question.answer {
                writeln!(f, "your answer: {}", answer_text(answer))?;
            }
        }
        let palette: String = view
            .palette
            .iter()
            .map(|entry| match (entry.current, entry.flagged, entry.answered) {
                (true, _, _) => '>',
                (_, true, _) => '?',
                (_, _, true) => '#',
                _ => '.',
            })
            .collect();
        writeln!(f, "[{palette}]")?;
        if let Some(line) = banner_line(&view.save.banner) {
            f.write_str(&line)?;
        }
        if let Some(summary) = &view.confirm {
            writeln!(
                f,
                "submit now? {} answered, {} unanswered, {} flagged. `confirm` or `cancel`",
                summary.answered, summary.unanswered, summary.flagged
            )?;
        }
        Ok(())
    }
}

fn banner_line(banner: &SaveBanner) -> Option<String> {
    match banner {
        SaveBanner::Hidden => None,
        SaveBanner::Retrying {
            attempt,
            max_attempts,
        } => Some(format!(
            "could not save (attempt {attempt} of {max_attempts}), retrying...\n"
        )),
        SaveBanner::Failed { message } | SaveBanner::Rejected { message } => {
            Some(format!("{message} Type `retry` to try again.\n"))
        }
    }
}

fn answer_text(answer: &AnswerValue) -> String {
    match answer {
        AnswerValue::Choice(index) => format!("option {}", index + 1),
        AnswerValue::TrueFalse(flag) => flag.to_string(),
        AnswerValue::Text(text) => text.clone(),
    }
}

fn time(view: &ExamSessionView) -> &str {
    view.time_display.as_deref().unwrap_or("--:--")
}
