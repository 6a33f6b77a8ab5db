use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;

use quiz_core::model::{AttemptId, OptionId, Question, QuestionId};
use services::{RunCommand, RunHandle, RunUi, Severity, TimerReadout};

struct OnScreen {
    question_id: QuestionId,
    options: Vec<OptionId>,
}

#[derive(Default)]
struct DurationPrompt {
    input_closed: bool,
    waiter: Option<oneshot::Sender<String>>,
}

/// Terminal collaborator: prints questions and notices, reads answers from stdin.
pub struct ConsoleUi {
    preset_duration: Option<i64>,
    default_secs: i64,
    on_screen: Mutex<Option<OnScreen>>,
    last_timer: Mutex<String>,
    prompt: Mutex<DurationPrompt>,
}

impl ConsoleUi {
    pub fn new(preset_duration: Option<i64>, default_secs: i64) -> Self {
        Self {
            preset_duration,
            default_secs,
            on_screen: Mutex::new(None),
            last_timer: Mutex::new(String::new()),
            prompt: Mutex::new(DurationPrompt::default()),
        }
    }

    /// Map a typed line to a command against the question on screen.
    ///
    /// Answers are 1-based option numbers separated by spaces or commas.
    pub fn parse_command(&self, line: &str) -> Option<RunCommand> {
        match line.trim().to_ascii_lowercase().as_str() {
            "" => None,
            "q" | "quit" | "end" => Some(RunCommand::End),
            "r" | "retry" => Some(RunCommand::Retry),
            raw => {
                let on_screen = self.on_screen.lock().ok()?;
                let OnScreen {
                    question_id,
                    options,
                } = on_screen.as_ref()?;
                let selected = raw
                    .split([',', ' '])
                    .filter(|part| !part.is_empty())
                    .map(|part| {
                        let index = part.parse::<usize>().ok()?.checked_sub(1)?;
                        options.get(index).cloned()
                    })
                    .collect::<Option<Vec<_>>>()?;
                Some(RunCommand::Answer {
                    question_id: *question_id,
                    selected,
                })
            }
        }
    }

    fn take_duration_waiter(&self) -> Option<oneshot::Sender<String>> {
        self.prompt.lock().ok().and_then(|mut prompt| prompt.waiter.take())
    }

    fn close_input(&self) {
        if let Ok(mut prompt) = self.prompt.lock() {
            prompt.input_closed = true;
            prompt.waiter = None;
        }
    }
}

#[async_trait]
impl RunUi for ConsoleUi {
    fn show_question(&self, question: &Question) {
        println!();
        println!("[{}] {}", question.difficulty_label(), question.prompt);
        for (index, option) in question.options.iter().enumerate() {
            println!("  {}) {}", index + 1, option.text);
        }
        if let Ok(mut on_screen) = self.on_screen.lock() {
            *on_screen = Some(OnScreen {
                question_id: question.id,
                options: question.options.iter().map(|o| o.id.clone()).collect(),
            });
        }
    }

    fn notify(&self, text: &str, severity: Severity) {
        let marker = match severity {
            Severity::Info => "·",
            Severity::Success => "✔",
            Severity::Error => "✘",
        };
        println!("{marker} {text}");
    }

    async fn ask_duration(&self) -> Option<i64> {
        if self.preset_duration.is_some() {
            return self.preset_duration;
        }
        let rx = {
            let mut prompt = self.prompt.lock().ok()?;
            if prompt.input_closed {
                return None;
            }
            let (tx, rx) = oneshot::channel();
            prompt.waiter = Some(tx);
            rx
        };
        println!("Run length in seconds (blank for {}):", self.default_secs);
        let line = rx.await.ok()?;
        line.trim().parse().ok()
    }

    fn go_to_results(&self, attempt_id: &AttemptId) {
        println!("Results: attempt {attempt_id}");
    }

    fn enter_immersive(&self) {
        println!("Answer with option numbers (e.g. `2` or `1,3`), `q` to end, `r` to retry.");
    }

    fn exit_immersive(&self) {
        if let Ok(mut on_screen) = self.on_screen.lock() {
            *on_screen = None;
        }
    }

    fn show_score(&self, score: i64) {
        println!("Score: {score}");
    }

    fn show_timer(&self, readout: &TimerReadout) {
        if matches!(readout, TimerReadout::Elapsed { .. }) {
            return;
        }
        let text = readout.to_string();
        let Ok(mut last) = self.last_timer.lock() else {
            return;
        };
        if *last != text {
            match readout {
                TimerReadout::RunRemaining { low: true, .. } => println!("⏱ {text} !"),
                _ => println!("⏱ {text}"),
            }
            *last = text;
        }
    }
}

/// Forward stdin lines to the run until input ends or the run stops.
///
/// A pending duration prompt takes the next line before it is read as a command.
pub async fn forward_input(ui: Arc<ConsoleUi>, handle: RunHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(waiter) = ui.take_duration_waiter() {
            let _ = waiter.send(line);
            continue;
        }
        let Some(command) = ui.parse_command(&line) else {
            println!("? unrecognised input: {}", line.trim());
            continue;
        };
        if !handle.send(command).await {
            break;
        }
    }
    ui.close_input();
}
