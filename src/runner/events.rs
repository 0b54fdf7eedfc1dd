use std::collections::HashMap;
use tokio::sync::broadcast;

/// Workflow execution events for real-time console output
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    RunStarted {
        suite: String,
        session_id: String,
        step_count: usize,
    },
    RunFinished {
        suite: String,
        passed: usize,
        failed: usize,
        skipped: usize,
        duration_ms: u64,
    },

    StepStarted {
        suite: String,
        index: u32,
        name: String,
        target: String,
    },
    StepPassed {
        suite: String,
        index: u32,
        duration_ms: u64,
    },
    StepFailed {
        suite: String,
        index: u32,
        error: String,
        duration_ms: u64,
    },
    StepSkipped {
        suite: String,
        index: u32,
        name: String,
        reason: String,
    },

    Log {
        suite: String,
        message: String,
    },
}

/// Event emitter for broadcasting run events
pub struct EventEmitter {
    sender: broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<RunEvent>) {
        let (sender, receiver) = broadcast::channel(100);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

impl Clone for EventEmitter {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<RunEvent>) {
        use colored::Colorize;
        use indicatif::ProgressDrawTarget;
        use std::io::IsTerminal;

        // Hidden draw target when piped, to keep escape codes out of CI logs
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        // One running step per suite
        let mut spinners: HashMap<String, (ProgressBar, String)> = HashMap::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                RunEvent::RunStarted {
                    suite,
                    session_id,
                    step_count,
                } => {
                    multi
                        .println(format!(
                            "\n{} [{}] run started: {} ({} steps)",
                            "▶".green().bold(),
                            suite.cyan(),
                            session_id.dimmed(),
                            step_count
                        ))
                        .ok();
                }

                RunEvent::RunFinished {
                    suite,
                    passed,
                    failed,
                    skipped,
                    duration_ms,
                } => {
                    if let Some((pb, _)) = spinners.remove(&suite) {
                        pb.finish();
                    }
                    println!("\n{} [{}] run finished", "■".blue().bold(), suite.cyan());
                    println!(
                        "  {} passed, {} failed, {} skipped",
                        passed.to_string().green(),
                        failed.to_string().red(),
                        skipped.to_string().yellow()
                    );
                    println!("  Duration: {}ms", duration_ms);
                }

                RunEvent::StepStarted {
                    suite,
                    index,
                    name,
                    target,
                } => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    let style = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("    {spinner} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner());
                    pb.set_style(style);

                    let body = format!("[{}] Step {}: {} {}", suite, index, name, target.dimmed());
                    pb.set_message(format!("{}... ", body));
                    pb.enable_steady_tick(StdDuration::from_millis(100));

                    spinners.insert(suite, (pb, body));
                }

                RunEvent::StepPassed {
                    suite, duration_ms, ..
                } => {
                    if let Some((pb, body)) = spinners.remove(&suite) {
                        pb.finish_and_clear();
                        println!("    {} {} ({}ms)", "✓".green(), body, duration_ms);
                    }
                }

                RunEvent::StepFailed {
                    suite,
                    error,
                    duration_ms,
                    ..
                } => {
                    if let Some((pb, body)) = spinners.remove(&suite) {
                        pb.finish_and_clear();
                        println!("    {} {} ({}ms)", "✗".red(), body, duration_ms);
                    }
                    println!("        {}", error.red());
                }

                RunEvent::StepSkipped {
                    suite,
                    index,
                    name,
                    reason,
                } => {
                    println!(
                        "    {} [{}] Step {}: {} ({})",
                        "○".yellow(),
                        suite,
                        index,
                        name,
                        reason.dimmed()
                    );
                }

                RunEvent::Log { suite, message } => {
                    multi.println(format!("      [{}] {}", suite, message)).ok();
                }
            }
        }
    }
}
