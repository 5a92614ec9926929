use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::str::FromStr;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UiMode {
    #[default]
    Auto,
    Plain,
    Pretty,
}

impl FromStr for UiMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(UiMode::Auto),
            "plain" => Ok(UiMode::Plain),
            "pretty" => Ok(UiMode::Pretty),
            other => Err(format!(
                "unknown ui mode '{}' (expected auto, plain or pretty)",
                other
            )),
        }
    }
}

/// Terminal feedback for the binary: a spinner on a TTY, `==>` lines otherwise.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn is_pretty(&self) -> bool {
        self.is_tty && self.mode != UiMode::Plain
    }

    pub fn activity(&self, name: &str) -> Activity {
        if self.is_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            Activity::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            Activity::new(name.to_string(), None)
        }
    }
}

/// One running activity. Reports its outcome once, on `finish` or on drop.
pub struct Activity {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    done: bool,
}

impl Activity {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
            done: false,
        }
    }

    /// Close the activity with a ✔ or ✖ and a detail line.
    pub fn finish(mut self, ok: bool, detail: &str) {
        self.report(ok, detail);
    }

    fn report(&mut self, ok: bool, detail: &str) {
        if self.done {
            return;
        }
        self.done = true;
        let mark = if ok { "✔" } else { "✖" };
        let elapsed = format_duration(self.start.elapsed());
        let message = if detail.is_empty() {
            format!("{mark} {} ({elapsed})", self.name)
        } else {
            format!("{mark} {} ({elapsed}): {detail}", self.name)
        };
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

impl Drop for Activity {
    fn drop(&mut self) {
        self.report(false, "interrupted");
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
