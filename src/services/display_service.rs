use std::io::{self, Write};

use tracing::warn;

/// Animation class re-added on every new value so the highlight replays
pub const FLASH_CLASS: &str = "animate__flash";
pub const VOLUME_HEADING: &str = "24hr Trading Volume:";

/// The element showing the latest volume, handed to the dashboard explicitly
pub trait VolumeDisplay: Send {
    fn show_loading(&mut self);
    /// `formatted` has no currency symbol; the display adds `$`
    fn show_volume(&mut self, formatted: &str);
    fn show_failure(&mut self, reason: &str);
    fn remove_class(&mut self, class: &str);
    fn add_class(&mut self, class: &str);
}

/// Terminal display. The flash animation is a highlighted line printed
/// when the flash class is added.
pub struct ConsoleDisplay<W: Write + Send> {
    out: W,
    value: Option<String>,
    classes: Vec<String>,
}

impl ConsoleDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            value: None,
            classes: Vec::new(),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
            warn!("Failed to write to display: {}", e);
        }
    }

    fn render_value(&mut self) {
        let Some(value) = self.value.clone() else {
            return;
        };
        let line = if self.has_class(FLASH_CLASS) {
            format!("{} \x1b[1;34m${}\x1b[0m", VOLUME_HEADING, value)
        } else {
            format!("{} ${}", VOLUME_HEADING, value)
        };
        self.write_line(&line);
    }
}

impl<W: Write + Send> VolumeDisplay for ConsoleDisplay<W> {
    fn show_loading(&mut self) {
        self.write_line("loading ...");
    }

    fn show_volume(&mut self, formatted: &str) {
        self.value = Some(formatted.to_string());
    }

    fn show_failure(&mut self, reason: &str) {
        self.write_line(&format!("⚠️ Volume unavailable: {} (retrying on next refresh)", reason));
    }

    fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }

    fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_string());
        }
        if class == FLASH_CLASS {
            self.render_value();
        }
    }
}
