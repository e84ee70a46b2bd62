use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Optional plain-text transcript of a chat session.
pub struct LoggingState {
    file_path: Option<String>,
    is_active: bool,
}

impl LoggingState {
    pub fn disabled() -> Self {
        Self {
            file_path: None,
            is_active: false,
        }
    }

    /// Start logging to `path`, failing early when the file cannot be written.
    pub fn to_file(path: impl Into<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut logging = Self::disabled();
        logging.set_log_file(path.into())?;
        Ok(logging)
    }

    pub fn set_log_file(&mut self, path: String) -> Result<String, Box<dyn std::error::Error>> {
        self.test_file_access(&path)?;

        self.file_path = Some(path.clone());
        self.is_active = true;

        Ok(format!("Logging enabled to: {path}"))
    }

    pub fn toggle_logging(&mut self) -> Result<String, Box<dyn std::error::Error>> {
        match &self.file_path {
            Some(path) => {
                self.is_active = !self.is_active;
                if self.is_active {
                    Ok(format!("Logging resumed to: {path}"))
                } else {
                    Ok(format!("Logging paused (file: {path})"))
                }
            }
            None => Err("No log file specified. Start with --log <file> to enable logging.".into()),
        }
    }

    /// Append `content` followed by a blank separator line.
    pub fn log_message(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = self.file_path.as_ref().filter(|_| self.is_active) else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer)?;

        writer.flush()?;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn get_status_string(&self) -> String {
        let file_name = |path: &str| {
            Path::new(path)
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned()
        };
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!("active ({})", file_name(path)),
            (Some(path), false) => format!("paused ({})", file_name(path)),
        }
    }

    fn test_file_access(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn disabled_logging_writes_nothing() {
        let logging = LoggingState::disabled();
        assert!(logging.log_message("ignored").is_ok());
        assert_eq!(logging.get_status_string(), "disabled");
    }

    #[test]
    fn messages_are_separated_by_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.log");
        let logging = LoggingState::to_file(path.to_string_lossy()).unwrap();

        logging.log_message("You: Hello").unwrap();
        logging.log_message("Hi!\nHow can I help?").unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "You: Hello\n\nHi!\nHow can I help?\n\n");
        assert_eq!(logging.get_status_string(), "active (chat.log)");
    }

    #[test]
    fn toggling_pauses_and_resumes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.log");
        let mut logging = LoggingState::to_file(path.to_string_lossy()).unwrap();

        logging.toggle_logging().unwrap();
        assert!(!logging.is_active());
        logging.log_message("skipped").unwrap();
        logging.toggle_logging().unwrap();
        logging.log_message("kept").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "kept\n\n");
        assert!(LoggingState::disabled().toggle_logging().is_err());
    }

    #[test]
    fn unwritable_path_is_rejected_up_front() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("chat.log");
        assert!(LoggingState::to_file(path.to_string_lossy()).is_err());
    }
}
