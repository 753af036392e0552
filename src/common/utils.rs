use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};

/// Read non-empty, non-comment lines from a file. Used for username lists;
/// `#`-prefixed lines and blank lines are ignored.
pub fn read_lines_from_file(file_path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let file = File::open(file_path)?;
    let reader = BufReader::new(file);
    let mut lines = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() && !line.starts_with('#') {
            lines.push(line.to_string());
        }
    }

    Ok(lines)
}

/// Spinner used by the attempt loop as a transient per-attempt status line.
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.into());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# header comment").unwrap();
        writeln!(file, "root").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  admin  ").unwrap();
        writeln!(file, "# trailing").unwrap();
        file.flush().unwrap();

        let lines = read_lines_from_file(file.path()).unwrap();
        assert_eq!(lines, vec!["root".to_string(), "admin".to_string()]);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_lines_from_file("/no/such/file.txt").is_err());
    }
}
