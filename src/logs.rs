use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::LogsError;

/// Returns the last `lines` lines of the log file at `log_path`.
///
/// # Arguments
/// * `log_path` - The server log file.
/// * `lines` - The number of log lines to return.
///
/// # Returns
/// * The trailing lines, or [`LogsError::LogUnavailable`] if the server has not written
///   the file yet.
pub fn tail_log(log_path: &Path, lines: usize) -> Result<Vec<String>, LogsError> {
    if !log_path.exists() {
        return Err(LogsError::LogUnavailable(log_path.to_path_buf()));
    }

    let file = File::open(log_path)?;
    let reader = BufReader::new(file);
    // Redis logs can carry client-supplied bytes, so undecodable lines are kept lossily.
    let all_lines = reader
        .split(b'\n')
        .map(|line| {
            let mut bytes = line?;
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        })
        .collect::<Result<Vec<String>, std::io::Error>>()?;

    let start = all_lines.len().saturating_sub(lines);
    Ok(all_lines[start..].to_vec())
}

/// Prints the last `lines` lines of the server log.
pub fn show_log(log_path: &Path, lines: usize) -> Result<(), LogsError> {
    for line in tail_log(log_path, lines)? {
        println!("{}", line);
    }
    Ok(())
}
