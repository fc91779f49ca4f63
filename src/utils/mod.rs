use crate::config::ToolsConfig;

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format a duration the way video sites print it: `m:ss` or `h:mm:ss`
pub fn format_timestamp(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Sanitize a media title so it can be used as a single path component
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .trim_start_matches('.')
        .trim()
        .to_string()
}

/// Check if the current environment has required tools
pub async fn check_dependencies(tools: &ToolsConfig) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(&tools.yt_dlp, "--version").await {
        missing.push(format!(
            "{} - required for searching and resolving YouTube videos",
            tools.yt_dlp
        ));
    }

    if !check_command_available(&tools.ffmpeg, "-version").await {
        missing.push(format!(
            "{} - required for MP3 conversion and tagging",
            tools.ffmpeg
        ));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, version_flag: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg(version_flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "0:00");
        assert_eq!(format_timestamp(59), "0:59");
        assert_eq!(format_timestamp(185), "3:05");
        assert_eq!(format_timestamp(3661), "1:01:01");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Hello World!"), "Hello World!");
        assert_eq!(sanitize_filename("AC/DC - T.N.T."), "AC_DC - T.N.T.");
        assert_eq!(sanitize_filename("what?  \"live\""), "what_  _live_");
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("  spaced  "), "spaced");
    }

    #[tokio::test]
    async fn test_missing_tools_are_reported() {
        let tools = ToolsConfig {
            yt_dlp: "songdown-no-such-yt-dlp".to_string(),
            ffmpeg: "songdown-no-such-ffmpeg".to_string(),
        };
        let missing = check_dependencies(&tools).await;
        assert_eq!(missing.len(), 2);
        assert!(missing[0].starts_with("songdown-no-such-yt-dlp"));
    }
}
