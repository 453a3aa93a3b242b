//! `MM:SS` countdown formatting.

/// Format a second count as zero-padded `MM:SS`.
///
/// Minutes are not wrapped at 60, so a 90-minute phase reads `90:00`.
///
/// ```
/// use pomodoro_radio::timer::format_clock;
///
/// assert_eq!(format_clock(1500), "25:00");
/// assert_eq!(format_clock(61), "01:01");
/// ```
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
