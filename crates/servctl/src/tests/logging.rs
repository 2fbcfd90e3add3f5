use crate::config::LoggingSettings;
use crate::logging::current_log_path;

use std::path::Path;

#[test]
fn given_settings_when_current_log_path_then_dated_file_in_log_dir() {
    // Given
    let settings = LoggingSettings {
        directory: "logs".into(),
        file_prefix: "servctl".into(),
        ..Default::default()
    };

    // When
    let path = current_log_path(Path::new("/data/app"), &settings);

    // Then
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    assert_eq!(
        path,
        Path::new("/data/app/logs").join(format!("servctl.{today}.log"))
    );
}
