use indicatif::{ProgressBar, ProgressStyle};

/// Percentage bar driven by the render progress callback.
pub fn create_percent_bar(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
    {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏ "));
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Finish a bar and print a success message with a checkmark
pub fn finish_with_success(pb: ProgressBar, message: impl Into<String>) {
    pb.finish_and_clear();
    println!("✓ {}", message.into());
}
