use std::sync::Arc;

use clap::Args;
use clonalboot::tools::bootstrap::{
    ProgressEvent,
    ProgressHook,
};
use clonalboot::utils::NUM_THREADS_ENV;
use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use log::LevelFilter;

#[derive(Args, Debug, Clone)]
pub(crate) struct UtilsArgs {
    #[arg(
        long,
        default_value_t = 0,
        help_heading = "UTILS",
        help = "Number of worker threads. 0 uses all available cores."
    )]
    pub threads:  usize,
    #[arg(
        short,
        long,
        default_value_t = false,
        help_heading = "UTILS",
        help = "Verbose logging. RUST_LOG takes precedence when set."
    )]
    pub verbose:  bool,
    #[arg(
        long,
        default_value_t = false,
        help_heading = "UTILS",
        help = "Display a progress bar."
    )]
    pub progress: bool,
}

impl UtilsArgs {
    /// Configures the thread pool size and the logger. Has to run before
    /// any library call touches the thread pool.
    pub fn setup(&self) -> anyhow::Result<()> {
        if self.threads > 0 {
            std::env::set_var(NUM_THREADS_ENV, self.threads.to_string());
        }

        let level = if self.verbose {
            LevelFilter::Debug
        }
        else {
            LevelFilter::Info
        };
        let mut builder = pretty_env_logger::formatted_timed_builder();
        builder.filter_level(level);
        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
        builder.try_init()?;
        Ok(())
    }
}

pub fn init_pbar(total: usize) -> anyhow::Result<ProgressBar> {
    let progress_bar = ProgressBar::new(total as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}, ETA: {eta}] \
                 [{bar:40.cyan/blue}] {pos:>5.green}/{len:5} {msg}",
            )?
            .progress_chars("#>-"),
    );
    progress_bar.set_message("Resampling...");
    Ok(progress_bar)
}

/// Hook advancing `progress_bar`. Planned units of both arms add up to its
/// length.
pub fn progress_hook(progress_bar: ProgressBar) -> ProgressHook {
    Arc::new(move |event| {
        match event {
            ProgressEvent::Planned(units) => progress_bar.inc_length(units),
            ProgressEvent::Completed(units) => progress_bar.inc(units),
        }
    })
}
