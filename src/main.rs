//! CLI entry point for wurl.

use std::process::ExitCode;

mod app;
mod app_config;
mod cli;

/// Process-level result, mapped onto the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    Success,
    Failure,
    Interrupted,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Interrupted => 130,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match app::runtime::run_wurl().await {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(error) => {
            eprintln!("wurl: {error:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}
