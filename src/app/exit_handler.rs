//! Exit code logic for the wurl process.
//!
//! Single responsibility: map the final transfer status to the process exit outcome.

use wurl_core::TransferStatus;

use crate::ProcessExit;

/// Determines the process exit outcome from the final transfer status.
pub(crate) fn determine_exit_outcome(status: TransferStatus) -> ProcessExit {
    match status {
        TransferStatus::Success => ProcessExit::Success,
        TransferStatus::ExhaustedRetries | TransferStatus::FatalAbort => ProcessExit::Failure,
        TransferStatus::Interrupted => ProcessExit::Interrupted,
    }
}
