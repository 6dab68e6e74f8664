// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Error types for the PV_Live client

use thiserror::Error;

/// Coarse classification of a [`PvLiveError`].
///
/// Input errors are detected locally before any request is sent. Communication
/// errors cover everything that went wrong at or beyond the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Communication,
    Config,
    Io,
}

#[derive(Debug, Error)]
pub enum PvLiveError {
    #[error("invalid entity: {0}")]
    InvalidEntity(String),

    #[error("the period parameter must be one of: 5, 30 (got {0})")]
    InvalidPeriod(u32),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("error communicating with the PV_Live API: {0}")]
    Communication(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl PvLiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEntity(_) | Self::InvalidPeriod(_) | Self::InvalidInput(_) => {
                ErrorKind::Input
            }
            Self::Communication(_) => ErrorKind::Communication,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) | Self::Csv(_) => ErrorKind::Io,
        }
    }

    pub fn is_input(&self) -> bool {
        self.kind() == ErrorKind::Input
    }
}

/// Failure of a single HTTP attempt (connect, timeout, body read).
///
/// Never returned to callers directly; the executor retries these and reports
/// a [`PvLiveError::Communication`] once attempts run out.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

pub type PvLiveResult<T> = std::result::Result<T, PvLiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            PvLiveError::InvalidEntity("x".to_string()).kind(),
            ErrorKind::Input
        );
        assert_eq!(PvLiveError::InvalidPeriod(15).kind(), ErrorKind::Input);
        assert_eq!(
            PvLiveError::Communication("down".to_string()).kind(),
            ErrorKind::Communication
        );
        assert_eq!(
            PvLiveError::Config("bad".to_string()).kind(),
            ErrorKind::Config
        );
        assert!(PvLiveError::InvalidInput("naive".to_string()).is_input());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = PvLiveError::Communication("Bad Request (400)... unknown field".to_string());
        let msg = err.to_string();
        assert!(msg.contains("PV_Live API"));
        assert!(msg.contains("unknown field"));

        assert!(PvLiveError::InvalidPeriod(15).to_string().contains("15"));
    }
}
