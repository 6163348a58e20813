//! Visual feedback for a scanning session
//!
//! Presenters only observe decisions; nothing they do can change an
//! authorization outcome.

use log::{debug, info};

use crate::engine::DecisionKind;
use crate::frame::{Detection, Frame};
use crate::token::TokenFields;

/// One detected code and what was decided about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub detection: Detection,
    pub decision: DecisionKind,
}

pub trait Presenter {
    /// Called once per frame that contained at least one code.
    fn present(&mut self, frame: &Frame, outcomes: &[Outcome]);
}

impl<T: Presenter + ?Sized> Presenter for &mut T {
    fn present(&mut self, frame: &Frame, outcomes: &[Outcome]) {
        (**self).present(frame, outcomes);
    }
}

/// Presents nothing.
impl Presenter for () {
    fn present(&mut self, _frame: &Frame, _outcomes: &[Outcome]) {}
}

/// Message shown to a holder whose attendance was just logged.
pub fn greeting(payload: &str) -> String {
    let name = TokenFields::parse(payload)
        .map(|fields| fields.display_name)
        .unwrap_or_else(|| payload.to_owned());
    format!("Hello {name}, your attendance has been taken!")
}

/// Reports decisions through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn present(&mut self, frame: &Frame, outcomes: &[Outcome]) {
        for outcome in outcomes {
            let region = outcome.detection.region;
            debug!(
                "frame {}: {} at ({}, {}) {}x{}",
                frame.sequence,
                outcome.decision.label(),
                region.left,
                region.top,
                region.width,
                region.height
            );
            if outcome.decision == DecisionKind::GrantedLogged {
                info!("{}", greeting(&outcome.detection.payload));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_uses_parsed_name() {
        assert_eq!(
            greeting("ROLLCALL/1 id=AL12345 issued=2026-01-01T00:00:00Z name=Ada Lovelace"),
            "Hello Ada Lovelace, your attendance has been taken!"
        );
        assert_eq!(
            greeting("Name: Grace Hopper | ID: GH12345 | Your attendance has been taken successfully."),
            "Hello Grace Hopper, your attendance has been taken!"
        );
    }

    #[test]
    fn test_greeting_falls_back_to_payload() {
        assert_eq!(greeting("X"), "Hello X, your attendance has been taken!");
    }
}
