//! Connection state machine.

/// Lifecycle state of a session's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Never opened.
    #[default]
    Disconnected,
    /// Connection and shell are open; commands may run.
    Connected,
    /// Closed after having been open. May be opened again.
    Closed,
}

impl ConnectionState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Disconnected -> Connected
    /// - Connected -> Closed
    /// - Closed -> Connected
    pub fn can_transition_to(&self, target: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (*self, target),
            (Disconnected, Connected) | (Connected, Closed) | (Closed, Connected)
        )
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: ConnectionState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::SessionError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if commands can run.
    pub fn can_execute(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let mut state = ConnectionState::Disconnected;
        assert!(state.transition_to(ConnectionState::Connected).is_ok());
        assert!(state.transition_to(ConnectionState::Closed).is_ok());
        assert!(state.transition_to(ConnectionState::Connected).is_ok());
        assert_eq!(state, ConnectionState::Connected);
    }

    #[test]
    fn test_invalid_double_open() {
        let mut state = ConnectionState::Connected;
        assert!(state.transition_to(ConnectionState::Connected).is_err());
        assert_eq!(state, ConnectionState::Connected);
    }

    #[test]
    fn test_invalid_close_before_open() {
        let mut state = ConnectionState::Disconnected;
        assert!(state.transition_to(ConnectionState::Closed).is_err());
        assert_eq!(state, ConnectionState::Disconnected);
    }

    #[test]
    fn test_can_execute() {
        assert!(!ConnectionState::Disconnected.can_execute());
        assert!(ConnectionState::Connected.can_execute());
        assert!(!ConnectionState::Closed.can_execute());
    }

    #[test]
    fn test_default() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }
}
