use crate::controller::CommandSpecError;
use crate::events::{DispatchError, EventPayloadError, TimerSpecError};
use crate::mapping::{DiscoveryError, MappingSampleError, ProfileLoadError};
use crate::model::ModelConstraintError;

// Umbrella error for hosts that do not care which subsystem failed
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileLoadError),

    #[error("Sample error: {0}")]
    Sample(#[from] MappingSampleError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Command error: {0}")]
    Command(#[from] CommandSpecError),

    #[error("Timer error: {0}")]
    Timer(#[from] TimerSpecError),

    #[error("Event error: {0}")]
    Event(#[from] EventPayloadError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Model error: {0}")]
    Model(#[from] ModelConstraintError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Command;
    use crate::events::{EventBus, HandlerId};

    fn build_empty_command() -> Result<(), CoreError> {
        Command::new("jump", vec![], vec![], None)?;
        Ok(())
    }

    fn send_nowhere() -> Result<(), CoreError> {
        EventBus::new().send(HandlerId(3), crate::Event::new("a"))?;
        Ok(())
    }

    #[test]
    fn test_subsystem_errors_convert() {
        assert!(matches!(
            build_empty_command(),
            Err(CoreError::Command(CommandSpecError::EmptySteps(name))) if name == "jump"
        ));
        let err = send_nowhere().unwrap_err();
        assert!(matches!(err, CoreError::Dispatch(DispatchError::UnknownHandler(HandlerId(3)))));
        assert!(err.to_string().starts_with("Dispatch error"));
    }
}
