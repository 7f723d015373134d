/// Frame module - frame-in-flight sync, command recording, the frame loop

pub mod frame_sync;
pub mod command_recorder;
pub mod frame_orchestrator;

pub use frame_sync::*;
pub use command_recorder::*;
pub use frame_orchestrator::*;
