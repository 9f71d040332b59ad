/// Rendering surface contract and canvas events
pub mod canvas;

/// Palette entries and drag payloads
pub mod palette;

/// Debounced property editing
pub mod property_editor;

/// Undo/redo history
pub mod history;

/// Canvas synchronizer and editing session
pub mod editor_session;

/// Save/load pipeline
pub mod workflow_persistence_service;
