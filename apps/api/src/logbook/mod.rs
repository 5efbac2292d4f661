//! Client-side logbook logic: the stack tuple codec, note projection,
//! filtering, dialog-to-payload shaping and export/import formats.

pub mod codec;
pub mod export;
pub mod filter;
pub mod form;
pub mod projection;
pub mod render;
pub mod stack_count;
